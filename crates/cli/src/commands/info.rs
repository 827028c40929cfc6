//! `info` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{InspectorConfig, ObjectClass};
use quality_engine::format_seconds;
use tracing::info;

use crate::cli::{InfoArgs, InfoFormat};

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    if let Some(path) = &args.config {
        info!(config = %path.display(), "Loading configuration info");
    }

    let config =
        ConfigLoader::load_or_default(args.config.as_deref()).context("Failed to load config")?;

    match args.format {
        InfoFormat::Text => print_config_info(&config),
        InfoFormat::Toml => {
            println!("{}", ConfigLoader::to_toml(&config).context("Failed to render TOML")?)
        }
        InfoFormat::Json => {
            println!("{}", ConfigLoader::to_json(&config).context("Failed to render JSON")?)
        }
    }

    Ok(())
}

fn print_config_info(config: &InspectorConfig) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║              SSL Quality Inspector Configuration             ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📡 Vision");
    println!("   ├─ Address: {}", config.vision.address);
    println!("   ├─ Receive timeout: {} ms", config.vision.receive_timeout_ms);
    println!("   └─ Max datagram: {} bytes", config.vision.max_datagram_size);

    let windows = &config.windows;
    println!("\n⏱  Windows");
    println!("   ├─ Latency: {}", format_seconds(windows.latency_window_s));
    println!("   ├─ Camera quality: {}", format_seconds(windows.camera_quality_window_s));
    println!("   ├─ Ball quality: {}", format_seconds(windows.ball_quality_window_s));
    println!("   ├─ Robot quality: {}", format_seconds(windows.robot_quality_window_s));
    println!("   └─ Visibility timeout: {}", format_seconds(windows.visibility_timeout_s));

    let tracking = &config.tracking;
    println!("\n🎯 Tracking");
    println!("   ├─ Max ball velocity: {} m/s", tracking.max_ball_velocity);
    println!("   ├─ Max robot velocity: {} m/s", tracking.max_robot_velocity);
    println!(
        "   └─ Visible above quality: {:.0}%",
        tracking.visible_quality_threshold * 100.0
    );

    println!("\n📉 Data loss");
    for (i, class) in [ObjectClass::Robot, ObjectClass::Ball].into_iter().enumerate() {
        let t = config.data_loss.thresholds(class);
        let prefix = if i == 0 { "├─" } else { "└─" };
        println!(
            "   {} {}: reset after {}, report over {}, objects older than {}",
            prefix,
            class,
            format_seconds(t.reset_gap_s),
            format_seconds(t.report_gap_s),
            format_seconds(t.min_object_age_s)
        );
    }

    let clock = &config.clock;
    println!("\n🕒 Clock");
    if clock.enabled {
        println!("   ├─ SNTP port: {}", clock.port);
        println!("   ├─ Sample every {} ms, retry after {} ms", clock.sample_interval_ms, clock.retry_delay_ms);
        println!("   └─ Window: {}", format_seconds(clock.window_s));
    } else {
        println!("   └─ Disabled");
    }

    println!("\n🖥  Report");
    println!("   ├─ Interval: {} ms", config.render.interval_ms);
    println!("   ├─ Log lines: {}", config.render.log_tail);
    match config.metrics.port {
        0 => println!("   └─ Metrics: disabled"),
        port => println!("   └─ Metrics: port {}", port),
    }

    println!();
}
