//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::InspectorConfig;
use ingestion::MockVisionConfig;
use quality_engine::now_seconds;
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineOptions};

/// Execute the `run` command
pub async fn run_inspector(args: &RunArgs) -> Result<()> {
    if let Some(path) = &args.config {
        info!(config = %path.display(), "Loading configuration");
    } else {
        info!("No configuration file given, using defaults");
    }

    let mut config = config_loader::ConfigLoader::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    apply_overrides(&mut config, args);
    config_loader::ConfigLoader::validate(&config)
        .context("Configuration invalid after command line overrides")?;

    info!(
        address = %config.vision.address,
        receive_timeout_ms = config.vision.receive_timeout_ms,
        clock = config.clock.enabled,
        metrics_port = config.metrics.port,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let options = PipelineOptions {
        buffer_size: args.buffer_size.max(1),
        duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
        mock: args.mock.then(|| MockVisionConfig {
            cameras: args.mock_cameras,
            drop_every: args.mock_drop_every,
            start_time: now_seconds(),
            ..MockVisionConfig::default()
        }),
    };

    let pipeline = Pipeline::new(config, options);
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Inspector failed")?;

    stats.print_summary();
    info!("SSL Quality Inspector finished");
    Ok(())
}

/// Command line values win over the configuration file
fn apply_overrides(config: &mut InspectorConfig, args: &RunArgs) {
    if let Some(address) = &args.vision_address {
        info!(address = %address, "Overriding vision address from CLI");
        config.vision.address = address.clone();
    }
    if let Some(timeout) = args.receive_timeout_ms {
        config.vision.receive_timeout_ms = timeout;
    }
    if args.no_clock || args.mock {
        config.clock.enabled = false;
    }
    if let Some(interval) = args.render_interval_ms {
        config.render.interval_ms = interval;
    }
    if let Some(tail) = args.log_tail {
        config.render.log_tail = tail;
    }
    if args.no_clear {
        config.render.clear_screen = false;
    }
    if let Some(port) = args.metrics_port {
        config.metrics.port = port;
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Received shutdown signal, stopping inspector...");
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &InspectorConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Vision:");
    println!("  Address: {}", config.vision.address);
    println!("  Receive timeout: {} ms", config.vision.receive_timeout_ms);
    println!("\nClock watching: {}", if config.clock.enabled { "on" } else { "off" });
    if config.clock.enabled {
        println!("  SNTP port: {}", config.clock.port);
    }
    println!("\nReport every {} ms", config.render.interval_ms);
    if config.metrics.port != 0 {
        println!("Metrics on port {}", config.metrics.port);
    }
    println!();
}
