//! Terminal report of the aggregator state.
//!
//! Pure formatting over owned snapshots; nothing here touches the engine.

use std::fmt::{self, Write as _};

use quality_engine::{
    format_seconds, format_timestamp, AggregatorSnapshot, CameraSnapshot, ClockSnapshot,
    DurationStats, LossReport, TrackSnapshot,
};

/// Move the cursor to the upper left corner and clear the screen
pub const CLEAR_SCREEN: &str = "\x1b[H\x1b[2J";

/// Number of largest gaps listed per object class
const WORST_LOSSES: usize = 5;

/// Percentage in red below 30%, yellow below 60%, green otherwise
pub fn colorize_percent(value: f64) -> String {
    let color = if value < 0.3 {
        31
    } else if value < 0.6 {
        33
    } else {
        32
    };
    format!("\x1b[{}m{:4.0}%\x1b[0m", color, (value * 100.0).round())
}

fn quality(value: Option<f64>) -> String {
    value.map_or_else(|| "  n/a".to_string(), colorize_percent)
}

fn duration_stats(stats: Option<DurationStats>) -> String {
    match stats {
        Some(s) => format!(
            "Min: {:>10} Max: {:>10} Avg: {:>10} Median: {:>10} ({} measures)",
            format_seconds(s.min),
            format_seconds(s.max),
            format_seconds(s.avg),
            format_seconds(s.median),
            s.count
        ),
        None => "no measures".to_string(),
    }
}

/// Everything shown in one refresh
pub struct Report<'a> {
    pub snapshot: &'a AggregatorSnapshot,
    pub sources: &'a [String],
    pub clocks: &'a [ClockSnapshot],
}

impl Report<'_> {
    fn write_sources(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Vision multicast sources:")?;
        writeln!(f, "{}", self.sources.join(" "))?;
        writeln!(f)
    }

    fn write_clocks(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Reference clocks:")?;
        for clock in self.clocks {
            if !clock.online {
                writeln!(f, "{} offline", clock.host)?;
                continue;
            }
            writeln!(f, "{} ClockOffset: {}", clock.host, duration_stats(clock.offset))?;
            writeln!(f, "{}         RTT: {}", clock.host, duration_stats(clock.rtt))?;
        }
        writeln!(f)
    }

    fn write_camera(f: &mut fmt::Formatter<'_>, camera: &CameraSnapshot) -> fmt::Result {
        write!(
            f,
            "Camera {}: {} @ {:5.1} fps",
            camera.camera_id,
            quality(camera.quality),
            camera.fps
        )?;
        if let Some(ia) = camera.inter_arrival {
            write!(
                f,
                ", inter-arrival {} ±{}",
                format_seconds(ia.mean),
                format_seconds(ia.std_dev)
            )?;
        }
        if camera.regressions > 0 {
            write!(f, ", {} frame id regressions", camera.regressions)?;
        }
        writeln!(f)?;

        writeln!(
            f,
            "  Robots visible: {} blue, {} yellow | Balls visible: {}",
            camera.visible_blue,
            camera.visible_yellow,
            camera.balls.iter().filter(|b| b.visible).count()
        )?;
        writeln!(f, "  Processing: {}", duration_stats(camera.processing_latency))?;
        writeln!(f, "   Receiving: {}", duration_stats(camera.receiving_latency))?;

        for track in camera.balls.iter().chain(&camera.robots) {
            write_track(f, track)?;
        }
        writeln!(f)
    }

    fn write_losses(f: &mut fmt::Formatter<'_>, report: &LossReport) -> fmt::Result {
        writeln!(f, "{}", report.summary)?;
        for record in report.over_threshold.iter().rev().take(WORST_LOSSES) {
            writeln!(
                f,
                "  cam {}: {} lost {} frames ({}) at {}",
                record.camera_id,
                record.object,
                record.frames_skipped,
                format_seconds(record.gap),
                format_timestamp(record.time)
            )?;
        }
        if report.histogram.total() > 0 {
            for line in report.histogram.to_string().lines() {
                writeln!(f, "  {line}")?;
            }
        }
        Ok(())
    }
}

fn write_track(f: &mut fmt::Formatter<'_>, track: &TrackSnapshot) -> fmt::Result {
    writeln!(
        f,
        "  {:<6} {} {:5.1} fps  age {:>8}  {}{}",
        track.object.to_string(),
        quality(track.quality),
        track.fps,
        format_seconds(track.age),
        track.position,
        if track.visible { "" } else { "  (hidden)" }
    )
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_sources(f)?;
        self.write_clocks(f)?;

        let snapshot = self.snapshot;
        writeln!(
            f,
            "Vision ({:?}, {} frames):",
            snapshot.source, snapshot.frames
        )?;
        for camera in &snapshot.cameras {
            Self::write_camera(f, camera)?;
        }

        for line in &snapshot.log {
            writeln!(f, "{line}")?;
        }
        writeln!(f)?;

        Self::write_losses(f, &snapshot.robot_losses)?;
        Self::write_losses(f, &snapshot.ball_losses)?;
        if snapshot.sequence_regressions > 0 {
            writeln!(f, "Sequence regressions: {}", snapshot.sequence_regressions)?;
        }
        Ok(())
    }
}

/// Render a full refresh, optionally prefixed with the clear-screen sequence
pub fn render(report: &Report<'_>, clear_screen: bool) -> String {
    let mut out = String::new();
    if clear_screen {
        out.push_str(CLEAR_SCREEN);
    }
    let _ = write!(out, "{report}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        DetectionFrame, InspectorConfig, Position2d, RobotDetection, RobotId, TeamColor,
    };
    use quality_engine::StatsAggregator;

    #[test]
    fn test_colorize_thresholds() {
        assert_eq!(colorize_percent(0.1), "\x1b[31m  10%\x1b[0m");
        assert!(colorize_percent(0.45).starts_with("\x1b[33m"));
        assert!(colorize_percent(0.6).starts_with("\x1b[32m"));
        assert!(colorize_percent(1.0).contains(" 100%"));
    }

    #[test]
    fn test_report_sections() {
        let aggregator = StatsAggregator::new(&InspectorConfig::default());
        for n in 1..=3u32 {
            let t = 50.0 + f64::from(n) * 0.016;
            let frame = DetectionFrame {
                camera_id: 1,
                frame_number: n,
                t_sent: t,
                t_capture: t - 0.004,
                robots: vec![RobotDetection {
                    robot_id: RobotId::new(5, TeamColor::Blue),
                    position: Position2d::new(0.5, 0.5),
                }],
                balls: vec![],
            };
            aggregator.ingest_at(Some(&frame), t + 0.002);
        }
        let snapshot = aggregator.snapshot(20);
        let sources = vec!["10.0.0.3".to_string()];
        let clocks = vec![ClockSnapshot {
            host: "10.0.0.3".to_string(),
            online: false,
            offset: None,
            rtt: None,
        }];

        let text = render(
            &Report {
                snapshot: &snapshot,
                sources: &sources,
                clocks: &clocks,
            },
            false,
        );
        assert!(text.starts_with("Vision multicast sources:\n10.0.0.3\n"));
        assert!(text.contains("10.0.0.3 offline"));
        assert!(text.contains("Camera 1:"));
        assert!(text.contains("5 B"));
        assert!(text.contains("Robot  5 B appeared"));
        assert!(text.contains("Number of robot data losses over"));
    }

    #[test]
    fn test_clear_screen_prefix() {
        let snapshot = StatsAggregator::new(&InspectorConfig::default()).snapshot(5);
        let report = Report {
            snapshot: &snapshot,
            sources: &[],
            clocks: &[],
        };
        assert!(render(&report, true).starts_with(CLEAR_SCREEN));
        assert!(!render(&report, false).contains(CLEAR_SCREEN));
    }
}
