//! Inspector configuration contracts that can be shared across crates.
//!
//! Every field has a default, so an empty TOML file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::ObjectClass;

/// Complete inspector configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct InspectorConfig {
    /// Vision multicast reception
    #[validate(nested)]
    pub vision: VisionConfig,

    /// Trailing windows and eviction timeout
    #[validate(nested)]
    pub windows: WindowConfig,

    /// Track association
    #[validate(nested)]
    pub tracking: TrackingConfig,

    /// Frame-sequence loss detection
    #[validate(nested)]
    pub data_loss: DataLossConfig,

    /// Reference clock sampling
    #[validate(nested)]
    pub clock: ClockConfig,

    /// Terminal report
    #[validate(nested)]
    pub render: RenderConfig,

    /// Prometheus exporter
    pub metrics: MetricsConfig,
}

/// Vision multicast reception
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct VisionConfig {
    /// Multicast group and port of the vision feed
    #[validate(length(min = 1))]
    pub address: String,

    /// Silence is signalled when nothing arrives for this long
    #[validate(range(min = 1))]
    pub receive_timeout_ms: u64,

    /// Receive buffer size; larger datagrams are reported as truncated
    #[validate(range(min = 512, max = 65536))]
    pub max_datagram_size: usize,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            address: "224.5.23.2:10006".to_string(),
            receive_timeout_ms: 1000,
            max_datagram_size: 8192,
        }
    }
}

impl VisionConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

/// Trailing windows (seconds)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct WindowConfig {
    /// Window of the processing / receiving latency statistics
    #[validate(range(exclusive_min = 0.0))]
    pub latency_window_s: f64,

    /// Camera-level frame quality window
    #[validate(range(exclusive_min = 0.0))]
    pub camera_quality_window_s: f64,

    /// Per-ball frame quality window
    #[validate(range(exclusive_min = 0.0))]
    pub ball_quality_window_s: f64,

    /// Per-robot frame quality window
    #[validate(range(exclusive_min = 0.0))]
    pub robot_quality_window_s: f64,

    /// Tracks without a detection for this long are evicted
    #[validate(range(exclusive_min = 0.0))]
    pub visibility_timeout_s: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            latency_window_s: 0.5,
            camera_quality_window_s: 0.5,
            ball_quality_window_s: 0.5,
            robot_quality_window_s: 0.5,
            visibility_timeout_s: 1.0,
        }
    }
}

impl WindowConfig {
    /// Quality window of an object class
    pub fn quality_window(&self, class: ObjectClass) -> f64 {
        match class {
            ObjectClass::Ball => self.ball_quality_window_s,
            ObjectClass::Robot => self.robot_quality_window_s,
        }
    }
}

/// Track association parameters
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TrackingConfig {
    /// Fastest plausible ball (m/s)
    #[validate(range(exclusive_min = 0.0))]
    pub max_ball_velocity: f64,

    /// Fastest plausible robot (m/s)
    #[validate(range(exclusive_min = 0.0))]
    pub max_robot_velocity: f64,

    /// A track becomes visible once its quality exceeds this value
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub visible_quality_threshold: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_ball_velocity: 10.0,
            max_robot_velocity: 6.0,
            visible_quality_threshold: 0.9,
        }
    }
}

impl TrackingConfig {
    /// Velocity ceiling of an object class
    pub fn max_velocity(&self, class: ObjectClass) -> f64 {
        match class {
            ObjectClass::Ball => self.max_ball_velocity,
            ObjectClass::Robot => self.max_robot_velocity,
        }
    }
}

/// Loss detection thresholds of one object class (seconds)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LossThresholds {
    /// Gaps longer than this are treated as the object leaving and returning
    #[validate(range(exclusive_min = 0.0))]
    pub reset_gap_s: f64,

    /// Losses with a longer gap are reported
    #[validate(range(min = 0.0))]
    pub report_gap_s: f64,

    /// Reported losses on objects older than this are flagged as mature
    #[validate(range(min = 0.0))]
    pub min_object_age_s: f64,
}

impl LossThresholds {
    pub fn robot() -> Self {
        Self {
            reset_gap_s: 1.0,
            report_gap_s: 0.2,
            min_object_age_s: 10.0,
        }
    }

    pub fn ball() -> Self {
        Self {
            reset_gap_s: 1.0,
            report_gap_s: 0.1,
            min_object_age_s: 5.0,
        }
    }
}

/// Frame-sequence loss detection
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DataLossConfig {
    /// Skipped-frame counts at or above this share one histogram bucket
    #[validate(range(min = 1))]
    pub histogram_overflow: u32,

    #[validate(nested)]
    pub robot: LossThresholds,

    #[validate(nested)]
    pub ball: LossThresholds,
}

impl Default for DataLossConfig {
    fn default() -> Self {
        Self {
            histogram_overflow: 6,
            robot: LossThresholds::robot(),
            ball: LossThresholds::ball(),
        }
    }
}

impl DataLossConfig {
    pub fn thresholds(&self, class: ObjectClass) -> &LossThresholds {
        match class {
            ObjectClass::Ball => &self.ball,
            ObjectClass::Robot => &self.robot,
        }
    }
}

/// Reference clock sampling
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ClockConfig {
    /// Start a clock watcher for every discovered vision source
    pub enabled: bool,

    /// SNTP port on the sources
    #[validate(range(min = 1))]
    pub port: u16,

    /// Delay between successful samples
    #[validate(range(min = 1))]
    pub sample_interval_ms: u64,

    /// Delay after a failed sample
    #[validate(range(min = 1))]
    pub retry_delay_ms: u64,

    /// Time to wait for an answer
    #[validate(range(min = 1))]
    pub timeout_ms: u64,

    /// Window of the offset / RTT statistics (seconds)
    #[validate(range(exclusive_min = 0.0))]
    pub window_s: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 123,
            sample_interval_ms: 100,
            retry_delay_ms: 1000,
            timeout_ms: 1000,
            window_s: 0.5,
        }
    }
}

/// Terminal report
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RenderConfig {
    /// Redraw period
    #[validate(range(min = 50))]
    pub interval_ms: u64,

    /// Number of event log lines shown
    pub log_tail: usize,

    /// Clear the terminal before each redraw
    pub clear_screen: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            log_tail: 20,
            clear_screen: true,
        }
    }
}

/// Prometheus exporter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Listen port (0 = disabled)
    pub port: u16,
}
