//! # Quality Engine
//!
//! SSL 视觉数据流的滑动窗口质量统计与目标跟踪。
//!
//! 负责：
//! - 滑动窗口计数器与时长统计
//! - 每个相机、每个跟踪目标的帧 ID 完整度
//! - 基于速度门限的检测-轨迹关联与轨迹合并
//! - 按 (相机, 目标) 的帧序列丢失检测
//! - 每个视觉源的参考时钟偏移统计
//!
//! 引擎不做任何 I/O。所有可变状态都在 [`StatsAggregator`] 的单一锁之后。
//!
//! ## 使用示例
//!
//! ```ignore
//! use quality_engine::StatsAggregator;
//!
//! let stats = StatsAggregator::new(&config);
//!
//! // a decoded frame, or `None` when the receive timeout elapsed
//! stats.ingest(Some(&frame));
//! stats.ingest(None);
//!
//! let snapshot = stats.snapshot(config.render.log_tail);
//! ```

mod aggregator;
mod camera_view;
mod clock;
mod data_loss;
mod frame_window;
mod track;
mod window;

pub use aggregator::{
    format_timestamp, now_seconds, AggregatorSnapshot, AggregatorState, EventLog, IngestOutcome,
    SourceState, StatsAggregator,
};
pub use camera_view::{CameraSnapshot, CameraView, ObjectEvent, TrackSnapshot, ViewParams};
pub use clock::{ClockBoard, ClockSnapshot, ClockStats};
pub use data_loss::{DataLossDetector, LossReport, LossSummary, SkipHistogram};
pub use frame_window::{FrameWindow, InterArrival};
pub use track::{Ball, Track, TrackSet, TrackedObject, VisibilityChange, VisibilityEvent};
pub use window::{format_seconds, DurationStats, WindowedCounter, WindowedDuration};
