//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the inspector workspace.
//! Business crates only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Timestamps are seconds since the UNIX epoch as `f64` (the vision wire format
//!   sends `t_capture` / `t_sent` this way)
//! - Durations are `f64` seconds and may be negative (clock offsets, skewed latencies)
//! - Positions are meters; the wire decoder converts from millimeters

mod clock;
mod config;
mod data_loss;
mod detection;
mod error;
mod frame;
mod robot_id;

pub use clock::{ClockProbe, ClockSample, LocalClockProbe};
pub use config::*;
pub use data_loss::{DataLossRecord, LossObject, ObjectClass};
pub use detection::{Detection, Position2d};
pub use error::*;
pub use frame::{BallDetection, DetectionFrame, RobotDetection, VisionEvent};
pub use robot_id::{RobotId, TeamColor};
