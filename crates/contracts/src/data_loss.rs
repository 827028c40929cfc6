//! DataLossRecord - evidence of skipped sequence numbers for one object.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::RobotId;

/// Object class, selects per-class thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Ball,
    Robot,
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectClass::Ball => f.write_str("ball"),
            ObjectClass::Robot => f.write_str("robot"),
        }
    }
}

/// Which object lost data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossObject {
    Ball,
    Robot(RobotId),
}

impl LossObject {
    pub fn class(&self) -> ObjectClass {
        match self {
            LossObject::Ball => ObjectClass::Ball,
            LossObject::Robot(_) => ObjectClass::Robot,
        }
    }
}

impl fmt::Display for LossObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LossObject::Ball => f.write_str("ball"),
            LossObject::Robot(id) => write!(f, "{id}"),
        }
    }
}

/// One detected gap in an object's frame sequence
///
/// Never mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataLossRecord {
    /// Camera that carried the object
    pub camera_id: u32,
    /// Sender timestamp of the frame that revealed the gap (seconds)
    pub time: f64,
    /// Time since the previous sample of the object (seconds)
    pub gap: f64,
    /// Number of frame ids missing between the two samples
    pub frames_skipped: u32,
    /// Time the object had been continuously tracked (seconds)
    pub object_age: f64,
    pub object: LossObject,
}
