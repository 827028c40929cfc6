//! Detection - a single timestamped observation of an object on the field.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position on the field plane in meters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position2d {
    pub x: f64,
    pub y: f64,
}

impl Position2d {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Build from wire coordinates given in millimeters
    pub fn from_millimeters(x_mm: f64, y_mm: f64) -> Self {
        Self {
            x: x_mm / 1000.0,
            y: y_mm / 1000.0,
        }
    }

    /// Euclidean distance in meters
    #[inline]
    pub fn distance_to(&self, other: &Position2d) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl fmt::Display for Position2d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x:{:6.3}|y:{:6.3}", self.x, self.y)
    }
}

/// Immutable observation: where an object was and when
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Sender timestamp of the frame carrying this detection (seconds)
    pub time: f64,
    /// Position in meters
    pub position: Position2d,
}

impl Detection {
    pub const fn new(time: f64, position: Position2d) -> Self {
        Self { time, position }
    }

    /// Velocity needed to travel from `self` to `other`.
    ///
    /// Returns `None` for simultaneous detections: two samples with the same
    /// timestamp can never be consecutive samples of one object.
    pub fn implied_velocity(&self, other: &Detection) -> Option<f64> {
        let dt = (other.time - self.time).abs();
        if dt == 0.0 {
            return None;
        }
        Some(self.position.distance_to(&other.position) / dt)
    }
}
