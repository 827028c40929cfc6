//! Robot identity as reported by the vision system.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Team color of a robot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamColor {
    Blue,
    Yellow,
}

impl TeamColor {
    pub const ALL: [TeamColor; 2] = [TeamColor::Blue, TeamColor::Yellow];

    /// Single-letter label used in logs and reports
    pub fn short(&self) -> &'static str {
        match self {
            TeamColor::Blue => "B",
            TeamColor::Yellow => "Y",
        }
    }
}

impl fmt::Display for TeamColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

/// Robot identifier: pattern id plus team color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RobotId {
    pub team: TeamColor,
    pub id: u32,
}

impl RobotId {
    pub const fn new(id: u32, team: TeamColor) -> Self {
        Self { team, id }
    }
}

impl fmt::Display for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:2} {}", self.id, self.team)
    }
}
