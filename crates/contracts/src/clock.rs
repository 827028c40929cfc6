//! ClockProbe trait - reference clock sampling interface

use serde::{Deserialize, Serialize};

use crate::ContractError;

/// One clock offset measurement against a reference host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockSample {
    /// Offset of the reference clock relative to the local clock (seconds)
    pub offset: f64,
    /// Round-trip time of the exchange (seconds)
    pub rtt: f64,
}

/// Clock sampling source
///
/// Implemented by the SNTP probe in `ingestion` and by test doubles.
#[trait_variant::make(ClockProbe: Send)]
pub trait LocalClockProbe {
    /// Take one offset/RTT sample against `host`
    ///
    /// # Errors
    /// Returns a `ContractError::ClockProbe` when the host does not answer or
    /// answers with an unusable packet.
    async fn sample(&self, host: &str) -> Result<ClockSample, ContractError>;
}
