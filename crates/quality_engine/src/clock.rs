//! Reference clock statistics per vision source.

use std::sync::{Mutex, PoisonError};

use contracts::ClockSample;
use serde::Serialize;

use crate::window::{DurationStats, WindowedDuration};

/// Offset and round-trip time of one reference clock
#[derive(Debug, Clone)]
pub struct ClockStats {
    host: String,
    online: bool,
    offset: WindowedDuration,
    rtt: WindowedDuration,
}

impl ClockStats {
    pub fn new(host: impl Into<String>, window: f64) -> Self {
        Self {
            host: host.into(),
            online: false,
            offset: WindowedDuration::new(window),
            rtt: WindowedDuration::new(window),
        }
    }

    /// Store a successful sample taken at local time `at`
    pub fn record(&mut self, sample: ClockSample, at: f64) {
        self.online = true;
        self.offset.add(sample.offset, at);
        self.rtt.add(sample.rtt, at);
    }

    /// The host stopped answering; its statistics no longer apply
    pub fn mark_offline(&mut self) {
        self.online = false;
        self.offset.clear();
        self.rtt.clear();
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn offset(&self) -> &WindowedDuration {
        &self.offset
    }

    pub fn rtt(&self) -> &WindowedDuration {
        &self.rtt
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            host: self.host.clone(),
            online: self.online,
            offset: self.offset.stats(),
            rtt: self.rtt.stats(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClockSnapshot {
    pub host: String,
    pub online: bool,
    pub offset: Option<DurationStats>,
    pub rtt: Option<DurationStats>,
}

/// Clock statistics of every watched host, shared between watchers and readers
#[derive(Debug, Default)]
pub struct ClockBoard {
    window: f64,
    clocks: Mutex<Vec<ClockStats>>,
}

impl ClockBoard {
    pub fn new(window: f64) -> Self {
        Self {
            window,
            clocks: Mutex::new(Vec::new()),
        }
    }

    /// Add `host` unless already present; returns whether it was new
    pub fn register(&self, host: &str) -> bool {
        let mut clocks = self.clocks.lock().unwrap_or_else(PoisonError::into_inner);
        if clocks.iter().any(|c| c.host == host) {
            return false;
        }
        clocks.push(ClockStats::new(host, self.window));
        true
    }

    pub fn record(&self, host: &str, sample: ClockSample, at: f64) {
        self.with_host(host, |clock| clock.record(sample, at));
    }

    pub fn mark_offline(&self, host: &str) {
        self.with_host(host, ClockStats::mark_offline);
    }

    fn with_host(&self, host: &str, f: impl FnOnce(&mut ClockStats)) {
        let mut clocks = self.clocks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(clock) = clocks.iter_mut().find(|c| c.host == host) {
            f(clock);
        }
    }

    /// Hosts in registration order
    pub fn snapshot(&self) -> Vec<ClockSnapshot> {
        let clocks = self.clocks.lock().unwrap_or_else(PoisonError::into_inner);
        clocks.iter().map(ClockStats::snapshot).collect()
    }

    pub fn len(&self) -> usize {
        self.clocks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
