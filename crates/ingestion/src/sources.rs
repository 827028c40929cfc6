//! Discovery of the hosts sending on the vision group

use std::sync::{Mutex, PoisonError};

use tracing::info;

/// Distinct sender addresses in the order they were first seen
#[derive(Debug, Default)]
pub struct MulticastSources {
    sources: Mutex<Vec<String>>,
}

impl MulticastSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `ip`; returns `true` the first time it is seen
    pub fn add(&self, ip: &str) -> bool {
        let mut sources = self.sources.lock().unwrap_or_else(PoisonError::into_inner);
        if sources.iter().any(|s| s == ip) {
            return false;
        }
        sources.push(ip.to_string());
        info!(source = %ip, "new multicast source");
        true
    }

    /// Copy of the current list
    pub fn list(&self) -> Vec<String> {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
