//! Receiver counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between the receiver task and its owner
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Datagrams read from the socket
    pub datagrams_received: AtomicU64,

    /// Frames forwarded downstream
    pub frames_forwarded: AtomicU64,

    /// Datagrams that failed to decode
    pub decode_errors: AtomicU64,

    /// Datagrams that filled the whole receive buffer
    pub truncated: AtomicU64,

    /// Receive timeouts
    pub silences: AtomicU64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.frames_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_truncated(&self) {
        self.truncated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_silence(&self) {
        self.silences.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            frames_forwarded: self.frames_forwarded.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            truncated: self.truncated.load(Ordering::Relaxed),
            silences: self.silences.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`IngestionMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub datagrams_received: u64,
    pub frames_forwarded: u64,
    pub decode_errors: u64,
    pub truncated: u64,
    pub silences: u64,
}
