//! Trailing-window primitives.
//!
//! Both primitives prune as part of every insertion: after `add`, only
//! samples inserted at or after `latest - window` are retained, where `latest`
//! is the greatest insertion time seen so far. `prune(now)` is the explicit
//! sweep for when no samples arrive; `clear()` drops everything.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;

/// Counts events inside a trailing window
#[derive(Debug, Clone)]
pub struct WindowedCounter {
    window: f64,
    samples: VecDeque<f64>,
    latest: Option<f64>,
}

impl WindowedCounter {
    /// Create a counter over `window` seconds
    pub fn new(window: f64) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
            latest: None,
        }
    }

    /// Window length in seconds
    #[inline]
    pub fn window(&self) -> f64 {
        self.window
    }

    /// Record one event at `at` and drop everything outside the window
    pub fn add(&mut self, at: f64) {
        let latest = self.latest.map_or(at, |l| l.max(at));
        self.latest = Some(latest);
        self.samples.push_back(at);
        self.prune(latest);
    }

    /// Drop events older than `now - window`
    pub fn prune(&mut self, now: f64) {
        self.prune_before(now - self.window);
    }

    /// Drop events older than `cutoff`
    pub fn prune_before(&mut self, cutoff: f64) {
        self.samples.retain(|&t| t >= cutoff);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.latest = None;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Events per second over the window
    pub fn rate(&self) -> f64 {
        self.samples.len() as f64 / self.window
    }
}

/// Aggregates over the durations currently inside a window (seconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DurationStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    /// Element `count / 2` of the sorted durations
    pub median: f64,
}

impl DurationStats {
    fn from_values(values: &mut [f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let count = values.len();
        let sum: f64 = values.iter().sum();
        Some(Self {
            count,
            min: values[0],
            max: values[count - 1],
            avg: sum / count as f64,
            median: values[count / 2],
        })
    }
}

/// Duration samples inside a trailing window
///
/// Statistics are recomputed from the full retained set on every insertion
/// and every explicit prune.
#[derive(Debug, Clone)]
pub struct WindowedDuration {
    window: f64,
    /// (insertion time, duration)
    samples: VecDeque<(f64, f64)>,
    latest: Option<f64>,
    stats: Option<DurationStats>,
}

impl WindowedDuration {
    pub fn new(window: f64) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
            latest: None,
            stats: None,
        }
    }

    #[inline]
    pub fn window(&self) -> f64 {
        self.window
    }

    /// Insert `value` observed at `at`
    pub fn add(&mut self, value: f64, at: f64) {
        let latest = self.latest.map_or(at, |l| l.max(at));
        self.latest = Some(latest);
        self.samples.push_back((at, value));
        self.prune(latest);
    }

    /// Drop samples inserted before `now - window`
    pub fn prune(&mut self, now: f64) {
        let cutoff = now - self.window;
        self.samples.retain(|&(t, _)| t >= cutoff);
        self.recompute();
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.latest = None;
        self.stats = None;
    }

    /// Current aggregates, `None` when the window is empty
    #[inline]
    pub fn stats(&self) -> Option<DurationStats> {
        self.stats
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn recompute(&mut self) {
        let mut values: Vec<f64> = self.samples.iter().map(|&(_, v)| v).collect();
        self.stats = DurationStats::from_values(&mut values);
    }
}

impl fmt::Display for WindowedDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.stats {
            Some(s) => write!(
                f,
                "Min: {:>10} Max: {:>10} Avg: {:>10} Median: {:>10} ({} measures in {})",
                format_seconds(s.min),
                format_seconds(s.max),
                format_seconds(s.avg),
                format_seconds(s.median),
                s.count,
                format_seconds(self.window)
            ),
            None => write!(f, "no measures in {}", format_seconds(self.window)),
        }
    }
}

/// Human-readable duration with a unit matching its magnitude
pub fn format_seconds(seconds: f64) -> String {
    let abs = seconds.abs();
    if abs >= 1.0 {
        format!("{seconds:.3}s")
    } else if abs >= 1e-3 {
        format!("{:.3}ms", seconds * 1e3)
    } else {
        format!("{:.1}µs", seconds * 1e6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_counter_retains_exactly_window() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut counter = WindowedCounter::new(0.5);
        let mut inserted = Vec::new();
        let mut t = 100.0;

        for _ in 0..500 {
            t += rng.random_range(0.0..0.05);
            counter.add(t);
            inserted.push(t);

            let expected = inserted.iter().filter(|&&s| s >= t - 0.5).count();
            assert_eq!(counter.len(), expected);
        }
    }

    #[test]
    fn test_counter_rate() {
        let mut counter = WindowedCounter::new(0.5);
        for i in 0..30 {
            counter.add(10.0 + i as f64 / 60.0);
        }
        // 60 Hz over half a second
        assert!((counter.rate() - 60.0).abs() < 2.0 + 1e-9);
    }

    #[test]
    fn test_counter_out_of_order_sample_uses_latest() {
        let mut counter = WindowedCounter::new(1.0);
        counter.add(10.0);
        counter.add(11.0);
        // older than latest - window: dropped right away
        counter.add(9.5);
        assert_eq!(counter.len(), 2);
    }

    #[test]
    fn test_counter_prune_and_clear() {
        let mut counter = WindowedCounter::new(1.0);
        counter.add(1.0);
        counter.add(1.5);
        counter.prune(2.2);
        assert_eq!(counter.len(), 1);
        counter.clear();
        assert!(counter.is_empty());
        assert_eq!(counter.rate(), 0.0);
    }

    #[test]
    fn test_duration_stats() {
        let mut durations = WindowedDuration::new(10.0);
        assert!(durations.stats().is_none());

        for (i, v) in [0.004, 0.001, 0.003, 0.002].into_iter().enumerate() {
            durations.add(v, i as f64);
        }

        let stats = durations.stats().unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min, 0.001);
        assert_eq!(stats.max, 0.004);
        assert!((stats.avg - 0.0025).abs() < 1e-12);
        // even count: upper-middle element
        assert_eq!(stats.median, 0.003);
    }

    #[test]
    fn test_duration_window_drops_old_samples() {
        let mut durations = WindowedDuration::new(0.5);
        durations.add(5.0, 1.0);
        durations.add(1.0, 1.2);
        durations.add(2.0, 1.6);

        let stats = durations.stats().unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.max, 2.0);

        durations.prune(2.0);
        assert_eq!(durations.stats().unwrap().count, 1);

        durations.prune(5.0);
        assert!(durations.stats().is_none());
    }

    #[test]
    fn test_duration_negative_values() {
        let mut offsets = WindowedDuration::new(1.0);
        offsets.add(-0.002, 0.0);
        offsets.add(0.001, 0.1);
        offsets.add(-0.004, 0.2);
        let stats = offsets.stats().unwrap();
        assert_eq!(stats.min, -0.004);
        assert_eq!(stats.median, -0.002);
    }

    #[test]
    fn test_duration_clear() {
        let mut durations = WindowedDuration::new(1.0);
        durations.add(0.1, 0.0);
        durations.clear();
        assert!(durations.is_empty());
        assert!(durations.stats().is_none());
        assert!(durations.to_string().starts_with("no measures"));
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(1.5), "1.500s");
        assert_eq!(format_seconds(0.0125), "12.500ms");
        assert_eq!(format_seconds(0.0000125), "12.5µs");
        assert_eq!(format_seconds(-0.002), "-2.000ms");
    }
}
