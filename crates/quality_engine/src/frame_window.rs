//! Completeness of a frame-id sequence over a trailing window.

use std::collections::HashMap;

use serde::Serialize;

use crate::window::WindowedCounter;

/// Mean and population standard deviation of inter-arrival times (seconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InterArrival {
    pub mean: f64,
    pub std_dev: f64,
}

/// Frame ids seen in the trailing window, with their arrival times
///
/// Each stored timestamp lies in `[latest - window, latest]`. The id range
/// spanned by the retained frames gives the completeness ratio.
#[derive(Debug, Clone)]
pub struct FrameWindow {
    window: f64,
    frames: HashMap<u32, f64>,
    /// Time since the previous arrival, keyed by the later frame id
    deltas: HashMap<u32, f64>,
    arrivals: WindowedCounter,
    last_arrival: Option<(u32, f64)>,
    latest: Option<f64>,
    regressions: u64,
}

impl FrameWindow {
    pub fn new(window: f64) -> Self {
        Self {
            window,
            frames: HashMap::new(),
            deltas: HashMap::new(),
            arrivals: WindowedCounter::new(window),
            last_arrival: None,
            latest: None,
            regressions: 0,
        }
    }

    #[inline]
    pub fn window(&self) -> f64 {
        self.window
    }

    /// Record `frame_id` as seen at `at`, overwriting an earlier arrival of the same id
    pub fn add(&mut self, frame_id: u32, at: f64) {
        if let Some((last_id, last_at)) = self.last_arrival {
            if frame_id < last_id {
                self.regressions += 1;
            }
            self.deltas.insert(frame_id, at - last_at);
        }
        self.last_arrival = Some((frame_id, at));

        self.frames.insert(frame_id, at);
        self.arrivals.add(at);

        let latest = self.latest.map_or(at, |l| l.max(at));
        self.latest = Some(latest);
        self.prune(latest - self.window);
    }

    /// Remove frames that arrived before `before`
    pub fn prune(&mut self, before: f64) {
        let deltas = &mut self.deltas;
        self.frames.retain(|id, &mut t| {
            let keep = t >= before;
            if !keep {
                deltas.remove(id);
            }
            keep
        });
        self.arrivals.prune_before(before);
    }

    /// Drop everything, including the arrival history used for deltas
    pub fn clear(&mut self) {
        self.frames.clear();
        self.deltas.clear();
        self.arrivals.clear();
        self.last_arrival = None;
        self.latest = None;
        self.regressions = 0;
    }

    /// Share of the retained id range that actually arrived
    ///
    /// `None` with no retained frames. Frames are keyed by id, so a duplicate
    /// overwrites and the ratio stays within `(0, 1]`; ids arriving out of
    /// order or wrapping show up in `regressions` instead.
    pub fn quality(&self) -> Option<f64> {
        let min = self.frames.keys().min()?;
        let max = self.frames.keys().max()?;
        let span = u64::from(*max) - u64::from(*min) + 1;
        Some(self.frames.len() as f64 / span as f64)
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Arrivals per second over the window
    pub fn fps(&self) -> f64 {
        self.arrivals.rate()
    }

    pub fn inter_arrival(&self) -> Option<InterArrival> {
        if self.deltas.is_empty() {
            return None;
        }
        let n = self.deltas.len() as f64;
        let mean = self.deltas.values().sum::<f64>() / n;
        let variance = self
            .deltas
            .values()
            .map(|d| (d - mean) * (d - mean))
            .sum::<f64>()
            / n;
        Some(InterArrival {
            mean,
            std_dev: variance.sqrt(),
        })
    }

    /// Arrivals whose id was lower than the previous arrival's
    #[inline]
    pub fn regressions(&self) -> u64 {
        self.regressions
    }
}
