//! Frame-sequence gap detection per (camera, object).
//!
//! Runs independently of track matching: robots are keyed by the id the vision
//! system reports, the ball by camera only. A jump of more than one in an
//! object's frame number between two of its samples means frames carrying the
//! object were lost.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use contracts::{DataLossConfig, DataLossRecord, DetectionFrame, LossObject, ObjectClass};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct SequenceState {
    first_detection_time: f64,
    last_detection_time: f64,
    last_frame_id: u32,
}

/// Ledger of frame-sequence gaps
#[derive(Debug, Clone)]
pub struct DataLossDetector {
    config: DataLossConfig,
    sequences: HashMap<(u32, LossObject), SequenceState>,
    records: Vec<DataLossRecord>,
    regressions: u64,
}

impl DataLossDetector {
    pub fn new(config: DataLossConfig) -> Self {
        Self {
            config,
            sequences: HashMap::new(),
            records: Vec::new(),
            regressions: 0,
        }
    }

    /// Check every object of `frame` against its sequence
    ///
    /// Returns the number of records appended. An object listed several times
    /// in one frame is only counted once.
    pub fn process(&mut self, frame: &DetectionFrame) -> usize {
        let before = self.records.len();
        let mut seen = HashSet::new();

        let robots = frame.robots.iter().map(|r| LossObject::Robot(r.robot_id));
        let ball = (!frame.balls.is_empty()).then_some(LossObject::Ball);

        for object in robots.chain(ball) {
            if seen.insert(object) {
                self.observe(frame.camera_id, object, frame.t_sent, frame.frame_number);
            }
        }

        self.records.len() - before
    }

    fn observe(&mut self, camera_id: u32, object: LossObject, t: f64, frame_id: u32) {
        let thresholds = self.config.thresholds(object.class());
        let Some(state) = self.sequences.get_mut(&(camera_id, object)) else {
            self.sequences.insert(
                (camera_id, object),
                SequenceState {
                    first_detection_time: t,
                    last_detection_time: t,
                    last_frame_id: frame_id,
                },
            );
            return;
        };

        let dt = t - state.last_detection_time;
        if dt > thresholds.reset_gap_s {
            state.first_detection_time = t;
        } else if frame_id <= state.last_frame_id {
            self.regressions += 1;
            debug!(
                camera_id,
                object = %object,
                frame_id,
                last_frame_id = state.last_frame_id,
                "frame number did not advance"
            );
            observability::record_sequence_regression(camera_id);
        } else if frame_id - state.last_frame_id > 1 {
            let record = DataLossRecord {
                camera_id,
                time: t,
                gap: dt,
                frames_skipped: frame_id - state.last_frame_id - 1,
                object_age: t - state.first_detection_time,
                object,
            };
            debug!(
                camera_id,
                object = %object,
                frames_skipped = record.frames_skipped,
                gap = record.gap,
                "data loss"
            );
            observability::record_data_loss(object.class(), record.frames_skipped, record.gap);
            self.records.push(record);
        }

        state.last_detection_time = t;
        state.last_frame_id = frame_id;
    }

    /// All records, in detection order
    #[inline]
    pub fn records(&self) -> &[DataLossRecord] {
        &self.records
    }

    /// Frame numbers that failed to advance, across all objects
    #[inline]
    pub fn regressions(&self) -> u64 {
        self.regressions
    }

    fn records_of(&self, class: ObjectClass) -> impl Iterator<Item = &DataLossRecord> {
        self.records.iter().filter(move |r| r.object.class() == class)
    }

    /// Records with a gap above the class report threshold, shortest gap first
    pub fn over_threshold(&self, class: ObjectClass) -> Vec<DataLossRecord> {
        let report_gap = self.config.thresholds(class).report_gap_s;
        let mut records: Vec<DataLossRecord> = self
            .records_of(class)
            .filter(|r| r.gap > report_gap)
            .copied()
            .collect();
        records.sort_by(|a, b| a.gap.total_cmp(&b.gap));
        records
    }

    /// Reported records on objects tracked longer than the class minimum age
    pub fn mature(&self, class: ObjectClass) -> Vec<DataLossRecord> {
        let min_age = self.config.thresholds(class).min_object_age_s;
        self.over_threshold(class)
            .into_iter()
            .filter(|r| r.object_age > min_age)
            .collect()
    }

    /// Distribution of skipped-frame counts over all records of a class
    pub fn histogram(&self, class: ObjectClass) -> SkipHistogram {
        let mut histogram = SkipHistogram::new(self.config.histogram_overflow);
        for record in self.records_of(class) {
            histogram.add(record.frames_skipped);
        }
        histogram
    }

    pub fn summary(&self, class: ObjectClass) -> LossSummary {
        let thresholds = self.config.thresholds(class);
        let over_threshold = self.over_threshold(class);
        LossSummary {
            class,
            report_gap: thresholds.report_gap_s,
            min_object_age: thresholds.min_object_age_s,
            mature: over_threshold
                .iter()
                .filter(|r| r.object_age > thresholds.min_object_age_s)
                .count(),
            over_threshold: over_threshold.len(),
        }
    }

    /// Everything the loss report shows for one class
    pub fn report(&self, class: ObjectClass) -> LossReport {
        LossReport {
            summary: self.summary(class),
            over_threshold: self.over_threshold(class),
            histogram: self.histogram(class),
        }
    }
}

/// Skipped-frame counts, with large counts folded into one bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipHistogram {
    buckets: BTreeMap<u32, u64>,
    overflow_at: u32,
    overflow: u64,
}

impl SkipHistogram {
    pub fn new(overflow_at: u32) -> Self {
        Self {
            buckets: BTreeMap::new(),
            overflow_at,
            overflow: 0,
        }
    }

    pub fn add(&mut self, frames_skipped: u32) {
        if frames_skipped >= self.overflow_at {
            self.overflow += 1;
        } else {
            *self.buckets.entry(frames_skipped).or_insert(0) += 1;
        }
    }

    /// (frames skipped, occurrences) below the overflow bucket, ascending
    pub fn buckets(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.buckets.iter().map(|(&k, &v)| (k, v))
    }

    pub fn overflow_at(&self) -> u32 {
        self.overflow_at
    }

    /// Occurrences of `overflow_at` or more skipped frames
    pub fn overflow(&self) -> u64 {
        self.overflow
    }

    pub fn total(&self) -> u64 {
        self.buckets.values().sum::<u64>() + self.overflow
    }
}

impl fmt::Display for SkipHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (frames, count) in self.buckets() {
            writeln!(f, "{frames} frames: {count}x")?;
        }
        write!(f, ">={} frames: {}x", self.overflow_at, self.overflow)
    }
}

/// Counts behind the per-class loss summary line
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LossSummary {
    pub class: ObjectClass,
    pub report_gap: f64,
    pub min_object_age: f64,
    pub over_threshold: usize,
    pub mature: usize,
}

impl fmt::Display for LossSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Number of {} data losses over {}: {}, {} older than {}",
            self.class,
            crate::window::format_seconds(self.report_gap),
            self.over_threshold,
            self.mature,
            crate::window::format_seconds(self.min_object_age)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LossReport {
    pub summary: LossSummary,
    pub over_threshold: Vec<DataLossRecord>,
    pub histogram: SkipHistogram,
}
