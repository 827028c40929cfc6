//! Top-level aggregator: camera views, loss detector and event log behind one lock.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use contracts::{DetectionFrame, InspectorConfig, LossObject, ObjectClass};
use serde::Serialize;
use tracing::{info, instrument};

use crate::camera_view::{CameraSnapshot, CameraView, ObjectEvent, ViewParams};
use crate::data_loss::{DataLossDetector, LossReport};
use crate::track::VisibilityChange;

const LOG_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Whether the vision feed currently delivers frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    Silent,
    Active,
}

/// Human-readable, append-only log of visibility transitions
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Vec<String>,
}

impl EventLog {
    pub fn push(&mut self, time: f64, line: impl AsRef<str>) {
        self.entries
            .push(format!("{}: {}", format_timestamp(time), line.as_ref()));
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// The last `n` entries
    pub fn tail(&self, n: usize) -> &[String] {
        &self.entries[self.entries.len().saturating_sub(n)..]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// UTC wall-clock rendering of a timestamp in seconds
pub fn format_timestamp(time: f64) -> String {
    let secs = time.floor();
    let nanos = ((time - secs) * 1e9) as u32;
    DateTime::<Utc>::from_timestamp(secs as i64, nanos.min(999_999_999))
        .map(|t| t.format(LOG_TIME_FORMAT).to_string())
        .unwrap_or_else(|| format!("{time:.3}"))
}

fn describe(camera_id: u32, event: &ObjectEvent) -> String {
    let object = match event.kind {
        LossObject::Ball => "Ball".to_string(),
        LossObject::Robot(id) => format!("Robot {id}"),
    };
    match event.change {
        VisibilityChange::Appeared => {
            format!("cam {camera_id}: {object} appeared at {}", event.position)
        }
        VisibilityChange::Vanished { visible_for } => format!(
            "cam {camera_id}: {object} vanished at {} after {visible_for:.1}s",
            event.position
        ),
    }
}

/// What one ingestion changed
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IngestOutcome {
    pub visibility_changes: usize,
    pub data_losses: usize,
    /// Quality of the camera that sent the frame after ingestion
    pub camera_quality: Option<f64>,
}

/// State guarded by the aggregator lock
#[derive(Debug)]
pub struct AggregatorState {
    params: ViewParams,
    source: SourceState,
    cameras: BTreeMap<u32, CameraView>,
    data_loss: DataLossDetector,
    log: EventLog,
    frames: u64,
    /// Latest send time across all cameras
    latest_sent: Option<f64>,
}

impl AggregatorState {
    fn new(config: &InspectorConfig) -> Self {
        Self {
            params: ViewParams::from(config),
            source: SourceState::Silent,
            cameras: BTreeMap::new(),
            data_loss: DataLossDetector::new(config.data_loss.clone()),
            log: EventLog::default(),
            frames: 0,
            latest_sent: None,
        }
    }

    fn ingest_frame(&mut self, frame: &DetectionFrame, now: f64) -> IngestOutcome {
        if self.source == SourceState::Silent {
            info!(camera_id = frame.camera_id, "vision feed active");
            self.source = SourceState::Active;
        }
        self.frames += 1;
        self.latest_sent = Some(self.latest_sent.map_or(frame.t_sent, |l| l.max(frame.t_sent)));
        observability::record_frame_ingested(frame.camera_id);

        let params = self.params;
        let camera = self
            .cameras
            .entry(frame.camera_id)
            .or_insert_with(|| CameraView::new(frame.camera_id, params));
        let events = camera.ingest(frame, now);
        let camera_quality = camera.frames().quality();

        self.log_events(frame.camera_id, frame.t_sent, &events);
        let data_losses = self.data_loss.process(frame);

        IngestOutcome {
            visibility_changes: events.len(),
            data_losses,
            camera_quality,
        }
    }

    fn silence(&mut self) -> IngestOutcome {
        observability::record_silence();
        if self.source == SourceState::Active {
            info!("vision feed silent, clearing camera state");
            self.source = SourceState::Silent;
        }
        self.latest_sent = None;

        let mut visibility_changes = 0;
        let mut cleared = Vec::new();
        for (&camera_id, camera) in self.cameras.iter_mut() {
            let time = camera.latest_sent();
            let events = camera.clear();
            if let Some(time) = time {
                cleared.push((camera_id, time, events));
            }
        }
        for (camera_id, time, events) in cleared {
            visibility_changes += events.len();
            self.log_events(camera_id, time, &events);
        }

        IngestOutcome {
            visibility_changes,
            ..IngestOutcome::default()
        }
    }

    fn sweep(&mut self) -> usize {
        let Some(now) = self.latest_sent else {
            return 0;
        };
        let swept: Vec<(u32, Vec<ObjectEvent>)> = self
            .cameras
            .iter_mut()
            .map(|(&camera_id, camera)| (camera_id, camera.sweep(now)))
            .collect();

        let mut count = 0;
        for (camera_id, events) in swept {
            count += events.len();
            self.log_events(camera_id, now, &events);
        }
        count
    }

    fn log_events(&mut self, camera_id: u32, time: f64, events: &[ObjectEvent]) {
        for event in events {
            let visible = matches!(event.change, VisibilityChange::Appeared);
            info!(
                camera_id,
                object = %event.kind,
                visible,
                x = event.position.x,
                y = event.position.y,
                "visibility changed"
            );
            observability::record_visibility_change(event.kind.class(), visible);
            self.log.push(time, describe(camera_id, event));
        }
    }

    pub fn source(&self) -> SourceState {
        self.source
    }

    /// Camera views by camera id
    pub fn cameras(&self) -> &BTreeMap<u32, CameraView> {
        &self.cameras
    }

    pub fn camera(&self, camera_id: u32) -> Option<&CameraView> {
        self.cameras.get(&camera_id)
    }

    pub fn data_loss(&self) -> &DataLossDetector {
        &self.data_loss
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Frames ingested since start
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Latest send time across all cameras, `None` while silent
    pub fn latest_sent(&self) -> Option<f64> {
        self.latest_sent
    }

    pub fn snapshot(&self, log_tail: usize) -> AggregatorSnapshot {
        AggregatorSnapshot {
            source: self.source,
            frames: self.frames,
            cameras: self.cameras.values().map(CameraView::snapshot).collect(),
            log: self.log.tail(log_tail).to_vec(),
            robot_losses: self.data_loss.report(ObjectClass::Robot),
            ball_losses: self.data_loss.report(ObjectClass::Ball),
            sequence_regressions: self.data_loss.regressions(),
        }
    }
}

/// Owned, consistent copy of the aggregator for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatorSnapshot {
    pub source: SourceState,
    pub frames: u64,
    /// Ascending camera id
    pub cameras: Vec<CameraSnapshot>,
    pub log: Vec<String>,
    pub robot_losses: LossReport,
    pub ball_losses: LossReport,
    pub sequence_regressions: u64,
}

/// Vision feed statistics
///
/// One producer calls `ingest`, any number of readers take `snapshot` or
/// `read`; all of them serialize on a single lock. A poisoned lock is
/// recovered, the state stays usable.
#[derive(Debug)]
pub struct StatsAggregator {
    state: Mutex<AggregatorState>,
}

impl StatsAggregator {
    pub fn new(config: &InspectorConfig) -> Self {
        Self {
            state: Mutex::new(AggregatorState::new(config)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AggregatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ingest a frame received now, or the silence signal for `None`
    pub fn ingest(&self, frame: Option<&DetectionFrame>) -> IngestOutcome {
        self.ingest_at(frame, now_seconds())
    }

    /// Ingest with an explicit local receive time
    #[instrument(
        level = "trace",
        name = "aggregator_ingest",
        skip(self, frame),
        fields(
            camera_id = frame.map(|f| f.camera_id),
            frame_number = frame.map(|f| f.frame_number)
        )
    )]
    pub fn ingest_at(&self, frame: Option<&DetectionFrame>, now: f64) -> IngestOutcome {
        let mut state = self.lock();
        match frame {
            Some(frame) => state.ingest_frame(frame, now),
            None => state.silence(),
        }
    }

    /// Prune every camera to the latest send time seen on any camera
    ///
    /// Ages out cameras that stopped sending while others go on. Returns the
    /// number of visibility changes logged.
    pub fn sweep(&self) -> usize {
        self.lock().sweep()
    }

    pub fn snapshot(&self, log_tail: usize) -> AggregatorSnapshot {
        self.lock().snapshot(log_tail)
    }

    /// Run `f` against the locked state
    pub fn read<R>(&self, f: impl FnOnce(&AggregatorState) -> R) -> R {
        f(&self.lock())
    }
}

/// Local wall-clock time in seconds since the UNIX epoch
pub fn now_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{BallDetection, Position2d, RobotDetection, RobotId, TeamColor};
    use std::sync::Arc;
    use std::thread;

    fn frame(camera_id: u32, frame_number: u32, t_sent: f64) -> DetectionFrame {
        DetectionFrame {
            camera_id,
            frame_number,
            t_sent,
            t_capture: t_sent - 0.003,
            robots: vec![RobotDetection {
                robot_id: RobotId::new(5, TeamColor::Yellow),
                position: Position2d::new(1.0, 1.0),
            }],
            balls: vec![BallDetection {
                position: Position2d::new(0.5, 0.0),
            }],
        }
    }

    fn aggregator() -> StatsAggregator {
        StatsAggregator::new(&InspectorConfig::default())
    }

    #[test]
    fn test_cameras_created_on_first_frame() {
        let stats = aggregator();
        stats.ingest_at(Some(&frame(0, 1, 100.0)), 100.001);
        stats.ingest_at(Some(&frame(3, 1, 100.0)), 100.001);

        stats.read(|state| {
            assert_eq!(state.cameras().keys().copied().collect::<Vec<_>>(), vec![0, 3]);
            assert_eq!(state.frames(), 2);
            assert_eq!(state.source(), SourceState::Active);
        });
    }

    #[test]
    fn test_visibility_logged_once() {
        let stats = aggregator();
        for i in 0..20u32 {
            let t = 100.0 + f64::from(i) / 60.0;
            stats.ingest_at(Some(&frame(0, i, t)), t);
        }

        stats.read(|state| {
            let log = state.log().entries();
            assert_eq!(log.len(), 2);
            assert!(log.iter().any(|l| l.contains("cam 0: Ball appeared at")));
            assert!(log.iter().any(|l| l.contains("cam 0: Robot  5 Y appeared at")));
            assert!(log[0].starts_with("1970-01-01T00:01:40.000: "));
        });
    }

    #[test]
    fn test_silence_clears_and_logs_vanish() {
        let stats = aggregator();
        stats.ingest_at(Some(&frame(0, 1, 100.0)), 100.0);
        let outcome = stats.ingest_at(None, 101.0);

        assert_eq!(outcome.visibility_changes, 2);
        stats.read(|state| {
            assert_eq!(state.source(), SourceState::Silent);
            let camera = state.camera(0).unwrap();
            assert_eq!(camera.frames().quality(), None);
            assert!(camera.balls().is_empty());
            assert!(state.log().tail(1)[0].contains("vanished"));
        });

        // repeated silence does not log again
        assert_eq!(stats.ingest_at(None, 102.0).visibility_changes, 0);
    }

    #[test]
    fn test_silence_then_frame_behaves_like_first() {
        let fresh = aggregator();
        fresh.ingest_at(Some(&frame(0, 500, 200.0)), 200.002);

        let reused = aggregator();
        for i in 0..40u32 {
            let t = 100.0 + f64::from(i) * 0.02;
            reused.ingest_at(Some(&frame(0, i * 2, t)), t + 0.01);
        }
        reused.ingest_at(None, 101.5);
        reused.ingest_at(Some(&frame(0, 500, 200.0)), 200.002);

        assert_eq!(fresh.snapshot(0).cameras, reused.snapshot(0).cameras);
    }

    #[test]
    fn test_data_loss_forwarded() {
        let stats = aggregator();
        let mut total = 0;
        for (id, t) in [(1, 10.0), (2, 10.016), (3, 10.033), (6, 10.083), (7, 10.1)] {
            total += stats.ingest_at(Some(&frame(0, id, t)), t).data_losses;
        }
        // robot and ball each lost frames 4 and 5
        assert_eq!(total, 2);

        let snapshot = stats.snapshot(20);
        assert_eq!(snapshot.robot_losses.histogram.total(), 1);
        assert_eq!(snapshot.ball_losses.histogram.total(), 1);
        assert!(snapshot.robot_losses.over_threshold.is_empty());
    }

    #[test]
    fn test_sweep_without_input() {
        let stats = aggregator();
        stats.ingest_at(Some(&frame(0, 1, 100.0)), 100.0);
        assert_eq!(stats.sweep(), 0);
        stats.read(|state| {
            assert_eq!(state.camera(0).unwrap().balls().visible_count(), 1);
        });
    }

    #[test]
    fn test_sweep_ages_out_stopped_camera() {
        let stats = aggregator();
        let mut t = 100.0;
        let mut id = 0;
        // both cameras for half a second
        while t < 100.5 {
            id += 1;
            stats.ingest_at(Some(&frame(0, id, t)), t);
            stats.ingest_at(Some(&frame(1, id, t)), t);
            t += 1.0 / 60.0;
        }
        // camera 1 stops, camera 0 goes on
        while t < 105.5 {
            id += 1;
            stats.ingest_at(Some(&frame(0, id, t)), t);
            t += 1.0 / 60.0;
        }

        assert_eq!(stats.sweep(), 2);

        let snapshot = stats.snapshot(10);
        let live = &snapshot.cameras[0];
        let stopped = &snapshot.cameras[1];
        assert_eq!(live.quality, Some(1.0));
        assert_eq!(live.visible_yellow, 1);
        assert_eq!(stopped.camera_id, 1);
        assert_eq!(stopped.quality, None);
        assert_eq!(stopped.fps, 0.0);
        assert!(stopped.balls.is_empty());
        assert_eq!(stopped.visible_yellow, 0);
        assert!(stopped.processing_latency.is_none());
        assert!(snapshot.log.iter().any(|l| l.contains("cam 1: Ball vanished")));

        // nothing left to age out
        assert_eq!(stats.sweep(), 0);
    }

    #[test]
    fn test_event_log_tail() {
        let mut log = EventLog::default();
        for i in 0..5 {
            log.push(0.0, format!("entry {i}"));
        }
        assert_eq!(log.tail(2).len(), 2);
        assert!(log.tail(2)[1].ends_with("entry 4"));
        assert_eq!(log.tail(10).len(), 5);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.25), "1970-01-01T00:00:00.250");
        assert_eq!(format_timestamp(1_700_000_000.5), "2023-11-14T22:13:20.500");
    }

    #[test]
    fn test_concurrent_ingest_and_read() {
        let stats = Arc::new(aggregator());

        let writer = {
            let stats = Arc::clone(&stats);
            thread::spawn(move || {
                for i in 0..500u32 {
                    let t = 100.0 + f64::from(i) / 60.0;
                    stats.ingest_at(Some(&frame(i % 2, i / 2, t)), t);
                }
            })
        };

        let reader = {
            let stats = Arc::clone(&stats);
            thread::spawn(move || {
                let mut last = 0;
                for _ in 0..200 {
                    let snapshot = stats.snapshot(5);
                    assert!(snapshot.frames >= last);
                    assert!(snapshot.log.len() <= 5);
                    last = snapshot.frames;
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(stats.read(|state| state.frames()), 500);
    }
}
