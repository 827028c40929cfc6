//! Per-camera statistics and tracks.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use contracts::{
    DetectionFrame, InspectorConfig, LossObject, ObjectClass, Position2d, RobotId, TeamColor,
};
use serde::Serialize;
use tracing::warn;

use crate::frame_window::{FrameWindow, InterArrival};
use crate::track::{Ball, Track, TrackSet, TrackedObject, VisibilityEvent};
use crate::window::{DurationStats, WindowedDuration};

/// Visibility transition with the object identity resolved
pub type ObjectEvent = VisibilityEvent<LossObject>;

/// Velocity ceiling and quality window of one object class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassParams {
    pub max_velocity: f64,
    pub quality_window: f64,
}

impl ClassParams {
    fn from_config(config: &InspectorConfig, class: ObjectClass) -> Self {
        Self {
            max_velocity: config.tracking.max_velocity(class),
            quality_window: config.windows.quality_window(class),
        }
    }
}

/// Window lengths and tracking limits of a camera view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewParams {
    pub latency_window: f64,
    pub camera_quality_window: f64,
    pub ball: ClassParams,
    pub robot: ClassParams,
    pub visibility_timeout: f64,
    pub visible_quality_threshold: f64,
}

impl Default for ViewParams {
    fn default() -> Self {
        Self::from(&InspectorConfig::default())
    }
}

impl From<&InspectorConfig> for ViewParams {
    fn from(config: &InspectorConfig) -> Self {
        Self {
            latency_window: config.windows.latency_window_s,
            camera_quality_window: config.windows.camera_quality_window_s,
            ball: ClassParams::from_config(config, ObjectClass::Ball),
            robot: ClassParams::from_config(config, ObjectClass::Robot),
            visibility_timeout: config.windows.visibility_timeout_s,
            visible_quality_threshold: config.tracking.visible_quality_threshold,
        }
    }
}

/// Everything known about one camera
#[derive(Debug, Clone)]
pub struct CameraView {
    camera_id: u32,
    params: ViewParams,
    frames: FrameWindow,
    processing: WindowedDuration,
    receiving: WindowedDuration,
    balls: TrackSet<Ball>,
    robots: BTreeMap<TeamColor, TrackSet<RobotId>>,
    latest_sent: Option<f64>,
}

impl CameraView {
    pub fn new(camera_id: u32, params: ViewParams) -> Self {
        Self {
            camera_id,
            params,
            frames: FrameWindow::new(params.camera_quality_window),
            processing: WindowedDuration::new(params.latency_window),
            receiving: WindowedDuration::new(params.latency_window),
            balls: TrackSet::new(params.ball.max_velocity, params.ball.quality_window),
            robots: BTreeMap::new(),
            latest_sent: None,
        }
    }

    /// Fold one frame into the view, `now` being the local receive time
    ///
    /// Detections are matched, then tracks merged, then stale tracks evicted
    /// and windows pruned to the frame's send time, and finally visibility is
    /// re-evaluated. Returns the visibility transitions in that order.
    pub fn ingest(&mut self, frame: &DetectionFrame, now: f64) -> Vec<ObjectEvent> {
        let t_sent = frame.t_sent;

        self.processing.add(frame.processing_latency(), t_sent);
        self.receiving.add(frame.receiving_latency(now), t_sent);

        let regressions = self.frames.regressions();
        self.frames.add(frame.frame_number, t_sent);
        if self.frames.regressions() > regressions {
            warn!(
                camera_id = self.camera_id,
                frame_number = frame.frame_number,
                "camera frame number went backwards"
            );
            observability::record_frame_regression(self.camera_id);
        }

        let robot = self.params.robot;
        for detection in &frame.robots {
            self.robots
                .entry(detection.robot_id.team)
                .or_insert_with(|| TrackSet::new(robot.max_velocity, robot.quality_window))
                .observe(detection.robot_id, detection.detection(t_sent), frame.frame_number);
        }
        for ball in &frame.balls {
            self.balls
                .observe(Ball, ball.detection(t_sent), frame.frame_number);
        }

        let mut events = resolve(self.balls.merge());
        for set in self.robots.values_mut() {
            events.extend(resolve(set.merge()));
        }

        self.latest_sent = Some(self.latest_sent.map_or(t_sent, |l| l.max(t_sent)));
        events.extend(self.prune(t_sent));
        events.extend(self.update_visibility());

        observability::record_camera_stats(
            self.camera_id,
            self.frames.quality(),
            self.frames.fps(),
            frame.processing_latency(),
            frame.receiving_latency(now),
        );

        events
    }

    /// Prune to `now` without new input
    ///
    /// `now` is the latest send time across all cameras, so a camera that
    /// stopped sending ages out while the others keep the clock moving.
    pub fn sweep(&mut self, now: f64) -> Vec<ObjectEvent> {
        let mut events = self.prune(now);
        events.extend(self.update_visibility());
        events
    }

    /// Forget everything; the next frame behaves like the first one
    pub fn clear(&mut self) -> Vec<ObjectEvent> {
        self.frames.clear();
        self.processing.clear();
        self.receiving.clear();
        self.latest_sent = None;

        let mut events = resolve(self.balls.clear());
        for set in self.robots.values_mut() {
            events.extend(resolve(set.clear()));
        }
        events
    }

    fn prune(&mut self, now: f64) -> Vec<ObjectEvent> {
        self.frames.prune(now - self.params.camera_quality_window);
        self.processing.prune(now);
        self.receiving.prune(now);

        let timeout = self.params.visibility_timeout;
        let mut events = resolve(self.balls.prune(now, timeout));
        for set in self.robots.values_mut() {
            events.extend(resolve(set.prune(now, timeout)));
        }
        events
    }

    fn update_visibility(&mut self) -> Vec<ObjectEvent> {
        let threshold = self.params.visible_quality_threshold;
        let mut events = resolve(self.balls.update_visibility(threshold));
        for set in self.robots.values_mut() {
            events.extend(resolve(set.update_visibility(threshold)));
        }
        events
    }

    #[inline]
    pub fn camera_id(&self) -> u32 {
        self.camera_id
    }

    #[inline]
    pub fn frames(&self) -> &FrameWindow {
        &self.frames
    }

    #[inline]
    pub fn processing_latency(&self) -> &WindowedDuration {
        &self.processing
    }

    #[inline]
    pub fn receiving_latency(&self) -> &WindowedDuration {
        &self.receiving
    }

    #[inline]
    pub fn balls(&self) -> &TrackSet<Ball> {
        &self.balls
    }

    pub fn robots(&self, team: TeamColor) -> Option<&TrackSet<RobotId>> {
        self.robots.get(&team)
    }

    #[inline]
    pub fn latest_sent(&self) -> Option<f64> {
        self.latest_sent
    }

    pub fn visible_robots(&self, team: TeamColor) -> usize {
        self.robots.get(&team).map_or(0, TrackSet::visible_count)
    }

    pub fn snapshot(&self) -> CameraSnapshot {
        let mut balls: Vec<TrackSnapshot> = self.balls.iter().map(TrackSnapshot::from).collect();
        balls.sort_by(TrackSnapshot::report_order);

        let mut robots: Vec<TrackSnapshot> = self
            .robots
            .values()
            .flat_map(TrackSet::iter)
            .map(TrackSnapshot::from)
            .collect();
        robots.sort_by(TrackSnapshot::report_order);

        CameraSnapshot {
            camera_id: self.camera_id,
            quality: self.frames.quality(),
            fps: self.frames.fps(),
            inter_arrival: self.frames.inter_arrival(),
            regressions: self.frames.regressions(),
            visible_blue: self.visible_robots(TeamColor::Blue),
            visible_yellow: self.visible_robots(TeamColor::Yellow),
            processing_latency: self.processing.stats(),
            receiving_latency: self.receiving.stats(),
            balls,
            robots,
        }
    }
}

fn resolve<K: TrackedObject>(events: Vec<VisibilityEvent<K>>) -> Vec<ObjectEvent> {
    events
        .into_iter()
        .map(|e| VisibilityEvent {
            kind: e.kind.object(),
            position: e.position,
            change: e.change,
        })
        .collect()
}

/// Owned copy of a camera's statistics for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraSnapshot {
    pub camera_id: u32,
    pub quality: Option<f64>,
    pub fps: f64,
    pub inter_arrival: Option<InterArrival>,
    pub regressions: u64,
    pub visible_blue: usize,
    pub visible_yellow: usize,
    pub processing_latency: Option<DurationStats>,
    pub receiving_latency: Option<DurationStats>,
    /// Sorted by age, oldest first
    pub balls: Vec<TrackSnapshot>,
    /// Sorted by age, then team, then id
    pub robots: Vec<TrackSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackSnapshot {
    pub object: LossObject,
    pub quality: Option<f64>,
    pub fps: f64,
    pub age: f64,
    pub visible: bool,
    pub position: Position2d,
}

impl TrackSnapshot {
    fn report_order(a: &Self, b: &Self) -> Ordering {
        b.age.total_cmp(&a.age).then_with(|| match (a.object, b.object) {
            (LossObject::Robot(x), LossObject::Robot(y)) => x.cmp(&y),
            _ => Ordering::Equal,
        })
    }
}

impl<K: TrackedObject> From<&Track<K>> for TrackSnapshot {
    fn from(track: &Track<K>) -> Self {
        Self {
            object: track.kind().object(),
            quality: track.quality(),
            fps: track.frames().fps(),
            age: track.age(),
            visible: track.is_visible(),
            position: track.last_detection().position,
        }
    }
}
