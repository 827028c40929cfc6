//! Velocity-gated association of detections to tracks.
//!
//! The wire protocol gives balls no identity at all, and robot ids can be
//! duplicated by misdetections, so a track is just "the detections that a
//! physically plausible motion could connect". A detection joins the track
//! that needs the slowest motion to reach it, provided that motion stays below
//! the class velocity ceiling.

use std::fmt;

use contracts::{Detection, LossObject, ObjectClass, Position2d, RobotId};
use serde::Serialize;

use crate::frame_window::FrameWindow;

/// Kind of object a track follows
pub trait TrackedObject: Copy + fmt::Debug + fmt::Display {
    const CLASS: ObjectClass;

    /// Identity used in event logs and loss records
    fn object(&self) -> LossObject;
}

/// Balls carry no identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Ball;

impl fmt::Display for Ball {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ball")
    }
}

impl TrackedObject for Ball {
    const CLASS: ObjectClass = ObjectClass::Ball;

    fn object(&self) -> LossObject {
        LossObject::Ball
    }
}

impl TrackedObject for RobotId {
    const CLASS: ObjectClass = ObjectClass::Robot;

    fn object(&self) -> LossObject {
        LossObject::Robot(*self)
    }
}

/// A visibility transition of one track
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum VisibilityChange {
    Appeared,
    /// `visible_for` runs from the transition to visible until the last detection
    Vanished { visible_for: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisibilityEvent<K> {
    pub kind: K,
    /// Last known position
    pub position: Position2d,
    pub change: VisibilityChange,
}

/// Detection history of one physical object
#[derive(Debug, Clone)]
pub struct Track<K> {
    kind: K,
    first_detection: Detection,
    last_detection: Detection,
    frames: FrameWindow,
    visible: bool,
    visible_since: Option<f64>,
}

impl<K: TrackedObject> Track<K> {
    /// Start a track from its first detection
    pub fn new(kind: K, detection: Detection, frame_id: u32, quality_window: f64) -> Self {
        let mut frames = FrameWindow::new(quality_window);
        frames.add(frame_id, detection.time);
        Self {
            kind,
            first_detection: detection,
            last_detection: detection,
            frames,
            visible: false,
            visible_since: None,
        }
    }

    /// Add a matched detection
    ///
    /// A detection older than the current last one only counts for the frame
    /// window, and extends the track backwards when older than the first.
    pub fn observe(&mut self, detection: Detection, frame_id: u32) {
        self.frames.add(frame_id, detection.time);
        if detection.time >= self.last_detection.time {
            self.last_detection = detection;
        } else if detection.time < self.first_detection.time {
            self.first_detection = detection;
        }
    }

    /// Velocity needed to reach `detection` from the last detection
    pub fn velocity_to(&self, detection: &Detection) -> Option<f64> {
        self.last_detection.implied_velocity(detection)
    }

    #[inline]
    pub fn kind(&self) -> K {
        self.kind
    }

    #[inline]
    pub fn first_detection(&self) -> &Detection {
        &self.first_detection
    }

    #[inline]
    pub fn last_detection(&self) -> &Detection {
        &self.last_detection
    }

    #[inline]
    pub fn frames(&self) -> &FrameWindow {
        &self.frames
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Time between first and last detection
    pub fn age(&self) -> f64 {
        self.last_detection.time - self.first_detection.time
    }

    pub fn quality(&self) -> Option<f64> {
        self.frames.quality()
    }

    fn prune(&mut self, now: f64) {
        self.frames.prune(now - self.frames.window());
    }

    /// Visible once quality exceeds `threshold`, invisible once the window is empty
    fn update_visibility(&mut self, threshold: f64) -> Option<VisibilityEvent<K>> {
        let change = if self.visible && self.frames.is_empty() {
            self.visible = false;
            let since = self
                .visible_since
                .take()
                .unwrap_or(self.last_detection.time);
            VisibilityChange::Vanished {
                visible_for: self.last_detection.time - since,
            }
        } else if !self.visible && self.quality().is_some_and(|q| q > threshold) {
            self.visible = true;
            self.visible_since = Some(self.last_detection.time);
            VisibilityChange::Appeared
        } else {
            return None;
        };
        Some(self.event(change))
    }

    /// Vanish event of a visible track being dropped
    fn vanish_on_drop(&self) -> Option<VisibilityEvent<K>> {
        self.visible.then(|| {
            let since = self.visible_since.unwrap_or(self.last_detection.time);
            self.event(VisibilityChange::Vanished {
                visible_for: self.last_detection.time - since,
            })
        })
    }

    fn event(&self, change: VisibilityChange) -> VisibilityEvent<K> {
        VisibilityEvent {
            kind: self.kind,
            position: self.last_detection.position,
            change,
        }
    }
}

/// All tracks of one object class on one camera (one team for robots)
#[derive(Debug, Clone)]
pub struct TrackSet<K> {
    tracks: Vec<Track<K>>,
    max_velocity: f64,
    quality_window: f64,
}

impl<K: TrackedObject> TrackSet<K> {
    pub fn new(max_velocity: f64, quality_window: f64) -> Self {
        Self {
            tracks: Vec::new(),
            max_velocity,
            quality_window,
        }
    }

    /// Index of the track needing the slowest motion below the ceiling
    ///
    /// Tracks whose last detection has the same timestamp never match. On a
    /// tie the first track found wins.
    pub fn find_match(&self, detection: &Detection) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (index, track) in self.tracks.iter().enumerate() {
            let Some(velocity) = track.velocity_to(detection) else {
                continue;
            };
            if velocity >= self.max_velocity {
                continue;
            }
            if best.is_none_or(|(_, v)| velocity < v) {
                best = Some((index, velocity));
            }
        }
        best.map(|(index, _)| index)
    }

    /// Feed a detection to its matching track, or start a new track
    ///
    /// Returns the index of the track that took the detection.
    pub fn observe(&mut self, kind: K, detection: Detection, frame_id: u32) -> usize {
        match self.find_match(&detection) {
            Some(index) => {
                self.tracks[index].observe(detection, frame_id);
                index
            }
            None => {
                self.tracks
                    .push(Track::new(kind, detection, frame_id, self.quality_window));
                self.tracks.len() - 1
            }
        }
    }

    /// Collapse tracks that plausibly follow the same object
    ///
    /// Repeats until no pair is within the velocity ceiling; of each pair the
    /// track with the more recent last detection survives. Returns vanish
    /// events for removed tracks that were visible.
    pub fn merge(&mut self) -> Vec<VisibilityEvent<K>> {
        let mut events = Vec::new();
        while let Some((a, b)) = self.mergeable_pair() {
            let drop = if self.tracks[a].last_detection.time >= self.tracks[b].last_detection.time {
                b
            } else {
                a
            };
            let removed = self.tracks.remove(drop);
            events.extend(removed.vanish_on_drop());
        }
        events
    }

    fn mergeable_pair(&self) -> Option<(usize, usize)> {
        for (i, a) in self.tracks.iter().enumerate() {
            for (j, b) in self.tracks.iter().enumerate().skip(i + 1) {
                let close = a
                    .last_detection
                    .implied_velocity(&b.last_detection)
                    .is_some_and(|v| v < self.max_velocity);
                if close {
                    return Some((i, j));
                }
            }
        }
        None
    }

    /// Evict tracks without a detection for `timeout`, prune the windows of the rest
    ///
    /// Returns vanish events for evicted tracks that were still visible.
    pub fn prune(&mut self, now: f64, timeout: f64) -> Vec<VisibilityEvent<K>> {
        let mut events = Vec::new();
        self.tracks.retain_mut(|track| {
            if now - track.last_detection.time >= timeout {
                events.extend(track.vanish_on_drop());
                false
            } else {
                track.prune(now);
                true
            }
        });
        events
    }

    pub fn update_visibility(&mut self, threshold: f64) -> Vec<VisibilityEvent<K>> {
        self.tracks
            .iter_mut()
            .filter_map(|track| track.update_visibility(threshold))
            .collect()
    }

    /// Drop every track, returning vanish events for the visible ones
    pub fn clear(&mut self) -> Vec<VisibilityEvent<K>> {
        let events = self
            .tracks
            .iter()
            .filter_map(Track::vanish_on_drop)
            .collect();
        self.tracks.clear();
        events
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track<K>> {
        self.tracks.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Track<K>> {
        self.tracks.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn visible_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.visible).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::TeamColor;

    fn det(time: f64, x: f64, y: f64) -> Detection {
        Detection::new(time, Position2d::new(x, y))
    }

    fn ball_set() -> TrackSet<Ball> {
        TrackSet::new(6.0, 0.5)
    }

    #[test]
    fn test_same_timestamp_never_matches() {
        let mut set = ball_set();
        set.observe(Ball, det(1.0, 0.0, 0.0), 1);
        assert_eq!(set.find_match(&det(1.0, 0.0, 0.0)), None);

        set.observe(Ball, det(1.0, 0.0, 0.0), 1);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_slowest_candidate_wins() {
        let mut set = ball_set();
        // at t = 1.0 the probe at (0, 0) implies 3, 1 and 8 m/s
        set.observe(Ball, det(0.0, 3.0, 0.0), 1);
        set.observe(Ball, det(0.0, 0.0, 1.0), 1);
        set.observe(Ball, det(0.0, -8.0, 0.0), 1);
        assert_eq!(set.len(), 3);

        assert_eq!(set.find_match(&det(1.0, 0.0, 0.0)), Some(1));
    }

    #[test]
    fn test_no_candidate_below_ceiling_creates_track() {
        let mut set = ball_set();
        set.observe(Ball, det(0.0, 8.0, 0.0), 1);

        let index = set.observe(Ball, det(1.0, 0.0, 0.0), 2);
        assert_eq!(index, 1);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_tie_keeps_first_found() {
        let mut set = ball_set();
        set.observe(Ball, det(0.0, 1.0, 0.0), 1);
        set.observe(Ball, det(0.0, -1.0, 0.0), 1);
        assert_eq!(set.find_match(&det(1.0, 0.0, 0.0)), Some(0));
    }

    #[test]
    fn test_observe_updates_last_detection() {
        let mut set = ball_set();
        set.observe(Ball, det(1.0, 0.0, 0.0), 1);
        set.observe(Ball, det(1.1, 0.1, 0.0), 2);

        let track = set.get(0).unwrap();
        assert_eq!(track.last_detection().time, 1.1);
        assert_eq!(track.first_detection().time, 1.0);
        assert!((track.age() - 0.1).abs() < 1e-12);
        assert_eq!(track.quality(), Some(1.0));
    }

    #[test]
    fn test_older_detection_keeps_last() {
        let mut set = ball_set();
        set.observe(Ball, det(1.0, 0.0, 0.0), 2);
        set.observe(Ball, det(0.9, 0.0, 0.0), 1);

        let track = set.get(0).unwrap();
        assert_eq!(track.last_detection().time, 1.0);
        assert_eq!(track.first_detection().time, 0.9);
        assert!(track.last_detection().time >= track.first_detection().time);
    }

    #[test]
    fn test_robot_kind_assigned_once() {
        let mut set: TrackSet<RobotId> = TrackSet::new(6.0, 0.5);
        set.observe(RobotId::new(3, TeamColor::Blue), det(0.0, 0.0, 0.0), 1);
        set.observe(RobotId::new(4, TeamColor::Blue), det(0.1, 0.1, 0.0), 2);

        assert_eq!(set.len(), 1);
        assert_eq!(set.get(0).unwrap().kind(), RobotId::new(3, TeamColor::Blue));
    }

    #[test]
    fn test_merge_keeps_most_recent() {
        let mut set = ball_set();
        set.observe(Ball, det(1.0, 0.0, 0.0), 1);
        set.observe(Ball, det(1.0, 0.2, 0.0), 1);
        // joins the first track, whose last detection becomes (1.1, 0.1)
        set.observe(Ball, det(1.1, 0.1, 0.0), 2);
        assert_eq!(set.len(), 2);

        // neither track was visible yet
        assert!(set.merge().is_empty());
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(0).unwrap().last_detection().time, 1.1);
    }

    #[test]
    fn test_merge_reports_vanish_of_visible_track() {
        let mut set = ball_set();
        set.observe(Ball, det(1.0, 0.0, 0.0), 1);
        set.observe(Ball, det(1.0, 0.2, 0.0), 1);
        let appeared = set.update_visibility(0.9);
        assert_eq!(appeared.len(), 2);

        set.observe(Ball, det(1.1, 0.1, 0.0), 2);
        let vanished = set.merge();
        assert_eq!(set.len(), 1);
        assert_eq!(vanished.len(), 1);
        assert_eq!(vanished[0].position, Position2d::new(0.2, 0.0));
        assert_eq!(
            vanished[0].change,
            VisibilityChange::Vanished { visible_for: 0.0 }
        );
        // the survivor keeps its own visibility
        assert_eq!(set.visible_count(), 1);
    }

    #[test]
    fn test_merge_idempotent() {
        let mut set = ball_set();
        for (i, x) in [0.0, 0.05, 3.0, 3.05, 9.0].into_iter().enumerate() {
            set.observe(Ball, det(1.0 + i as f64 * 0.01, x, 0.0), i as u32);
        }

        set.merge();
        let once: Vec<f64> = set.iter().map(|t| t.last_detection().time).collect();
        assert!(set.merge().is_empty());
        let twice: Vec<f64> = set.iter().map(|t| t.last_detection().time).collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_skips_same_timestamp_pairs() {
        let mut set = ball_set();
        set.observe(Ball, det(1.0, 0.0, 0.0), 1);
        set.observe(Ball, det(1.0, 0.01, 0.0), 1);
        assert!(set.merge().is_empty());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_prune_evicts_after_timeout() {
        let mut set = ball_set();
        set.observe(Ball, det(1.0, 0.0, 0.0), 1);
        set.observe(Ball, det(1.5, 5.0, 5.0), 2);

        assert!(set.prune(1.9, 1.0).is_empty());
        assert_eq!(set.len(), 2);

        set.prune(2.0, 1.0);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(0).unwrap().last_detection().time, 1.5);
    }

    #[test]
    fn test_visibility_hysteresis() {
        let mut set = ball_set();
        let mut events = Vec::new();

        // complete sequence: quality 1.0
        for i in 0..10u32 {
            let t = 1.0 + f64::from(i) * 0.01;
            set.observe(Ball, det(t, 0.0, 0.0), i);
            set.prune(t, 1.0);
            events.extend(set.update_visibility(0.9));
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].change, VisibilityChange::Appeared);

        // every other frame: quality drops towards 0.5 but stays visible
        for i in 0..30u32 {
            let t = 1.1 + f64::from(i) * 0.02;
            set.observe(Ball, det(t, 0.0, 0.0), 10 + i * 2);
            set.prune(t, 1.0);
            events.extend(set.update_visibility(0.9));
        }
        let quality = set.get(0).unwrap().quality().unwrap();
        assert!(quality < 0.6);
        assert_eq!(events.len(), 1);
        assert!(set.get(0).unwrap().is_visible());

        // no detections: window empties before the eviction timeout
        let last = set.get(0).unwrap().last_detection().time;
        set.prune(last + 0.6, 1.0);
        events.extend(set.update_visibility(0.9));
        assert_eq!(events.len(), 2);
        match events[1].change {
            VisibilityChange::Vanished { visible_for } => {
                assert!((visible_for - (last - 1.0)).abs() < 1e-9)
            }
            VisibilityChange::Appeared => panic!("expected vanish"),
        }
        assert_eq!(set.len(), 1);
        assert_eq!(set.visible_count(), 0);
    }

    #[test]
    fn test_dropping_visible_track_reports_vanish() {
        let mut set = ball_set();
        set.observe(Ball, det(1.0, 0.0, 0.0), 1);
        set.update_visibility(0.9);
        assert_eq!(set.visible_count(), 1);

        let events = set.prune(2.5, 1.0);
        assert_eq!(events.len(), 1);
        assert!(set.is_empty());

        set.observe(Ball, det(3.0, 0.0, 0.0), 5);
        set.update_visibility(0.9);
        let events = set.clear();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].change, VisibilityChange::Vanished { .. }));
    }
}
