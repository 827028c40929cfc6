//! Mock 视觉源
//!
//! 无网络环境下生成确定性的检测帧，用于测试和离线运行。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use contracts::{
    BallDetection, DetectionFrame, Position2d, RobotDetection, RobotId, TeamColor, VisionEvent,
};
use tracing::{debug, trace};

use crate::config::IngestionMetrics;

/// Mock 视觉源配置
#[derive(Debug, Clone)]
pub struct MockVisionConfig {
    /// 相机数量，id 为 `0..cameras`
    pub cameras: u32,

    /// 每队机器人数量，分布在各相机上
    pub robots_per_team: u32,

    /// 在 0 号相机上放一个球
    pub ball: bool,

    /// 每个相机的帧率
    pub fps: f64,

    /// 每隔 n 帧丢弃一帧
    pub drop_every: Option<u32>,

    /// 第一个 tick 的 `t_sent` (秒)
    pub start_time: f64,

    /// 采集到发送的延迟 (秒)
    pub processing_latency: f64,
}

impl Default for MockVisionConfig {
    fn default() -> Self {
        Self {
            cameras: 2,
            robots_per_team: 3,
            ball: true,
            fps: 60.0,
            drop_every: None,
            start_time: 1_000.0,
            processing_latency: 0.004,
        }
    }
}

/// Mock 视觉源
///
/// 每队第 `n` 个机器人绕场地中心做圆周运动，由 `n % cameras` 号相机观测；
/// 球在 0 号相机上来回滚动。
pub struct MockVisionSource {
    config: MockVisionConfig,
    running: Arc<AtomicBool>,
}

impl MockVisionSource {
    pub fn new(config: MockVisionConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &MockVisionConfig {
        &self.config
    }

    /// 第 `tick` 个 tick 的帧 (从 0 开始)，未丢帧时每个相机一帧
    pub fn tick(&self, tick: u64) -> Vec<DetectionFrame> {
        let config = &self.config;
        let cameras = config.cameras.max(1);
        let frame_number = u32::try_from(tick + 1).unwrap_or(u32::MAX);
        if config
            .drop_every
            .is_some_and(|n| n > 0 && frame_number % n == 0)
        {
            return Vec::new();
        }

        let t_sent = config.start_time + tick as f64 / config.fps;
        let t_capture = t_sent - config.processing_latency;

        (0..cameras)
            .map(|camera_id| {
                let robots = TeamColor::ALL
                    .iter()
                    .flat_map(|&team| {
                        (0..config.robots_per_team)
                            .filter(move |n| n % cameras == camera_id)
                            .map(move |n| RobotDetection {
                                robot_id: RobotId::new(n, team),
                                position: robot_position(n, team, t_capture),
                            })
                    })
                    .collect();
                let balls = if config.ball && camera_id == 0 {
                    vec![BallDetection {
                        position: ball_position(t_capture),
                    }]
                } else {
                    Vec::new()
                };
                DetectionFrame {
                    camera_id,
                    frame_number,
                    t_sent,
                    t_capture,
                    robots,
                    balls,
                }
            })
            .collect()
    }

    /// 按配置帧率开始发送，返回事件流
    pub fn start(
        &self,
        channel_capacity: usize,
        metrics: Option<Arc<IngestionMetrics>>,
    ) -> async_channel::Receiver<VisionEvent> {
        let (tx, rx) = async_channel::bounded(channel_capacity);
        let source = MockVisionSource {
            config: self.config.clone(),
            running: self.running.clone(),
        };
        let metrics = metrics.unwrap_or_else(|| Arc::new(IngestionMetrics::new()));

        self.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let interval = Duration::from_secs_f64(1.0 / source.config.fps);
            let mut tick: u64 = 0;

            debug!(
                cameras = source.config.cameras,
                fps = source.config.fps,
                "mock vision source started"
            );

            'outer: while source.running.load(Ordering::Relaxed) {
                for frame in source.tick(tick) {
                    metrics.record_forwarded();
                    trace!(
                        camera_id = frame.camera_id,
                        frame_number = frame.frame_number,
                        "mock frame sent"
                    );
                    if tx.send(VisionEvent::Frame(frame)).await.is_err() {
                        debug!("mock vision channel closed");
                        break 'outer;
                    }
                }
                tick += 1;
                tokio::time::sleep(interval).await;
            }

            debug!("mock vision source stopped");
        });

        rx
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

fn robot_position(n: u32, team: TeamColor, t: f64) -> Position2d {
    let radius = 1.0 + 0.4 * f64::from(n);
    let phase = match team {
        TeamColor::Blue => 0.0,
        TeamColor::Yellow => std::f64::consts::PI,
    };
    let angle = 0.5 * t + phase + f64::from(n);
    Position2d::new(radius * angle.cos(), radius * angle.sin())
}

fn ball_position(t: f64) -> Position2d {
    Position2d::new(2.0 * (0.8 * t).sin(), 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_layout() {
        let source = MockVisionSource::new(MockVisionConfig {
            cameras: 2,
            robots_per_team: 3,
            ..Default::default()
        });
        let frames = source.tick(0);
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.frame_number == 1));

        // robots 0 and 2 of each team on camera 0, robot 1 on camera 1
        assert_eq!(frames[0].robots.len(), 4);
        assert_eq!(frames[1].robots.len(), 2);
        assert_eq!(frames[0].balls.len(), 1);
        assert!(frames[1].balls.is_empty());

        let next = source.tick(1);
        assert!((next[0].t_sent - frames[0].t_sent - 1.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_drop_every() {
        let source = MockVisionSource::new(MockVisionConfig {
            drop_every: Some(5),
            ..Default::default()
        });
        assert!(source.tick(4).is_empty());
        assert!(!source.tick(5).is_empty());
    }

    #[test]
    fn test_speeds_stay_plausible() {
        let source = MockVisionSource::new(MockVisionConfig::default());
        let (first, second) = (source.tick(10), source.tick(11));
        let (a, b) = (&first[0], &second[0]);
        for (ra, rb) in a.robots.iter().zip(&b.robots) {
            let v = ra.detection(a.t_sent).implied_velocity(&rb.detection(b.t_sent));
            assert!(v.unwrap() < 6.0);
        }
    }

    #[tokio::test]
    async fn test_mock_source_streams_frames() {
        let source = MockVisionSource::new(MockVisionConfig {
            cameras: 1,
            fps: 200.0,
            ..Default::default()
        });
        let metrics = Arc::new(IngestionMetrics::new());
        let rx = source.start(10, Some(metrics.clone()));
        assert!(source.is_running());

        for expected in 1..=3 {
            let event = rx.recv().await.unwrap();
            let frame = event.frame().unwrap();
            assert_eq!(frame.camera_id, 0);
            assert_eq!(frame.frame_number, expected);
        }

        source.stop();
        assert!(!source.is_running());
        assert!(metrics.snapshot().frames_forwarded >= 3);
    }
}
