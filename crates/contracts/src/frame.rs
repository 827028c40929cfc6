//! DetectionFrame - 解码后的视觉帧，质量引擎的输入。

use serde::{Deserialize, Serialize};

use crate::{Detection, Position2d, RobotId};

/// 单个相机一次采集的检测结果
///
/// 位置已由解码器转换为米。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionFrame {
    /// 相机 ID
    pub camera_id: u32,

    /// 每个相机的帧序号 (单调递增)
    pub frame_number: u32,

    /// 视觉软件发送该帧的时间 (秒)
    pub t_sent: f64,

    /// 图像采集时间 (秒)
    pub t_capture: f64,

    /// 双方机器人
    #[serde(default)]
    pub robots: Vec<RobotDetection>,

    /// 候选球
    #[serde(default)]
    pub balls: Vec<BallDetection>,
}

impl DetectionFrame {
    /// Time spent inside the vision software (`sent - captured`)
    pub fn processing_latency(&self) -> f64 {
        self.t_sent - self.t_capture
    }

    /// Time between sending and `now` on the local clock
    pub fn receiving_latency(&self, now: f64) -> f64 {
        now - self.t_sent
    }
}

/// A detected robot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobotDetection {
    pub robot_id: RobotId,
    pub position: Position2d,
}

impl RobotDetection {
    pub fn detection(&self, time: f64) -> Detection {
        Detection::new(time, self.position)
    }
}

/// A detected ball
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallDetection {
    pub position: Position2d,
}

impl BallDetection {
    pub fn detection(&self, time: f64) -> Detection {
        Detection::new(time, self.position)
    }
}

/// 接收器发往摄入循环的消息
#[derive(Debug, Clone, PartialEq)]
pub enum VisionEvent {
    /// 解码后的帧
    Frame(DetectionFrame),
    /// 接收超时内未收到任何数据
    Silence,
}

impl VisionEvent {
    /// The carried frame, `None` for silence
    pub fn frame(&self) -> Option<&DetectionFrame> {
        match self {
            VisionEvent::Frame(frame) => Some(frame),
            VisionEvent::Silence => None,
        }
    }
}

impl From<Option<DetectionFrame>> for VisionEvent {
    fn from(frame: Option<DetectionFrame>) -> Self {
        frame.map_or(VisionEvent::Silence, VisionEvent::Frame)
    }
}
