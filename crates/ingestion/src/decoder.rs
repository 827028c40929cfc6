//! 视觉数据报解码
//!
//! 内置的 [`JsonFrameDecoder`] 读取 JSON 形式的视觉 wrapper 包。
//! 线上坐标单位为毫米，在此转换为米，下游不会看到线上单位。

use contracts::{
    BallDetection, ContractError, DetectionFrame, Position2d, RobotDetection, RobotId, TeamColor,
};
use serde::Deserialize;

/// 数据报解码器 trait
///
/// `Ok(None)` 表示数据报合法但不含检测数据 (例如仅含几何信息的包)。
pub trait FrameDecoder: Send + Sync {
    /// 解码单个数据报
    ///
    /// # Errors
    /// 数据报格式错误时返回 `ContractError::Decode`。
    fn decode(&self, datagram: &[u8]) -> Result<Option<DetectionFrame>, ContractError>;
}

/// JSON wrapper 包解码器
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFrameDecoder;

#[derive(Debug, Deserialize)]
struct WirePacket {
    #[serde(default)]
    detection: Option<WireDetection>,
}

#[derive(Debug, Deserialize)]
struct WireDetection {
    camera_id: u32,
    frame_number: u32,
    t_capture: f64,
    t_sent: f64,
    #[serde(default)]
    balls: Vec<WireBall>,
    #[serde(default)]
    robots_yellow: Vec<WireRobot>,
    #[serde(default)]
    robots_blue: Vec<WireRobot>,
}

#[derive(Debug, Deserialize)]
struct WireBall {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct WireRobot {
    #[serde(default)]
    robot_id: Option<u32>,
    x: f64,
    y: f64,
}

impl WireDetection {
    fn into_frame(self) -> DetectionFrame {
        // robots without an id cannot be tracked
        let robots = |list: Vec<WireRobot>, team: TeamColor| {
            list.into_iter().filter_map(move |r| {
                r.robot_id.map(|id| RobotDetection {
                    robot_id: RobotId::new(id, team),
                    position: Position2d::from_millimeters(r.x, r.y),
                })
            })
        };

        let mut all = Vec::with_capacity(self.robots_yellow.len() + self.robots_blue.len());
        all.extend(robots(self.robots_yellow, TeamColor::Yellow));
        all.extend(robots(self.robots_blue, TeamColor::Blue));

        DetectionFrame {
            camera_id: self.camera_id,
            frame_number: self.frame_number,
            t_sent: self.t_sent,
            t_capture: self.t_capture,
            robots: all,
            balls: self
                .balls
                .into_iter()
                .map(|b| BallDetection {
                    position: Position2d::from_millimeters(b.x, b.y),
                })
                .collect(),
        }
    }
}

impl FrameDecoder for JsonFrameDecoder {
    fn decode(&self, datagram: &[u8]) -> Result<Option<DetectionFrame>, ContractError> {
        let packet: WirePacket =
            serde_json::from_slice(datagram).map_err(|e| ContractError::decode(e.to_string()))?;
        Ok(packet.detection.map(WireDetection::into_frame))
    }
}

/// Encode a frame in the format [`JsonFrameDecoder`] reads
///
/// Used by the mock source and by tests that push datagrams through a socket.
pub fn encode_json(frame: &DetectionFrame) -> Vec<u8> {
    let robots = |team: TeamColor| {
        frame
            .robots
            .iter()
            .filter(|r| r.robot_id.team == team)
            .map(|r| {
                serde_json::json!({
                    "robot_id": r.robot_id.id,
                    "x": r.position.x * 1000.0,
                    "y": r.position.y * 1000.0,
                })
            })
            .collect::<Vec<_>>()
    };
    let balls: Vec<_> = frame
        .balls
        .iter()
        .map(|b| serde_json::json!({ "x": b.position.x * 1000.0, "y": b.position.y * 1000.0 }))
        .collect();

    serde_json::json!({
        "detection": {
            "camera_id": frame.camera_id,
            "frame_number": frame.frame_number,
            "t_capture": frame.t_capture,
            "t_sent": frame.t_sent,
            "balls": balls,
            "robots_yellow": robots(TeamColor::Yellow),
            "robots_blue": robots(TeamColor::Blue),
        }
    })
    .to_string()
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_converts_millimeters() {
        let json = br#"{"detection":{"camera_id":2,"frame_number":17,"t_capture":10.0,"t_sent":10.01,
            "balls":[{"x":1500.0,"y":-250.0}],
            "robots_yellow":[{"robot_id":3,"x":0.0,"y":1000.0}],
            "robots_blue":[{"robot_id":3,"x":-2000.0,"y":0.0},{"x":1.0,"y":1.0}]}}"#;
        let frame = JsonFrameDecoder.decode(json).unwrap().unwrap();

        assert_eq!(frame.camera_id, 2);
        assert_eq!(frame.frame_number, 17);
        assert_eq!(frame.balls.len(), 1);
        assert!((frame.balls[0].position.x - 1.5).abs() < 1e-12);
        assert!((frame.balls[0].position.y + 0.25).abs() < 1e-12);

        // the blue robot without an id is dropped
        assert_eq!(frame.robots.len(), 2);
        assert_eq!(frame.robots[0].robot_id, RobotId::new(3, TeamColor::Yellow));
        assert_eq!(frame.robots[1].robot_id, RobotId::new(3, TeamColor::Blue));
        assert!((frame.robots[1].position.x + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_geometry_only_packet() {
        let frame = JsonFrameDecoder.decode(br#"{"geometry":{}}"#).unwrap();
        assert!(frame.is_none());
    }

    #[test]
    fn test_malformed_datagram() {
        let err = JsonFrameDecoder.decode(b"\x08\x01garbage").unwrap_err();
        assert!(matches!(err, ContractError::Decode { .. }));

        let err = JsonFrameDecoder
            .decode(br#"{"detection":{"camera_id":1}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("frame_number"));
    }

    #[test]
    fn test_random_bytes_never_panic() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let len = rng.random_range(0..64);
            let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
            let _ = JsonFrameDecoder.decode(&bytes);
        }
    }

    #[test]
    fn test_encode_is_readable() {
        let frame = DetectionFrame {
            camera_id: 0,
            frame_number: 5,
            t_sent: 3.5,
            t_capture: 3.49,
            robots: vec![RobotDetection {
                robot_id: RobotId::new(7, TeamColor::Blue),
                position: Position2d::new(0.5, -0.5),
            }],
            balls: vec![BallDetection {
                position: Position2d::new(1.0, 2.0),
            }],
        };
        let decoded = JsonFrameDecoder.decode(&encode_json(&frame)).unwrap().unwrap();
        assert_eq!(decoded.robots[0].robot_id, frame.robots[0].robot_id);
        assert!((decoded.balls[0].position.y - 2.0).abs() < 1e-9);
    }
}
