//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - Mock 视觉源直接接入质量引擎
//! - UDP 数据报经接收器和解码器进入质量引擎
//! - 真实 socket 上的静默处理
//! - 配置文件驱动引擎阈值

#[cfg(test)]
mod e2e_tests {
    use std::io::Write;
    use std::time::Duration;

    use config_loader::ConfigLoader;
    use contracts::{
        DetectionFrame, InspectorConfig, LossObject, ObjectClass, Position2d, RobotDetection,
        RobotId, TeamColor, VisionConfig, VisionEvent,
    };
    use ingestion::{encode_json, JsonFrameDecoder, MockVisionConfig, MockVisionSource, VisionReceiver};
    use quality_engine::{SourceState, StatsAggregator};
    use tokio::net::UdpSocket;

    fn robot_frame(frame_number: u32, t_sent: f64) -> DetectionFrame {
        DetectionFrame {
            camera_id: 0,
            frame_number,
            t_sent,
            t_capture: t_sent - 0.003,
            robots: vec![RobotDetection {
                robot_id: RobotId::new(2, TeamColor::Yellow),
                position: Position2d::new(1.0, -1.0),
            }],
            balls: vec![],
        }
    }

    /// 端到端测试：MockVisionSource -> StatsAggregator
    #[tokio::test]
    async fn test_e2e_mock_source_into_aggregator() {
        let source = MockVisionSource::new(MockVisionConfig {
            cameras: 1,
            robots_per_team: 2,
            fps: 500.0,
            ..MockVisionConfig::default()
        });
        let aggregator = StatsAggregator::new(&InspectorConfig::default());
        let rx = source.start(64, None);

        let ingest = async {
            for _ in 0..30 {
                let event = rx.recv().await.unwrap();
                let frame = event.frame().unwrap();
                aggregator.ingest_at(Some(frame), frame.t_sent + 0.002);
            }
        };
        let result = tokio::time::timeout(Duration::from_secs(5), ingest).await;
        source.stop();
        assert!(result.is_ok(), "mock source stalled");

        let snapshot = aggregator.snapshot(50);
        assert_eq!(snapshot.source, SourceState::Active);
        assert_eq!(snapshot.frames, 30);

        let camera = &snapshot.cameras[0];
        assert_eq!(camera.quality, Some(1.0));
        assert_eq!(camera.visible_blue, 2);
        assert_eq!(camera.visible_yellow, 2);
        assert_eq!(camera.balls.len(), 1);
        // one track per robot, never split
        assert_eq!(camera.robots.len(), 4);
        assert!(snapshot.robot_losses.histogram.total() == 0);

        // four robots and the ball appeared once each
        let appeared = snapshot.log.iter().filter(|l| l.contains("appeared")).count();
        assert_eq!(appeared, 5);
    }

    /// 端到端测试：UDP -> VisionReceiver -> JsonFrameDecoder -> StatsAggregator
    #[tokio::test]
    async fn test_e2e_udp_receiver_reports_data_loss() {
        let receiver = VisionReceiver::new(
            VisionConfig {
                address: "127.0.0.1:0".to_string(),
                receive_timeout_ms: 5_000,
                max_datagram_size: 8192,
            },
            JsonFrameDecoder,
        );
        let socket = receiver.bind().await.unwrap();
        let target = socket.local_addr().unwrap();
        let (tx, rx) = async_channel::bounded(32);
        let _handle = receiver.spawn(socket, tx);

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        // ids 4 and 5 never arrive
        let ids = [1u32, 2, 3, 6, 7];
        for &id in &ids {
            let frame = robot_frame(id, 20.0 + f64::from(id) / 60.0);
            sender.send_to(&encode_json(&frame), target).await.unwrap();
        }

        let aggregator = StatsAggregator::new(&InspectorConfig::default());
        for _ in &ids {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("receiver stalled")
                .unwrap();
            let frame = event.frame().unwrap().clone();
            aggregator.ingest_at(Some(&frame), frame.t_sent + 0.001);
        }
        receiver.stop();

        assert_eq!(receiver.sources().list(), vec!["127.0.0.1"]);

        let records = aggregator.read(|state| state.data_loss().records().to_vec());
        assert_eq!(records.len(), 1);
        let record = records[0];
        assert_eq!(record.frames_skipped, 2);
        assert_eq!(record.object, LossObject::Robot(RobotId::new(2, TeamColor::Yellow)));
        assert!((record.time - (20.0 + 6.0 / 60.0)).abs() < 1e-9);

        let snapshot = aggregator.snapshot(10);
        assert_eq!(snapshot.robot_losses.histogram.total(), 1);
        // 5 of 7 ids inside the window
        let quality = snapshot.cameras[0].quality.unwrap();
        assert!((quality - 5.0 / 7.0).abs() < 1e-9);
    }

    /// 真实 socket 上的接收超时会清空引擎状态
    #[tokio::test]
    async fn test_e2e_silence_clears_state() {
        let receiver = VisionReceiver::new(
            VisionConfig {
                address: "127.0.0.1:0".to_string(),
                receive_timeout_ms: 50,
                max_datagram_size: 8192,
            },
            JsonFrameDecoder,
        );
        let socket = receiver.bind().await.unwrap();
        let target = socket.local_addr().unwrap();
        let (tx, rx) = async_channel::bounded(32);
        let _handle = receiver.spawn(socket, tx);

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        for id in 1..=3u32 {
            let frame = robot_frame(id, 40.0 + f64::from(id) / 60.0);
            sender.send_to(&encode_json(&frame), target).await.unwrap();
        }

        let aggregator = StatsAggregator::new(&InspectorConfig::default());
        let drive = async {
            loop {
                let event = rx.recv().await.unwrap();
                match &event {
                    VisionEvent::Frame(frame) => {
                        aggregator.ingest_at(Some(frame), frame.t_sent);
                    }
                    VisionEvent::Silence => {
                        aggregator.ingest(None);
                        break;
                    }
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), drive)
            .await
            .expect("no silence signalled");
        receiver.stop();

        let snapshot = aggregator.snapshot(10);
        assert_eq!(snapshot.source, SourceState::Silent);
        assert_eq!(snapshot.frames, 3);
        let camera = &snapshot.cameras[0];
        assert_eq!(camera.quality, None);
        assert_eq!(camera.visible_yellow, 0);
        assert!(camera.robots.is_empty());
        assert!(snapshot.log.last().unwrap().contains("vanished"));
    }

    /// 配置文件中的阈值作用于丢失报告
    #[test]
    fn test_config_file_drives_loss_report() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            "[data_loss.robot]\nreset_gap_s = 1.0\nreport_gap_s = 0.01\nmin_object_age_s = 0.0\n"
        )
        .unwrap();
        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(config.data_loss.thresholds(ObjectClass::Robot).report_gap_s, 0.01);

        let aggregator = StatsAggregator::new(&config);
        for id in [1u32, 2, 4] {
            let frame = robot_frame(id, 10.0 + f64::from(id) / 60.0);
            aggregator.ingest_at(Some(&frame), frame.t_sent);
        }

        let report = aggregator.snapshot(0).robot_losses;
        assert_eq!(report.summary.over_threshold, 1);
        assert_eq!(report.summary.mature, 1);
        assert_eq!(report.over_threshold[0].frames_skipped, 1);
    }

    /// Frames that reach the engine after a gap larger than the reset threshold start over
    #[test]
    fn test_long_gap_resets_sequence() {
        let aggregator = StatsAggregator::new(&InspectorConfig::default());
        aggregator.ingest_at(Some(&robot_frame(1, 10.0)), 10.0);
        aggregator.ingest_at(Some(&robot_frame(50, 15.0)), 15.0);
        let records = aggregator.read(|state| state.data_loss().records().len());
        assert_eq!(records, 0);
    }
}
