//! Inspector 指标收集模块
//!
//! 基于 `metrics` facade 的辅助函数，以及关闭时输出的内存会话摘要。

use contracts::{ClockSample, ObjectClass};
use metrics::{counter, gauge, histogram};

/// 记录一帧进入质量引擎
pub fn record_frame_ingested(camera_id: u32) {
    counter!(
        "ssl_inspector_frames_ingested_total",
        "camera_id" => camera_id.to_string()
    )
    .increment(1);
}

/// 每帧摄入后发布的相机窗口统计
///
/// 相机帧窗口为空时 `quality` 为 `None`。
pub fn record_camera_stats(
    camera_id: u32,
    quality: Option<f64>,
    fps: f64,
    processing_latency_s: f64,
    receiving_latency_s: f64,
) {
    let camera = camera_id.to_string();

    if let Some(quality) = quality {
        gauge!("ssl_inspector_camera_quality", "camera_id" => camera.clone()).set(quality);
    }
    gauge!("ssl_inspector_camera_fps", "camera_id" => camera.clone()).set(fps);

    histogram!(
        "ssl_inspector_processing_latency_ms",
        "camera_id" => camera.clone()
    )
    .record(processing_latency_s * 1000.0);
    histogram!(
        "ssl_inspector_receiving_latency_ms",
        "camera_id" => camera
    )
    .record(receiving_latency_s * 1000.0);
}

/// Camera frame number lower than the previous one from that camera
pub fn record_frame_regression(camera_id: u32) {
    counter!(
        "ssl_inspector_camera_frame_regressions_total",
        "camera_id" => camera_id.to_string()
    )
    .increment(1);
}

/// 记录目标帧序列中的一次丢失
pub fn record_data_loss(class: ObjectClass, frames_skipped: u32, gap_s: f64) {
    let class = class.to_string();
    counter!("ssl_inspector_data_loss_total", "class" => class.clone()).increment(1);
    counter!("ssl_inspector_frames_skipped_total", "class" => class.clone())
        .increment(u64::from(frames_skipped));
    histogram!("ssl_inspector_data_loss_gap_ms", "class" => class).record(gap_s * 1000.0);
}

/// Frame id at or below the previous one for the same object
pub fn record_sequence_regression(camera_id: u32) {
    counter!(
        "ssl_inspector_sequence_regressions_total",
        "camera_id" => camera_id.to_string()
    )
    .increment(1);
}

/// Track visibility transition
pub fn record_visibility_change(class: ObjectClass, visible: bool) {
    let transition = if visible { "appeared" } else { "vanished" };
    counter!(
        "ssl_inspector_visibility_changes_total",
        "class" => class.to_string(),
        "transition" => transition
    )
    .increment(1);
}

/// 接收超时，未收到任何数据报
pub fn record_silence() {
    counter!("ssl_inspector_silence_total").increment(1);
}

/// 记录无法解码的数据报
pub fn record_decode_error(reason: &'static str) {
    counter!("ssl_inspector_decode_errors_total", "reason" => reason).increment(1);
}

/// Successful reference clock sample
pub fn record_clock_sample(host: &str, sample: &ClockSample) {
    gauge!("ssl_inspector_clock_offset_ms", "host" => host.to_string())
        .set(sample.offset * 1000.0);
    gauge!("ssl_inspector_clock_rtt_ms", "host" => host.to_string()).set(sample.rtt * 1000.0);
    gauge!("ssl_inspector_clock_online", "host" => host.to_string()).set(1.0);
}

/// Failed reference clock sample
pub fn record_clock_offline(host: &str) {
    gauge!("ssl_inspector_clock_online", "host" => host.to_string()).set(0.0);
    counter!("ssl_inspector_clock_failures_total", "host" => host.to_string()).increment(1);
}

/// 会话指标聚合器
///
/// 由摄入循环更新，会话结束时输出一次摘要。
#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    /// 总帧数
    pub frames: u64,

    /// 接收超时次数
    pub silences: u64,

    /// 解码失败丢弃的数据报
    pub decode_errors: u64,

    /// 数据丢失记录总数
    pub data_losses: u64,

    /// 处理延迟 (毫秒)
    pub processing_latency_ms: RunningStats,

    /// 接收延迟 (毫秒)
    pub receiving_latency_ms: RunningStats,

    /// Camera frame quality sampled at each frame
    pub camera_quality: RunningStats,
}

impl SessionSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account one ingested frame
    pub fn record_frame(&mut self, processing_latency_s: f64, receiving_latency_s: f64) {
        self.frames += 1;
        self.processing_latency_ms.push(processing_latency_s * 1000.0);
        self.receiving_latency_ms.push(receiving_latency_s * 1000.0);
    }

    pub fn record_quality(&mut self, quality: f64) {
        self.camera_quality.push(quality);
    }

    pub fn record_silence(&mut self) {
        self.silences += 1;
    }

    pub fn record_decode_error(&mut self) {
        self.decode_errors += 1;
    }

    pub fn record_data_losses(&mut self, count: u64) {
        self.data_losses += count;
    }

    /// Percentage of received datagrams that failed to decode
    pub fn decode_error_rate(&self) -> f64 {
        let received = self.frames + self.decode_errors;
        if received == 0 {
            0.0
        } else {
            self.decode_errors as f64 / received as f64 * 100.0
        }
    }
}

impl std::fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Session Summary ===")?;
        writeln!(f, "Frames ingested: {}", self.frames)?;
        writeln!(
            f,
            "Decode errors: {} ({:.2}%)",
            self.decode_errors,
            self.decode_error_rate()
        )?;
        writeln!(f, "Silence periods: {}", self.silences)?;
        writeln!(f, "Data losses: {}", self.data_losses)?;
        writeln!(
            f,
            "Processing latency (ms): {}",
            StatsSummary::from(&self.processing_latency_ms)
        )?;
        writeln!(
            f,
            "Receiving latency (ms): {}",
            StatsSummary::from(&self.receiving_latency_ms)
        )?;
        writeln!(
            f,
            "Camera quality: {}",
            StatsSummary::from(&self.camera_quality)
        )?;
        Ok(())
    }
}

/// Snapshot of a `RunningStats`
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线均值 / 方差 (Welford 算法)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        stats.push(1.0);
        stats.push(2.0);
        stats.push(3.0);
        stats.push(4.0);
        stats.push(5.0);

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_session_summary_update() {
        let mut summary = SessionSummary::new();

        summary.record_frame(0.004, 0.001);
        summary.record_frame(0.006, 0.003);
        summary.record_decode_error();
        summary.record_silence();
        summary.record_data_losses(3);

        assert_eq!(summary.frames, 2);
        assert_eq!(summary.silences, 1);
        assert_eq!(summary.data_losses, 3);
        assert!((summary.processing_latency_ms.mean() - 5.0).abs() < 1e-9);
        assert!((summary.decode_error_rate() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_display() {
        let mut summary = SessionSummary::new();
        summary.record_frame(0.010, 0.002);
        summary.record_quality(0.98);

        let output = format!("{}", summary);
        assert!(output.contains("Frames ingested: 1"));
        assert!(output.contains("Decode errors: 0 (0.00%)"));
        assert!(output.contains("mean=10.000"));
    }

    #[test]
    fn test_empty_stats_display() {
        let summary = StatsSummary::from(&RunningStats::default());
        assert_eq!(summary.to_string(), "N/A");
    }
}
