//! Pipeline orchestrator - coordinates receiver, quality engine, clocks and report.

use std::future::Future;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{ClockConfig, InspectorConfig, RenderConfig, VisionEvent};
use ingestion::{
    ClockWatcher, IngestionMetrics, JsonFrameDecoder, MockVisionConfig, MockVisionSource,
    MulticastSources, SntpProbe, VisionReceiver,
};
use observability::SessionSummary;
use quality_engine::{now_seconds, ClockBoard, StatsAggregator};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use super::RunStats;
use crate::report::{render, Report};

/// Options that do not belong to the configuration file
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Channel buffer size between the feed and the ingest loop
    pub buffer_size: usize,

    /// Stop after this long (None = until shutdown)
    pub duration: Option<Duration>,

    /// Generated feed instead of the network
    pub mock: Option<MockVisionConfig>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: InspectorConfig,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(config: InspectorConfig, options: PipelineOptions) -> Self {
        Self { config, options }
    }

    /// Run until `shutdown` resolves, the feed ends or the duration elapses
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<RunStats> {
        let start_time = Instant::now();

        if self.config.metrics.port != 0 {
            observability::init_metrics_only(self.config.metrics.port)?;
            info!("Metrics endpoint available on port {}", self.config.metrics.port);
        }

        let aggregator = Arc::new(StatsAggregator::new(&self.config));
        let clocks = Arc::new(ClockBoard::new(self.config.clock.window_s));
        let summary = Arc::new(Mutex::new(SessionSummary::new()));

        let (source_tx, source_rx) = async_channel::unbounded::<String>();
        let feed = self.start_feed(source_tx).await?;

        let clock_task = self
            .config
            .clock
            .enabled
            .then(|| spawn_clock_supervisor(self.config.clock.clone(), clocks.clone(), source_rx));

        let render_task = spawn_render_loop(
            self.config.render.clone(),
            aggregator.clone(),
            feed.sources.clone(),
            clocks.clone(),
        );

        info!(
            address = %self.config.vision.address,
            mock = self.options.mock.is_some(),
            "Inspector running"
        );

        tokio::select! {
            _ = ingest_loop(aggregator.clone(), feed.events.clone(), summary.clone()) => {
                info!("Vision feed ended");
            }
            _ = shutdown => {}
            _ = sleep_or_forever(self.options.duration) => {
                info!("Configured duration elapsed");
            }
        }

        info!("Shutting down inspector...");
        feed.stop();
        render_task.abort();
        if let Some(task) = clock_task {
            task.abort();
        }

        aggregator.sweep();
        let snapshot = aggregator.snapshot(self.config.render.log_tail);
        let sources = feed.sources.list();
        let report = Report {
            snapshot: &snapshot,
            sources: &sources,
            clocks: &clocks.snapshot(),
        };
        print!("{}", render(&report, false));

        let ingestion = feed.metrics.snapshot();
        let mut summary = summary
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        summary.decode_errors = ingestion.decode_errors + ingestion.truncated;

        let stats = RunStats {
            duration: start_time.elapsed(),
            summary,
            ingestion,
            sources: sources.len(),
            cameras: snapshot.cameras.len(),
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            frames = stats.summary.frames,
            "Inspector shutdown complete"
        );
        Ok(stats)
    }

    async fn start_feed(&self, source_tx: async_channel::Sender<String>) -> Result<Feed> {
        if let Some(mock) = &self.options.mock {
            info!(cameras = mock.cameras, "Running in MOCK mode (no network)");
            let metrics = Arc::new(IngestionMetrics::new());
            let source = MockVisionSource::new(mock.clone());
            let events = source.start(self.options.buffer_size, Some(metrics.clone()));
            return Ok(Feed {
                events,
                sources: Arc::new(MulticastSources::new()),
                metrics,
                stop: FeedStop::Mock(source),
            });
        }

        let receiver = VisionReceiver::new(self.config.vision.clone(), JsonFrameDecoder)
            .with_source_notifications(source_tx);
        let socket = receiver
            .bind()
            .await
            .with_context(|| format!("Failed to listen on {}", self.config.vision.address))?;

        let (tx, events) = async_channel::bounded(self.options.buffer_size);
        let handle = receiver.spawn(socket, tx);

        Ok(Feed {
            events,
            sources: receiver.sources(),
            metrics: receiver.metrics(),
            stop: FeedStop::Receiver(receiver, handle),
        })
    }
}

/// Event stream plus the means to stop it
struct Feed {
    events: async_channel::Receiver<VisionEvent>,
    sources: Arc<MulticastSources>,
    metrics: Arc<IngestionMetrics>,
    stop: FeedStop,
}

enum FeedStop {
    Mock(MockVisionSource),
    Receiver(
        VisionReceiver<JsonFrameDecoder>,
        JoinHandle<ingestion::Result<()>>,
    ),
}

impl Feed {
    fn stop(&self) {
        match &self.stop {
            FeedStop::Mock(source) => source.stop(),
            FeedStop::Receiver(receiver, handle) => {
                receiver.stop();
                handle.abort();
            }
        }
        self.events.close();
    }
}

/// Feed every event into the aggregator and the session totals
async fn ingest_loop(
    aggregator: Arc<StatsAggregator>,
    events: async_channel::Receiver<VisionEvent>,
    summary: Arc<Mutex<SessionSummary>>,
) {
    while let Ok(event) = events.recv().await {
        match event {
            VisionEvent::Frame(frame) => {
                let now = now_seconds();
                let outcome = aggregator.ingest_at(Some(&frame), now);

                let mut summary = summary.lock().unwrap_or_else(PoisonError::into_inner);
                summary.record_frame(frame.processing_latency(), frame.receiving_latency(now));
                if let Some(quality) = outcome.camera_quality {
                    summary.record_quality(quality);
                }
                summary.record_data_losses(outcome.data_losses as u64);
            }
            VisionEvent::Silence => {
                aggregator.ingest(None);
                summary
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .record_silence();
            }
        }
    }
}

/// Start one clock watcher per newly discovered source
///
/// Aborting the returned task drops the `JoinSet`, which aborts every watcher.
fn spawn_clock_supervisor(
    config: ClockConfig,
    board: Arc<ClockBoard>,
    new_sources: async_channel::Receiver<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let probe = Arc::new(SntpProbe::new(
            config.port,
            Duration::from_millis(config.timeout_ms),
        ));
        let mut watchers = JoinSet::new();

        while let Ok(host) = new_sources.recv().await {
            info!(host = %host, "Starting clock watcher");
            let watcher = ClockWatcher::new(host, probe.clone(), board.clone(), &config);
            watchers.spawn(watcher.run());
        }

        debug!("Source channel closed, clock supervisor done");
    })
}

/// Redraw the report every `render.interval_ms`
///
/// Each refresh first sweeps the aggregator, so cameras that stopped sending
/// while others continue age out of the report.
fn spawn_render_loop(
    config: RenderConfig,
    aggregator: Arc<StatsAggregator>,
    sources: Arc<MulticastSources>,
    clocks: Arc<ClockBoard>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(config.interval_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            let swept = aggregator.sweep();
            if swept > 0 {
                debug!(visibility_changes = swept, "Swept stale camera state");
            }
            let snapshot = aggregator.snapshot(config.log_tail);
            let sources = sources.list();
            let clocks = clocks.snapshot();
            let text = render(
                &Report {
                    snapshot: &snapshot,
                    sources: &sources,
                    clocks: &clocks,
                },
                config.clear_screen,
            );

            let mut stdout = std::io::stdout().lock();
            if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()) {
                warn!(error = %e, "Failed to write report");
            }
        }
    })
}

async fn sleep_or_forever(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}
