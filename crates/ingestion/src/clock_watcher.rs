//! Periodic clock sampling of one vision host

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use contracts::{ClockConfig, ClockProbe};
use quality_engine::{ClockBoard, now_seconds};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

/// Samples one host forever and feeds its entry on the [`ClockBoard`]
pub struct ClockWatcher<P> {
    host: String,
    probe: Arc<P>,
    board: Arc<ClockBoard>,
    sample_interval: Duration,
    retry_delay: Duration,
    running: Arc<AtomicBool>,
}

impl<P: ClockProbe + Sync + 'static> ClockWatcher<P> {
    /// Registers `host` on the board
    pub fn new(
        host: impl Into<String>,
        probe: Arc<P>,
        board: Arc<ClockBoard>,
        config: &ClockConfig,
    ) -> Self {
        let host = host.into();
        board.register(&host);
        Self {
            host,
            probe,
            board,
            sample_interval: Duration::from_millis(config.sample_interval_ms),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Handle that stops the loop when set to `false`
    pub fn running(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Sample until the running flag is cleared
    #[instrument(name = "clock_watcher", skip_all, fields(host = %self.host))]
    pub async fn run(self) {
        self.running.store(true, Ordering::SeqCst);
        debug!("clock watcher started");
        let mut online = false;

        while self.running.load(Ordering::Relaxed) {
            match self.probe.sample(&self.host).await {
                Ok(sample) => {
                    if !online {
                        debug!(offset = sample.offset, rtt = sample.rtt, "clock online");
                    }
                    online = true;
                    self.board.record(&self.host, sample, now_seconds());
                    observability::record_clock_sample(&self.host, &sample);
                    tokio::time::sleep(self.sample_interval).await;
                }
                Err(e) => {
                    if online {
                        warn!(error = %e, "clock went offline");
                    }
                    online = false;
                    self.board.mark_offline(&self.host);
                    observability::record_clock_offline(&self.host);
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }

        debug!("clock watcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ClockSample, ContractError};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted answers, then fails forever
    struct ScriptedProbe {
        answers: Mutex<VecDeque<Option<ClockSample>>>,
    }

    impl ClockProbe for ScriptedProbe {
        async fn sample(&self, host: &str) -> Result<ClockSample, ContractError> {
            let next = self.answers.lock().unwrap().pop_front().flatten();
            next.ok_or_else(|| ContractError::clock_probe(host, "no answer"))
        }
    }

    fn fast_config() -> ClockConfig {
        ClockConfig {
            sample_interval_ms: 1,
            retry_delay_ms: 1,
            ..ClockConfig::default()
        }
    }

    async fn wait_for(board: &ClockBoard, pred: impl Fn(&ClockBoard) -> bool) {
        for _ in 0..200 {
            if pred(board) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_samples_then_offline() {
        let probe = Arc::new(ScriptedProbe {
            answers: Mutex::new(VecDeque::from([
                Some(ClockSample { offset: 0.25, rtt: 0.001 }),
                Some(ClockSample { offset: 0.26, rtt: 0.002 }),
            ])),
        });
        let board = Arc::new(ClockBoard::new(60.0));
        let watcher = ClockWatcher::new("10.0.0.9", probe.clone(), board.clone(), &fast_config());
        assert_eq!(watcher.host(), "10.0.0.9");
        assert_eq!(board.len(), 1);

        let running = watcher.running();
        let handle = watcher.spawn();

        // the script runs out, so the host ends offline with cleared windows
        wait_for(&board, |b| {
            let snapshot = b.snapshot();
            let clock = &snapshot[0];
            probe.answers.lock().unwrap().is_empty() && !clock.online && clock.offset.is_none()
        })
        .await;

        running.store(false, Ordering::SeqCst);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_online_after_success() {
        let probe = Arc::new(ScriptedProbe {
            answers: Mutex::new(
                std::iter::repeat_n(Some(ClockSample { offset: -0.1, rtt: 0.003 }), 1000)
                    .collect(),
            ),
        });
        let board = Arc::new(ClockBoard::new(60.0));
        let watcher = ClockWatcher::new("10.0.0.4", probe, board.clone(), &fast_config());
        let running = watcher.running();
        let handle = watcher.spawn();

        wait_for(&board, |b| {
            b.snapshot()[0].offset.is_some_and(|s| s.count >= 2)
        })
        .await;
        let snapshot = board.snapshot();
        let clock = &snapshot[0];
        assert!(clock.online);
        assert!((clock.offset.unwrap().avg + 0.1).abs() < 1e-9);

        running.store(false, Ordering::SeqCst);
        handle.await.unwrap();
    }
}
