//! Run statistics printed at shutdown.

use std::time::Duration;

use ingestion::MetricsSnapshot;
use observability::SessionSummary;

/// Statistics from an inspector run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Run-long totals from the ingest loop
    pub summary: SessionSummary,

    /// Receiver counters
    pub ingestion: MetricsSnapshot,

    /// Distinct vision hosts seen
    pub sources: usize,

    /// Cameras that delivered at least one frame
    pub cameras: usize,
}

impl RunStats {
    /// Frames ingested per second of run time
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.summary.frames as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                      Inspector Statistics                    ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Datagrams received: {}", self.ingestion.datagrams_received);
        println!("   ├─ Truncated datagrams: {}", self.ingestion.truncated);
        println!("   ├─ Frame rate: {:.2} fps", self.fps());
        println!("   ├─ Vision sources: {}", self.sources);
        println!("   └─ Cameras: {}", self.cameras);
        println!();
        print!("{}", self.summary);
        println!();
    }
}
