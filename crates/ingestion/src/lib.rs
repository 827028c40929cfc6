//! # Ingestion
//!
//! Adapters between the network and the quality engine.
//!
//! Responsibilities:
//! - Receive vision datagrams on the multicast group (`VisionReceiver`)
//! - Decode them into `DetectionFrame`s behind the `FrameDecoder` trait
//! - Signal silence when nothing arrives within the receive timeout
//! - Discover sending hosts (`MulticastSources`)
//! - Sample the clocks of those hosts over SNTP (`SntpProbe`, `ClockWatcher`)
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{JsonFrameDecoder, VisionReceiver};
//!
//! let receiver = VisionReceiver::new(config.vision.clone(), JsonFrameDecoder);
//! let socket = receiver.bind().await?;
//! let (tx, rx) = async_channel::bounded(256);
//! receiver.spawn(socket, tx);
//! while let Ok(event) = rx.recv().await {
//!     aggregator.ingest(event.frame());
//! }
//! ```
//!
//! ## Mock Testing
//!
//! ```ignore
//! use ingestion::{MockVisionConfig, MockVisionSource};
//!
//! let source = MockVisionSource::new(MockVisionConfig::default());
//! let rx = source.start(100, None);
//! ```

mod clock_watcher;
mod config;
mod decoder;
mod error;
mod mock;
mod receiver;
mod sntp;
mod sources;

pub use clock_watcher::ClockWatcher;
pub use config::{IngestionMetrics, MetricsSnapshot};
pub use decoder::{encode_json, FrameDecoder, JsonFrameDecoder};
pub use error::{IngestionError, Result};
pub use mock::{MockVisionConfig, MockVisionSource};
pub use receiver::VisionReceiver;
pub use sntp::{compute_sample, SntpProbe};
pub use sources::MulticastSources;
