//! UDP multicast receiver for the vision feed

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use contracts::{VisionConfig, VisionEvent};
use metrics::counter;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::IngestionMetrics;
use crate::decoder::FrameDecoder;
use crate::error::{IngestionError, Result};
use crate::sources::MulticastSources;

/// Pause after a failed socket read
const READ_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Receives datagrams, decodes them and forwards [`VisionEvent`]s
///
/// A receive timeout is forwarded as [`VisionEvent::Silence`]. Every sender
/// address is recorded in the shared [`MulticastSources`]; newly seen ones are
/// additionally announced on the optional source channel.
pub struct VisionReceiver<D> {
    config: VisionConfig,
    decoder: Arc<D>,
    sources: Arc<MulticastSources>,
    metrics: Arc<IngestionMetrics>,
    new_sources: Option<async_channel::Sender<String>>,
    running: Arc<AtomicBool>,
}

impl<D: FrameDecoder + 'static> VisionReceiver<D> {
    pub fn new(config: VisionConfig, decoder: D) -> Self {
        Self {
            config,
            decoder: Arc::new(decoder),
            sources: Arc::new(MulticastSources::new()),
            metrics: Arc::new(IngestionMetrics::new()),
            new_sources: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Announce every newly discovered sender on `tx`
    pub fn with_source_notifications(mut self, tx: async_channel::Sender<String>) -> Self {
        self.new_sources = Some(tx);
        self
    }

    pub fn sources(&self) -> Arc<MulticastSources> {
        self.sources.clone()
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Bind the configured address, joining the group if it is multicast
    ///
    /// # Errors
    /// Fails when the address is not `ipv4:port`, the port cannot be bound or
    /// the group cannot be joined.
    pub async fn bind(&self) -> Result<UdpSocket> {
        let address: SocketAddrV4 =
            self.config
                .address
                .parse()
                .map_err(|e: std::net::AddrParseError| IngestionError::InvalidAddress {
                    address: self.config.address.clone(),
                    message: e.to_string(),
                })?;

        let group = *address.ip();
        let bind_ip = if group.is_multicast() {
            Ipv4Addr::UNSPECIFIED
        } else {
            group
        };
        let bind_addr = SocketAddrV4::new(bind_ip, address.port());

        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|source| IngestionError::Bind {
                address: bind_addr.to_string(),
                source,
            })?;

        if group.is_multicast() {
            socket
                .join_multicast_v4(group, Ipv4Addr::UNSPECIFIED)
                .map_err(|source| IngestionError::JoinMulticast {
                    group: group.to_string(),
                    source,
                })?;
            info!(%group, port = address.port(), "joined multicast group");
        } else {
            info!(address = %bind_addr, "listening for unicast vision datagrams");
        }

        Ok(socket)
    }

    /// Spawn the receive loop on `socket`; events go to `tx`
    pub fn spawn(
        &self,
        socket: UdpSocket,
        tx: async_channel::Sender<VisionEvent>,
    ) -> JoinHandle<Result<()>> {
        let task = ReceiveLoop {
            max_datagram_size: self.config.max_datagram_size,
            timeout: self.config.receive_timeout(),
            decoder: self.decoder.clone(),
            sources: self.sources.clone(),
            metrics: self.metrics.clone(),
            new_sources: self.new_sources.clone(),
            running: self.running.clone(),
        };
        self.running.store(true, Ordering::SeqCst);
        tokio::spawn(task.run(socket, tx))
    }

    /// Stop after the current receive completes or times out
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

struct ReceiveLoop<D> {
    max_datagram_size: usize,
    timeout: Duration,
    decoder: Arc<D>,
    sources: Arc<MulticastSources>,
    metrics: Arc<IngestionMetrics>,
    new_sources: Option<async_channel::Sender<String>>,
    running: Arc<AtomicBool>,
}

impl<D: FrameDecoder> ReceiveLoop<D> {
    #[instrument(name = "vision_receiver", skip_all, fields(timeout_ms = self.timeout.as_millis() as u64))]
    async fn run(self, socket: UdpSocket, tx: async_channel::Sender<VisionEvent>) -> Result<()> {
        let mut buf = vec![0u8; self.max_datagram_size];
        debug!("vision receiver started");

        while self.running.load(Ordering::Relaxed) {
            let event = match tokio::time::timeout(self.timeout, socket.recv_from(&mut buf)).await
            {
                Err(_) => {
                    self.metrics.record_silence();
                    trace!("receive timeout");
                    VisionEvent::Silence
                }
                Ok(Err(e)) => {
                    warn!(error = %IngestionError::Receive(e), "could not read from vision socket");
                    tokio::time::sleep(READ_ERROR_BACKOFF).await;
                    continue;
                }
                Ok(Ok((len, sender))) => match self.handle_datagram(&buf[..len], sender) {
                    Some(event) => event,
                    None => continue,
                },
            };

            if tx.send(event).await.is_err() {
                debug!("vision event channel closed");
                break;
            }
        }

        self.running.store(false, Ordering::SeqCst);
        debug!("vision receiver stopped");
        Ok(())
    }

    fn handle_datagram(&self, datagram: &[u8], sender: SocketAddr) -> Option<VisionEvent> {
        self.metrics.record_received();
        counter!("ssl_inspector_datagrams_total").increment(1);

        let ip = sender.ip().to_string();
        if self.sources.add(&ip) {
            if let Some(tx) = &self.new_sources {
                // a full channel loses the notification, the source stays listed
                let _ = tx.try_send(ip);
            }
        }

        if datagram.len() >= self.max_datagram_size {
            self.metrics.record_truncated();
            observability::record_decode_error("truncated");
            warn!(
                %sender,
                size = datagram.len(),
                "datagram fills the receive buffer, dropping it"
            );
            return None;
        }

        match self.decoder.decode(datagram) {
            Ok(Some(frame)) => {
                self.metrics.record_forwarded();
                trace!(
                    camera_id = frame.camera_id,
                    frame_number = frame.frame_number,
                    "frame decoded"
                );
                Some(VisionEvent::Frame(frame))
            }
            Ok(None) => None,
            Err(e) => {
                self.metrics.record_decode_error();
                observability::record_decode_error("malformed");
                let err = IngestionError::Decode {
                    sender: sender.to_string(),
                    message: e.to_string(),
                };
                debug!(error = %err, "dropping datagram");
                None
            }
        }
    }
}
