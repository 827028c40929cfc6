//! Minimal SNTPv4 client used to measure the clock offset of vision hosts

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use contracts::{ClockProbe, ClockSample, ContractError};
use tokio::net::UdpSocket;

/// Seconds between 1900-01-01 (NTP era 0) and 1970-01-01
const NTP_UNIX_OFFSET: f64 = 2_208_988_800.0;

const PACKET_LEN: usize = 48;

/// LI = 0, VN = 4, Mode = 3 (client)
const CLIENT_HEADER: u8 = 0b00_100_011;

const MODE_SERVER: u8 = 4;

/// Offset and RTT probe speaking SNTP
#[derive(Debug, Clone)]
pub struct SntpProbe {
    port: u16,
    timeout: Duration,
}

impl SntpProbe {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }

    async fn exchange(&self, host: &str) -> Result<ClockSample, String> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| e.to_string())?;
        socket
            .connect((host, self.port))
            .await
            .map_err(|e| e.to_string())?;

        let mut request = [0u8; PACKET_LEN];
        request[0] = CLIENT_HEADER;
        let t1 = unix_now();
        let origin = to_ntp(t1);
        request[40..48].copy_from_slice(&origin);
        socket.send(&request).await.map_err(|e| e.to_string())?;

        let mut response = [0u8; PACKET_LEN];
        let len = tokio::time::timeout(self.timeout, socket.recv(&mut response))
            .await
            .map_err(|_| "timed out".to_string())?
            .map_err(|e| e.to_string())?;
        let t4 = unix_now();

        if len < PACKET_LEN {
            return Err(format!("short response of {len} bytes"));
        }
        if response[0] & 0b111 != MODE_SERVER {
            return Err("response is not in server mode".to_string());
        }
        if response[1] == 0 {
            return Err("kiss-o'-death response".to_string());
        }
        if response[24..32] != origin {
            return Err("response does not answer our request".to_string());
        }

        let t2 = from_ntp(&response[32..40]);
        let t3 = from_ntp(&response[40..48]);
        Ok(compute_sample(t1, t2, t3, t4))
    }
}

impl ClockProbe for SntpProbe {
    async fn sample(&self, host: &str) -> Result<ClockSample, ContractError> {
        self.exchange(host)
            .await
            .map_err(|message| ContractError::clock_probe(host, message))
    }
}

/// Offset and RTT from the four timestamps of one exchange
///
/// `t1` request sent (local), `t2` request received (server),
/// `t3` response sent (server), `t4` response received (local).
pub fn compute_sample(t1: f64, t2: f64, t3: f64, t4: f64) -> ClockSample {
    ClockSample {
        offset: ((t2 - t1) + (t3 - t4)) / 2.0,
        rtt: (t4 - t1) - (t3 - t2),
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

fn to_ntp(unix: f64) -> [u8; 8] {
    let ntp = unix + NTP_UNIX_OFFSET;
    let seconds = ntp.trunc() as u32;
    let fraction = (ntp.fract() * 4_294_967_296.0) as u32;
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&seconds.to_be_bytes());
    out[4..].copy_from_slice(&fraction.to_be_bytes());
    out
}

fn from_ntp(bytes: &[u8]) -> f64 {
    let seconds = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let fraction = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    f64::from(seconds) + f64::from(fraction) / 4_294_967_296.0 - NTP_UNIX_OFFSET
}
