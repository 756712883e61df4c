//! Replication configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// High-availability replication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaConfig {
    /// Address the master's replication listener binds
    pub listen_addr: SocketAddr,

    /// How often an idle peer sends its offset heartbeat
    pub heartbeat_interval: Duration,

    /// Close the connection after this long without bytes from the master
    pub housekeeping_interval: Duration,

    /// Delay between slave reconnect attempts
    pub connect_retry_interval: Duration,

    /// Maximum body bytes per transfer frame
    pub max_transfer_size: usize,

    /// `is_slave_ok` fails once the best slave lags the master's write
    /// position by at least this many bytes
    pub slave_fallbehind_max: i64,

    /// Size of each of the slave's two reassembly buffers
    pub read_buffer_size: usize,
}

impl Default for HaConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:10912".parse().unwrap(),
            heartbeat_interval: Duration::from_secs(5),
            housekeeping_interval: Duration::from_secs(20),
            connect_retry_interval: Duration::from_secs(5),
            max_transfer_size: 32 * 1024,
            slave_fallbehind_max: 256 * 1024 * 1024,
            read_buffer_size: 4 * 1024 * 1024,
        }
    }
}

impl HaConfig {
    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    pub fn with_max_transfer_size(mut self, size: usize) -> Self {
        self.max_transfer_size = size;
        self
    }

    pub fn with_slave_fallbehind_max(mut self, bytes: i64) -> Self {
        self.slave_fallbehind_max = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HaConfig::default();
        assert_eq!(config.listen_addr.port(), 10912);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.housekeeping_interval, Duration::from_secs(20));
        assert_eq!(config.max_transfer_size, 32 * 1024);
        assert_eq!(config.slave_fallbehind_max, 256 * 1024 * 1024);
        assert_eq!(config.read_buffer_size, 4 * 1024 * 1024);
    }
}
