//! Relay configuration parsed from environment variables.
//!
//! Every setting has a default; unparseable values fall back to it.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_HEARTBEAT_TIMEOUT_SECS: u64 = 45;
pub const DEFAULT_SESSION_QUEUE_CAPACITY: usize = 256;

/// A new session's queue must hold both snapshot frames.
const MIN_SESSION_QUEUE_CAPACITY: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Cadence of server→client WebSocket pings.
    pub heartbeat_interval: Duration,
    /// A session silent for longer than this is evicted.
    pub heartbeat_timeout: Duration,
    /// Bounded outbound queue per session; overflow drops frames for that
    /// session only.
    pub session_queue_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
            heartbeat_timeout: Duration::from_secs(DEFAULT_HEARTBEAT_TIMEOUT_SECS),
            session_queue_capacity: DEFAULT_SESSION_QUEUE_CAPACITY,
        }
    }
}

impl RelayConfig {
    /// Build typed relay config from environment variables.
    ///
    /// Optional:
    /// - `BIND_ADDR`: default `0.0.0.0`
    /// - `PORT`: default 3000
    /// - `HEARTBEAT_INTERVAL_SECS`: default 15
    /// - `HEARTBEAT_TIMEOUT_SECS`: default 45, never below the interval
    /// - `SESSION_QUEUE_CAPACITY`: default 256, at least 2
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let interval_secs = parse_or(&lookup, "HEARTBEAT_INTERVAL_SECS", DEFAULT_HEARTBEAT_INTERVAL_SECS).max(1);
        let timeout_secs = parse_or(&lookup, "HEARTBEAT_TIMEOUT_SECS", DEFAULT_HEARTBEAT_TIMEOUT_SECS).max(interval_secs);

        Self {
            bind_addr: parse_or(&lookup, "BIND_ADDR", defaults.bind_addr),
            port: parse_or(&lookup, "PORT", defaults.port),
            heartbeat_interval: Duration::from_secs(interval_secs),
            heartbeat_timeout: Duration::from_secs(timeout_secs),
            session_queue_capacity: parse_or(&lookup, "SESSION_QUEUE_CAPACITY", DEFAULT_SESSION_QUEUE_CAPACITY)
                .max(MIN_SESSION_QUEUE_CAPACITY),
        }
    }

    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
