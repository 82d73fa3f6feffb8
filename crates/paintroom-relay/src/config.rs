//! Relay configuration, read from the environment.

use std::net::SocketAddr;
use tracing::warn;

pub const ADDR_VAR: &str = "PAINTROOM_RELAY_ADDR";
pub const ROOM_HISTORY_VAR: &str = "PAINTROOM_ROOM_HISTORY";

/// Operations kept per room for late joiners.
pub const DEFAULT_ROOM_HISTORY: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address the server binds to
    pub addr: SocketAddr,
    /// Recent operations replayed to joiners, per room
    pub room_history: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3030)),
            room_history: DEFAULT_ROOM_HISTORY,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparsable values fall back
    /// to the default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            addr: parse_var(&lookup, ADDR_VAR).unwrap_or(defaults.addr),
            room_history: parse_var(&lookup, ROOM_HISTORY_VAR).unwrap_or(defaults.room_history),
        }
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring {}={:?}: {}", key, raw, e);
            None
        }
    }
}
