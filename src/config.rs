//! Sync engine configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_DEBOUNCE_MS: u64 = 800;
pub const DEFAULT_RESIZE_GUARD_MS: u64 = 200;
pub const DEFAULT_DUPLICATE_OFFSET: f64 = 20.0;
pub const DEFAULT_NOTICE_CAPACITY: usize = 64;

/// Tuning knobs for a room session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncConfig {
    /// Idle window after the last field edit before the note is written remotely.
    pub debounce: Duration,
    /// How long after a gesture release remote pushes may not touch geometry.
    pub resize_guard: Duration,
    /// Offset applied on both axes when duplicating a note.
    pub duplicate_offset: f64,
    /// Capacity of the bounded notice channel.
    pub notice_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            resize_guard: Duration::from_millis(DEFAULT_RESIZE_GUARD_MS),
            duplicate_offset: DEFAULT_DUPLICATE_OFFSET,
            notice_capacity: DEFAULT_NOTICE_CAPACITY,
        }
    }
}

impl SyncConfig {
    /// Build config from environment variables, falling back to defaults.
    ///
    /// - `NOTEROOM_DEBOUNCE_MS`: default 800
    /// - `NOTEROOM_RESIZE_GUARD_MS`: default 200
    /// - `NOTEROOM_DUPLICATE_OFFSET`: default 20.0
    /// - `NOTEROOM_NOTICE_CAPACITY`: default 64
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            debounce: Duration::from_millis(env_parse("NOTEROOM_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)),
            resize_guard: Duration::from_millis(env_parse("NOTEROOM_RESIZE_GUARD_MS", DEFAULT_RESIZE_GUARD_MS)),
            duplicate_offset: env_parse_finite("NOTEROOM_DUPLICATE_OFFSET", DEFAULT_DUPLICATE_OFFSET),
            notice_capacity: env_parse("NOTEROOM_NOTICE_CAPACITY", DEFAULT_NOTICE_CAPACITY).max(1),
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key).map_or(default, |v| v.parse::<T>().unwrap_or(default))
}

/// Like `env_parse`, but `NaN` and infinities also fall back to `default`.
pub(crate) fn env_parse_finite(key: &str, default: f64) -> f64 {
    let value = env_parse(key, default);
    if value.is_finite() { value } else { default }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
