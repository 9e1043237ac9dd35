//! Game configuration.
//!
//! Every field has a default, so a partial file (or none at all) yields a
//! playable configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::improv::RoundTimes;

/// Upper bound for every configured duration, in seconds. Larger values are
/// clamped so deadlines stay representable.
pub const MAX_DURATION_SECONDS: u64 = 24 * 60 * 60;

fn clamped_secs(seconds: u64) -> Duration {
    Duration::from_secs(seconds.min(MAX_DURATION_SECONDS))
}

/// Top-level configuration, one table per concern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Player count limits
    pub limits: LimitsConfig,
    /// Round timing
    pub times: TimesConfig,
    /// Per-connection settings
    pub connection: ConnectionConfig,
    /// Session code settings
    pub lobby: LobbyConfig,
}

/// Player count limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Participants needed before the host may start
    pub minimum_number_of_players: usize,
    /// Whether the minimum is checked at all
    pub enforce_minimum_players: bool,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { minimum_number_of_players: 3, enforce_minimum_players: false }
    }
}

/// Round timing, in whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimesConfig {
    /// Length of one presentation
    pub improv_round_duration_seconds: u64,
    /// Time on the clock after an interruption
    pub interception_time_added_seconds: u64,
    /// Pause between presentations
    pub intermission_duration_seconds: u64,
}

impl Default for TimesConfig {
    fn default() -> Self {
        Self {
            improv_round_duration_seconds: 30,
            interception_time_added_seconds: 30,
            intermission_duration_seconds: 10,
        }
    }
}

impl TimesConfig {
    /// Durations for the presentation timer, clamped to
    /// [`MAX_DURATION_SECONDS`].
    pub fn round_times(&self) -> RoundTimes {
        RoundTimes {
            round_duration: clamped_secs(self.improv_round_duration_seconds),
            interception_bonus: clamped_secs(self.interception_time_added_seconds),
            intermission: clamped_secs(self.intermission_duration_seconds),
        }
    }
}

/// Per-connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Interval between keep-alive pings
    pub heartbeat_interval_seconds: u64,
    /// Frames buffered per connection before it is dropped
    pub outbound_queue_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { heartbeat_interval_seconds: 45, outbound_queue_capacity: 256 }
    }
}

impl ConnectionConfig {
    /// Keep-alive interval, clamped to [`MAX_DURATION_SECONDS`].
    pub fn heartbeat_interval(&self) -> Duration {
        clamped_secs(self.heartbeat_interval_seconds)
    }
}

/// Session code settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// Fixed session code. A random four digit code is used when unset.
    pub code: Option<String>,
}

impl GameConfig {
    /// Participants required to start, if the minimum is enforced.
    pub fn required_players(&self) -> Option<usize> {
        self.limits.enforce_minimum_players.then_some(self.limits.minimum_number_of_players)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = GameConfig::default();
        let times = config.times.round_times();

        assert_eq!(times.round_duration, Duration::from_secs(30));
        assert_eq!(times.interception_bonus, Duration::from_secs(30));
        assert_eq!(times.intermission, Duration::from_secs(10));
        assert_eq!(config.connection.heartbeat_interval(), Duration::from_secs(45));
        assert_eq!(config.required_players(), None);
    }

    #[test]
    fn enforced_minimum() {
        let mut config = GameConfig::default();
        config.limits.enforce_minimum_players = true;

        assert_eq!(config.required_players(), Some(3));
    }

    #[test]
    fn oversized_durations_are_clamped() {
        let mut config = GameConfig::default();
        config.times.improv_round_duration_seconds = u64::MAX;
        config.times.interception_time_added_seconds = MAX_DURATION_SECONDS + 1;
        config.times.intermission_duration_seconds = 5;
        config.connection.heartbeat_interval_seconds = u64::MAX;

        let limit = Duration::from_secs(MAX_DURATION_SECONDS);
        let times = config.times.round_times();
        assert_eq!(times.round_duration, limit);
        assert_eq!(times.interception_bonus, limit);
        assert_eq!(times.intermission, Duration::from_secs(5));
        assert_eq!(config.connection.heartbeat_interval(), limit);
    }
}
