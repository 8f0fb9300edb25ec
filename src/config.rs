use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Smallest group that can vote (somebody has to be voted for)
pub const MIN_CAPACITY: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}")]
    InvalidValue { name: String, value: String },
}

/// Tunables for matchmaking and voting
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Group size; a room is formed as soon as the pool holds this many players
    pub capacity: usize,
    pub voting_seconds: u64,
    pub reward_per_vote: u32,
    /// Fill a waiting pool with bots this many seconds after its first join (None = never)
    pub bot_fill_seconds: Option<u64>,
    /// Refuse joins while a room spawned from the pool is still voting
    pub exclusive_rounds: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: 4,
            voting_seconds: 30,
            reward_per_vote: 25,
            bot_fill_seconds: None,
            exclusive_rounds: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let capacity = env_or("CATVOTE_ROOM_CAPACITY", defaults.capacity);
        let capacity = if capacity < MIN_CAPACITY {
            tracing::warn!(
                "CATVOTE_ROOM_CAPACITY={} is below {}, using {}",
                capacity,
                MIN_CAPACITY,
                MIN_CAPACITY
            );
            MIN_CAPACITY
        } else {
            capacity
        };

        Self {
            capacity,
            voting_seconds: env_or("CATVOTE_VOTING_SECONDS", defaults.voting_seconds),
            reward_per_vote: env_or("CATVOTE_REWARD_PER_VOTE", defaults.reward_per_vote),
            bot_fill_seconds: parse_env("CATVOTE_BOT_FILL_SECONDS").unwrap_or_else(|e| {
                tracing::warn!("{}, bot fill disabled", e);
                None
            }),
            exclusive_rounds: env_flag("CATVOTE_EXCLUSIVE_ROUNDS", defaults.exclusive_rounds),
        }
    }

    pub fn voting_window(&self) -> Duration {
        Duration::from_secs(self.voting_seconds)
    }

    pub fn bot_fill_delay(&self) -> Option<Duration> {
        self.bot_fill_seconds.map(Duration::from_secs)
    }
}

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 6574)),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            bind: env_or("CATVOTE_BIND", Self::default().bind),
        }
    }
}

/// Read and parse an optional variable. Unset or blank is `Ok(None)`.
pub(crate) fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    let Some(raw) = std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
    else {
        return Ok(None);
    };

    raw.parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw,
        })
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match parse_env(name) {
        Ok(Some(v)) => v,
        Ok(None) => default,
        Err(e) => {
            tracing::warn!("{}, using default", e);
            default
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| {
            let v = v.trim().to_lowercase();
            v != "0" && v != "false" && !v.is_empty()
        })
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for name in [
            "CATVOTE_ROOM_CAPACITY",
            "CATVOTE_VOTING_SECONDS",
            "CATVOTE_REWARD_PER_VOTE",
            "CATVOTE_BOT_FILL_SECONDS",
            "CATVOTE_EXCLUSIVE_ROUNDS",
            "CATVOTE_BIND",
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.capacity, 4);
        assert_eq!(config.voting_window(), Duration::from_secs(30));
        assert_eq!(config.reward_per_vote, 25);
        assert!(config.bot_fill_delay().is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("CATVOTE_ROOM_CAPACITY", "3");
        std::env::set_var("CATVOTE_VOTING_SECONDS", " 10 ");
        std::env::set_var("CATVOTE_BOT_FILL_SECONDS", "5");
        std::env::set_var("CATVOTE_EXCLUSIVE_ROUNDS", "true");

        let config = EngineConfig::from_env();
        assert_eq!(config.capacity, 3);
        assert_eq!(config.voting_seconds, 10);
        assert_eq!(config.reward_per_vote, 25);
        assert_eq!(config.bot_fill_seconds, Some(5));
        assert!(config.exclusive_rounds);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear_env();
        std::env::set_var("CATVOTE_ROOM_CAPACITY", "1");
        std::env::set_var("CATVOTE_REWARD_PER_VOTE", "lots");
        std::env::set_var("CATVOTE_BOT_FILL_SECONDS", "soon");
        std::env::set_var("CATVOTE_BIND", "not-an-address");

        let config = EngineConfig::from_env();
        assert_eq!(config.capacity, MIN_CAPACITY);
        assert_eq!(config.reward_per_vote, 25);
        assert!(config.bot_fill_seconds.is_none());
        assert_eq!(ServerConfig::from_env().bind, ServerConfig::default().bind);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_parse_env_reports_bad_value() {
        clear_env();
        std::env::set_var("CATVOTE_VOTING_SECONDS", "-3");
        let result: Result<Option<u64>, _> = parse_env("CATVOTE_VOTING_SECONDS");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
        clear_env();
    }
}
