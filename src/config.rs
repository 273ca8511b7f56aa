//! Service configuration: defaults, TOML file, `PADDOCK_*` environment
//! overrides and validation.

use crate::errors::{ConfigError, PaddockResult};
use serde::{Deserialize, Serialize};
use std::{env, path::Path, str::FromStr, time::Duration};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PaddockConfig {
    pub server: ServerConfig,
    pub round: RoundConfig,
    pub betting: BettingConfig,
    pub ledger: LedgerConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// Broadcast buffer per subscriber before it starts lagging
    pub event_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            cors_origins: vec!["http://localhost:3000".to_string()],
            request_timeout_secs: 30,
            event_capacity: 1024,
        }
    }
}

/// Lifecycle timings, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoundConfig {
    pub bet_window_ms: u64,
    pub race_duration_ms: u64,
    pub countdown_interval_ms: u64,
    pub lock_delay_ms: u64,
    pub result_buffer_ms: u64,
    pub cooldown_ms: u64,
    pub skip_delay_ms: u64,
    pub error_delay_ms: u64,
    pub history_capacity: usize,
    pub history_query_limit: usize,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            bet_window_ms: 120_000,
            race_duration_ms: 30_000,
            countdown_interval_ms: 1_000,
            lock_delay_ms: 1_000,
            result_buffer_ms: 2_000,
            cooldown_ms: 15_000,
            skip_delay_ms: 5_000,
            error_delay_ms: 10_000,
            history_capacity: 50,
            history_query_limit: 20,
        }
    }
}

impl RoundConfig {
    pub fn bet_window(&self) -> Duration {
        Duration::from_millis(self.bet_window_ms)
    }

    pub fn race_duration(&self) -> Duration {
        Duration::from_millis(self.race_duration_ms)
    }

    pub fn countdown_interval(&self) -> Duration {
        Duration::from_millis(self.countdown_interval_ms)
    }

    pub fn lock_delay(&self) -> Duration {
        Duration::from_millis(self.lock_delay_ms)
    }

    pub fn result_buffer(&self) -> Duration {
        Duration::from_millis(self.result_buffer_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn skip_delay(&self) -> Duration {
        Duration::from_millis(self.skip_delay_ms)
    }

    pub fn error_delay(&self) -> Duration {
        Duration::from_millis(self.error_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BettingConfig {
    pub min_bet: f64,
    pub max_bet: f64,
    pub edge_factor: f64,
    /// Bound on queued bet commands awaiting the orchestrator
    pub command_capacity: usize,
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            min_bet: 0.001,
            max_bet: 1.0,
            edge_factor: 0.15,
            command_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LedgerMode {
    /// No ledger; every round runs degraded
    Disabled,
    /// In-process contract replica
    Simulated,
}

impl FromStr for LedgerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" => Ok(LedgerMode::Disabled),
            "simulated" => Ok(LedgerMode::Simulated),
            other => Err(format!("unknown ledger mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    pub mode: LedgerMode,
    pub timeout_ms: u64,
    pub settle_attempts: u32,
    pub settle_retry_delay_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            mode: LedgerMode::Simulated,
            timeout_ms: 10_000,
            settle_attempts: 3,
            settle_retry_delay_ms: 2_000,
        }
    }
}

impl LedgerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn settle_retry_delay(&self) -> Duration {
        Duration::from_millis(self.settle_retry_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Disabled,
    Memory,
    Rocksdb,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" => Ok(StorageBackend::Disabled),
            "memory" => Ok(StorageBackend::Memory),
            "rocksdb" => Ok(StorageBackend::Rocksdb),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Rocksdb,
            data_dir: "./paddock_data".to_string(),
        }
    }
}

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

fn parse_env<T: FromStr>(key: &str, raw: String, reason: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        field: key.to_string(),
        value: raw,
        reason: reason.to_string(),
    })
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// File (if any), then environment, then validation
    pub fn load(&self) -> PaddockResult<PaddockConfig> {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => PaddockConfig::default(),
        };

        self.apply_overrides(&mut config, |key| env::var(key).ok())?;
        self.validate(&config)?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> PaddockResult<PaddockConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    fn apply_overrides<F>(&self, config: &mut PaddockConfig, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("PADDOCK_HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("PADDOCK_PORT") {
            config.server.port = parse_env("PADDOCK_PORT", port, "Invalid port number")?;
        }
        if let Some(origins) = lookup("PADDOCK_CORS_ORIGINS") {
            config.server.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }

        let timings: [(&str, &mut u64); 8] = [
            ("PADDOCK_BET_WINDOW_MS", &mut config.round.bet_window_ms),
            ("PADDOCK_RACE_DURATION_MS", &mut config.round.race_duration_ms),
            ("PADDOCK_COUNTDOWN_INTERVAL_MS", &mut config.round.countdown_interval_ms),
            ("PADDOCK_LOCK_DELAY_MS", &mut config.round.lock_delay_ms),
            ("PADDOCK_RESULT_BUFFER_MS", &mut config.round.result_buffer_ms),
            ("PADDOCK_COOLDOWN_MS", &mut config.round.cooldown_ms),
            ("PADDOCK_SKIP_DELAY_MS", &mut config.round.skip_delay_ms),
            ("PADDOCK_ERROR_DELAY_MS", &mut config.round.error_delay_ms),
        ];
        for (key, slot) in timings {
            if let Some(raw) = lookup(key) {
                *slot = parse_env(key, raw, "Invalid duration in milliseconds")?;
            }
        }

        if let Some(raw) = lookup("PADDOCK_MIN_BET") {
            config.betting.min_bet = parse_env("PADDOCK_MIN_BET", raw, "Invalid amount")?;
        }
        if let Some(raw) = lookup("PADDOCK_MAX_BET") {
            config.betting.max_bet = parse_env("PADDOCK_MAX_BET", raw, "Invalid amount")?;
        }
        if let Some(raw) = lookup("PADDOCK_LEDGER_MODE") {
            config.ledger.mode = parse_env("PADDOCK_LEDGER_MODE", raw, "Expected disabled or simulated")?;
        }
        if let Some(raw) = lookup("PADDOCK_LEDGER_TIMEOUT_MS") {
            config.ledger.timeout_ms = parse_env("PADDOCK_LEDGER_TIMEOUT_MS", raw, "Invalid timeout value")?;
        }
        if let Some(raw) = lookup("PADDOCK_STORAGE_BACKEND") {
            config.storage.backend =
                parse_env("PADDOCK_STORAGE_BACKEND", raw, "Expected disabled, memory or rocksdb")?;
        }
        if let Some(dir) = lookup("PADDOCK_DATA_DIR") {
            config.storage.data_dir = dir;
        }

        Ok(())
    }

    pub fn validate(&self, config: &PaddockConfig) -> Result<(), ConfigError> {
        if config.server.port == 0 {
            return Err(invalid("server.port", 0, "Port cannot be zero"));
        }
        if config.server.event_capacity == 0 {
            return Err(invalid("server.event_capacity", 0, "Capacity cannot be zero"));
        }

        let round = &config.round;
        if round.bet_window_ms == 0 {
            return Err(invalid("round.bet_window_ms", 0, "Betting window cannot be zero"));
        }
        if round.race_duration_ms == 0 {
            return Err(invalid("round.race_duration_ms", 0, "Race duration cannot be zero"));
        }
        if round.countdown_interval_ms == 0 {
            return Err(invalid("round.countdown_interval_ms", 0, "Countdown interval cannot be zero"));
        }
        if round.error_delay_ms == 0 {
            return Err(invalid("round.error_delay_ms", 0, "Error delay cannot be zero"));
        }
        if round.history_capacity == 0 {
            return Err(invalid("round.history_capacity", 0, "History capacity cannot be zero"));
        }

        let betting = &config.betting;
        if !(betting.min_bet.is_finite() && betting.min_bet > 0.0) {
            return Err(invalid("betting.min_bet", betting.min_bet, "Minimum bet must be positive"));
        }
        if !(betting.max_bet.is_finite() && betting.max_bet >= betting.min_bet) {
            return Err(invalid("betting.max_bet", betting.max_bet, "Maximum bet must be at least the minimum"));
        }
        if !(0.0..=1.0).contains(&betting.edge_factor) {
            return Err(invalid("betting.edge_factor", betting.edge_factor, "Edge factor must be in [0, 1]"));
        }

        if config.ledger.timeout_ms < 100 {
            return Err(invalid("ledger.timeout_ms", config.ledger.timeout_ms, "Timeout must be at least 100ms"));
        }
        if config.ledger.settle_attempts == 0 {
            return Err(invalid("ledger.settle_attempts", 0, "At least one settle attempt is required"));
        }

        if config.storage.backend == StorageBackend::Rocksdb && config.storage.data_dir.is_empty() {
            return Err(ConfigError::MissingRequired("storage.data_dir".to_string()));
        }

        Ok(())
    }

    pub fn save(&self, config: &PaddockConfig, path: &str) -> PaddockResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into())
    }
}
