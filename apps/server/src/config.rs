//! # Server Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOCKBOOK_PORT=9000                                                │
//! │     STOCKBOOK_JWT_SECRET=...                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     $STOCKBOOK_CONFIG, or                                              │
//! │     ~/.config/stockbook/server.toml (Linux)                            │
//! │     ~/Library/Application Support/com.stockbook.stockbook/server.toml  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0"
//! port = 8080
//!
//! [database]
//! path = "/var/lib/stockbook/stockbook.db"
//! max_connections = 5
//!
//! [auth]
//! jwt_secret = "change-me-to-something-long-and-random"
//! token_lifetime_secs = 28800
//! bootstrap_admin_password = "first-login-only"
//!
//! [accounting]
//! tax_rate_bps = 1000        # 10.00%
//! auto_post_vouchers = true
//! payment_terms_days = 30
//!
//! [backup]
//! dir = "/var/lib/stockbook/backups"
//! retain = 7
//!
//! [scheduler]
//! enabled = true
//! tick_secs = 60
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use stockbook_core::TaxRate;
use stockbook_db::{DbConfig, PostingPolicy};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "STOCKBOOK_CONFIG";

/// Shortest accepted HS256 secret, in bytes.
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        ServerSection {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSection {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSection {
    /// HS256 signing key. Empty means "generate one at startup", which
    /// invalidates every token on restart.
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: i64,
    /// Password for the `admin` user created when the users table is empty.
    #[serde(default)]
    pub bootstrap_admin_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountingSection {
    /// Default tax rate in basis points; the `tax_rate` setting wins when present.
    #[serde(default)]
    pub tax_rate_bps: u32,
    #[serde(default = "default_true")]
    pub auto_post_vouchers: bool,
    #[serde(default = "default_payment_terms")]
    pub payment_terms_days: i64,
}

impl Default for AccountingSection {
    fn default() -> Self {
        AccountingSection {
            tax_rate_bps: 0,
            auto_post_vouchers: true,
            payment_terms_days: default_payment_terms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSection {
    /// Defaults to `backups/` next to the database file.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_retain")]
    pub retain: usize,
}

impl Default for BackupSection {
    fn default() -> Self {
        BackupSection {
            dir: None,
            retain: default_retain(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        SchedulerSection {
            enabled: true,
            tick_secs: default_tick_secs(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "stockbook", "stockbook")
        .map(|dirs| dirs.data_dir().join("stockbook.db"))
        .unwrap_or_else(|| PathBuf::from("stockbook.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_token_lifetime() -> i64 {
    8 * 60 * 60
}

fn default_true() -> bool {
    true
}

fn default_payment_terms() -> i64 {
    30
}

fn default_retain() -> usize {
    7
}

fn default_tick_secs() -> u64 {
    60
}

// =============================================================================
// Server Config
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub accounting: AccountingSection,
    #[serde(default)]
    pub backup: BackupSection,
    #[serde(default)]
    pub scheduler: SchedulerSection,
}

impl ServerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config_path`, `$STOCKBOOK_CONFIG`, platform config dir)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let path = config_path
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
            .or_else(Self::default_config_path);

        let mut config = match path {
            Some(path) if path.exists() => {
                info!(?path, "Loading server config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
                Self::from_toml(&contents)?
            }
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());

        if config.auth.jwt_secret.is_empty() {
            warn!("No jwt_secret configured; generating one, tokens will not survive a restart");
            config.auth.jwt_secret = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.auth.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "auth.jwt_secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if self.auth.token_lifetime_secs <= 0 {
            return Err(ConfigError::Invalid("auth.token_lifetime_secs must be positive".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid("database.max_connections must be at least 1".into()));
        }
        if self.accounting.tax_rate_bps > 10_000 {
            return Err(ConfigError::Invalid("accounting.tax_rate_bps must be at most 10000".into()));
        }
        if !(0..=3650).contains(&self.accounting.payment_terms_days) {
            return Err(ConfigError::Invalid(
                "accounting.payment_terms_days must be between 0 and 3650".into(),
            ));
        }
        if self.backup.retain == 0 {
            return Err(ConfigError::Invalid("backup.retain must be at least 1".into()));
        }
        if self.scheduler.tick_secs == 0 {
            return Err(ConfigError::Invalid("scheduler.tick_secs must be at least 1".into()));
        }
        Ok(())
    }

    /// Applies `STOCKBOOK_*` overrides. Unparsable numbers are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("STOCKBOOK_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(port) = parse_var(&lookup, "STOCKBOOK_PORT") {
            debug!(port, "Overriding port from environment");
            self.server.port = port;
        }
        if let Some(path) = lookup("STOCKBOOK_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }
        if let Some(max) = parse_var(&lookup, "STOCKBOOK_DB_MAX_CONNECTIONS") {
            self.database.max_connections = max;
        }
        if let Some(secret) = lookup("STOCKBOOK_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(secs) = parse_var(&lookup, "STOCKBOOK_TOKEN_LIFETIME_SECS") {
            self.auth.token_lifetime_secs = secs;
        }
        if let Some(password) = lookup("STOCKBOOK_ADMIN_PASSWORD") {
            self.auth.bootstrap_admin_password = Some(password);
        }
        if let Some(bps) = parse_var(&lookup, "STOCKBOOK_TAX_RATE_BPS") {
            self.accounting.tax_rate_bps = bps;
        }
        if let Some(auto) = parse_var(&lookup, "STOCKBOOK_AUTO_POST_VOUCHERS") {
            self.accounting.auto_post_vouchers = auto;
        }
        if let Some(days) = parse_var(&lookup, "STOCKBOOK_PAYMENT_TERMS_DAYS") {
            self.accounting.payment_terms_days = days;
        }
        if let Some(dir) = lookup("STOCKBOOK_BACKUP_DIR") {
            self.backup.dir = Some(PathBuf::from(dir));
        }
        if let Some(retain) = parse_var(&lookup, "STOCKBOOK_BACKUP_RETAIN") {
            self.backup.retain = retain;
        }
        if let Some(enabled) = parse_var(&lookup, "STOCKBOOK_SCHEDULER_ENABLED") {
            self.scheduler.enabled = enabled;
        }
        if let Some(secs) = parse_var(&lookup, "STOCKBOOK_SCHEDULER_TICK_SECS") {
            self.scheduler.tick_secs = secs;
        }
    }

    /// Gets the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "stockbook", "stockbook")
            .map(|dirs| dirs.config_dir().join("server.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind_addr, self.server.port)
    }

    pub fn posting_policy(&self) -> PostingPolicy {
        PostingPolicy {
            default_tax_rate: TaxRate::from_bps(self.accounting.tax_rate_bps),
            auto_post_vouchers: self.accounting.auto_post_vouchers,
            payment_terms_days: self.accounting.payment_terms_days,
        }
    }

    pub fn db_config(&self) -> DbConfig {
        let config = DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .posting_policy(self.posting_policy())
            .backup_retain(self.backup.retain);
        match &self.backup.dir {
            Some(dir) => config.backup_dir(dir),
            None => config,
        }
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable environment override");
            None
        }
    }
}
