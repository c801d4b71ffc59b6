use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bloatdb_core::DEFAULT_NAMESPACE;
use bloatdb_generate::SeedOptions;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use thiserror::Error;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "bloatdb.toml";
pub const DEFAULT_CACHE_DIR: &str = ".bloatdb";
const DEFAULT_PORT: u16 = 5432;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("toml decode error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("json decode error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid connection url: {0}")]
    Url(#[from] sqlx::Error),
    #[error("no database connection configured; pass --database-url, set DATABASE_URL or add [connection] to the config file")]
    MissingConnection,
    #[error("incomplete connection settings: missing {0}")]
    IncompleteConnection(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub seed: SeedConfig,
    pub cache: CacheConfig,
}

/// Either a full `url` or discrete fields; `url` wins when both are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub rows_per_table: Option<u64>,
    pub seed: Option<u64>,
    pub page_rows: Option<usize>,
    pub timestamp_floor: Option<NaiveDateTime>,
    pub timestamp_ceiling: Option<NaiveDateTime>,
    pub token_length: Option<usize>,
    /// Per-table row counts.
    pub tables: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub namespace: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_CACHE_DIR),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl Config {
    /// Load `path`, or `bloatdb.toml` when present, or defaults.
    ///
    /// Files ending in `.json` hold only connection fields, as written by
    /// older tooling: `{host, database, user, password, port?}`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    return Ok(Self::default());
                }
                fallback
            }
        };

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let connection: ConnectionConfig = serde_json::from_str(content)?;
        Ok(Self {
            connection,
            ..Self::default()
        })
    }

    /// Connection precedence: explicit flag, then `env_url`, then the file.
    pub fn connect_options(
        &self,
        flag_url: Option<&str>,
        env_url: Option<&str>,
    ) -> Result<PgConnectOptions, ConfigError> {
        if let Some(url) = flag_url.or(env_url).or(self.connection.url.as_deref()) {
            return Ok(url.parse::<PgConnectOptions>()?);
        }
        self.connection.discrete_options()
    }
}

impl ConnectionConfig {
    fn is_empty(&self) -> bool {
        self.host.is_none() && self.database.is_none() && self.user.is_none()
    }

    fn discrete_options(&self) -> Result<PgConnectOptions, ConfigError> {
        if self.is_empty() {
            return Err(ConfigError::MissingConnection);
        }
        let host = self
            .host
            .as_deref()
            .ok_or(ConfigError::IncompleteConnection("host"))?;
        let database = self
            .database
            .as_deref()
            .ok_or(ConfigError::IncompleteConnection("database"))?;
        let user = self
            .user
            .as_deref()
            .ok_or(ConfigError::IncompleteConnection("user"))?;

        let mut options = PgConnectOptions::new()
            .host(host)
            .port(self.port.unwrap_or(DEFAULT_PORT))
            .database(database)
            .username(user);
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        Ok(options)
    }
}

impl SeedConfig {
    pub fn to_options(&self) -> SeedOptions {
        let defaults = SeedOptions::default();
        SeedOptions {
            rows_per_table: self.rows_per_table.unwrap_or(defaults.rows_per_table),
            table_rows: self.tables.clone(),
            seed: self.seed,
            page_rows: self.page_rows.unwrap_or(defaults.page_rows),
            timestamp_floor: self.timestamp_floor.unwrap_or(defaults.timestamp_floor),
            timestamp_ceiling: self.timestamp_ceiling,
            token_length: self.token_length.unwrap_or(defaults.token_length),
        }
    }
}
