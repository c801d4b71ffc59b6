use bloatdb_core::Error as CoreError;
use bloatdb_generate::SeedError;
use bloatdb_plan::PlanError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::registry::RegistryError;
use crate::workspace::CacheError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("logging setup failed: {0}")]
    Registry(#[from] RegistryError),
    #[error("schema error: {0}")]
    Core(#[from] CoreError),
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),
    #[error("seeding failed: {0}")]
    Seed(#[from] SeedError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
