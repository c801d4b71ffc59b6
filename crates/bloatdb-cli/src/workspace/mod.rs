mod atomic;
mod cache;

pub use cache::CacheLayout;

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid cache state: {0}")]
    Invalid(String),
}

pub type CacheResult<T> = Result<T, CacheError>;
