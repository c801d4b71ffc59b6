use async_trait::async_trait;

use bloatdb_core::{Result, SchemaDescription};

use crate::options::IntrospectOptions;

/// Trait implemented by database adapters that can describe a namespace.
#[async_trait]
pub trait Adapter {
    /// Engine identifier (e.g. `postgres`).
    fn engine(&self) -> &'static str;

    /// Describe every base table of the configured namespace.
    async fn introspect(&self, opts: &IntrospectOptions) -> Result<SchemaDescription>;
}
