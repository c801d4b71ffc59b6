use bloatdb_core::DEFAULT_NAMESPACE;

/// Options that control how introspection behaves.
#[derive(Debug, Clone)]
pub struct IntrospectOptions {
    /// Schema (namespace) whose base tables are described.
    pub namespace: String,
    /// Look up enum labels for `USER-DEFINED` columns.
    pub include_enum_labels: bool,
}

impl Default for IntrospectOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            include_enum_labels: true,
        }
    }
}

impl IntrospectOptions {
    pub fn for_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }
}
