use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Storage width of an integer column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IntWidth {
    Small,
    Regular,
    Big,
}

impl IntWidth {
    /// Largest value the column can hold.
    pub fn max_value(self) -> i64 {
        match self {
            IntWidth::Small => i16::MAX as i64,
            IntWidth::Regular => i32::MAX as i64,
            IntWidth::Big => i64::MAX,
        }
    }

    /// Number of decimal digits used for opaque key tokens of this width.
    pub fn token_digits(self) -> u32 {
        match self {
            IntWidth::Small => 4,
            IntWidth::Regular => 9,
            IntWidth::Big => 18,
        }
    }
}

/// Representation of a Postgres enum type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct EnumType {
    /// Namespace of the type, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
    pub labels: Vec<String>,
}

impl EnumType {
    /// SQL type reference suitable for a cast (`"schema"."name"`).
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&self.name)),
            None => quote_ident(&self.name),
        }
    }
}

/// Semantic type tag of a column.
///
/// Anything the seeding engine cannot synthesize lands in `Unsupported`;
/// the raw type string stays on the column for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnKind {
    Integer { width: IntWidth },
    Boolean,
    Text,
    Timestamp { with_time_zone: bool },
    Uuid,
    Enumeration { enum_type: EnumType },
    Unsupported,
}

impl ColumnKind {
    /// Classify an `information_schema` data type.
    ///
    /// `USER-DEFINED` columns only classify as enumerations when labels are known.
    pub fn classify(data_type: &str, enum_type: Option<&EnumType>) -> Self {
        let normalized = normalize_type(data_type);
        match normalized.as_str() {
            "smallint" | "int2" => ColumnKind::Integer {
                width: IntWidth::Small,
            },
            "integer" | "int" | "int4" => ColumnKind::Integer {
                width: IntWidth::Regular,
            },
            "bigint" | "int8" => ColumnKind::Integer {
                width: IntWidth::Big,
            },
            "boolean" | "bool" => ColumnKind::Boolean,
            "text" | "character varying" | "varchar" | "character" | "char" | "bpchar" => {
                ColumnKind::Text
            }
            "timestamp" | "timestamp without time zone" => ColumnKind::Timestamp {
                with_time_zone: false,
            },
            "timestamptz" | "timestamp with time zone" => ColumnKind::Timestamp {
                with_time_zone: true,
            },
            "uuid" => ColumnKind::Uuid,
            "user-defined" => match enum_type {
                Some(enum_type) if !enum_type.labels.is_empty() => ColumnKind::Enumeration {
                    enum_type: enum_type.clone(),
                },
                _ => ColumnKind::Unsupported,
            },
            _ => ColumnKind::Unsupported,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, ColumnKind::Unsupported)
    }
}

fn normalize_type(data_type: &str) -> String {
    data_type
        .split('(')
        .next()
        .unwrap_or(data_type)
        .trim()
        .to_lowercase()
}

/// Quote a Postgres identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
