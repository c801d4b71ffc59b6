use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Constraint kinds as reported by `information_schema.table_constraints`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, JsonSchema)]
pub enum ConstraintKind {
    #[serde(rename = "PRIMARY KEY")]
    PrimaryKey,
    #[serde(rename = "FOREIGN KEY")]
    ForeignKey,
    #[serde(rename = "UNIQUE")]
    Unique,
    #[serde(rename = "CHECK")]
    Check,
}

impl ConstraintKind {
    /// Precedence used when a column carries several constraints; lower wins.
    pub fn precedence(self) -> u8 {
        match self {
            ConstraintKind::ForeignKey => 0,
            ConstraintKind::PrimaryKey => 1,
            ConstraintKind::Unique => 2,
            ConstraintKind::Check => 3,
        }
    }

    pub fn is_key(self) -> bool {
        matches!(self, ConstraintKind::PrimaryKey | ConstraintKind::Unique)
    }

    /// Postgres' default name for an unnamed constraint of this kind.
    pub fn default_name(self, table: &str, column: &str) -> String {
        match self {
            ConstraintKind::PrimaryKey => format!("{table}_pkey"),
            ConstraintKind::ForeignKey => format!("{table}_{column}_fkey"),
            ConstraintKind::Unique => format!("{table}_{column}_key"),
            ConstraintKind::Check => format!("{table}_{column}_check"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConstraintKind::PrimaryKey => "PRIMARY KEY",
            ConstraintKind::ForeignKey => "FOREIGN KEY",
            ConstraintKind::Unique => "UNIQUE",
            ConstraintKind::Check => "CHECK",
        }
    }
}

/// Target of a column-level foreign key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
}

/// Membership of a column in a PRIMARY KEY or UNIQUE constraint. Columns
/// sharing `name` form one (possibly composite) key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct KeyMembership {
    pub name: String,
    pub kind: ConstraintKind,
}

/// Effective constraint of a column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    PrimaryKey,
    ForeignKey(ForeignKeyRef),
    Unique,
    Check,
}

impl Constraint {
    pub fn kind(&self) -> ConstraintKind {
        match self {
            Constraint::PrimaryKey => ConstraintKind::PrimaryKey,
            Constraint::ForeignKey(_) => ConstraintKind::ForeignKey,
            Constraint::Unique => ConstraintKind::Unique,
            Constraint::Check => ConstraintKind::Check,
        }
    }

    pub fn foreign_key(&self) -> Option<&ForeignKeyRef> {
        match self {
            Constraint::ForeignKey(fk) => Some(fk),
            _ => None,
        }
    }

    /// True for constraints that make duplicate values collide on insert.
    pub fn is_unique_key(&self) -> bool {
        matches!(self, Constraint::PrimaryKey | Constraint::Unique)
    }
}
