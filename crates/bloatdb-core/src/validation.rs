use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::schema::DatabaseSchema;
use crate::types::ColumnKind;

/// Validate internal consistency of a database schema.
///
/// This checks:
/// - duplicate tables/columns
/// - foreign key targets exist
/// - enumerations carry at least one label
pub fn validate_schema(schema: &DatabaseSchema) -> Result<()> {
    let mut catalog: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for table in &schema.tables {
        if catalog.contains_key(table.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate table name: {}",
                table.name
            )));
        }

        let mut columns = BTreeSet::new();
        for column in &table.columns {
            if !columns.insert(column.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate column name: {}.{}",
                    table.name, column.name
                )));
            }
            if let ColumnKind::Enumeration { enum_type } = &column.kind
                && enum_type.labels.is_empty()
            {
                return Err(Error::InvalidSchema(format!(
                    "enumeration {} on {}.{} has no labels",
                    enum_type.name, table.name, column.name
                )));
            }
        }

        catalog.insert(table.name.as_str(), columns);
    }

    for table in &schema.tables {
        for (column, fk) in table.foreign_keys() {
            let ref_columns = catalog.get(fk.table.as_str()).ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "referenced table not found: {} (from {}.{})",
                    fk.table, table.name, column.name
                ))
            })?;
            if !ref_columns.contains(fk.column.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "referenced column not found: {}.{} (from {}.{})",
                    fk.table, fk.column, table.name, column.name
                )));
            }
        }
    }

    Ok(())
}
