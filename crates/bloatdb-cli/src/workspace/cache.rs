use std::path::{Path, PathBuf};

use bloatdb_core::SchemaDescription;
use bloatdb_plan::OrderedPlan;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, info};

use super::atomic::write_json_atomic;
use super::CacheResult;

const SCHEMAS_DIR: &str = "schemas";
const ANALYZERS_DIR: &str = "analyzers";

/// On-disk layout of the schema and plan caches.
///
/// Entries are keyed by database and calendar day:
/// `<root>/schemas/<database>_<YYYYMMDD>.json` and
/// `<root>/analyzers/<database>_<YYYYMMDD>.json`.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn schema_path(&self, database: &str, day: NaiveDate) -> PathBuf {
        self.root.join(SCHEMAS_DIR).join(entry_name(database, day))
    }

    pub fn plan_path(&self, database: &str, day: NaiveDate) -> PathBuf {
        self.root.join(ANALYZERS_DIR).join(entry_name(database, day))
    }

    pub fn load_schema(
        &self,
        database: &str,
        day: NaiveDate,
    ) -> CacheResult<Option<SchemaDescription>> {
        let path = self.schema_path(database, day);
        match read_json(&path)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn store_schema(
        &self,
        database: &str,
        day: NaiveDate,
        description: &SchemaDescription,
    ) -> CacheResult<PathBuf> {
        let path = self.schema_path(database, day);
        write_json_atomic(&path, description)?;
        debug!(event = "schema_cached", path = %path.display());
        Ok(path)
    }

    /// Raw plan document; callers validate it before use.
    pub fn load_plan(&self, database: &str, day: NaiveDate) -> CacheResult<Option<Value>> {
        read_json(&self.plan_path(database, day))
    }

    pub fn store_plan(
        &self,
        database: &str,
        day: NaiveDate,
        plan: &OrderedPlan,
    ) -> CacheResult<PathBuf> {
        let path = self.plan_path(database, day);
        write_json_atomic(&path, plan)?;
        debug!(event = "plan_cached", path = %path.display());
        Ok(path)
    }

    /// Delete every cached schema and plan file, for all databases and days.
    /// Returns how many files were removed.
    pub fn purge(&self) -> CacheResult<usize> {
        let mut removed = 0;
        for dir in [SCHEMAS_DIR, ANALYZERS_DIR] {
            let dir = self.root.join(dir);
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            for entry in entries {
                let path = entry?.path();
                if path.is_file() {
                    std::fs::remove_file(&path)?;
                    removed += 1;
                }
            }
        }
        info!(event = "cache_purged", root = %self.root.display(), removed, "cache purged");
        Ok(removed)
    }
}

fn entry_name(database: &str, day: NaiveDate) -> String {
    let stem: String = database
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    format!("{stem}_{}.json", day.format("%Y%m%d"))
}

fn read_json(path: &Path) -> CacheResult<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::CacheError;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).expect("valid date")
    }

    fn temp_layout() -> CacheLayout {
        CacheLayout::new(std::env::temp_dir().join(format!("bloatdb_cache_{}", uuid::Uuid::new_v4())))
    }

    #[test]
    fn paths_follow_database_and_day() {
        let layout = CacheLayout::new("/var/cache/bloatdb");
        assert_eq!(
            layout.schema_path("shop", day()),
            PathBuf::from("/var/cache/bloatdb/schemas/shop_20240309.json")
        );
        assert_eq!(
            layout.plan_path("shop", day()),
            PathBuf::from("/var/cache/bloatdb/analyzers/shop_20240309.json")
        );
    }

    #[test]
    fn database_names_are_made_file_safe() {
        let layout = CacheLayout::new("c");
        assert_eq!(
            layout.schema_path("../my db", day()),
            PathBuf::from("c/schemas/___my_db_20240309.json")
        );
    }

    #[test]
    fn schema_cache_round_trips_and_misses_other_days() {
        let layout = temp_layout();
        let description: SchemaDescription = serde_json::from_value(serde_json::json!({
            "users": {"columns": [
                {"name": "id", "data_type": "uuid", "is_nullable": false,
                 "constraint": {"type": "PRIMARY KEY"}}
            ]}
        }))
        .expect("description");

        assert!(layout.load_schema("shop", day()).expect("load").is_none());
        layout.store_schema("shop", day(), &description).expect("store");

        let cached = layout.load_schema("shop", day()).expect("load").expect("hit");
        assert_eq!(cached, description);

        let next_day = day().succ_opt().expect("next day");
        assert!(layout.load_schema("shop", next_day).expect("load").is_none());
        std::fs::remove_dir_all(layout.root()).expect("cleanup");
    }

    #[test]
    fn purge_removes_every_cached_entry() {
        let layout = temp_layout();
        assert_eq!(layout.purge().expect("purge empty"), 0);

        let description: SchemaDescription = serde_json::from_value(serde_json::json!({
            "users": {"columns": [
                {"name": "id", "data_type": "integer", "is_nullable": false,
                 "constraint": {"type": "PRIMARY KEY"}}
            ]}
        }))
        .expect("description");
        let next_day = day().succ_opt().expect("next day");
        layout.store_schema("shop", day(), &description).expect("store");
        layout.store_schema("shop", next_day, &description).expect("store");
        layout.store_schema("blog", day(), &description).expect("store");
        let plan_path = layout.plan_path("shop", day());
        std::fs::create_dir_all(plan_path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&plan_path, "{}").expect("write plan");

        assert_eq!(layout.purge().expect("purge"), 4);
        assert!(layout.load_schema("shop", day()).expect("load").is_none());
        assert!(layout.load_plan("shop", day()).expect("load").is_none());
        assert_eq!(layout.purge().expect("purge again"), 0);
        std::fs::remove_dir_all(layout.root()).expect("cleanup");
    }

    #[test]
    fn corrupt_entries_surface_as_json_errors() {
        let layout = temp_layout();
        let path = layout.plan_path("shop", day());
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, "{not json").expect("write");

        let err = layout.load_plan("shop", day()).unwrap_err();
        assert!(matches!(err, CacheError::Json(_)));
        std::fs::remove_dir_all(layout.root()).expect("cleanup");
    }
}
