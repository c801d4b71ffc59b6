use std::fs;
use std::path::Path;

use bloatdb_core::{ColumnKind, DatabaseSchema, IntWidth, SchemaDescription, validate_schema};
use schemars::schema_for;

fn load_fixture() -> SchemaDescription {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/blog.json");
    let raw = fs::read_to_string(&path)
        .unwrap_or_else(|_| panic!("missing fixture at {}", path.display()));
    serde_json::from_str(&raw).expect("parse fixture")
}

#[test]
fn cached_description_loads_into_typed_schema() {
    let description = load_fixture();
    let schema = DatabaseSchema::from_description(&description, Some("blog".to_string()))
        .expect("typed schema");
    validate_schema(&schema).expect("fixture is consistent");

    assert_eq!(schema.table_names(), vec!["comments", "posts", "users"]);

    let comments = schema.table("comments").expect("comments");
    assert_eq!(
        comments.columns[0].kind,
        ColumnKind::Integer {
            width: IntWidth::Regular
        }
    );
    assert_eq!(comments.referenced_tables(), vec!["posts"]);

    let users = schema.table("users").expect("users");
    assert!(!users.has_foreign_keys());
    let status = users.column("status").expect("status column");
    match &status.kind {
        ColumnKind::Enumeration { enum_type } => {
            assert_eq!(enum_type.qualified_name(), "\"public\".\"user_status\"");
        }
        other => panic!("unexpected kind {other:?}"),
    }
    assert!(!users.column("nickname").expect("nickname").required);

    let referenced: Vec<_> = schema.referenced_columns().into_iter().collect();
    assert_eq!(
        referenced,
        vec![
            ("posts".to_string(), "id".to_string()),
            ("users".to_string(), "id".to_string()),
        ]
    );
}

#[test]
fn regenerated_metadata_matches_the_cache() {
    let description = load_fixture();
    let schema = DatabaseSchema::from_description(&description, None).expect("typed schema");
    let regenerated = schema.to_description();

    assert_eq!(regenerated.database_metadata, description.database_metadata);
    for (name, table) in &description.tables {
        assert_eq!(
            regenerated.tables[name].table_metadata, table.table_metadata,
            "metadata mismatch for {name}"
        );
    }
}

#[test]
fn description_json_schema_names_metadata_keys() {
    let generated = schema_for!(SchemaDescription);
    let json = serde_json::to_value(&generated).expect("serialize generated schema");
    let properties = json
        .get("properties")
        .and_then(|value| value.as_object())
        .expect("top-level properties");
    assert!(properties.contains_key("@database_metadata"));
}
