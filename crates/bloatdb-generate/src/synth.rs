use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use fake::Fake;
use fake::faker::address::en::{CityName, CountryName, StreetName, ZipCode};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::{SafeEmail, Username};
use fake::faker::lorem::en::{Word, Words};
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::faker::phone_number::en::PhoneNumber;
use rand::distr::Alphanumeric;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use bloatdb_core::{Column, ColumnKind, Constraint, IntWidth, Table};

use crate::errors::SeedError;
use crate::sampler::RowSampler;
use crate::value::{Row, SeedValue};

/// Ceiling for plain integer columns.
const INT_CAP: i64 = 1_000_000;

/// Knobs shared by every table's synthesizer.
#[derive(Debug, Clone)]
pub struct SynthOptions {
    pub timestamp_floor: NaiveDateTime,
    pub timestamp_ceiling: NaiveDateTime,
    /// Length of text primary-key tokens before clipping.
    pub token_length: usize,
}

impl SynthOptions {
    pub fn default_floor() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2000, 1, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .unwrap_or_default()
    }
}

/// Generates candidate rows for one table from a seeded RNG.
#[derive(Debug, Clone)]
pub struct ValueSynthesizer {
    options: SynthOptions,
    rng: ChaCha8Rng,
}

impl ValueSynthesizer {
    pub fn new(options: SynthOptions, seed: u64) -> Self {
        Self {
            options,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Synthesizer seeded from the run seed mixed with the table name.
    pub fn for_table(options: SynthOptions, run_seed: u64, table: &str) -> Self {
        Self::new(options, hash_seed(run_seed, table))
    }

    pub fn synthesize_row<S>(&mut self, table: &Table, sampler: &S) -> Result<Row, SeedError>
    where
        S: RowSampler + ?Sized,
    {
        table
            .columns
            .iter()
            .map(|column| self.synthesize(table, column, sampler))
            .collect()
    }

    pub fn synthesize<S>(
        &mut self,
        table: &Table,
        column: &Column,
        sampler: &S,
    ) -> Result<SeedValue, SeedError>
    where
        S: RowSampler + ?Sized,
    {
        if !column.required {
            return Ok(SeedValue::Null);
        }

        match &column.constraint {
            Some(Constraint::ForeignKey(fk)) => {
                sampler
                    .pick(&fk.table, &fk.column, &mut self.rng)
                    .ok_or_else(|| SeedError::EmptyReferencedTable {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        referenced_table: fk.table.clone(),
                        referenced_column: fk.column.clone(),
                    })
            }
            Some(Constraint::PrimaryKey) => self.primary_key(table, column),
            _ => self.by_type(table, column),
        }
    }

    fn primary_key(&mut self, table: &Table, column: &Column) -> Result<SeedValue, SeedError> {
        match &column.kind {
            ColumnKind::Uuid => Ok(SeedValue::Uuid(self.uuid_v4())),
            ColumnKind::Text => {
                let length = clip_length(self.options.token_length, column.max_length);
                Ok(SeedValue::Text(self.token(length)))
            }
            ColumnKind::Integer { width } => Ok(SeedValue::Int(self.digit_token(*width))),
            _ => self.by_type(table, column),
        }
    }

    fn by_type(&mut self, table: &Table, column: &Column) -> Result<SeedValue, SeedError> {
        let value = match &column.kind {
            ColumnKind::Integer { width } => {
                SeedValue::Int(self.rng.random_range(1..=width.max_value().min(INT_CAP)))
            }
            ColumnKind::Boolean => SeedValue::Bool(self.rng.random_bool(0.5)),
            ColumnKind::Text => {
                let text = self.text_for(&column.name);
                SeedValue::Text(truncate_chars(text, column.max_length))
            }
            ColumnKind::Timestamp { .. } => SeedValue::Timestamp(self.timestamp()),
            ColumnKind::Uuid => SeedValue::Uuid(self.uuid_v4()),
            ColumnKind::Enumeration { enum_type } => {
                let label = enum_type.labels.choose(&mut self.rng).ok_or_else(|| {
                    SeedError::UnsupportedColumnType {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        data_type: format!("enum {} without labels", enum_type.name),
                    }
                })?;
                SeedValue::Text(label.clone())
            }
            ColumnKind::Unsupported => {
                return Err(SeedError::UnsupportedColumnType {
                    table: table.name.clone(),
                    column: column.name.clone(),
                    data_type: column.data_type.clone(),
                });
            }
        };
        Ok(value)
    }

    fn uuid_v4(&mut self) -> uuid::Uuid {
        uuid::Builder::from_random_bytes(self.rng.random()).into_uuid()
    }

    fn token(&mut self, length: usize) -> String {
        (&mut self.rng)
            .sample_iter(Alphanumeric)
            .take(length)
            .map(char::from)
            .collect()
    }

    /// Number with exactly `width.token_digits()` digits.
    fn digit_token(&mut self, width: IntWidth) -> i64 {
        let digits = width.token_digits();
        let low = 10_i64.pow(digits - 1);
        let high = 10_i64.pow(digits) - 1;
        self.rng.random_range(low..=high)
    }

    fn timestamp(&mut self) -> NaiveDateTime {
        let floor = self.options.timestamp_floor;
        let span = (self.options.timestamp_ceiling - floor).num_seconds();
        if span <= 0 {
            return floor;
        }
        floor + TimeDelta::seconds(self.rng.random_range(0..=span))
    }

    fn text_for(&mut self, column: &str) -> String {
        let name = column.to_lowercase();
        let rng = &mut self.rng;
        let has = |needle: &str| name.contains(needle);

        if has("email") {
            SafeEmail().fake_with_rng(rng)
        } else if has("first_name") || has("firstname") {
            FirstName().fake_with_rng(rng)
        } else if has("last_name") || has("lastname") || has("surname") {
            LastName().fake_with_rng(rng)
        } else if has("username") || has("user_name") || has("login") {
            Username().fake_with_rng(rng)
        } else if has("company") {
            CompanyName().fake_with_rng(rng)
        } else if has("name") {
            Name().fake_with_rng(rng)
        } else if has("phone") {
            PhoneNumber().fake_with_rng(rng)
        } else if has("city") {
            CityName().fake_with_rng(rng)
        } else if has("country") {
            CountryName().fake_with_rng(rng)
        } else if has("address") || has("street") {
            let number = rng.random_range(1..=9999);
            let street: String = StreetName().fake_with_rng(rng);
            format!("{number} {street}")
        } else if has("zip") || has("postal") {
            ZipCode().fake_with_rng(rng)
        } else if has("url") || has("website") {
            let word: String = Word().fake_with_rng(rng);
            format!("https://{word}.example.com/{}", rng.random_range(1..=9999))
        } else {
            let words: Vec<String> = Words(2..6).fake_with_rng(rng);
            words.join(" ")
        }
    }
}

/// Per-table seed: FNV-1a over the table name, keyed by the run seed.
pub fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn clip_length(length: usize, max_length: Option<i32>) -> usize {
    match max_length.and_then(|max| usize::try_from(max).ok()) {
        Some(max) if max > 0 => length.min(max).max(1),
        _ => length.max(1),
    }
}

fn truncate_chars(text: String, max_length: Option<i32>) -> String {
    match max_length.and_then(|max| usize::try_from(max).ok()) {
        Some(max) if text.chars().count() > max => text.chars().take(max).collect(),
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::sampler::PopulatedRowIndex;
    use bloatdb_core::{DatabaseSchema, EnumType, ForeignKeyRef};

    fn options() -> SynthOptions {
        SynthOptions {
            timestamp_floor: SynthOptions::default_floor(),
            timestamp_ceiling: NaiveDate::from_ymd_opt(2024, 6, 1)
                .and_then(|date| date.and_hms_opt(12, 0, 0))
                .expect("valid date"),
            token_length: 12,
        }
    }

    fn column(name: &str, data_type: &str, constraint: Option<Constraint>) -> Column {
        Column {
            name: name.to_string(),
            data_type: data_type.to_string(),
            kind: ColumnKind::classify(data_type, None),
            required: true,
            default: None,
            max_length: None,
            constraint,
            keys: Vec::new(),
        }
    }

    fn table(name: &str, columns: Vec<Column>) -> Table {
        Table {
            name: name.to_string(),
            columns,
        }
    }

    #[test]
    fn uuid_primary_keys_are_unique_v4() {
        let users = table("users", vec![column("id", "uuid", Some(Constraint::PrimaryKey))]);
        let sampler = PopulatedRowIndex::default();
        let mut synth = ValueSynthesizer::new(options(), 42);

        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let value = synth
                .synthesize(&users, &users.columns[0], &sampler)
                .expect("uuid");
            let uuid = value.as_uuid().expect("uuid value");
            assert_eq!(uuid.get_version_num(), 4);
            assert_eq!(uuid.get_variant(), uuid::Variant::RFC4122);
            assert!(seen.insert(uuid), "duplicate uuid {uuid}");
        }
    }

    #[test]
    fn nullable_columns_are_always_null() {
        let mut nickname = column("nickname", "text", None);
        nickname.required = false;
        let mut owner = column(
            "owner_id",
            "uuid",
            Some(Constraint::ForeignKey(ForeignKeyRef {
                table: "users".to_string(),
                column: "id".to_string(),
            })),
        );
        owner.required = false;
        let mut payload = column("payload", "jsonb", None);
        payload.required = false;
        let notes = table("notes", vec![nickname, owner, payload]);

        let sampler = PopulatedRowIndex::default();
        let mut synth = ValueSynthesizer::new(options(), 1);
        for _ in 0..200 {
            let row = synth.synthesize_row(&notes, &sampler).expect("row");
            assert!(row.iter().all(SeedValue::is_null));
        }
    }

    #[test]
    fn foreign_key_without_committed_rows_fails() {
        let posts = table(
            "posts",
            vec![column(
                "user_id",
                "uuid",
                Some(Constraint::ForeignKey(ForeignKeyRef {
                    table: "users".to_string(),
                    column: "id".to_string(),
                })),
            )],
        );
        let sampler = PopulatedRowIndex::default();
        let mut synth = ValueSynthesizer::new(options(), 3);

        let err = synth.synthesize_row(&posts, &sampler).unwrap_err();
        match err {
            SeedError::EmptyReferencedTable {
                table,
                column,
                referenced_table,
                referenced_column,
            } => {
                assert_eq!(table, "posts");
                assert_eq!(column, "user_id");
                assert_eq!(referenced_table, "users");
                assert_eq!(referenced_column, "id");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn foreign_keys_sample_committed_values() {
        let users = table("users", vec![column("id", "integer", Some(Constraint::PrimaryKey))]);
        let posts = table(
            "posts",
            vec![column(
                "user_id",
                "integer",
                Some(Constraint::ForeignKey(ForeignKeyRef {
                    table: "users".to_string(),
                    column: "id".to_string(),
                })),
            )],
        );
        let schema = DatabaseSchema {
            database: None,
            tables: vec![users.clone(), posts.clone()],
            fingerprint: None,
        };
        let mut index = PopulatedRowIndex::for_schema(&schema);
        index
            .ingest(&users, &[0], vec![vec![SeedValue::Int(1234)]])
            .expect("ingest");

        let mut synth = ValueSynthesizer::new(options(), 9);
        let row = synth.synthesize_row(&posts, &index).expect("row");
        assert_eq!(row, vec![SeedValue::Int(1234)]);
    }

    #[test]
    fn type_rules_stay_in_range() {
        let mut title = column("title", "character varying", None);
        title.max_length = Some(8);
        let mood = Column {
            kind: ColumnKind::Enumeration {
                enum_type: EnumType {
                    schema: None,
                    name: "mood".to_string(),
                    labels: vec!["happy".to_string(), "sad".to_string()],
                },
            },
            ..column("mood", "USER-DEFINED", None)
        };
        let events = table(
            "events",
            vec![
                column("code", "text", Some(Constraint::PrimaryKey)),
                column("seq", "smallint", Some(Constraint::PrimaryKey)),
                column("attendees", "smallint", None),
                column("at", "timestamp with time zone", None),
                title,
                mood,
                column("is_public", "boolean", None),
            ],
        );
        let options = options();
        let sampler = PopulatedRowIndex::default();
        let mut synth = ValueSynthesizer::new(options.clone(), 5);

        for _ in 0..200 {
            let row = synth.synthesize_row(&events, &sampler).expect("row");
            let code = row[0].as_text().expect("code");
            assert_eq!(code.len(), 12);
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));

            let seq = row[1].as_i64().expect("seq");
            assert!((1000..=9999).contains(&seq));

            let attendees = row[2].as_i64().expect("attendees");
            assert!((1..=i16::MAX as i64).contains(&attendees));

            let at = row[3].as_timestamp().expect("at");
            assert!(at >= options.timestamp_floor && at <= options.timestamp_ceiling);

            assert!(row[4].as_text().expect("title").chars().count() <= 8);
            assert!(matches!(row[5].as_text().as_deref(), Some("happy" | "sad")));
            assert!(row[6].as_bool().is_some());
        }
    }

    #[test]
    fn text_tokens_respect_max_length() {
        let mut code = column("code", "character", Some(Constraint::PrimaryKey));
        code.max_length = Some(3);
        let codes = table("codes", vec![code]);
        let mut synth = ValueSynthesizer::new(options(), 11);
        let row = synth
            .synthesize_row(&codes, &PopulatedRowIndex::default())
            .expect("row");
        assert_eq!(row[0].as_text().map(|text| text.len()), Some(3));
    }

    #[test]
    fn column_name_heuristics_shape_text() {
        let people = table("people", vec![column("email", "text", None)]);
        let mut synth = ValueSynthesizer::new(options(), 21);
        let row = synth
            .synthesize_row(&people, &PopulatedRowIndex::default())
            .expect("row");
        assert!(row[0].as_text().expect("email").contains('@'));
    }

    #[test]
    fn unsupported_required_column_is_an_error() {
        let docs = table("docs", vec![column("payload", "jsonb", None)]);
        let mut synth = ValueSynthesizer::new(options(), 2);
        let err = synth
            .synthesize_row(&docs, &PopulatedRowIndex::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SeedError::UnsupportedColumnType { ref data_type, .. } if data_type == "jsonb"
        ));
    }

    #[test]
    fn same_seed_same_rows() {
        let users = table(
            "users",
            vec![
                column("id", "uuid", Some(Constraint::PrimaryKey)),
                column("name", "text", None),
                column("joined_at", "timestamp", None),
            ],
        );
        let sampler = PopulatedRowIndex::default();
        let mut first = ValueSynthesizer::for_table(options(), 99, "users");
        let mut second = ValueSynthesizer::for_table(options(), 99, "users");
        for _ in 0..10 {
            assert_eq!(
                first.synthesize_row(&users, &sampler).expect("row"),
                second.synthesize_row(&users, &sampler).expect("row")
            );
        }
        assert_ne!(hash_seed(99, "users"), hash_seed(99, "posts"));
    }
}
