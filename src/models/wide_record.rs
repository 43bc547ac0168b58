// Wide analytics record, driven by a single schema description so the
// SELECT list and the scan targets can never drift apart.
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;

use crate::models::row::{format_timestamp, parse_timestamp, CellValue, GenericRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Timestamp,
    Text,
    Integer,
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
}

/// Identity and dimension columns, in table order.
const PRIMARY_FIELDS: &[(&str, FieldType)] = &[
    ("data_time", FieldType::Timestamp),
    ("write_time", FieldType::Timestamp),
    ("time_hour", FieldType::Text),
    ("id", FieldType::Text),
    ("time", FieldType::Integer),
    ("extra", FieldType::Text),
    ("entrance_time", FieldType::Integer),
    ("entrance_id", FieldType::Text),
    ("stamp", FieldType::Integer),
    ("app_id", FieldType::Text),
    ("platform", FieldType::Text),
    ("user_id", FieldType::Text),
    ("version", FieldType::Text),
    ("build_id", FieldType::Text),
    ("device_id", FieldType::Text),
    ("model", FieldType::Text),
    ("os", FieldType::Text),
    ("os_ver", FieldType::Text),
    ("sdk_ver", FieldType::Text),
    ("category", FieldType::Text),
    ("action", FieldType::Text),
    ("label", FieldType::Text),
    ("state", FieldType::Text),
    ("value", FieldType::Integer),
];

/// Numbered extension slots: (prefix, slot count, slot type).
const SLOT_FAMILIES: &[(&str, usize, FieldType)] = &[
    ("d", 40, FieldType::Text),
    ("v", 40, FieldType::Integer),
    ("info", 10, FieldType::Text),
    ("ud", 20, FieldType::Text),
    ("uv", 10, FieldType::Integer),
    ("sd", 20, FieldType::Text),
    ("sv", 10, FieldType::Integer),
];

const LISTING_FIELDS: &[&str] = &[
    "data_time",
    "write_time",
    "time_hour",
    "id",
    "time",
    "platform",
    "category",
    "action",
    "os",
    "user_id",
    "app_id",
    "version",
    "device_id",
    "model",
    "os_ver",
    "d1",
    "d2",
    "d3",
    "label",
    "state",
    "value",
    "extra",
    "entrance_time",
    "entrance_id",
];

const LOG_FIELDS: &[&str] = &[
    "data_time",
    "write_time",
    "time_hour",
    "id",
    "time",
    "platform",
    "category",
    "action",
    "os",
    "user_id",
    "app_id",
    "version",
    "d1",
    "d2",
    "d3",
];

pub struct WideSchema {
    fields: Vec<FieldDef>,
    index: HashMap<String, usize>,
}

impl WideSchema {
    fn build() -> Self {
        let mut fields: Vec<FieldDef> = PRIMARY_FIELDS
            .iter()
            .map(|(name, field_type)| FieldDef {
                name: (*name).to_string(),
                field_type: *field_type,
            })
            .collect();

        for (prefix, count, field_type) in SLOT_FAMILIES {
            fields.extend((1..=*count).map(|slot| FieldDef {
                name: format!("{}{}", prefix, slot),
                field_type: *field_type,
            }));
        }

        let index = fields
            .iter()
            .enumerate()
            .map(|(idx, field)| (field.name.clone(), idx))
            .collect();

        Self { fields, index }
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.index_of(name).map(|idx| &self.fields[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Canonical `&'static str` for a column name, if the schema knows it.
    pub fn canonical(&'static self, name: &str) -> Option<&'static str> {
        self.field(name).map(|field| field.name.as_str())
    }

    pub fn primary_fields(&self) -> &[FieldDef] {
        &self.fields[..PRIMARY_FIELDS.len()]
    }
}

pub static WIDE_SCHEMA: Lazy<WideSchema> = Lazy::new(WideSchema::build);

/// Column subsets the analytics table is read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Every schema column in schema order.
    Full,
    /// The primary identity/dimension columns.
    Core,
    /// Primary columns plus the first message slots, for record listings.
    Listing,
    /// Reduced column set for log browsing.
    Logs,
}

impl Projection {
    pub fn columns(&self) -> Vec<&'static str> {
        let schema: &'static WideSchema = &WIDE_SCHEMA;
        match self {
            Projection::Full => schema.fields().iter().map(|f| f.name.as_str()).collect(),
            Projection::Core => schema
                .primary_fields()
                .iter()
                .map(|f| f.name.as_str())
                .collect(),
            Projection::Listing => LISTING_FIELDS.to_vec(),
            Projection::Logs => LOG_FIELDS.to_vec(),
        }
    }

    pub fn select_list(&self) -> String {
        self.columns().join(", ")
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ScanError {
    #[error("column {column} expects {expected:?}, got {found}")]
    TypeMismatch {
        column: String,
        expected: FieldType,
        found: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Timestamp(Option<NaiveDateTime>),
    Text(String),
    Integer(i64),
}

impl FieldValue {
    fn empty(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Timestamp => FieldValue::Timestamp(None),
            FieldType::Text => FieldValue::Text(String::new()),
            FieldType::Integer => FieldValue::Integer(0),
        }
    }

    fn matches(&self, field_type: FieldType) -> bool {
        matches!(
            (self, field_type),
            (FieldValue::Timestamp(_), FieldType::Timestamp)
                | (FieldValue::Text(_), FieldType::Text)
                | (FieldValue::Integer(_), FieldType::Integer)
        )
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Timestamp(Some(ts)) => json!(format_timestamp(ts)),
            FieldValue::Timestamp(None) => Value::Null,
            FieldValue::Text(s) => json!(s),
            FieldValue::Integer(i) => json!(i),
        }
    }

    pub fn to_cell(&self) -> CellValue {
        match self {
            FieldValue::Timestamp(Some(ts)) => CellValue::Timestamp(*ts),
            FieldValue::Timestamp(None) => CellValue::Null,
            FieldValue::Text(s) => CellValue::Text(s.clone()),
            FieldValue::Integer(i) => CellValue::Int(*i),
        }
    }

    /// Coerce a driver cell into the slot type of `field`.
    fn from_cell(field: &FieldDef, cell: &CellValue) -> Result<Self, ScanError> {
        let mismatch = |found: &CellValue| ScanError::TypeMismatch {
            column: field.name.clone(),
            expected: field.field_type,
            found: format!("{:?}", found),
        };

        if matches!(cell, CellValue::Null) {
            return Ok(Self::empty(field.field_type));
        }

        match field.field_type {
            FieldType::Timestamp => match cell {
                CellValue::Timestamp(ts) => Ok(FieldValue::Timestamp(Some(*ts))),
                CellValue::Bytes(_) | CellValue::Text(_) => cell
                    .as_text()
                    .and_then(|raw| parse_timestamp(&raw))
                    .map(|ts| FieldValue::Timestamp(Some(ts)))
                    .ok_or_else(|| mismatch(cell)),
                CellValue::Int(_) | CellValue::UInt(_) => cell
                    .as_i64()
                    .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
                    .map(|dt| FieldValue::Timestamp(Some(dt.naive_utc())))
                    .ok_or_else(|| mismatch(cell)),
                _ => Err(mismatch(cell)),
            },
            FieldType::Text => cell
                .as_text()
                .map(FieldValue::Text)
                .ok_or_else(|| mismatch(cell)),
            FieldType::Integer => match cell {
                CellValue::Float(f) if f.fract() != 0.0 => Err(mismatch(cell)),
                CellValue::Bool(b) => Ok(FieldValue::Integer(i64::from(*b))),
                CellValue::Timestamp(_) => Err(mismatch(cell)),
                _ => cell
                    .as_i64()
                    .map(FieldValue::Integer)
                    .ok_or_else(|| mismatch(cell)),
            },
        }
    }
}

/// One row of the analytics table. Values are stored in schema order;
/// columns a projection did not read keep their empty value.
#[derive(Debug, Clone, PartialEq)]
pub struct WideRecord {
    values: Vec<FieldValue>,
}

impl Default for WideRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl WideRecord {
    pub fn new() -> Self {
        Self {
            values: WIDE_SCHEMA
                .fields()
                .iter()
                .map(|f| FieldValue::empty(f.field_type))
                .collect(),
        }
    }

    /// Scan a generic row into the record by column name. Columns the schema
    /// does not know are ignored; a value that cannot be coerced to its
    /// slot type fails the whole row.
    pub fn from_row(row: &GenericRow) -> Result<Self, ScanError> {
        let mut record = Self::new();
        for (column, cell) in row.iter() {
            if let Some(idx) = WIDE_SCHEMA.index_of(column) {
                let field = &WIDE_SCHEMA.fields()[idx];
                record.values[idx] = FieldValue::from_cell(field, cell)?;
            }
        }
        Ok(record)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        WIDE_SCHEMA.index_of(name).map(|idx| &self.values[idx])
    }

    pub fn text(&self, name: &str) -> &str {
        match self.get(name) {
            Some(FieldValue::Text(s)) => s,
            _ => "",
        }
    }

    pub fn integer(&self, name: &str) -> i64 {
        match self.get(name) {
            Some(FieldValue::Integer(i)) => *i,
            _ => 0,
        }
    }

    pub fn timestamp(&self, name: &str) -> Option<NaiveDateTime> {
        match self.get(name) {
            Some(FieldValue::Timestamp(ts)) => *ts,
            _ => None,
        }
    }

    /// Store `value` under `name`. Unknown names and values of the wrong
    /// slot type are ignored; returns whether the value was stored.
    pub fn set(&mut self, name: &str, value: FieldValue) -> bool {
        match WIDE_SCHEMA.index_of(name) {
            Some(idx) if value.matches(WIDE_SCHEMA.fields()[idx].field_type) => {
                self.values[idx] = value;
                true
            }
            _ => false,
        }
    }

    pub fn with_text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, FieldValue::Text(value.into()));
        self
    }

    pub fn with_integer(mut self, name: &str, value: i64) -> Self {
        self.set(name, FieldValue::Integer(value));
        self
    }

    pub fn with_timestamp(mut self, name: &str, value: NaiveDateTime) -> Self {
        self.set(name, FieldValue::Timestamp(Some(value)));
        self
    }

    pub fn id(&self) -> &str {
        self.text("id")
    }

    pub fn data_time(&self) -> Option<NaiveDateTime> {
        self.timestamp("data_time")
    }

    /// Same record as an ordered generic row covering every schema column.
    pub fn to_generic_row(&self) -> GenericRow {
        WIDE_SCHEMA
            .fields()
            .iter()
            .zip(&self.values)
            .fold(GenericRow::new(), |row, (field, value)| {
                row.with(field.name.clone(), value.to_cell())
            })
    }
}

impl Serialize for WideRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in WIDE_SCHEMA.fields().iter().zip(&self.values) {
            map.serialize_entry(&field.name, &value.to_json())?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_schema_layout() {
        assert_eq!(WIDE_SCHEMA.len(), 24 + 40 + 40 + 10 + 20 + 10 + 20 + 10);
        assert_eq!(WIDE_SCHEMA.index_of("data_time"), Some(0));
        assert_eq!(WIDE_SCHEMA.index_of("d1"), Some(24));
        assert_eq!(WIDE_SCHEMA.index_of("v1"), Some(64));
        assert!(WIDE_SCHEMA.contains("sv10"));
        assert!(!WIDE_SCHEMA.contains("sv11"));
        assert_eq!(
            WIDE_SCHEMA.field("uv3").map(|f| f.field_type),
            Some(FieldType::Integer)
        );
    }

    #[test]
    fn test_projection_columns_are_schema_members() {
        for projection in [
            Projection::Full,
            Projection::Core,
            Projection::Listing,
            Projection::Logs,
        ] {
            for column in projection.columns() {
                assert!(WIDE_SCHEMA.contains(column), "{} not in schema", column);
            }
        }
        assert!(Projection::Core.select_list().starts_with("data_time, write_time"));
    }

    #[test]
    fn test_from_row_coerces_driver_values() {
        let row = GenericRow::new()
            .with("data_time", CellValue::Bytes(b"2024-01-02 03:04:05".to_vec()))
            .with("id", CellValue::Bytes(b"abc".to_vec()))
            .with("time", CellValue::Bytes(b"1700000000000".to_vec()))
            .with("value", CellValue::UInt(7))
            .with("label", CellValue::Int(3))
            .with("state", CellValue::Null)
            .with("not_a_column", CellValue::Int(1));

        let record = WideRecord::from_row(&row).unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(record.data_time(), Some(expected));
        assert_eq!(record.id(), "abc");
        assert_eq!(record.integer("time"), 1_700_000_000_000);
        assert_eq!(record.integer("value"), 7);
        assert_eq!(record.text("label"), "3");
        assert_eq!(record.text("state"), "");
    }

    #[test]
    fn test_from_row_rejects_bad_integer() {
        let row = GenericRow::new().with("time", CellValue::Text("soon".into()));
        let err = WideRecord::from_row(&row).unwrap_err();
        assert!(matches!(err, ScanError::TypeMismatch { ref column, .. } if column == "time"));
    }

    #[test]
    fn test_set_ignores_wrong_type_and_unknown_name() {
        let mut record = WideRecord::new();
        assert!(!record.set("time", FieldValue::Text("x".into())));
        assert!(!record.set("nope", FieldValue::Integer(1)));
        assert!(record.set("v5", FieldValue::Integer(9)));
        assert_eq!(record.integer("v5"), 9);
    }

    #[test]
    fn test_serializes_every_field_in_schema_order() {
        let record = WideRecord::new().with_text("platform", "ios");
        let value = serde_json::to_value(&record).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), WIDE_SCHEMA.len());
        assert_eq!(object["platform"], json!("ios"));
        assert_eq!(object["data_time"], Value::Null);

        let serialized = serde_json::to_string(&record).unwrap();
        assert!(serialized.starts_with(r#"{"data_time":null,"write_time":null"#));
    }

    #[test]
    fn test_generic_row_round_keeps_names() {
        let row = WideRecord::new().with_integer("v1", 5).to_generic_row();
        assert_eq!(row.len(), WIDE_SCHEMA.len());
        assert_eq!(row.get("v1"), Some(&CellValue::Int(5)));
    }
}
