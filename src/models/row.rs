// Dynamically typed rows for statements whose shape is only known at run time
// (ad-hoc SQL, DESCRIBE output, SELECT * on arbitrary tables).
use chrono::{NaiveDateTime, SecondsFormat};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{json, Value};

/// Text layout used for every timestamp that leaves the service.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse the textual timestamp forms the store and callers use.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DD HH:MM`.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// A single cell as returned by the driver, tagged with its runtime type.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bytes(Vec<u8>),
    Text(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Timestamp(NaiveDateTime),
}

impl CellValue {
    /// Wire representation: byte sequences decode to text, timestamps use
    /// [`format_timestamp`], everything else passes through.
    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Null => Value::Null,
            CellValue::Bytes(bytes) => json!(String::from_utf8_lossy(bytes)),
            CellValue::Text(s) => json!(s),
            CellValue::Int(i) => json!(i),
            CellValue::UInt(u) => json!(u),
            CellValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CellValue::Bool(b) => json!(b),
            CellValue::Timestamp(ts) => json!(format_timestamp(ts)),
        }
    }

    /// Best-effort textual view, used when a caller needs a scalar string.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Int(i) => Some(i.to_string()),
            CellValue::UInt(u) => Some(u.to_string()),
            CellValue::Float(f) => Some(f.to_string()),
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::Timestamp(ts) => Some(format_timestamp(ts)),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Int(i) => Some(*i),
            CellValue::UInt(u) => i64::try_from(*u).ok(),
            CellValue::Float(f) => Some(*f as i64),
            CellValue::Bytes(_) | CellValue::Text(_) => self.as_text()?.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::UInt(u) => Some(*u as f64),
            CellValue::Float(f) => Some(*f),
            CellValue::Bytes(_) | CellValue::Text(_) => self.as_text()?.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Raw statement output: column names discovered from the statement plus the
/// cells of every row, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First cell of the first row, the shape of every `COUNT(*)` result.
    pub fn scalar(&self) -> Option<&CellValue> {
        self.rows.first().and_then(|row| row.first())
    }
}

/// Ordered `(column, value)` pairs. Serializes as a JSON object that keeps
/// the column order of the statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericRow {
    cells: Vec<(String, CellValue)>,
}

impl GenericRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: CellValue) {
        self.cells.push((column.into(), value));
    }

    pub fn with(mut self, column: impl Into<String>, value: CellValue) -> Self {
        self.push(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn to_json(&self) -> Value {
        let map = self
            .cells
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        Value::Object(map)
    }
}

impl Serialize for GenericRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, &value.to_json())?;
        }
        map.end()
    }
}
