use serde::{Deserialize, Serialize};

/// Where a response's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Live,
    Mock,
}

impl Source {
    pub fn is_mock(&self) -> bool {
        matches!(self, Source::Mock)
    }
}

/// A payload tagged with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub data: T,
    pub source: Source,
}

impl<T> Sourced<T> {
    pub fn live(data: T) -> Self {
        Self {
            data,
            source: Source::Live,
        }
    }

    pub fn mock(data: T) -> Self {
        Self {
            data,
            source: Source::Mock,
        }
    }

    pub fn is_mock(&self) -> bool {
        self.source.is_mock()
    }
}

/// `{value, text}` pair for selection lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
}

impl SelectOption {
    pub fn same(value: &str) -> Self {
        Self {
            value: value.to_string(),
            text: value.to_string(),
        }
    }
}

/// `{key, label}` pair describing a displayable field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldLabel {
    pub key: String,
    pub label: String,
}

/// Body of `POST /api/sql`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlRequest {
    pub query: String,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
}
