use chrono::{Duration, NaiveDateTime, Utc};
use std::collections::BTreeMap;

use crate::api::middleware::AppError;
use crate::validation::SqlValidator;

pub const DEFAULT_LIMIT: u32 = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_SORT_FIELD: &str = "data_time";

/// Inclusive time bounds on `data_time`. `None` on either side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl TimeWindow {
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// A bound at the Unix epoch is a zero value and means "unbounded".
    pub fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        let non_zero = |ts: Option<NaiveDateTime>| ts.filter(|t| t.and_utc().timestamp() != 0);
        Self {
            start: non_zero(start),
            end: non_zero(end),
        }
    }

    pub fn last_hours(hours: i64) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            start: Some(now - Duration::hours(hours)),
            end: Some(now),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Columns with an exact-match filter. Declaration order is predicate order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EqualityField {
    Category,
    UserId,
    AppId,
    Platform,
    Os,
    Action,
    Version,
}

impl EqualityField {
    pub fn column(&self) -> &'static str {
        match self {
            EqualityField::Category => "category",
            EqualityField::UserId => "user_id",
            EqualityField::AppId => "app_id",
            EqualityField::Platform => "platform",
            EqualityField::Os => "os",
            EqualityField::Action => "action",
            EqualityField::Version => "version",
        }
    }
}

/// Keys accepted in the free-form filter map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FilterKey {
    /// Substring match on the message slot `d1`.
    Msg,
    DeviceId,
    Model,
}

impl FilterKey {
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "msg" => Some(FilterKey::Msg),
            "device_id" => Some(FilterKey::DeviceId),
            "model" => Some(FilterKey::Model),
            _ => None,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            FilterKey::Msg => "d1",
            FilterKey::DeviceId => "device_id",
            FilterKey::Model => "model",
        }
    }

    pub fn is_substring(&self) -> bool {
        matches!(self, FilterKey::Msg)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Exactly `"asc"` or `"desc"`; anything else is not a direction.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Normalised filter, sort and pagination request for the analytics table.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub window: TimeWindow,
    pub limit: u32,
    pub offset: u64,
    equality: BTreeMap<EqualityField, String>,
    filters: BTreeMap<FilterKey, String>,
    sort_field: &'static str,
    sort_direction: SortDirection,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            window: TimeWindow::unbounded(),
            limit: DEFAULT_LIMIT,
            offset: 0,
            equality: BTreeMap::new(),
            filters: BTreeMap::new(),
            sort_field: DEFAULT_SORT_FIELD,
            sort_direction: SortDirection::Desc,
        }
    }
}

impl QueryOptions {
    /// Defaults used by caller-facing endpoints: the last 24 hours.
    pub fn last_day() -> Self {
        Self {
            window: TimeWindow::last_hours(24),
            ..Self::default()
        }
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    /// Set or clear (empty value) an exact-match filter.
    pub fn set_equality(&mut self, field: EqualityField, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            self.equality.remove(&field);
        } else {
            self.equality.insert(field, value.to_string());
        }
    }

    pub fn with_equality(mut self, field: EqualityField, value: &str) -> Self {
        self.set_equality(field, value);
        self
    }

    pub fn equality(&self, field: EqualityField) -> Option<&str> {
        self.equality.get(&field).map(String::as_str)
    }

    pub fn equality_filters(&self) -> impl Iterator<Item = (EqualityField, &str)> {
        self.equality.iter().map(|(field, value)| (*field, value.as_str()))
    }

    /// Add a free-form filter. Unknown keys and empty values are ignored.
    pub fn apply_filter(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        if let Some(key) = FilterKey::parse(key) {
            self.filters.insert(key, value.to_string());
        }
    }

    pub fn filters(&self) -> impl Iterator<Item = (FilterKey, &str)> {
        self.filters.iter().map(|(key, value)| (*key, value.as_str()))
    }

    pub fn set_sort_field(&mut self, field: &str) -> Result<(), AppError> {
        if field.trim().is_empty() {
            return Ok(());
        }
        self.sort_field = SqlValidator::validate_sort_field(field)?;
        Ok(())
    }

    pub fn sort_field(&self) -> &'static str {
        self.sort_field
    }

    /// Only an exact `"asc"`/`"desc"` changes the direction.
    pub fn set_sort_direction(&mut self, raw: &str) {
        if let Some(direction) = SortDirection::parse(raw) {
            self.sort_direction = direction;
        }
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    /// Positive limits replace the current one.
    pub fn set_limit(&mut self, limit: i64) {
        if limit > 0 {
            self.limit = u32::try_from(limit).unwrap_or(u32::MAX);
        }
    }

    pub fn set_offset(&mut self, offset: i64) {
        if offset >= 0 {
            self.offset = offset as u64;
        }
    }

    /// Page-based pagination: page defaults to 1, page size to
    /// [`DEFAULT_PAGE_SIZE`] and is capped at [`MAX_PAGE_SIZE`].
    pub fn paginate(&mut self, page: Option<i64>, page_size: Option<i64>) {
        let page = page.filter(|p| *p > 0).unwrap_or(1) as u64;
        let size = page_size
            .filter(|s| *s > 0)
            .map(|s| s.min(i64::from(MAX_PAGE_SIZE)) as u32)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        self.limit = size;
        self.offset = (page - 1).saturating_mul(u64::from(size));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn test_defaults() {
        let opts = QueryOptions::default();
        assert_eq!(opts.limit, 100);
        assert_eq!(opts.offset, 0);
        assert_eq!(opts.sort_field(), "data_time");
        assert_eq!(opts.sort_direction(), SortDirection::Desc);
        assert!(opts.window.is_unbounded());

        let day = QueryOptions::last_day();
        let (start, end) = (day.window.start.unwrap(), day.window.end.unwrap());
        assert_eq!((end - start).num_hours(), 24);
    }

    #[test]
    fn test_sort_direction_requires_exact_value() {
        let mut opts = QueryOptions::default();
        for raw in ["ASC", "Desc", "up", "", "asc "] {
            opts.set_sort_direction(raw);
            assert_eq!(opts.sort_direction(), SortDirection::Desc, "input {:?}", raw);
        }
        opts.set_sort_direction("asc");
        assert_eq!(opts.sort_direction(), SortDirection::Asc);
        opts.set_sort_direction("DESC");
        assert_eq!(opts.sort_direction(), SortDirection::Asc);
    }

    #[test]
    fn test_sort_field_allow_list() {
        let mut opts = QueryOptions::default();
        assert!(opts.set_sort_field("value").is_ok());
        assert_eq!(opts.sort_field(), "value");
        assert!(opts.set_sort_field("value DESC; DROP TABLE kv_7").is_err());
        assert_eq!(opts.sort_field(), "value");
        assert!(opts.set_sort_field("").is_ok());
        assert_eq!(opts.sort_field(), "value");
    }

    #[test]
    fn test_page_size_is_capped() {
        let mut opts = QueryOptions::default();
        opts.paginate(Some(3), Some(500));
        assert_eq!(opts.limit, 100);
        assert_eq!(opts.offset, 200);

        opts.paginate(None, None);
        assert_eq!(opts.limit, 20);
        assert_eq!(opts.offset, 0);

        opts.paginate(Some(-1), Some(0));
        assert_eq!((opts.limit, opts.offset), (20, 0));
    }

    #[test]
    fn test_unknown_filter_keys_ignored() {
        let mut opts = QueryOptions::default();
        opts.apply_filter("msg", "timeout");
        opts.apply_filter("color", "red");
        opts.apply_filter("model", "");
        let filters: Vec<_> = opts.filters().collect();
        assert_eq!(filters, vec![(FilterKey::Msg, "timeout")]);
    }

    #[test]
    fn test_equality_empty_value_clears() {
        let mut opts = QueryOptions::default().with_equality(EqualityField::Os, "iOS 16");
        assert_eq!(opts.equality(EqualityField::Os), Some("iOS 16"));
        opts.set_equality(EqualityField::Os, "  ");
        assert_eq!(opts.equality(EqualityField::Os), None);
    }

    #[test]
    fn test_epoch_bound_is_unbounded() {
        let epoch = DateTime::from_timestamp(0, 0).unwrap().naive_utc();
        let later = DateTime::from_timestamp(1_700_000_000, 0).unwrap().naive_utc();
        let window = TimeWindow::new(Some(epoch), Some(later));
        assert_eq!(window.start, None);
        assert_eq!(window.end, Some(later));
    }

    #[test]
    fn test_limit_and_offset_ignore_invalid() {
        let mut opts = QueryOptions::default();
        opts.set_limit(0);
        opts.set_offset(-4);
        assert_eq!((opts.limit, opts.offset), (100, 0));
        opts.set_limit(25);
        opts.set_offset(50);
        assert_eq!((opts.limit, opts.offset), (25, 50));
    }
}
