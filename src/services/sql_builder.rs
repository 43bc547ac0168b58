// Translates QueryOptions into parameterized statements against the
// analytics table. Every caller-supplied value is bound as a parameter; the
// only interpolated pieces are the validated table name, schema columns and
// the sort direction keyword.
use chrono::NaiveDateTime;

use crate::api::middleware::AppError;
use crate::models::{EqualityField, Projection, QueryOptions, TimeWindow};
use crate::validation::SqlValidator;

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    UInt(u64),
    Timestamp(NaiveDateTime),
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl SqlStatement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Statement text with no bound parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }
}

/// `WHERE` clause text plus its parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// A page query and, when requested, the matching filtered count.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub data: SqlStatement,
    pub count: Option<SqlStatement>,
}

#[derive(Debug, Clone)]
pub struct SqlBuilder {
    table: String,
}

impl SqlBuilder {
    pub fn new(table: &str) -> Result<Self, AppError> {
        SqlValidator::validate_identifier(table)?;
        Ok(Self {
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// One predicate per populated option, AND-joined; `WHERE 1=1` when
    /// nothing applies.
    pub fn where_clause(&self, opts: &QueryOptions) -> WhereClause {
        let mut conditions: Vec<String> = Vec::new();
        let mut params = Vec::new();

        if let Some(start) = opts.window.start {
            conditions.push("data_time >= ?".to_string());
            params.push(SqlParam::Timestamp(start));
        }
        if let Some(end) = opts.window.end {
            conditions.push("data_time <= ?".to_string());
            params.push(SqlParam::Timestamp(end));
        }

        for (field, value) in opts.equality_filters() {
            conditions.push(format!("{} = ?", field.column()));
            params.push(SqlParam::from(value));
        }

        for (key, value) in opts.filters() {
            if key.is_substring() {
                conditions.push(format!("{} LIKE ?", key.column()));
                params.push(SqlParam::Text(format!("%{}%", value)));
            } else {
                conditions.push(format!("{} = ?", key.column()));
                params.push(SqlParam::from(value));
            }
        }

        let sql = if conditions.is_empty() {
            "WHERE 1=1".to_string()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        WhereClause { sql, params }
    }

    /// `SELECT <projection> ... ORDER BY ... LIMIT ? OFFSET ?`, plus a
    /// `COUNT(*)` over the same predicates when `with_count` is set.
    pub fn build(&self, opts: &QueryOptions, projection: Projection, with_count: bool) -> BuiltQuery {
        let filter = self.where_clause(opts);

        let count = with_count.then(|| {
            SqlStatement::new(
                format!("SELECT COUNT(*) FROM {} {}", self.table, filter.sql),
                filter.params.clone(),
            )
        });

        let mut params = filter.params;
        params.push(SqlParam::UInt(u64::from(opts.limit)));
        params.push(SqlParam::UInt(opts.offset));

        let data = SqlStatement::new(
            format!(
                "SELECT {} FROM {} {} ORDER BY {} {} LIMIT ? OFFSET ?",
                projection.select_list(),
                self.table,
                filter.sql,
                opts.sort_field(),
                opts.sort_direction().as_sql()
            ),
            params,
        );

        BuiltQuery { data, count }
    }

    pub fn whole_table_count(&self) -> SqlStatement {
        SqlStatement::raw(format!("SELECT COUNT(*) FROM {}", self.table))
    }

    pub fn record_by_id(&self, id: &str) -> SqlStatement {
        SqlStatement::new(
            format!(
                "SELECT {} FROM {} WHERE id = ? LIMIT 1",
                Projection::Full.select_list(),
                self.table
            ),
            vec![SqlParam::from(id)],
        )
    }

    pub fn select_all(&self, limit: u32, offset: u64) -> SqlStatement {
        SqlStatement::new(
            format!("SELECT * FROM {} LIMIT ? OFFSET ?", self.table),
            vec![SqlParam::UInt(u64::from(limit)), SqlParam::UInt(offset)],
        )
    }

    /// `SELECT <select> FROM <table> WHERE ... <tail>`. `select` and `tail`
    /// are fixed fragments, never caller input.
    fn aggregate(&self, select: &str, opts: &QueryOptions, tail: &str) -> SqlStatement {
        let filter = self.where_clause(opts);
        SqlStatement::new(
            format!("SELECT {} FROM {} {} {}", select, self.table, filter.sql, tail)
                .trim_end()
                .to_string(),
            filter.params,
        )
    }

    pub fn event_counts(&self, window: TimeWindow) -> SqlStatement {
        let opts = QueryOptions::default().with_window(window);
        self.aggregate(
            "category, action, COUNT(*) AS count",
            &opts,
            "GROUP BY category, action ORDER BY count DESC LIMIT 100",
        )
    }

    pub fn user_distribution(&self, window: TimeWindow) -> SqlStatement {
        let opts = QueryOptions::default().with_window(window);
        let filter = self.where_clause(&opts);
        let sql = format!(
            "WITH total AS (SELECT COUNT(DISTINCT user_id) AS total_users FROM {table} {filter}) \
             SELECT os, COUNT(DISTINCT user_id) AS users, \
             ROUND(COUNT(DISTINCT user_id) * 100.0 / total_users, 2) AS percent \
             FROM {table}, total {filter} GROUP BY os, total_users ORDER BY users DESC",
            table = self.table,
            filter = filter.sql
        );
        let mut params = filter.params.clone();
        params.extend(filter.params);
        SqlStatement::new(sql, params)
    }

    /// Grouped count of one schema column, most frequent first.
    pub fn top_values(&self, column: &'static str, opts: &QueryOptions, limit: u32) -> SqlStatement {
        self.aggregate(
            &format!("{} AS item, COUNT(*) AS count", column),
            opts,
            &format!("GROUP BY {} ORDER BY count DESC LIMIT {}", column, limit),
        )
    }

    pub fn network_types(&self, opts: &QueryOptions) -> SqlStatement {
        self.aggregate(
            "d38 AS network_type, COUNT(*) AS count",
            opts,
            "GROUP BY d38 ORDER BY count DESC",
        )
    }

    pub fn response_times(&self, opts: &QueryOptions) -> SqlStatement {
        self.aggregate(
            "AVG(v1) AS avg_total, AVG(v2) AS avg_dns, AVG(v3) AS avg_tcp, \
             AVG(v4) AS avg_request, AVG(v5) AS avg_response",
            opts,
            "",
        )
    }

    pub fn region_performance(&self, opts: &QueryOptions) -> SqlStatement {
        self.aggregate(
            "d40 AS region, AVG(v1) AS avg_total, COUNT(*) AS count",
            opts,
            "GROUP BY d40 ORDER BY count DESC LIMIT 10",
        )
    }

    pub fn hourly_performance(&self, opts: &QueryOptions) -> SqlStatement {
        self.aggregate(
            "toStartOfHour(data_time) AS hour, AVG(v1) AS avg_total, COUNT(*) AS count",
            opts,
            "GROUP BY hour ORDER BY hour",
        )
    }
}

/// Options for the network statistics family: category pinned to the
/// network performance event.
pub fn network_options(opts: &QueryOptions) -> QueryOptions {
    opts.clone()
        .with_equality(EqualityField::Category, "PERF_NET_SSE")
}

/// Options for the iOS device statistics family.
pub fn ios_options(opts: &QueryOptions) -> QueryOptions {
    opts.clone().with_equality(EqualityField::Platform, "ios")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn builder() -> SqlBuilder {
        SqlBuilder::new("kv_7").unwrap()
    }

    #[test]
    fn test_rejects_bad_table() {
        assert!(SqlBuilder::new("kv_7 WHERE 1=1").is_err());
    }

    #[test]
    fn test_no_predicates_uses_tautology() {
        let clause = builder().where_clause(&QueryOptions::default());
        assert_eq!(clause.sql, "WHERE 1=1");
        assert!(clause.params.is_empty());
    }

    #[test]
    fn test_time_only_predicates() {
        let cases = [
            (Some(ts(1)), Some(ts(2)), "WHERE data_time >= ? AND data_time <= ?", 2),
            (Some(ts(1)), None, "WHERE data_time >= ?", 1),
            (None, Some(ts(2)), "WHERE data_time <= ?", 1),
            (None, None, "WHERE 1=1", 0),
        ];
        for (start, end, expected, count) in cases {
            let opts = QueryOptions::default().with_window(TimeWindow::new(start, end));
            let clause = builder().where_clause(&opts);
            assert_eq!(clause.sql, expected);
            assert_eq!(clause.params.len(), count);
        }
    }

    #[test]
    fn test_predicate_order_and_binding() {
        let mut opts = QueryOptions::default()
            .with_window(TimeWindow::new(Some(ts(1)), None))
            .with_equality(EqualityField::Version, "1.2.0")
            .with_equality(EqualityField::Category, "ERROR")
            .with_equality(EqualityField::Platform, "iOS");
        opts.apply_filter("model", "iPhone 14");
        opts.apply_filter("msg", "x' OR '1'='1");

        let clause = builder().where_clause(&opts);
        assert_eq!(
            clause.sql,
            "WHERE data_time >= ? AND category = ? AND platform = ? AND version = ? \
             AND d1 LIKE ? AND model = ?"
        );
        assert_eq!(
            clause.params,
            vec![
                SqlParam::Timestamp(ts(1)),
                SqlParam::Text("ERROR".into()),
                SqlParam::Text("iOS".into()),
                SqlParam::Text("1.2.0".into()),
                SqlParam::Text("%x' OR '1'='1%".into()),
                SqlParam::Text("iPhone 14".into()),
            ]
        );
        assert!(!clause.sql.contains("OR"));
    }

    #[test]
    fn test_data_and_count_share_parameters() {
        let mut opts = QueryOptions::default()
            .with_window(TimeWindow::new(Some(ts(1)), Some(ts(3))))
            .with_equality(EqualityField::UserId, "66412");
        opts.apply_filter("device_id", "DV1");
        opts.set_limit(25);
        opts.set_offset(50);

        let built = builder().build(&opts, Projection::Listing, true);
        let count = built.count.expect("count requested");
        let data = built.data;

        assert_eq!(data.params.len(), count.params.len() + 2);
        assert_eq!(&data.params[..count.params.len()], count.params.as_slice());
        assert_eq!(
            &data.params[count.params.len()..],
            &[SqlParam::UInt(25), SqlParam::UInt(50)]
        );
        assert!(count.sql.starts_with("SELECT COUNT(*) FROM kv_7 WHERE"));
        assert!(!count.sql.contains("LIMIT"));
    }

    #[test]
    fn test_order_and_page_assembly() {
        let mut opts = QueryOptions::default();
        opts.set_sort_field("value").unwrap();
        opts.set_sort_direction("asc");
        let built = builder().build(&opts, Projection::Core, false);
        assert!(built.count.is_none());
        assert!(built.data.sql.starts_with("SELECT data_time, write_time"));
        assert!(built
            .data
            .sql
            .ends_with("FROM kv_7 WHERE 1=1 ORDER BY value ASC LIMIT ? OFFSET ?"));
    }

    #[test]
    fn test_user_distribution_binds_window_twice() {
        let stmt = builder().user_distribution(TimeWindow::new(Some(ts(1)), Some(ts(2))));
        assert_eq!(stmt.params.len(), 4);
        assert_eq!(stmt.sql.matches('?').count(), 4);
    }

    #[test]
    fn test_network_options_pin_category() {
        let opts = network_options(&QueryOptions::default());
        let stmt = builder().network_types(&opts);
        assert!(stmt.sql.contains("WHERE category = ?"));
        assert_eq!(stmt.params, vec![SqlParam::Text("PERF_NET_SSE".into())]);
    }
}
