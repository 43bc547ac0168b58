use once_cell::sync::Lazy;
use regex::Regex;
use sqlparser::ast::Statement;
use sqlparser::dialect::ClickHouseDialect;
use sqlparser::parser::Parser;

use crate::api::middleware::AppError;
use crate::models::wide_record::WIDE_SCHEMA;

/// Largest page number the ad-hoc gateway will format into SQL text.
pub const MAX_PAGE: i64 = 100_000;
/// Largest page size the ad-hoc gateway will format into SQL text.
pub const MAX_GATEWAY_PAGE_SIZE: i64 = 1_000;
pub const DEFAULT_GATEWAY_PAGE_SIZE: i64 = 10;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").expect("identifier pattern")
});

static LIMIT_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bLIMIT\b").expect("limit pattern"));

/// Statement verbs the ad-hoc gateway accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementVerb {
    Select,
    Show,
    Describe,
}

/// Validation for every value that ends up inside SQL text rather than
/// being bound as a parameter.
pub struct SqlValidator;

impl SqlValidator {
    /// Classify the leading keyword of `sql` (trimmed, case-insensitive).
    pub fn statement_verb(sql: &str) -> Result<StatementVerb, AppError> {
        let keyword: String = sql
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_ascii_uppercase();

        match keyword.as_str() {
            "SELECT" => Ok(StatementVerb::Select),
            "SHOW" => Ok(StatementVerb::Show),
            "DESCRIBE" => Ok(StatementVerb::Describe),
            "" => Err(AppError::InvalidSql("Empty SQL statement".to_string())),
            other => Err(AppError::InvalidSql(format!(
                "{} statements are not allowed. Only SELECT, SHOW and DESCRIBE are permitted.",
                other
            ))),
        }
    }

    /// Drop one trailing `;` and refuse input holding more than one statement.
    pub fn single_statement(sql: &str) -> Result<&str, AppError> {
        let trimmed = sql.trim();
        let body = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();
        if Self::statement_count(body) > 1 {
            return Err(AppError::InvalidSql(
                "Multiple statements are not allowed".to_string(),
            ));
        }
        Ok(body)
    }

    /// Statements the parser finds in `sql`; text it cannot parse is split
    /// on semicolons outside quoted literals.
    fn statement_count(sql: &str) -> usize {
        match Parser::parse_sql(&ClickHouseDialect {}, sql) {
            Ok(statements) => statements.len(),
            Err(_) => Self::unquoted_semicolons(sql) + 1,
        }
    }

    fn unquoted_semicolons(sql: &str) -> usize {
        let mut quote: Option<char> = None;
        let mut escaped = false;
        let mut count = 0;
        for c in sql.chars() {
            if escaped {
                escaped = false;
                continue;
            }
            match quote {
                Some(_) if c == '\\' => escaped = true,
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if matches!(c, '\'' | '"' | '`') => quote = Some(c),
                None if c == ';' => count += 1,
                None => {}
            }
        }
        count
    }

    /// Table identifiers: `name` or `database.name`.
    pub fn validate_identifier(name: &str) -> Result<&str, AppError> {
        if IDENTIFIER.is_match(name) {
            Ok(name)
        } else {
            Err(AppError::Validation(format!("Invalid table name: {:?}", name)))
        }
    }

    /// Sort columns must be analytics table columns; returns the canonical name.
    pub fn validate_sort_field(name: &str) -> Result<&'static str, AppError> {
        WIDE_SCHEMA
            .canonical(name.trim())
            .ok_or_else(|| AppError::Validation(format!("Unknown sort field: {}", name)))
    }

    /// Extract and validate the table of a `DESCRIBE [TABLE] <name>` statement.
    pub fn describe_target(sql: &str) -> Result<&str, AppError> {
        let body = Self::single_statement(sql)?;
        let keyword_len = "DESCRIBE".len();
        let rest = match body.get(..keyword_len) {
            Some(keyword) if keyword.eq_ignore_ascii_case("DESCRIBE") => body[keyword_len..].trim(),
            _ => "",
        };

        let rest = match rest.split_once(char::is_whitespace) {
            Some((keyword, name)) if keyword.eq_ignore_ascii_case("TABLE") => name.trim(),
            _ => rest,
        };

        if rest.is_empty() {
            return Err(AppError::Validation(
                "DESCRIBE requires a table name".to_string(),
            ));
        }
        Self::validate_identifier(rest)
    }

    /// Normalise caller pagination for text formatting: page defaults to 1
    /// and may not exceed [`MAX_PAGE`]; page size is clamped to
    /// `1..=MAX_GATEWAY_PAGE_SIZE`.
    pub fn page_bounds(page: Option<i64>, page_size: Option<i64>) -> Result<(u64, u64), AppError> {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        if page > MAX_PAGE {
            return Err(AppError::Validation(format!(
                "page must not exceed {}",
                MAX_PAGE
            )));
        }
        let page_size = page_size
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_GATEWAY_PAGE_SIZE)
            .min(MAX_GATEWAY_PAGE_SIZE);
        Ok((page as u64, page_size as u64))
    }

    /// Append `LIMIT/OFFSET` for the given page unless the statement already
    /// limits itself.
    pub fn ensure_limit(sql: &str, page: u64, page_size: u64) -> String {
        if Self::has_limit(sql) {
            return sql.to_string();
        }
        let offset = page.saturating_sub(1) * page_size;
        format!("{} LIMIT {} OFFSET {}", sql, page_size, offset)
    }

    /// Check for a LIMIT clause using the parsed statement; statements the
    /// parser cannot handle fall back to a keyword match.
    pub fn has_limit(sql: &str) -> bool {
        let dialect = ClickHouseDialect {};
        let parsed = Parser::new(&dialect)
            .try_with_sql(sql)
            .and_then(|mut parser| parser.parse_statements());

        match parsed {
            Ok(statements) => statements
                .first()
                .map(Self::check_limit_in_statement)
                .unwrap_or(false),
            Err(_) => LIMIT_KEYWORD.is_match(sql),
        }
    }

    fn check_limit_in_statement(stmt: &Statement) -> bool {
        match stmt {
            Statement::Query(query) => query.limit_clause.is_some(),
            _ => false,
        }
    }

    /// Text following the first ` FROM `, cut before ORDER BY, GROUP BY,
    /// HAVING, LIMIT or OFFSET (case-insensitive).
    pub fn extract_from_clause(sql: &str) -> Option<&str> {
        let upper = sql.to_ascii_uppercase();
        let from_idx = upper.find(" FROM ")?;
        let start = from_idx + " FROM ".len();
        let tail_upper = &upper[start..];

        let end = [" ORDER BY ", " GROUP BY ", " HAVING ", " LIMIT ", " OFFSET "]
            .iter()
            .filter_map(|keyword| tail_upper.find(keyword))
            .min()
            .unwrap_or(tail_upper.len());

        let clause = sql[start..start + end].trim();
        if clause.is_empty() {
            None
        } else {
            Some(clause)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_verb_allow_list() {
        assert_eq!(
            SqlValidator::statement_verb("  select 1").unwrap(),
            StatementVerb::Select
        );
        assert_eq!(
            SqlValidator::statement_verb("SHOW TABLES").unwrap(),
            StatementVerb::Show
        );
        assert_eq!(
            SqlValidator::statement_verb("describe kv_7").unwrap(),
            StatementVerb::Describe
        );
        assert!(matches!(
            SqlValidator::statement_verb("update kv_7 set x=1"),
            Err(AppError::InvalidSql(_))
        ));
        assert!(SqlValidator::statement_verb("DROP TABLE kv_7").is_err());
        assert!(SqlValidator::statement_verb("SELECTX 1").is_err());
        assert!(SqlValidator::statement_verb("   ").is_err());
    }

    #[test]
    fn test_single_statement() {
        assert_eq!(
            SqlValidator::single_statement("SELECT 1;").unwrap(),
            "SELECT 1"
        );
        assert!(SqlValidator::single_statement("SELECT 1; DROP TABLE kv_7").is_err());

        let literal = "SELECT * FROM kv_7 WHERE d1 = 'a;b'";
        assert_eq!(SqlValidator::single_statement(literal).unwrap(), literal);
        assert_eq!(
            SqlValidator::single_statement("SELECT count() FROM kv_7 WHERE d1 LIKE '%;%';").unwrap(),
            "SELECT count() FROM kv_7 WHERE d1 LIKE '%;%'"
        );
    }

    #[test]
    fn test_unquoted_semicolons() {
        assert_eq!(SqlValidator::unquoted_semicolons("SELECT 'a;b', `c;d`, \"e;f\""), 0);
        assert_eq!(SqlValidator::unquoted_semicolons("SELECT 1; SELECT 2"), 1);
        assert_eq!(SqlValidator::unquoted_semicolons(r"SELECT 'it\'s;' ; x"), 1);
    }

    #[test]
    fn test_validate_identifier() {
        assert!(SqlValidator::validate_identifier("kv_7").is_ok());
        assert!(SqlValidator::validate_identifier("system.tables").is_ok());
        assert!(SqlValidator::validate_identifier("kv_7; DROP").is_err());
        assert!(SqlValidator::validate_identifier("7kv").is_err());
        assert!(SqlValidator::validate_identifier("").is_err());
    }

    #[test]
    fn test_validate_sort_field() {
        assert_eq!(SqlValidator::validate_sort_field("v12").unwrap(), "v12");
        assert!(SqlValidator::validate_sort_field("data_time; DROP TABLE kv_7").is_err());
        assert!(SqlValidator::validate_sort_field("1").is_err());
    }

    #[test]
    fn test_describe_target() {
        assert_eq!(SqlValidator::describe_target("DESCRIBE kv_7").unwrap(), "kv_7");
        assert_eq!(
            SqlValidator::describe_target("describe table system.tables;").unwrap(),
            "system.tables"
        );
        assert!(matches!(
            SqlValidator::describe_target("DESCRIBE"),
            Err(AppError::Validation(_))
        ));
        assert!(SqlValidator::describe_target("DESCRIBE kv_7 x").is_err());
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(SqlValidator::page_bounds(None, None).unwrap(), (1, 10));
        assert_eq!(SqlValidator::page_bounds(Some(0), Some(-5)).unwrap(), (1, 10));
        assert_eq!(SqlValidator::page_bounds(Some(3), Some(5000)).unwrap(), (3, 1000));
        assert!(SqlValidator::page_bounds(Some(MAX_PAGE + 1), None).is_err());
    }

    #[test]
    fn test_ensure_limit() {
        assert_eq!(
            SqlValidator::ensure_limit("SELECT * FROM kv_7", 3, 20),
            "SELECT * FROM kv_7 LIMIT 20 OFFSET 40"
        );
        let limited = "SELECT * FROM kv_7 LIMIT 5";
        assert_eq!(SqlValidator::ensure_limit(limited, 1, 20), limited);
    }

    #[test]
    fn test_limit_detection_with_ast() {
        assert!(!SqlValidator::has_limit("SELECT * FROM table_limit"));
        assert!(!SqlValidator::has_limit("SELECT limit_value FROM users"));
        assert!(!SqlValidator::has_limit("SELECT * FROM users /* LIMIT */"));
        assert!(SqlValidator::has_limit("SELECT * FROM users LIMIT 100 OFFSET 10"));
    }

    #[test]
    fn test_extract_from_clause() {
        assert_eq!(
            SqlValidator::extract_from_clause(
                "SELECT os, count() FROM kv_7 WHERE platform = 'ios' group by os order by os"
            ),
            Some("kv_7 WHERE platform = 'ios'")
        );
        assert_eq!(
            SqlValidator::extract_from_clause("select * from kv_7 limit 5"),
            Some("kv_7")
        );
        assert_eq!(SqlValidator::extract_from_clause("SELECT 1"), None);
    }
}
