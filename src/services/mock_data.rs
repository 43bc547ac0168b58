// Synthetic data served when the store is unavailable or disabled. Every
// generator returns the same types the live path produces, so responses keep
// one shape regardless of provenance.
use chrono::{Duration, NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{
    AnalyticsResult, CategoryCount, CellValue, ColumnInfo, DeviceStats, GenericRow, HourlyStat,
    ModelCount, NetworkStats, NetworkTypeCount, RegionStat, ResponseTimes, SelectOption,
    UserDistribution, VersionCount, WideRecord,
};
use crate::validation::{SqlValidator, StatementVerb};

/// Rows for an unspecified mock listing.
pub const DEFAULT_MOCK_ROWS: usize = 50;
/// Upper bound on rows synthesized for any single mock response.
pub const MAX_MOCK_ROWS: usize = 100;

/// Rows to synthesize for a requested count: the default when zero, capped
/// at `MAX_MOCK_ROWS` otherwise.
pub fn mock_rows(requested: usize) -> usize {
    match requested {
        0 => DEFAULT_MOCK_ROWS,
        n => n.min(MAX_MOCK_ROWS),
    }
}

pub const PROJECTS: &[&str] = &[
    "frontend-monitor-web-20000.2:demo",
    "docs-web-10001",
    "av-platform-30001",
];

const PLATFORMS: &[&str] = &["iOS", "Android", "Web", "macOS", "Windows"];
const CATEGORIES: &[&str] = &["ERROR", "WARNING", "INFO", "DEBUG", "USER_ACTION", "PERFORMANCE"];
const ACTIONS: &[&str] = &["click", "view", "login", "submit", "error", "api_call", "page_load"];
const OSES: &[&str] = &["iOS 16", "Android 13", "Windows 10", "macOS 13", "Linux"];
const LABELS: &[&str] = &["UI", "Network", "Database", "Auth", "API", "Performance"];
const STATES: &[&str] = &["success", "failure", "pending", "timeout"];
const DEVICE_IDS: &[&str] = &["DV20252701", "DV20252702", "DV20252703", "DV20252704", "DV20252705"];
const MODELS: &[&str] = &["iPhone 14", "Samsung Galaxy S22", "Google Pixel 7", "MacBook Pro", "ThinkPad X1"];
const OS_VERSIONS: &[&str] = &["16.5", "13.0", "10.0.19045", "13.3", "5.15.0"];
const USER_IDS: &[&str] = &["17430", "66417", "66412", "66399", "65500"];
const MESSAGES: &[&str] = &[
    "User clicked the login button",
    "Page finished loading",
    "User submitted a form",
    "Page visit",
    "Custom event reported",
    "User is viewing the reporting dashboard",
    "Script error. @ (:0:0)",
    "JSON payload: {\"id\":\"YRKRY18EXMI120000\",\"uid\":\"1743066412\",\"version\":\"1.39.1\"}",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)",
    "aegis.report page visit",
    "Login succeeded, device ID: DV20252703",
];

const LOG_PLATFORMS: &[&str] = &["iOS", "Android", "Web", "macOS"];
const LOG_CATEGORIES: &[&str] = &["PAGE_VIEW", "USER_ACTION", "ERROR", "WARNING", "INFO"];
const LOG_ACTIONS: &[&str] = &["login", "click", "view", "create", "delete", "update", "share"];
const LOG_OSES: &[&str] = &["Windows 10", "iOS 16", "Android 13", "macOS 13"];

static LIMIT_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\blimit\s+(\d+)").expect("valid limit pattern"));
static COUNT_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcount\s*\(").expect("valid count pattern"));
/// First grouping column, with any table qualifier dropped.
static GROUP_BY_COLUMN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bgroup\s+by\s+(?:[a-z_][a-z0-9_]*\.)?([a-z_][a-z0-9_]*)\b").expect("valid group by pattern")
});

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, values: &[&'a str]) -> &'a str {
    values.choose(rng).copied().unwrap_or_default()
}

fn base_record(ts: NaiveDateTime) -> WideRecord {
    WideRecord::new()
        .with_timestamp("data_time", ts)
        .with_text("time_hour", ts.format("%Y-%m-%d %H").to_string())
        .with_integer("time", ts.and_utc().timestamp_millis())
}

/// Wide records spread over the last seven days.
pub fn kv7_records<R: Rng + ?Sized>(rng: &mut R, count: usize, now: NaiveDateTime) -> Vec<WideRecord> {
    sample_kv7(rng, mock_rows(count), now)
}

/// Uncapped population the mock aggregates are computed from.
fn sample_kv7<R: Rng + ?Sized>(rng: &mut R, count: usize, now: NaiveDateTime) -> Vec<WideRecord> {
    (0..count)
        .map(|i| {
            let ts = now
                - Duration::hours(rng.gen_range(0..7 * 24))
                - Duration::minutes(rng.gen_range(0..60))
                - Duration::seconds(rng.gen_range(0..60));
            let action = pick(rng, ACTIONS);
            let model = pick(rng, MODELS);
            let os = pick(rng, OSES);

            base_record(ts)
                .with_timestamp("write_time", ts + Duration::seconds(1))
                .with_text("id", format!("log_{}", rng.gen_range(0..1_000_000)))
                .with_text("platform", pick(rng, PLATFORMS))
                .with_text("category", pick(rng, CATEGORIES))
                .with_text("action", action)
                .with_text("os", os)
                .with_text("user_id", pick(rng, USER_IDS))
                .with_text("app_id", pick(rng, PROJECTS))
                .with_text("version", format!("1.{}.{}", rng.gen_range(0..10), rng.gen_range(0..100)))
                .with_text("device_id", pick(rng, DEVICE_IDS))
                .with_text("model", model)
                .with_text("os_ver", pick(rng, OS_VERSIONS))
                .with_text("label", pick(rng, LABELS))
                .with_text("state", pick(rng, STATES))
                .with_integer("value", rng.gen_range(0..100))
                .with_text("d1", pick(rng, MESSAGES))
                .with_text("d2", format!("Page path: /{}", action.to_lowercase()))
                .with_text("d3", format!("Device: {} {}", model, os))
                .with_text("extra", format!("extra-{}", i))
                .with_integer("entrance_time", ts.and_utc().timestamp())
                .with_text("entrance_id", format!("entrance_{}", rng.gen_range(0..100_000)))
        })
        .collect()
}

/// Log entries spread over the last 24 hours.
pub fn log_records<R: Rng + ?Sized>(rng: &mut R, count: usize, now: NaiveDateTime) -> Vec<WideRecord> {
    (0..count.min(MAX_MOCK_ROWS))
        .map(|i| {
            let ts = now - Duration::hours(rng.gen_range(0..24)) - Duration::minutes(rng.gen_range(0..60));
            let platform = pick(rng, LOG_PLATFORMS);

            base_record(ts)
                .with_timestamp("write_time", ts + Duration::seconds(2))
                .with_text("id", format!("log_{}_{}", ts.and_utc().timestamp(), i))
                .with_text("platform", platform)
                .with_text("category", pick(rng, LOG_CATEGORIES))
                .with_text("action", pick(rng, LOG_ACTIONS))
                .with_text("os", pick(rng, LOG_OSES))
                .with_text("user_id", format!("user_{}", 1000 + rng.gen_range(0..9000)))
                .with_text("app_id", PROJECTS[0])
                .with_text("version", format!("1.{}.{}", rng.gen_range(0..10), rng.gen_range(0..100)))
                .with_text("d1", pick(rng, MESSAGES))
                .with_text("d2", "Page path: /home")
                .with_text("d3", format!("Device: {}", platform))
        })
        .collect()
}

/// Category/action counts aggregated from generated records.
pub fn event_counts<R: Rng + ?Sized>(rng: &mut R, now: NaiveDateTime) -> Vec<AnalyticsResult> {
    let mut counts: BTreeMap<(String, String), u64> = BTreeMap::new();
    for record in sample_kv7(rng, 200, now) {
        *counts
            .entry((record.text("category").to_string(), record.text("action").to_string()))
            .or_default() += 1;
    }

    let mut results: Vec<AnalyticsResult> = counts
        .into_iter()
        .map(|((category, action), count)| AnalyticsResult {
            category,
            action,
            count,
        })
        .collect();
    results.sort_by(|a, b| b.count.cmp(&a.count));
    results
}

/// Distinct users per operating system from generated records.
pub fn user_distribution<R: Rng + ?Sized>(rng: &mut R, now: NaiveDateTime) -> Vec<UserDistribution> {
    let records = sample_kv7(rng, 200, now);
    let mut by_os: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut all_users = BTreeSet::new();
    for record in &records {
        let user = record.text("user_id").to_string();
        all_users.insert(user.clone());
        by_os.entry(record.text("os").to_string()).or_default().insert(user);
    }

    let total = all_users.len().max(1) as f64;
    let mut results: Vec<UserDistribution> = by_os
        .into_iter()
        .map(|(os, users)| UserDistribution {
            os,
            count: users.len() as u64,
            percent: (users.len() as f64 * 10_000.0 / total).round() / 100.0,
        })
        .collect();
    results.sort_by(|a, b| b.count.cmp(&a.count));
    results
}

pub fn network_stats<R: Rng + ?Sized>(rng: &mut R, now: NaiveDateTime) -> NetworkStats {
    let network_types = [
        ("WIFI", 350),
        ("5G", 250),
        ("4G", 150),
        ("3G", 50),
        ("NoNetwork", 30),
        ("NoPermission", 20),
    ]
    .iter()
    .map(|(network_type, count)| NetworkTypeCount {
        network_type: network_type.to_string(),
        count: *count,
    })
    .collect();

    let regions = [
        ("Guangdong", 420.0, 400),
        ("Beijing", 380.0, 200),
        ("Shanghai", 400.0, 150),
        ("Zhejiang", 430.0, 100),
        ("Hong Kong", 350.0, 50),
    ]
    .iter()
    .map(|(region, avg_time, count)| RegionStat {
        region: region.to_string(),
        avg_time: *avg_time,
        count: *count,
    })
    .collect();

    // Oldest hour first
    let current_hour = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .unwrap_or(now);
    let time_series = (0..24i64)
        .rev()
        .map(|i| HourlyStat {
            hour: (current_hour - Duration::hours(i)).format("%Y-%m-%d %H:00").to_string(),
            avg_time: 400.0 + f64::from(rng.gen_range(0..100i32)) - 50.0,
            count: rng.gen_range(50..150),
        })
        .collect();

    NetworkStats {
        network_types,
        response_time: ResponseTimes {
            total: 450.0,
            dns: 100.0,
            tcp: 150.0,
            request: 120.0,
            response: 80.0,
        },
        regions,
        time_series,
    }
}

pub fn ios_device_stats() -> DeviceStats {
    let versions = |rows: &[(&str, u64)]| -> Vec<VersionCount> {
        rows.iter()
            .map(|(version, count)| VersionCount {
                version: version.to_string(),
                count: *count,
            })
            .collect()
    };

    DeviceStats {
        devices: [
            ("iPhone13", 350),
            ("iPhone 12", 250),
            ("iPhone 7", 150),
            ("iPhone 6", 100),
            ("iPhone 13 Pro", 50),
        ]
        .iter()
        .map(|(model, count)| ModelCount {
            model: model.to_string(),
            count: *count,
        })
        .collect(),
        os_versions: versions(&[
            ("Version 16.0 (Build 20A5283p)", 300),
            ("Version 15.4.1 (Build 19E258)", 250),
            ("Version 15.1 (Build 19B74)", 200),
            ("Version 14.8 (Build 18H17)", 100),
            ("Version 13.7 (Build 17H35)", 50),
        ]),
        app_versions: versions(&[
            ("4.2.8", 200),
            ("4.3.5", 180),
            ("4.6.6", 150),
            ("4.8.6", 120),
            ("4.1.3", 100),
        ]),
        categories: [
            ("PERF_NET_SSE", 500),
            ("USER_ACTION", 300),
            ("PAGE_VIEW", 150),
            ("ERROR", 30),
            ("WARNING", 20),
        ]
        .iter()
        .map(|(category, count)| CategoryCount {
            category: category.to_string(),
            count: *count,
        })
        .collect(),
    }
}

pub fn table_list() -> Vec<GenericRow> {
    ["kv_7", "system.query_log", "system.tables", "system.columns"]
        .iter()
        .map(|name| GenericRow::new().with("name", CellValue::Text(name.to_string())))
        .collect()
}

/// Fixed `DESCRIBE` output for the analytics table.
pub fn describe_schema() -> Vec<GenericRow> {
    [
        ("data_time", "DateTime", "", ""),
        ("write_time", "DateTime", "MATERIALIZED", "now()"),
        ("time_hour", "String", "", ""),
        ("id", "String", "", ""),
        ("time", "Int64", "", ""),
        ("platform", "LowCardinality(String)", "", ""),
        ("user_id", "String", "", ""),
        ("category", "LowCardinality(String)", "", ""),
        ("action", "String", "", ""),
        ("os", "LowCardinality(String)", "", ""),
    ]
    .iter()
    .map(|(name, data_type, default_type, default_expression)| {
        GenericRow::new()
            .with("name", CellValue::Text(name.to_string()))
            .with("type", CellValue::Text(data_type.to_string()))
            .with("default_type", CellValue::Text(default_type.to_string()))
            .with("default_expression", CellValue::Text(default_expression.to_string()))
    })
    .collect()
}

/// Column list served by `/api/sql/fields` when the store cannot describe the table.
pub fn table_fields() -> Vec<ColumnInfo> {
    [
        ("data_time", "DateTime"),
        ("write_time", "DateTime"),
        ("time_hour", "String"),
        ("id", "String"),
        ("time", "Int64"),
        ("extra", "String"),
        ("entrance_time", "Int64"),
        ("app_id", "String"),
        ("platform", "String"),
        ("user_id", "String"),
        ("category", "String"),
        ("action", "String"),
        ("os", "String"),
    ]
    .iter()
    .map(|(name, data_type)| ColumnInfo::new(*name, *data_type))
    .collect()
}

fn grouped(column: &str, rows: &[(&str, u64)]) -> Vec<GenericRow> {
    rows.iter()
        .map(|(value, count)| {
            GenericRow::new()
                .with(column, CellValue::Text(value.to_string()))
                .with("count", CellValue::UInt(*count))
        })
        .collect()
}

/// Synthetic result for an ad-hoc statement, shaped after what it asks for.
pub fn sql_results(query: &str, now: NaiveDateTime) -> Vec<GenericRow> {
    match SqlValidator::statement_verb(query) {
        Ok(StatementVerb::Show) => return table_list(),
        Ok(StatementVerb::Describe) => return describe_schema(),
        _ => {}
    }

    let group_key = COUNT_CALL
        .is_match(query)
        .then(|| GROUP_BY_COLUMN.captures(query))
        .flatten()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_lowercase());

    if let Some(key) = group_key {
        return match key.as_str() {
            "platform" => grouped(
                "platform",
                &[("iOS", 1250), ("Android", 980), ("Web", 780), ("macOS", 320), ("Windows", 175)],
            ),
            "os" => grouped(
                "os",
                &[
                    ("iOS 16", 850),
                    ("iOS 15", 320),
                    ("Android 13", 650),
                    ("Android 12", 280),
                    ("macOS 13", 220),
                    ("Windows 11", 120),
                    ("Windows 10", 65),
                ],
            ),
            _ => grouped(
                "category",
                &[
                    ("PAGE_VIEW", 1800),
                    ("USER_ACTION", 950),
                    ("ERROR", 120),
                    ("WARNING", 310),
                    ("INFO", 520),
                ],
            ),
        };
    }

    let rows = LIMIT_CLAUSE
        .captures(query)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .map(|n| n.min(MAX_MOCK_ROWS))
        .unwrap_or(DEFAULT_MOCK_ROWS);

    wide_rows(rows, now)
}

/// `count` deterministic wide rows, one hour apart, as generic rows.
pub fn wide_rows(count: usize, now: NaiveDateTime) -> Vec<GenericRow> {
    (0..count).map(|i| sql_row(i, now).to_generic_row()).collect()
}

/// Deterministic wide row `i` hours before `now`.
fn sql_row(i: usize, now: NaiveDateTime) -> WideRecord {
    const SQL_PLATFORMS: &[&str] = &["iOS", "Android", "Web", "macOS", "Windows"];
    const SQL_CATEGORIES: &[&str] = &["PAGE_VIEW", "USER_ACTION", "ERROR", "WARNING", "INFO", "ANALYTICS"];
    const SQL_ACTIONS: &[&str] = &["login", "click", "view", "create", "delete", "update", "share", "submit"];
    const SQL_OSES: &[&str] = &["iOS 16", "iOS 15", "Android 13", "Android 12", "macOS 13", "Windows 11", "Windows 10"];
    const SQL_MODELS: &[&str] = &[
        "iPhone 13",
        "iPhone 14",
        "iPhone 15",
        "Samsung Galaxy S22",
        "Google Pixel 7",
        "iPad Pro",
        "MacBook Pro",
        "Surface Pro",
    ];
    const NETWORKS: &[&str] = &["Wi-Fi", "4G", "5G", "3G", "Ethernet"];

    let n = i as i64;
    let ts = now - Duration::hours(n);
    let mut record = WideRecord::new()
        .with_timestamp("data_time", ts)
        .with_timestamp("write_time", ts + Duration::seconds(2))
        .with_text("time_hour", format!("{:02}", ts.hour()))
        .with_text("id", format!("ev_{}", 100 + i))
        .with_integer("time", ts.and_utc().timestamp())
        .with_text("extra", format!("extra_data_{}", i))
        .with_integer("entrance_time", ts.and_utc().timestamp() - n * 60)
        .with_text("entrance_id", format!("entrance_{}", i))
        .with_integer("stamp", n * 10)
        .with_text("app_id", format!("app_{}", i % 5 + 1))
        .with_text("platform", SQL_PLATFORMS[i % SQL_PLATFORMS.len()])
        .with_text("user_id", format!("user_{}", 1000 + i))
        .with_text("version", format!("1.{}.{}", 2 + i % 3, 30 + i * 5))
        .with_text("build_id", format!("build_{}", 2000 + i))
        .with_text("device_id", format!("device_{}", 3000 + i))
        .with_text("model", SQL_MODELS[(i * 9) % SQL_MODELS.len()])
        .with_text("os", SQL_OSES[(i * 5) % SQL_OSES.len()])
        .with_text("os_ver", format!("{}.{}.{}", 10 + i % 3, 5 + i % 5, i % 10))
        .with_text("sdk_ver", format!("sdk_{}.{}", 3 + i % 2, i % 5))
        .with_text("category", SQL_CATEGORIES[(i * 3) % SQL_CATEGORIES.len()])
        .with_text("action", SQL_ACTIONS[(i * 7) % SQL_ACTIONS.len()])
        .with_text("label", format!("label_{}", i))
        .with_text("state", format!("state_{}", i % 3))
        .with_integer("value", 10 + n * 5)
        .with_text("d38", NETWORKS[(i * 11) % NETWORKS.len()])
        .with_text("d39", format!("carrier_{}", i % 6))
        .with_text("d40", format!("region_{}", i % 8));

    for j in 1..=37 {
        record = record.with_text(&format!("d{}", j), format!("d{}_value_{}", j, i));
    }
    for j in 1..=40i64 {
        record = record.with_integer(&format!("v{}", j), j * (n + 100));
    }
    for (family, slots) in [("info", 10), ("ud", 20), ("sd", 20)] {
        for j in 1..=slots {
            record = record.with_text(&format!("{}{}", family, j), format!("{}{}_data_{}", family, j, i));
        }
    }
    for (family, slots) in [("uv", 10i64), ("sv", 10)] {
        for j in 1..=slots {
            record = record.with_integer(&format!("{}{}", family, j), j * (n + 10));
        }
    }
    record
}

pub fn log_fields() -> Vec<(&'static str, &'static str)> {
    vec![
        ("date", "Date"),
        ("time", "Time"),
        ("id", "Log ID"),
        ("platform", "Platform"),
        ("category", "Category"),
        ("action", "Action"),
        ("os", "Operating system"),
        ("uid", "User ID"),
        ("app_id", "App ID"),
        ("version", "Version"),
        ("device_id", "Device ID"),
        ("model", "Device model"),
        ("os_ver", "OS version"),
        ("msg", "Message"),
        ("label", "Label"),
        ("state", "State"),
        ("value", "Value"),
    ]
}

pub fn project_options() -> Vec<SelectOption> {
    PROJECTS.iter().map(|p| SelectOption::same(p)).collect()
}

pub fn log_type_options() -> Vec<SelectOption> {
    [
        ("all", "All logs"),
        ("error", "Error logs"),
        ("warning", "Warning logs"),
        ("info", "Info logs"),
        ("debug", "Debug logs"),
    ]
    .iter()
    .map(|(value, text)| SelectOption {
        value: value.to_string(),
        text: text.to_string(),
    })
    .collect()
}
