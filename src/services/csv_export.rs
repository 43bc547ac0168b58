use crate::models::{format_timestamp, WideRecord};

pub const CSV_HEADER: &str = "data_time,id,user_id,platform,os,action,message";
pub const EXPORT_FILENAME: &str = "logs_export.csv";

/// Quote a field when it contains a comma, quote or line break; inner
/// quotes are doubled.
pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn record_line(record: &WideRecord) -> String {
    let data_time = record
        .data_time()
        .map(|ts| format_timestamp(&ts))
        .unwrap_or_default();

    [
        data_time.as_str(),
        record.id(),
        record.text("user_id"),
        record.text("platform"),
        record.text("os"),
        record.text("action"),
        record.text("d1"),
    ]
    .iter()
    .map(|field| escape_field(field))
    .collect::<Vec<_>>()
    .join(",")
}

/// Header plus one line per record, each line `\n` terminated.
pub fn render(records: &[WideRecord]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + 1 + records.len() * 96);
    out.push_str(CSV_HEADER);
    out.push('\n');
    for record in records {
        out.push_str(&record_line(record));
        out.push('\n');
    }
    out
}
