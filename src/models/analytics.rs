use serde::{Deserialize, Serialize};

/// Event counts grouped by category and action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsResult {
    pub category: String,
    pub action: String,
    pub count: u64,
}

/// Distinct users per operating system, with their share in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDistribution {
    pub os: String,
    pub count: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkTypeCount {
    #[serde(rename = "type")]
    pub network_type: String,
    pub count: u64,
}

/// Average request phase timings (milliseconds) from `v1..v5`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimes {
    pub total: f64,
    pub dns: f64,
    pub tcp: f64,
    pub request: f64,
    pub response: f64,
}

impl Default for ResponseTimes {
    fn default() -> Self {
        Self {
            total: 500.0,
            dns: 100.0,
            tcp: 150.0,
            request: 100.0,
            response: 150.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionStat {
    pub region: String,
    pub avg_time: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyStat {
    pub hour: String,
    pub avg_time: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub network_types: Vec<NetworkTypeCount>,
    pub response_time: ResponseTimes,
    pub regions: Vec<RegionStat>,
    pub time_series: Vec<HourlyStat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCount {
    pub model: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionCount {
    pub version: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStats {
    pub devices: Vec<ModelCount>,
    pub os_versions: Vec<VersionCount>,
    pub app_versions: Vec<VersionCount>,
    pub categories: Vec<CategoryCount>,
}

/// Column name and type as reported by `DESCRIBE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}
