use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::geo::{self, Country};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Low, Severity::Medium, Severity::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape shared by every input row: a day, a region and an application.
pub trait Record {
    fn date(&self) -> NaiveDate;
    fn region(&self) -> &str;
    fn app(&self) -> &str;

    /// Country derived from the region; `None` for unmapped regions.
    fn country(&self) -> Option<&'static Country> {
        geo::country_for_region(self.region())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserReport {
    pub date: NaiveDate,
    pub region: String,
    pub app: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseTimeRecord {
    pub date: NaiveDate,
    pub region: String,
    pub app: String,
    /// Hours, never negative.
    pub resolution_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceRecord {
    pub date: NaiveDate,
    pub region: String,
    pub app: String,
    /// 0 to 100.
    pub compliance_score: f64,
}

macro_rules! impl_record {
    ($($ty:ty),+) => {
        $(
            impl Record for $ty {
                fn date(&self) -> NaiveDate {
                    self.date
                }

                fn region(&self) -> &str {
                    &self.region
                }

                fn app(&self) -> &str {
                    &self.app
                }
            }
        )+
    };
}

impl_record!(UserReport, ResponseTimeRecord, ComplianceRecord);

/// The three datasets as loaded. Never mutated after load.
#[derive(Debug, Clone, Default)]
pub struct Datasets {
    pub reports: Vec<UserReport>,
    pub response_times: Vec<ResponseTimeRecord>,
    pub compliance: Vec<ComplianceRecord>,
}

impl Datasets {
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty() && self.response_times.is_empty() && self.compliance.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub report_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyMean {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow<V> {
    pub key: String,
    pub value: V,
}

/// Headline figures. Means over no rows are `None`, never zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub avg_resolution_time: Option<f64>,
    pub high_severity_count: usize,
    pub avg_compliance_score: Option<f64>,
    pub total_reports: usize,
    pub severity_mix: Vec<SeverityCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityCount {
    pub severity: Severity,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub date: NaiveDate,
    pub report_count: usize,
    pub z_score: f64,
}
