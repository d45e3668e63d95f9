use std::fmt;

use serde::{Deserialize, Serialize};

use crate::aggregate::Breakdowns;

pub const ALL_CLEAR: &str = "All systems within thresholds.";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Thresholds {
    /// Alert when a country's mean resolution time is above this many hours.
    pub max_resolution_hours: f64,
    /// Alert when a country's mean compliance score is below this.
    pub min_compliance_score: f64,
    /// Alert when a country has more high-severity reports than this.
    pub max_high_severity_reports: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_resolution_hours: 6.0,
            min_compliance_score: 75.0,
            max_high_severity_reports: 50,
        }
    }
}

/// Declaration order is output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertRule {
    ResolutionTime,
    Compliance,
    HighSeverityReports,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub country: String,
    pub rule: AlertRule,
    pub value: f64,
    pub threshold: f64,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rule {
            AlertRule::ResolutionTime => write!(
                f,
                "{}: average resolution time {:.2} hrs exceeds {:.2} hrs",
                self.country, self.value, self.threshold
            ),
            AlertRule::Compliance => write!(
                f,
                "{}: average compliance score {:.2} is below {:.2}",
                self.country, self.value, self.threshold
            ),
            AlertRule::HighSeverityReports => write!(
                f,
                "{}: {} high-severity reports exceed the limit of {}",
                self.country, self.value as usize, self.threshold as usize
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "alerts", rename_all = "snake_case")]
pub enum AlertStatus {
    AllClear,
    Alerts(Vec<Alert>),
}

impl From<Vec<Alert>> for AlertStatus {
    fn from(alerts: Vec<Alert>) -> Self {
        if alerts.is_empty() {
            AlertStatus::AllClear
        } else {
            AlertStatus::Alerts(alerts)
        }
    }
}

impl AlertStatus {
    pub fn alerts(&self) -> &[Alert] {
        match self {
            AlertStatus::AllClear => &[],
            AlertStatus::Alerts(alerts) => alerts,
        }
    }

    /// Formatted messages, or the single all-clear line.
    pub fn messages(&self) -> Vec<String> {
        match self {
            AlertStatus::AllClear => vec![ALL_CLEAR.to_string()],
            AlertStatus::Alerts(alerts) => alerts.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Evaluates every rule against a country-keyed breakdown.
///
/// Each rule runs independently, so one country can raise up to three alerts.
/// Output is grouped by rule, then ordered by country within each group.
pub fn evaluate_alerts(by_country: &Breakdowns, thresholds: &Thresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for row in &by_country.resolution_time {
        if row.value > thresholds.max_resolution_hours {
            alerts.push(Alert {
                country: row.key.clone(),
                rule: AlertRule::ResolutionTime,
                value: row.value,
                threshold: thresholds.max_resolution_hours,
            });
        }
    }

    for row in &by_country.compliance_score {
        if row.value < thresholds.min_compliance_score {
            alerts.push(Alert {
                country: row.key.clone(),
                rule: AlertRule::Compliance,
                value: row.value,
                threshold: thresholds.min_compliance_score,
            });
        }
    }

    for row in &by_country.high_severity_reports {
        if row.value > thresholds.max_high_severity_reports {
            alerts.push(Alert {
                country: row.key.clone(),
                rule: AlertRule::HighSeverityReports,
                value: row.value as f64,
                threshold: thresholds.max_high_severity_reports as f64,
            });
        }
    }

    // Breakdown rows are already key-sorted; the stable sort only enforces it.
    alerts.sort_by(|a, b| a.rule.cmp(&b.rule).then_with(|| a.country.cmp(&b.country)));
    alerts
}
