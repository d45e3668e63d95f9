use std::collections::BTreeMap;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::models::{
    BreakdownRow, ComplianceRecord, DailyCount, DailyMean, Datasets, Kpis, Record,
    ResponseTimeRecord, Severity, SeverityCount, UserReport,
};

/// Dimension used for categorical breakdowns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakdownKey {
    #[default]
    Country,
    App,
}

impl BreakdownKey {
    /// Group key for a row; `None` drops the row from the breakdown.
    fn key_of<T: Record>(&self, row: &T) -> Option<String> {
        match self {
            BreakdownKey::Country => row.country().map(|c| c.name.to_string()),
            BreakdownKey::App => Some(row.app().to_string()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BreakdownKey::Country => "country",
            BreakdownKey::App => "app",
        }
    }
}

/// Running sum and count for a mean.
#[derive(Debug, Clone, Copy, Default)]
struct MeanAcc {
    sum: f64,
    count: usize,
}

impl MeanAcc {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Anything carrying a date can be grouped by day.
pub trait Dated {
    fn day(&self) -> NaiveDate;
}

macro_rules! impl_dated {
    ($($ty:ty),+) => {
        $(
            impl Dated for $ty {
                fn day(&self) -> NaiveDate {
                    self.date
                }
            }
        )+
    };
}

impl_dated!(
    UserReport,
    ResponseTimeRecord,
    ComplianceRecord,
    DailyCount,
    DailyMean
);

pub fn mean_of<T>(rows: &[T], metric: impl Fn(&T) -> f64) -> Option<f64> {
    let mut acc = MeanAcc::default();
    for row in rows {
        acc.add(metric(row));
    }
    acc.mean()
}

/// Rows per day, ascending. Days without rows are absent.
pub fn daily_counts<T: Dated>(rows: &[T]) -> Vec<DailyCount> {
    sum_by_date(rows, |_| 1)
}

/// Sums a per-row count by day. Over a [`DailyCount`] series this is the
/// identity.
pub fn sum_by_date<T: Dated>(rows: &[T], count: impl Fn(&T) -> usize) -> Vec<DailyCount> {
    let mut days: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for row in rows {
        *days.entry(row.day()).or_insert(0) += count(row);
    }
    days.into_iter()
        .map(|(date, report_count)| DailyCount { date, report_count })
        .collect()
}

/// Mean of `metric` per day, ascending.
pub fn daily_mean<T: Dated>(rows: &[T], metric: impl Fn(&T) -> f64) -> Vec<DailyMean> {
    let mut days: BTreeMap<NaiveDate, MeanAcc> = BTreeMap::new();
    for row in rows {
        days.entry(row.day()).or_default().add(metric(row));
    }
    days.into_iter()
        .filter_map(|(date, acc)| acc.mean().map(|value| DailyMean { date, value }))
        .collect()
}

/// High-severity report count per key. Keys without any high-severity
/// report are absent.
pub fn high_severity_by(reports: &[UserReport], key: BreakdownKey) -> Vec<BreakdownRow<usize>> {
    let mut groups: BTreeMap<String, usize> = BTreeMap::new();
    for report in reports.iter().filter(|r| r.severity == Severity::High) {
        if let Some(k) = key.key_of(report) {
            *groups.entry(k).or_insert(0) += 1;
        }
    }
    groups
        .into_iter()
        .map(|(key, value)| BreakdownRow { key, value })
        .collect()
}

/// Mean of `metric` per key, sorted by key.
pub fn mean_by<T: Record>(
    rows: &[T],
    key: BreakdownKey,
    metric: impl Fn(&T) -> f64,
) -> Vec<BreakdownRow<f64>> {
    let mut groups: BTreeMap<String, MeanAcc> = BTreeMap::new();
    for row in rows {
        if let Some(k) = key.key_of(row) {
            groups.entry(k).or_default().add(metric(row));
        }
    }
    groups
        .into_iter()
        .filter_map(|(key, acc)| acc.mean().map(|value| BreakdownRow { key, value }))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trends {
    pub daily_reports: Vec<DailyCount>,
    pub daily_resolution_time: Vec<DailyMean>,
    pub daily_compliance_score: Vec<DailyMean>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdowns {
    pub key: BreakdownKey,
    pub high_severity_reports: Vec<BreakdownRow<usize>>,
    pub resolution_time: Vec<BreakdownRow<f64>>,
    pub compliance_score: Vec<BreakdownRow<f64>>,
}

fn resolution(row: &ResponseTimeRecord) -> f64 {
    row.resolution_time
}

fn compliance(row: &ComplianceRecord) -> f64 {
    row.compliance_score
}

pub fn kpis(filtered: &Datasets) -> Kpis {
    let severity_mix = Severity::ALL
        .iter()
        .map(|&severity| SeverityCount {
            severity,
            count: filtered
                .reports
                .iter()
                .filter(|r| r.severity == severity)
                .count(),
        })
        .collect::<Vec<_>>();
    let high_severity_count = severity_mix
        .iter()
        .find(|s| s.severity == Severity::High)
        .map_or(0, |s| s.count);

    Kpis {
        avg_resolution_time: mean_of(&filtered.response_times, resolution),
        high_severity_count,
        avg_compliance_score: mean_of(&filtered.compliance, compliance),
        total_reports: filtered.reports.len(),
        severity_mix,
    }
}

pub fn trends(filtered: &Datasets) -> Trends {
    Trends {
        daily_reports: daily_counts(&filtered.reports),
        daily_resolution_time: daily_mean(&filtered.response_times, resolution),
        daily_compliance_score: daily_mean(&filtered.compliance, compliance),
    }
}

pub fn breakdowns(filtered: &Datasets, key: BreakdownKey) -> Breakdowns {
    Breakdowns {
        key,
        high_severity_reports: high_severity_by(&filtered.reports, key),
        resolution_time: mean_by(&filtered.response_times, key, resolution),
        compliance_score: mean_by(&filtered.compliance, key, compliance),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    fn report(d: u32, region: &str, app: &str, severity: Severity) -> UserReport {
        UserReport {
            date: day(d),
            region: region.to_string(),
            app: app.to_string(),
            severity,
        }
    }

    fn response(d: u32, region: &str, hours: f64) -> ResponseTimeRecord {
        ResponseTimeRecord {
            date: day(d),
            region: region.to_string(),
            app: "Payments".to_string(),
            resolution_time: hours,
        }
    }

    #[test]
    fn daily_counts_are_sorted_without_zero_fill() {
        let reports = vec![
            report(3, "Asia", "Mail", Severity::Low),
            report(1, "Asia", "Mail", Severity::Low),
            report(3, "Europe", "Mail", Severity::High),
        ];
        let counts = daily_counts(&reports);
        assert_eq!(
            counts,
            vec![
                DailyCount {
                    date: day(1),
                    report_count: 1
                },
                DailyCount {
                    date: day(3),
                    report_count: 2
                },
            ]
        );
    }

    #[test]
    fn daily_mean_averages_per_day() {
        let rows = vec![
            response(1, "Asia", 2.0),
            response(1, "Europe", 4.0),
            response(2, "Asia", 5.0),
        ];
        let means = daily_mean(&rows, |r| r.resolution_time);
        assert_eq!(means.len(), 2);
        assert_eq!(means[0].value, 3.0);
        assert_eq!(means[1].value, 5.0);
    }

    #[test]
    fn reaggregating_a_daily_series_is_a_noop() {
        let rows = vec![
            response(4, "Asia", 2.0),
            response(1, "Europe", 4.0),
            response(4, "Asia", 7.0),
        ];
        let once = daily_mean(&rows, |r| r.resolution_time);
        let twice = daily_mean(&once, |m| m.value);
        assert_eq!(once, twice);

        let reports = vec![
            report(2, "Asia", "Mail", Severity::Low),
            report(2, "Asia", "Mail", Severity::High),
            report(5, "Asia", "Mail", Severity::Low),
        ];
        let counts = daily_counts(&reports);
        assert_eq!(sum_by_date(&counts, |c| c.report_count), counts);
    }

    #[test]
    fn high_severity_counts_by_country_skip_unmapped_and_quiet_countries() {
        let reports = vec![
            report(1, "Europe", "Mail", Severity::High),
            report(1, "Europe", "Mail", Severity::High),
            report(1, "Asia", "Mail", Severity::Low),
            report(1, "Atlantis", "Mail", Severity::High),
        ];
        let rows = high_severity_by(&reports, BreakdownKey::Country);
        assert_eq!(
            rows,
            vec![BreakdownRow {
                key: "Germany".to_string(),
                value: 2
            }]
        );
    }

    #[test]
    fn app_breakdown_keeps_unmapped_regions() {
        let reports = vec![
            report(1, "Atlantis", "Mail", Severity::High),
            report(1, "Europe", "Payments", Severity::High),
        ];
        let rows = high_severity_by(&reports, BreakdownKey::App);
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["Mail", "Payments"]);
    }

    #[test]
    fn mean_by_country_is_sorted_by_name() {
        let rows = vec![
            response(1, "South America", 8.0),
            response(1, "Africa", 2.0),
            response(2, "Africa", 4.0),
        ];
        let means = mean_by(&rows, BreakdownKey::Country, |r| r.resolution_time);
        assert_eq!(means[0].key, "Brazil");
        assert_eq!(means[0].value, 8.0);
        assert_eq!(means[1].key, "South Africa");
        assert_eq!(means[1].value, 3.0);
    }

    #[test]
    fn kpis_on_empty_data_have_no_means() {
        let kpis = kpis(&Datasets::default());
        assert_eq!(kpis.avg_resolution_time, None);
        assert_eq!(kpis.avg_compliance_score, None);
        assert_eq!(kpis.high_severity_count, 0);
        assert_eq!(kpis.total_reports, 0);
    }

    #[test]
    fn kpis_count_high_severity_and_mix() {
        let data = Datasets {
            reports: vec![
                report(1, "Asia", "Mail", Severity::High),
                report(1, "Asia", "Mail", Severity::Low),
                report(2, "Asia", "Mail", Severity::High),
            ],
            response_times: vec![response(1, "Asia", 1.0), response(1, "Asia", 2.0)],
            compliance: Vec::new(),
        };
        let kpis = kpis(&data);
        assert_eq!(kpis.high_severity_count, 2);
        assert_eq!(kpis.total_reports, 3);
        assert_eq!(kpis.avg_resolution_time, Some(1.5));
        assert_eq!(kpis.avg_compliance_score, None);
        assert_eq!(
            kpis.severity_mix,
            vec![
                SeverityCount {
                    severity: Severity::Low,
                    count: 1
                },
                SeverityCount {
                    severity: Severity::Medium,
                    count: 0
                },
                SeverityCount {
                    severity: Severity::High,
                    count: 2
                },
            ]
        );
    }
}
