//! One full pass of the pipeline for a given selection:
//! filter, aggregate, then detect anomalies and evaluate alerts.

use chrono::NaiveDate;
use serde::Serialize;

use crate::aggregate::{self, BreakdownKey, Breakdowns, Trends};
use crate::alerts::{self, AlertStatus};
use crate::anomaly;
use crate::config::Settings;
use crate::filter::{self, Selection};
use crate::geo;
use crate::models::{Anomaly, BreakdownRow, Datasets, Kpis, Record};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Value per country, keyed by ISO-3 for map rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapCell {
    pub country: String,
    pub iso3: &'static str,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapLayer {
    pub metric: &'static str,
    pub cells: Vec<MapCell>,
}

/// Everything the presentation layer receives for one interaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub selection: Selection,
    pub date_range: Option<DateRange>,
    pub kpis: Kpis,
    pub trends: Trends,
    pub anomalies: Vec<Anomaly>,
    pub z_threshold: f64,
    pub breakdowns: Breakdowns,
    pub map: Vec<MapLayer>,
    pub alerts: AlertStatus,
}

impl Dashboard {
    pub fn build(datasets: &Datasets, selection: &Selection, settings: &Settings) -> Self {
        let filtered = filter::filter_datasets(datasets, selection);
        tracing::debug!(
            reports = filtered.reports.len(),
            response_times = filtered.response_times.len(),
            compliance = filtered.compliance.len(),
            "filtered datasets"
        );

        let kpis = aggregate::kpis(&filtered);
        let trends = aggregate::trends(&filtered);
        let z_threshold = settings.anomaly.z_threshold;
        let anomalies = anomaly::detect_spikes(&trends.daily_reports, z_threshold);

        let by_country = aggregate::breakdowns(&filtered, BreakdownKey::Country);
        let alerts = AlertStatus::from(alerts::evaluate_alerts(&by_country, &settings.thresholds));
        let map = map_layers(&by_country);
        let breakdowns = match settings.filters.breakdown_by {
            BreakdownKey::Country => by_country,
            key => aggregate::breakdowns(&filtered, key),
        };

        tracing::info!(
            anomalies = anomalies.len(),
            alerts = alerts.alerts().len(),
            "dashboard computed"
        );

        Self {
            selection: selection.clone(),
            date_range: date_range(&filtered),
            kpis,
            trends,
            anomalies,
            z_threshold,
            breakdowns,
            map,
            alerts,
        }
    }
}

fn date_range(filtered: &Datasets) -> Option<DateRange> {
    let dates = filtered
        .reports
        .iter()
        .map(Record::date)
        .chain(filtered.response_times.iter().map(Record::date))
        .chain(filtered.compliance.iter().map(Record::date));
    dates.fold(None, |range, date| match range {
        None => Some(DateRange {
            start: date,
            end: date,
        }),
        Some(DateRange { start, end }) => Some(DateRange {
            start: start.min(date),
            end: end.max(date),
        }),
    })
}

fn map_layer(metric: &'static str, rows: &[BreakdownRow<f64>]) -> MapLayer {
    let cells = rows
        .iter()
        .filter_map(|row| {
            geo::country_by_name(&row.key).map(|country| MapCell {
                country: row.key.clone(),
                iso3: country.iso3,
                value: row.value,
            })
        })
        .collect();
    MapLayer { metric, cells }
}

fn map_layers(by_country: &Breakdowns) -> Vec<MapLayer> {
    let high_severity: Vec<BreakdownRow<f64>> = by_country
        .high_severity_reports
        .iter()
        .map(|row| BreakdownRow {
            key: row.key.clone(),
            value: row.value as f64,
        })
        .collect();

    vec![
        map_layer("high_severity_reports", &high_severity),
        map_layer("resolution_time", &by_country.resolution_time),
        map_layer("compliance_score", &by_country.compliance_score),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertRule;
    use crate::filter::DefaultScope;
    use crate::loader::{self, DataPaths};
    use crate::models::{ComplianceRecord, ResponseTimeRecord, Severity, UserReport};
    use std::path::Path;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    fn sample() -> Datasets {
        let mut reports = Vec::new();
        for d in 1..=3 {
            for _ in 0..2 {
                reports.push(UserReport {
                    date: day(d),
                    region: "Asia".to_string(),
                    app: "Mail".to_string(),
                    severity: Severity::High,
                });
            }
        }
        reports.push(UserReport {
            date: day(2),
            region: "Europe".to_string(),
            app: "Payments".to_string(),
            severity: Severity::Low,
        });

        Datasets {
            reports,
            response_times: vec![
                ResponseTimeRecord {
                    date: day(1),
                    region: "Asia".to_string(),
                    app: "Mail".to_string(),
                    resolution_time: 9.0,
                },
                ResponseTimeRecord {
                    date: day(1),
                    region: "Europe".to_string(),
                    app: "Payments".to_string(),
                    resolution_time: 2.0,
                },
            ],
            compliance: vec![ComplianceRecord {
                date: day(4),
                region: "Europe".to_string(),
                app: "Payments".to_string(),
                compliance_score: 60.0,
            }],
        }
    }

    #[test]
    fn builds_every_section() {
        let data = sample();
        let selection = Selection::defaults(&data, DefaultScope::UserReports);
        let dashboard = Dashboard::build(&data, &selection, &Settings::default());

        assert_eq!(dashboard.kpis.total_reports, 7);
        assert_eq!(dashboard.kpis.high_severity_count, 6);
        assert_eq!(dashboard.kpis.avg_resolution_time, Some(5.5));
        assert_eq!(dashboard.trends.daily_reports.len(), 3);
        assert!(dashboard.anomalies.is_empty());
        assert_eq!(
            dashboard.date_range,
            Some(DateRange {
                start: day(1),
                end: day(4)
            })
        );

        let messages = dashboard.alerts.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].starts_with("India: average resolution time"));
        assert!(messages[1].starts_with("Germany: average compliance score"));

        let resolution_layer = &dashboard.map[1];
        assert_eq!(resolution_layer.metric, "resolution_time");
        assert_eq!(resolution_layer.cells[0].iso3, "DEU");
        assert_eq!(resolution_layer.cells[1].iso3, "IND");
    }

    #[test]
    fn empty_selection_yields_no_data() {
        let data = sample();
        let selection = Selection::new(["Oceania"], ["Mail"]);
        let dashboard = Dashboard::build(&data, &selection, &Settings::default());

        assert_eq!(dashboard.kpis.avg_resolution_time, None);
        assert_eq!(dashboard.kpis.avg_compliance_score, None);
        assert_eq!(dashboard.kpis.total_reports, 0);
        assert!(dashboard.trends.daily_reports.is_empty());
        assert!(dashboard.trends.daily_resolution_time.is_empty());
        assert!(dashboard.trends.daily_compliance_score.is_empty());
        assert!(dashboard.anomalies.is_empty());
        assert!(dashboard.alerts.alerts().is_empty());
        assert_eq!(dashboard.alerts, AlertStatus::AllClear);
        assert_eq!(dashboard.date_range, None);
    }

    #[test]
    fn app_breakdown_still_alerts_by_country() {
        let data = sample();
        let selection = Selection::defaults(&data, DefaultScope::UserReports);
        let mut settings = Settings::default();
        settings.filters.breakdown_by = BreakdownKey::App;
        let dashboard = Dashboard::build(&data, &selection, &settings);

        assert_eq!(dashboard.breakdowns.key, BreakdownKey::App);
        assert_eq!(dashboard.breakdowns.high_severity_reports[0].key, "Mail");
        assert_eq!(dashboard.alerts.alerts()[0].country, "India");
    }

    #[test]
    fn bundled_sample_data_flags_spike_and_breaches() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
        let (data, load) = loader::load_datasets(&DataPaths::in_dir(&dir)).expect("sample data");
        assert_eq!(load.skipped(), 0);

        let selection = Selection::defaults(&data, DefaultScope::UserReports);
        assert_eq!(selection.regions.len(), 5);
        let dashboard = Dashboard::build(&data, &selection, &Settings::default());

        assert_eq!(dashboard.anomalies.len(), 1);
        assert_eq!(
            dashboard.anomalies[0].date,
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
        );

        let alerts = dashboard.alerts.alerts();
        assert!(alerts
            .iter()
            .any(|a| a.rule == AlertRule::ResolutionTime && a.country == "India"));
        assert!(alerts
            .iter()
            .any(|a| a.rule == AlertRule::Compliance && a.country == "South Africa"));
        assert!(alerts.iter().all(|a| a.rule != AlertRule::HighSeverityReports));
    }
}
