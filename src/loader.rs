use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;

use crate::error::{Result, TowerError};
use crate::models::{ComplianceRecord, Datasets, ResponseTimeRecord, Severity, UserReport};

pub const USER_REPORTS_FILE: &str = "user_reports.csv";
pub const RESPONSE_TIMES_FILE: &str = "response_times.csv";
pub const POLICY_COMPLIANCE_FILE: &str = "policy_compliance.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub user_reports: PathBuf,
    pub response_times: PathBuf,
    pub policy_compliance: PathBuf,
}

impl DataPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            user_reports: dir.join(USER_REPORTS_FILE),
            response_times: dir.join(RESPONSE_TIMES_FILE),
            policy_compliance: dir.join(POLICY_COMPLIANCE_FILE),
        }
    }

    pub fn all(&self) -> [&Path; 3] {
        [
            self.user_reports.as_path(),
            self.response_times.as_path(),
            self.policy_compliance.as_path(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowIssueKind {
    UnparseableDate { value: String },
    InvalidSeverity { value: String },
    InvalidMetric { column: String, value: String },
    Malformed { reason: String },
}

impl fmt::Display for RowIssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowIssueKind::UnparseableDate { value } => write!(f, "unparseable date '{value}'"),
            RowIssueKind::InvalidSeverity { value } => write!(f, "invalid severity '{value}'"),
            RowIssueKind::InvalidMetric { column, value } => {
                write!(f, "invalid {column} '{value}'")
            }
            RowIssueKind::Malformed { reason } => write!(f, "malformed row: {reason}"),
        }
    }
}

/// A skipped input row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowIssue {
    pub path: PathBuf,
    pub line: u64,
    pub kind: RowIssueKind,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub rows_loaded: usize,
    pub issues: Vec<RowIssue>,
}

impl LoadReport {
    pub fn skipped(&self) -> usize {
        self.issues.len()
    }
}

/// Borrowed view of the columns every dataset shares plus its metric column.
struct RawRow<'a> {
    date: NaiveDate,
    region: &'a str,
    app: &'a str,
    metric: &'a str,
}

pub fn load_datasets(paths: &DataPaths) -> Result<(Datasets, LoadReport)> {
    let mut report = LoadReport::default();

    let reports = read_table(&paths.user_reports, "severity", &mut report, |row| {
        let severity = row
            .metric
            .parse::<Severity>()
            .map_err(|_| RowIssueKind::InvalidSeverity {
                value: row.metric.to_string(),
            })?;
        Ok(UserReport {
            date: row.date,
            region: row.region.to_string(),
            app: row.app.to_string(),
            severity,
        })
    })?;

    let response_times = read_table(&paths.response_times, "resolution_time", &mut report, |row| {
        let resolution_time = parse_metric(row.metric, "resolution_time", |v| v >= 0.0)?;
        Ok(ResponseTimeRecord {
            date: row.date,
            region: row.region.to_string(),
            app: row.app.to_string(),
            resolution_time,
        })
    })?;

    let compliance = read_table(
        &paths.policy_compliance,
        "compliance_score",
        &mut report,
        |row| {
            let compliance_score =
                parse_metric(row.metric, "compliance_score", |v| (0.0..=100.0).contains(&v))?;
            Ok(ComplianceRecord {
                date: row.date,
                region: row.region.to_string(),
                app: row.app.to_string(),
                compliance_score,
            })
        },
    )?;

    if report.skipped() > 0 {
        tracing::warn!(
            skipped = report.skipped(),
            "skipped rows that could not be parsed"
        );
    }

    Ok((
        Datasets {
            reports,
            response_times,
            compliance,
        },
        report,
    ))
}

fn read_table<T>(
    path: &Path,
    metric_column: &str,
    report: &mut LoadReport,
    mut build: impl FnMut(&RawRow<'_>) -> std::result::Result<T, RowIssueKind>,
) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|source| TowerError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let headers = reader
        .headers()
        .map_err(|source| TowerError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    let date_idx = column_index(&headers, path, "date")?;
    let region_idx = column_index(&headers, path, "region")?;
    let app_idx = column_index(&headers, path, "app")?;
    let metric_idx = column_index(&headers, path, metric_column)?;

    let mut rows = Vec::new();
    let mut record = StringRecord::new();

    loop {
        let line = reader.position().line();
        match reader.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {}
            Err(err) if err.is_io_error() => {
                return Err(TowerError::Csv {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
            Err(err) => {
                push_issue(
                    report,
                    path,
                    line,
                    RowIssueKind::Malformed {
                        reason: err.to_string(),
                    },
                );
                continue;
            }
        }
        let line = record.position().map(|p| p.line()).unwrap_or(line);

        let field = |idx: usize| record.get(idx).unwrap_or("");
        let raw_date = field(date_idx);
        let Some(date) = parse_date(raw_date) else {
            push_issue(
                report,
                path,
                line,
                RowIssueKind::UnparseableDate {
                    value: raw_date.to_string(),
                },
            );
            continue;
        };

        let raw = RawRow {
            date,
            region: field(region_idx),
            app: field(app_idx),
            metric: field(metric_idx),
        };
        match build(&raw) {
            Ok(row) => rows.push(row),
            Err(kind) => push_issue(report, path, line, kind),
        }
    }

    tracing::debug!(path = %path.display(), rows = rows.len(), "loaded table");
    report.rows_loaded += rows.len();
    Ok(rows)
}

fn column_index(headers: &StringRecord, path: &Path, column: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| TowerError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        })
}

fn push_issue(report: &mut LoadReport, path: &Path, line: u64, kind: RowIssueKind) {
    tracing::warn!(path = %path.display(), line, "skipping row: {kind}");
    report.issues.push(RowIssue {
        path: path.to_path_buf(),
        line,
        kind,
    });
}

fn parse_metric(
    value: &str,
    column: &str,
    valid: impl Fn(f64) -> bool,
) -> std::result::Result<f64, RowIssueKind> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() && valid(v) => Ok(v),
        _ => Err(RowIssueKind::InvalidMetric {
            column: column.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Accepts a plain ISO date or a timestamp, keeping only the calendar day.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts.date());
        }
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|ts| ts.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, contents: &str) {
        let mut file = File::create(dir.join(name)).expect("create fixture");
        file.write_all(contents.as_bytes()).expect("write fixture");
    }

    fn write_fixtures(dir: &Path, reports: &str) {
        write_file(dir, USER_REPORTS_FILE, reports);
        write_file(
            dir,
            RESPONSE_TIMES_FILE,
            "date,region,app,resolution_time\n2024-01-01,Europe,Payments,4.5\n",
        );
        write_file(
            dir,
            POLICY_COMPLIANCE_FILE,
            "date,region,app,compliance_score\n2024-01-01,Europe,Payments,88\n",
        );
    }

    #[test]
    fn loads_all_three_tables() {
        let tmp = TempDir::new().expect("tempdir");
        write_fixtures(
            tmp.path(),
            "date,region,app,severity\n2024-01-01,Europe,Payments,high\n2024-01-02,Asia,Mail,low\n",
        );

        let (datasets, report) = load_datasets(&DataPaths::in_dir(tmp.path())).expect("load");
        assert_eq!(datasets.reports.len(), 2);
        assert_eq!(datasets.reports[0].severity, Severity::High);
        assert_eq!(datasets.response_times[0].resolution_time, 4.5);
        assert_eq!(datasets.compliance[0].compliance_score, 88.0);
        assert_eq!(report.rows_loaded, 4);
        assert_eq!(report.skipped(), 0);
    }

    #[test]
    fn missing_column_is_fatal() {
        let tmp = TempDir::new().expect("tempdir");
        write_fixtures(tmp.path(), "date,region,app\n2024-01-01,Europe,Payments\n");

        let err = load_datasets(&DataPaths::in_dir(tmp.path())).unwrap_err();
        match err {
            TowerError::MissingColumn { column, path } => {
                assert_eq!(column, "severity");
                assert!(path.ends_with(USER_REPORTS_FILE));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_fatal() {
        let tmp = TempDir::new().expect("tempdir");
        let err = load_datasets(&DataPaths::in_dir(tmp.path())).unwrap_err();
        assert!(matches!(err, TowerError::FileRead { .. }));
    }

    #[test]
    fn bad_rows_are_skipped_and_recorded() {
        let tmp = TempDir::new().expect("tempdir");
        write_fixtures(
            tmp.path(),
            "date,region,app,severity\n\
             2024-01-01,Europe,Payments,high\n\
             not-a-date,Europe,Payments,high\n\
             2024-01-03,Europe,Payments,urgent\n",
        );

        let (datasets, report) = load_datasets(&DataPaths::in_dir(tmp.path())).expect("load");
        assert_eq!(datasets.reports.len(), 1);
        assert_eq!(report.skipped(), 2);
        assert_eq!(report.issues[0].line, 3);
        assert_eq!(
            report.issues[0].kind,
            RowIssueKind::UnparseableDate {
                value: "not-a-date".to_string()
            }
        );
        assert!(matches!(
            report.issues[1].kind,
            RowIssueKind::InvalidSeverity { .. }
        ));
    }

    #[test]
    fn out_of_range_metrics_are_skipped() {
        let tmp = TempDir::new().expect("tempdir");
        write_fixtures(tmp.path(), "date,region,app,severity\n");
        write_file(
            tmp.path(),
            RESPONSE_TIMES_FILE,
            "date,region,app,resolution_time\n2024-01-01,Asia,Mail,-1\n2024-01-01,Asia,Mail,abc\n",
        );
        write_file(
            tmp.path(),
            POLICY_COMPLIANCE_FILE,
            "date,region,app,compliance_score\n2024-01-01,Asia,Mail,101\n2024-01-01,Asia,Mail,100\n",
        );

        let (datasets, report) = load_datasets(&DataPaths::in_dir(tmp.path())).expect("load");
        assert!(datasets.response_times.is_empty());
        assert_eq!(datasets.compliance.len(), 1);
        assert_eq!(report.skipped(), 3);
    }

    #[test]
    fn columns_may_appear_in_any_order() {
        let tmp = TempDir::new().expect("tempdir");
        write_fixtures(
            tmp.path(),
            "severity,app,id,region,date\nmedium, Mail ,7,Asia,2024-02-10\n",
        );

        let (datasets, _) = load_datasets(&DataPaths::in_dir(tmp.path())).expect("load");
        assert_eq!(datasets.reports[0].app, "Mail");
        assert_eq!(datasets.reports[0].region, "Asia");
        assert_eq!(datasets.reports[0].severity, Severity::Medium);
    }

    #[test]
    fn parse_date_accepts_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6);
        assert_eq!(parse_date("2024-05-06"), expected);
        assert_eq!(parse_date("2024-05-06 13:45:00"), expected);
        assert_eq!(parse_date("2024-05-06T13:45:00"), expected);
        assert_eq!(parse_date("2024-05-06T13:45:00+02:00"), expected);
        assert_eq!(parse_date("06/05/2024"), None);
    }
}
