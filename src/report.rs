use std::fmt::Write;

use crate::dashboard::Dashboard;
use crate::loader::LoadReport;

fn fmt_mean(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "n/a".to_string(),
    }
}

fn fmt_set(values: &std::collections::BTreeSet<String>) -> String {
    if values.is_empty() {
        "(none)".to_string()
    } else {
        values.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

pub fn build_markdown(dashboard: &Dashboard, load: Option<&LoadReport>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Global Operations Control Tower");
    let _ = writeln!(
        output,
        "Regions: {} | Apps: {}",
        fmt_set(&dashboard.selection.regions),
        fmt_set(&dashboard.selection.apps)
    );
    match &dashboard.date_range {
        Some(range) => {
            let _ = writeln!(output, "Data from {} to {}", range.start, range.end);
        }
        None => {
            let _ = writeln!(output, "No rows match the current filters.");
        }
    }
    if let Some(load) = load.filter(|l| l.skipped() > 0) {
        let _ = writeln!(
            output,
            "{} input rows were skipped while loading.",
            load.skipped()
        );
    }

    let kpis = &dashboard.kpis;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Metrics");
    let _ = writeln!(
        output,
        "- Avg. Resolution Time (hrs): {}",
        fmt_mean(kpis.avg_resolution_time)
    );
    let _ = writeln!(output, "- High Severity Reports: {}", kpis.high_severity_count);
    let _ = writeln!(
        output,
        "- Avg. Compliance Score: {}",
        fmt_mean(kpis.avg_compliance_score)
    );
    let mix = kpis
        .severity_mix
        .iter()
        .map(|s| format!("{} {}", s.count, s.severity))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(output, "- Total Reports: {} ({})", kpis.total_reports, mix);

    let trends = &dashboard.trends;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Trends Over Time");
    if trends.daily_reports.is_empty()
        && trends.daily_resolution_time.is_empty()
        && trends.daily_compliance_score.is_empty()
    {
        let _ = writeln!(output, "No daily data for this selection.");
    } else {
        let _ = writeln!(output, "| date | reports | avg resolution (hrs) | avg compliance |");
        let _ = writeln!(output, "|---|---|---|---|");
        let mut dates: Vec<_> = trends
            .daily_reports
            .iter()
            .map(|d| d.date)
            .chain(trends.daily_resolution_time.iter().map(|d| d.date))
            .chain(trends.daily_compliance_score.iter().map(|d| d.date))
            .collect();
        dates.sort_unstable();
        dates.dedup();
        for date in dates {
            let reports = trends
                .daily_reports
                .iter()
                .find(|d| d.date == date)
                .map_or_else(|| "-".to_string(), |d| d.report_count.to_string());
            let resolution = trends
                .daily_resolution_time
                .iter()
                .find(|d| d.date == date)
                .map_or_else(|| "-".to_string(), |d| format!("{:.2}", d.value));
            let compliance = trends
                .daily_compliance_score
                .iter()
                .find(|d| d.date == date)
                .map_or_else(|| "-".to_string(), |d| format!("{:.2}", d.value));
            let _ = writeln!(output, "| {date} | {reports} | {resolution} | {compliance} |");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Anomaly Detection");
    if dashboard.anomalies.is_empty() {
        let _ = writeln!(
            output,
            "No daily report spikes beyond |z| > {}.",
            dashboard.z_threshold
        );
    } else {
        let _ = writeln!(output, "High Severity Report Spikes:");
        for anomaly in &dashboard.anomalies {
            let _ = writeln!(
                output,
                "- {}: {} reports (z = {:.2})",
                anomaly.date, anomaly.report_count, anomaly.z_score
            );
        }
    }

    let breakdowns = &dashboard.breakdowns;
    let label = breakdowns.key.label();
    let _ = writeln!(output);
    let _ = writeln!(output, "## Breakdown by {label}");
    let _ = writeln!(output, "### High severity reports");
    if breakdowns.high_severity_reports.is_empty() {
        let _ = writeln!(output, "No high severity reports.");
    }
    for row in &breakdowns.high_severity_reports {
        let _ = writeln!(output, "- {}: {}", row.key, row.value);
    }
    let _ = writeln!(output, "### Avg. resolution time (hrs)");
    if breakdowns.resolution_time.is_empty() {
        let _ = writeln!(output, "No data.");
    }
    for row in &breakdowns.resolution_time {
        let _ = writeln!(output, "- {}: {:.2}", row.key, row.value);
    }
    let _ = writeln!(output, "### Avg. compliance score");
    if breakdowns.compliance_score.is_empty() {
        let _ = writeln!(output, "No data.");
    }
    for row in &breakdowns.compliance_score {
        let _ = writeln!(output, "- {}: {:.2}", row.key, row.value);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Alerts");
    for message in dashboard.alerts.messages() {
        let _ = writeln!(output, "- {message}");
    }

    output
}

pub fn build_json(dashboard: &Dashboard) -> serde_json::Result<String> {
    serde_json::to_string_pretty(dashboard)
}
