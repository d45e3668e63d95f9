use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

mod aggregate;
mod alerts;
mod anomaly;
mod bootstrap;
mod config;
mod dashboard;
mod error;
mod filter;
mod geo;
mod loader;
mod models;
mod report;
mod watch;

use aggregate::BreakdownKey;
use bootstrap::LogLevel;
use config::Settings;
use dashboard::Dashboard;
use filter::{DefaultScope, Selection};
use models::Datasets;

#[derive(Parser)]
#[command(name = "control-tower")]
#[command(about = "Global operations control tower: KPIs, trends, anomalies and alerts", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Settings file (defaults to ./control-tower.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding the three CSV datasets (default: ./data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Region to include; repeat for several. Defaults to every known region
    #[arg(long = "region", global = true)]
    regions: Vec<String>,
    /// App to include; repeat for several. Defaults to every known app
    #[arg(long = "app", global = true)]
    apps: Vec<String>,
    /// Where the default region/app choices come from
    #[arg(long, value_enum, global = true)]
    default_scope: Option<DefaultScope>,
    /// Dimension for the breakdown tables
    #[arg(long, value_enum, global = true)]
    breakdown_by: Option<BreakdownKey>,
    /// |z| above which a day's report count is flagged
    #[arg(long, global = true)]
    z_threshold: Option<f64>,
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the dashboard as markdown
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Write the dashboard as JSON (stdout unless --out is given)
    Snapshot {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print alert messages, or the all-clear line
    Alerts {
        /// Exit with an error when any alert fires
        #[arg(long)]
        fail_on_alert: bool,
    },
    /// List the regions and apps available for filtering
    Filters,
    /// Re-render the markdown report whenever an input file changes
    Watch {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
    },
}

impl GlobalArgs {
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = config::load_settings(self.config.as_deref())?;
        if let Some(dir) = &self.data_dir {
            settings.data.dir = dir.clone();
        }
        if let Some(scope) = self.default_scope {
            settings.filters.default_scope = scope;
        }
        if let Some(key) = self.breakdown_by {
            settings.filters.breakdown_by = key;
        }
        if let Some(z) = self.z_threshold {
            settings.anomaly.z_threshold = z;
        }
        settings.validate()?;
        Ok(settings)
    }

    fn selection(&self, datasets: &Datasets, scope: DefaultScope) -> Selection {
        let regions = (!self.regions.is_empty()).then(|| self.regions.clone());
        let apps = (!self.apps.is_empty()).then(|| self.apps.clone());

        match (regions, apps) {
            (Some(regions), Some(apps)) => Selection::new(regions, apps),
            (regions, apps) => {
                if scope == DefaultScope::UserReports {
                    let dropped = filter::rows_outside_report_defaults(datasets);
                    if dropped > 0 {
                        tracing::warn!(
                            dropped,
                            "response-time/compliance rows use regions or apps absent from \
                             user reports and fall outside the default filters; \
                             use --default-scope union to keep them"
                        );
                    }
                }
                Selection::defaults(datasets, scope).narrowed(regions, apps)
            }
        }
    }
}

fn load(
    global: &GlobalArgs,
    settings: &Settings,
) -> anyhow::Result<(Datasets, loader::LoadReport, Selection)> {
    let (datasets, load) = loader::load_datasets(&settings.data.paths())
        .with_context(|| format!("failed to load datasets from {}", settings.data.dir.display()))?;
    tracing::info!(
        reports = datasets.reports.len(),
        response_times = datasets.response_times.len(),
        compliance = datasets.compliance.len(),
        skipped = load.skipped(),
        "datasets loaded"
    );
    if datasets.is_empty() {
        tracing::warn!("all three datasets are empty");
    }
    let selection = global.selection(&datasets, settings.filters.default_scope);
    Ok((datasets, load, selection))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    bootstrap::setup_logging(cli.global.log_level)?;

    let settings = cli.global.settings()?;
    let scope = settings.filters.default_scope;

    match cli.command {
        Commands::Report { out } => {
            let (datasets, load, selection) = load(&cli.global, &settings)?;
            let dashboard = Dashboard::build(&datasets, &selection, &settings);
            std::fs::write(&out, report::build_markdown(&dashboard, Some(&load)))
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Snapshot { out } => {
            let (datasets, _, selection) = load(&cli.global, &settings)?;
            let dashboard = Dashboard::build(&datasets, &selection, &settings);
            let json = report::build_json(&dashboard)?;
            match out {
                Some(out) => {
                    std::fs::write(&out, json)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                    eprintln!("Snapshot written to {}.", out.display());
                }
                None => println!("{json}"),
            }
        }
        Commands::Alerts { fail_on_alert } => {
            let (datasets, _, selection) = load(&cli.global, &settings)?;
            let dashboard = Dashboard::build(&datasets, &selection, &settings);
            for message in dashboard.alerts.messages() {
                println!("{message}");
            }
            let firing = dashboard.alerts.alerts().len();
            if fail_on_alert && firing > 0 {
                anyhow::bail!("{firing} alerts firing");
            }
        }
        Commands::Filters => {
            let (datasets, _, _) = load(&cli.global, &settings)?;
            let available = Selection::defaults(&datasets, scope);
            println!("Regions:");
            for region in &available.regions {
                let country = geo::country_for_region(region).map_or("unmapped", |c| c.name);
                println!("- {region} ({country})");
            }
            println!("Apps:");
            for app in &available.apps {
                println!("- {app}");
            }
        }
        Commands::Watch { out, interval_secs } => {
            let watcher = watch::Watcher::new(
                settings.data.paths(),
                Duration::from_secs(interval_secs.max(1)),
            );
            let global = &cli.global;
            let select = |datasets: &Datasets| global.selection(datasets, scope);
            let render = |datasets: &Datasets,
                          selection: &Selection,
                          load: &loader::LoadReport|
             -> anyhow::Result<()> {
                let dashboard = Dashboard::build(datasets, selection, &settings);
                std::fs::write(&out, report::build_markdown(&dashboard, Some(load)))
                    .with_context(|| format!("failed to write {}", out.display()))?;
                println!("Report written to {}.", out.display());
                Ok(())
            };
            tracing::info!(out = %out.display(), "watching input files");
            watcher.run(&select, &render).await?;
        }
    }

    Ok(())
}
