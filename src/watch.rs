//! Reload-on-change loop. Each reload produces a fresh, immutable
//! [`Datasets`]; a failed reload keeps serving the previous one.

use std::fs;
use std::future::Future;
use std::path::Path;
use std::time::{Duration, SystemTime};

use tokio::time;

use crate::filter::Selection;
use crate::loader::{self, DataPaths, LoadReport};
use crate::models::Datasets;

/// Last-modified time and size of every input file; `None` where a file
/// is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(Vec<Option<(SystemTime, u64)>>);

impl Fingerprint {
    pub fn of(paths: &DataPaths) -> Self {
        Self(paths.all().iter().map(|p| modified(p)).collect())
    }
}

fn modified(path: &Path) -> Option<(SystemTime, u64)> {
    let meta = fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

/// Builds a selection for freshly loaded data.
pub type SelectionFn<'a> = dyn Fn(&Datasets) -> Selection + Send + Sync + 'a;

/// Renders and writes one refresh of the dashboard.
pub type RenderFn<'a> =
    dyn Fn(&Datasets, &Selection, &LoadReport) -> anyhow::Result<()> + Send + Sync + 'a;

pub struct Watcher {
    paths: DataPaths,
    interval: Duration,
}

impl Watcher {
    pub fn new(paths: DataPaths, interval: Duration) -> Self {
        Self { paths, interval }
    }

    /// Poll until Ctrl-C, re-rendering whenever any input file changes.
    pub async fn run(
        &self,
        select: &SelectionFn<'_>,
        render: &RenderFn<'_>,
    ) -> anyhow::Result<()> {
        let ctrl_c = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("cannot listen for Ctrl+C: {err}");
                std::future::pending::<()>().await;
            }
            tracing::info!("Ctrl+C received; stopping watch");
        };
        self.run_until(select, render, ctrl_c).await
    }

    /// Same loop as [`Watcher::run`], stopping once `shutdown` completes.
    pub async fn run_until(
        &self,
        select: &SelectionFn<'_>,
        render: &RenderFn<'_>,
        shutdown: impl Future<Output = ()>,
    ) -> anyhow::Result<()> {
        let mut fingerprint = Fingerprint::of(&self.paths);
        let (datasets, load) = loader::load_datasets(&self.paths)?;
        render(&datasets, &select(&datasets), &load)?;

        let mut interval = time::interval(self.interval);
        // The first tick fires immediately; the initial render already happened.
        interval.tick().await;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = &mut shutdown => return Ok(()),
            }

            let current = Fingerprint::of(&self.paths);
            if current == fingerprint {
                continue;
            }
            fingerprint = current;
            tracing::info!("input files changed; reloading");

            match loader::load_datasets(&self.paths) {
                Ok((datasets, load)) => {
                    if let Err(err) = render(&datasets, &select(&datasets), &load) {
                        tracing::error!("render failed: {err:#}");
                    }
                }
                Err(err) => {
                    tracing::error!("reload failed, keeping previous snapshot: {err}");
                }
            }
        }
    }
}
