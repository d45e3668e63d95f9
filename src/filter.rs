use std::collections::BTreeSet;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::models::{Datasets, Record};

/// Where the default region/app choices come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefaultScope {
    /// Distinct values of the user-reports dataset only. Rows of the other
    /// datasets with values unseen in user reports fall outside the default.
    #[default]
    UserReports,
    /// Distinct values across all three datasets.
    Union,
}

/// Allowed regions and apps. An empty set allows nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub regions: BTreeSet<String>,
    pub apps: BTreeSet<String>,
}

impl Selection {
    pub fn new<R, A>(regions: R, apps: A) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            regions: regions.into_iter().map(Into::into).collect(),
            apps: apps.into_iter().map(Into::into).collect(),
        }
    }

    pub fn defaults(datasets: &Datasets, scope: DefaultScope) -> Self {
        let mut selection = Self::default();
        selection.extend_from(&datasets.reports);
        if scope == DefaultScope::Union {
            selection.extend_from(&datasets.response_times);
            selection.extend_from(&datasets.compliance);
        }
        selection
    }

    fn extend_from<T: Record>(&mut self, rows: &[T]) {
        for row in rows {
            if !self.regions.contains(row.region()) {
                self.regions.insert(row.region().to_string());
            }
            if !self.apps.contains(row.app()) {
                self.apps.insert(row.app().to_string());
            }
        }
    }

    /// Replace either dimension with an explicit operator choice.
    pub fn narrowed(mut self, regions: Option<Vec<String>>, apps: Option<Vec<String>>) -> Self {
        if let Some(regions) = regions {
            self.regions = regions.into_iter().collect();
        }
        if let Some(apps) = apps {
            self.apps = apps.into_iter().collect();
        }
        self
    }

    pub fn allows<T: Record>(&self, row: &T) -> bool {
        self.regions.contains(row.region()) && self.apps.contains(row.app())
    }
}

pub fn filter_records<T: Record + Clone>(rows: &[T], selection: &Selection) -> Vec<T> {
    rows.iter()
        .filter(|row| selection.allows(*row))
        .cloned()
        .collect()
}

/// Filtered copies of all three datasets.
pub fn filter_datasets(datasets: &Datasets, selection: &Selection) -> Datasets {
    Datasets {
        reports: filter_records(&datasets.reports, selection),
        response_times: filter_records(&datasets.response_times, selection),
        compliance: filter_records(&datasets.compliance, selection),
    }
}

/// Rows of the response-time and compliance datasets that the user-reports
/// default selection can never match.
pub fn rows_outside_report_defaults(datasets: &Datasets) -> usize {
    let defaults = Selection::defaults(datasets, DefaultScope::UserReports);
    let response_times = datasets
        .response_times
        .iter()
        .filter(|row| !defaults.allows(*row))
        .count();
    let compliance = datasets
        .compliance
        .iter()
        .filter(|row| !defaults.allows(*row))
        .count();
    response_times + compliance
}
