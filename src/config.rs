//! Settings file parsing (TOML) and validation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::aggregate::BreakdownKey;
use crate::alerts::Thresholds;
use crate::anomaly::DEFAULT_Z_THRESHOLD;
use crate::error::{Result, TowerError};
use crate::filter::DefaultScope;
use crate::loader::DataPaths;

pub const DEFAULT_CONFIG_FILE: &str = "control-tower.toml";
pub const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub data: DataSettings,
    pub thresholds: Thresholds,
    pub anomaly: AnomalySettings,
    pub filters: FilterSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataSettings {
    /// Relative paths resolve against the working directory.
    pub dir: PathBuf,
    // Per-file overrides, relative to `dir` unless absolute.
    pub user_reports: Option<PathBuf>,
    pub response_times: Option<PathBuf>,
    pub policy_compliance: Option<PathBuf>,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_DATA_DIR),
            user_reports: None,
            response_times: None,
            policy_compliance: None,
        }
    }
}

impl DataSettings {
    pub fn paths(&self) -> DataPaths {
        let mut paths = DataPaths::in_dir(&self.dir);
        let resolve = |file: &Path| self.dir.join(file);
        if let Some(file) = &self.user_reports {
            paths.user_reports = resolve(file);
        }
        if let Some(file) = &self.response_times {
            paths.response_times = resolve(file);
        }
        if let Some(file) = &self.policy_compliance {
            paths.policy_compliance = resolve(file);
        }
        paths
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnomalySettings {
    pub z_threshold: f64,
}

impl Default for AnomalySettings {
    fn default() -> Self {
        Self {
            z_threshold: DEFAULT_Z_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterSettings {
    pub default_scope: DefaultScope,
    pub breakdown_by: BreakdownKey,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let z = self.anomaly.z_threshold;
        if !z.is_finite() || z <= 0.0 {
            return Err(TowerError::Config(format!(
                "anomaly.z_threshold must be a positive number, got {z}"
            )));
        }
        let hours = self.thresholds.max_resolution_hours;
        if !hours.is_finite() || hours < 0.0 {
            return Err(TowerError::Config(format!(
                "thresholds.max_resolution_hours must be non-negative, got {hours}"
            )));
        }
        let score = self.thresholds.min_compliance_score;
        if !(0.0..=100.0).contains(&score) {
            return Err(TowerError::Config(format!(
                "thresholds.min_compliance_score must be within 0..=100, got {score}"
            )));
        }
        Ok(())
    }
}

pub fn parse_settings(content: &str) -> Result<Settings> {
    let settings: Settings = toml::from_str(content)?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings from `path`. Without an explicit path, the default file in
/// the working directory is used when present, built-in defaults otherwise.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !fallback.exists() {
                tracing::debug!("no {DEFAULT_CONFIG_FILE}; using built-in settings");
                return Ok(Settings::default());
            }
            fallback
        }
    };

    let content = fs::read_to_string(&path).map_err(|source| TowerError::FileRead {
        path: path.clone(),
        source,
    })?;
    let settings = parse_settings(&content)?;
    tracing::info!(path = %path.display(), "loaded settings");
    Ok(settings)
}
