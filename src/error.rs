use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors raised while loading datasets or configuration.
///
/// Row-level problems never surface here; the loader records them in a
/// [`crate::loader::LoadReport`] and keeps going.
#[derive(Error, Debug)]
pub enum TowerError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An input file lacks a column the pipeline depends on.
    #[error("{path} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    /// The CSV reader failed on a file as a whole (bad header, bad encoding).
    #[error("Failed to parse CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The settings file is not valid TOML for the expected schema.
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, TowerError>;
