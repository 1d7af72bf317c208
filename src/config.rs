//! mongo_migrate configuration, express in toml.
//!
//! Basic configuration file example:
//! ```toml
//! [src]
//! url = "mongodb://localhost:27017"
//!
//! [dst]
//! url = "mongodb://localhost:27018"
//!
//! [migrate]
//! # databases never copied, replaces the default list when given.
//! exclude = ["admin", "config", "local"]
//! # deadline for the whole run.
//! timeout = "10m"
//! # stream collections and insert every `chunk_size` documents.
//! chunk_size = 10000
//! ```
//!
//! Every value can be overridden from the command line, see [ConfigOverrides].
use crate::blocking::{Side, TransferMode};
use crate::error::ConfigError;
use crate::{DEFAULT_EXCLUDED_DBS, DEFAULT_TIMEOUT};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

/// Database names which are never copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionSet {
    names: BTreeSet<String>,
}

impl ExclusionSet {
    /// exclude nothing, every database is copied.
    pub fn empty() -> ExclusionSet {
        ExclusionSet {
            names: BTreeSet::new(),
        }
    }

    pub fn contains(&self, db: &str) -> bool {
        self.names.contains(db)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// mongodb administrative databases, plus `test`.
impl Default for ExclusionSet {
    fn default() -> Self {
        DEFAULT_EXCLUDED_DBS.iter().copied().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        ExclusionSet {
            names: iter
                .into_iter()
                .map(Into::into)
                .map(|name: String| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }
}

/// Everything a migration run needs, immutable once built.
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    source_uri: String,
    dest_uri: String,
    exclusions: ExclusionSet,
    timeout: Duration,
    transfer_mode: TransferMode,
}

impl MigrateConfig {
    /// create a configuration with default exclusions, timeout and transfer mode.
    pub fn new(source_uri: String, dest_uri: String) -> MigrateConfig {
        MigrateConfig {
            source_uri,
            dest_uri,
            exclusions: ExclusionSet::default(),
            timeout: DEFAULT_TIMEOUT,
            transfer_mode: TransferMode::default(),
        }
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> MigrateConfig {
        self.exclusions = exclusions;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> MigrateConfig {
        self.timeout = timeout;
        self
    }

    pub fn with_transfer_mode(mut self, transfer_mode: TransferMode) -> MigrateConfig {
        self.transfer_mode = transfer_mode;
        self
    }

    /// Build configuration from an optional config file, `overrides` win over the file.
    pub fn resolve(
        file: Option<FileConfig>,
        overrides: ConfigOverrides,
    ) -> Result<MigrateConfig, ConfigError> {
        let file = file.unwrap_or_default();

        let source_uri = overrides
            .source_uri
            .or_else(|| file.src.map(|src| src.url))
            .ok_or(ConfigError::MissingUri { side: Side::Source })?;
        let dest_uri = overrides
            .dest_uri
            .or_else(|| file.dst.map(|dst| dst.url))
            .ok_or(ConfigError::MissingUri {
                side: Side::Destination,
            })?;

        let exclusions = match overrides.exclude.or(file.migrate.exclude) {
            Some(names) => names.into_iter().collect(),
            None => ExclusionSet::default(),
        };
        let timeout = match overrides.timeout.or(file.migrate.timeout) {
            Some(timeout) => parse_duration(&timeout)?,
            None => DEFAULT_TIMEOUT,
        };
        let transfer_mode = match overrides.chunk_size.or(file.migrate.chunk_size) {
            Some(size) => TransferMode::Chunked(
                NonZeroUsize::new(size).ok_or(ConfigError::InvalidChunkSize)?,
            ),
            None => TransferMode::Buffered,
        };

        Ok(MigrateConfig {
            source_uri,
            dest_uri,
            exclusions,
            timeout,
            transfer_mode,
        })
    }

    /// get source mongodb uri.
    pub fn get_src_uri(&self) -> &str {
        &self.source_uri
    }

    /// get destination mongodb uri.
    pub fn get_dst_uri(&self) -> &str {
        &self.dest_uri
    }

    /// get connection uri of one side.
    pub fn get_uri(&self, side: Side) -> &str {
        match side {
            Side::Source => self.get_src_uri(),
            Side::Destination => self.get_dst_uri(),
        }
    }

    pub fn get_exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    /// deadline for the whole run.
    pub fn get_timeout(&self) -> Duration {
        self.timeout
    }

    pub fn get_transfer_mode(&self) -> TransferMode {
        self.transfer_mode
    }
}

/// Values given on the command line, each one overrides the config file.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub source_uri: Option<String>,
    pub dest_uri: Option<String>,
    pub exclude: Option<Vec<String>>,
    pub timeout: Option<String>,
    pub chunk_size: Option<usize>,
}

/// Configuration file content.
#[derive(Deserialize, Debug, Default)]
pub struct FileConfig {
    src: Option<Endpoint>,
    dst: Option<Endpoint>,
    #[serde(default)]
    migrate: MigrateSection,
}

impl FileConfig {
    /// load configuration file from `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<FileConfig, ConfigError> {
        let data = std::fs::read(path)?;
        Ok(toml::from_slice(&data)?)
    }

    pub fn from_toml(data: &str) -> Result<FileConfig, ConfigError> {
        Ok(toml::from_str(data)?)
    }
}

/// Source or destination database configuration.
#[derive(Deserialize, Debug)]
struct Endpoint {
    /// database url, begins with 'mongodb://' or 'mongodb+srv://'.
    url: String,
}

#[derive(Deserialize, Debug, Default)]
struct MigrateSection {
    exclude: Option<Vec<String>>,
    timeout: Option<String>,
    chunk_size: Option<usize>,
}

/// Parse durations like `500ms`, `10s`, `5m`, `1h`.  A bare number is seconds.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidTimeout(input.to_string());
    let text = input.trim();
    let split_at = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split_at);
    let number: u64 = number.parse().map_err(|_| invalid())?;

    let duration = match unit.trim() {
        "ms" => Duration::from_millis(number),
        "" | "s" => Duration::from_secs(number),
        "m" => Duration::from_secs(number.checked_mul(60).ok_or_else(invalid)?),
        "h" => Duration::from_secs(number.checked_mul(60 * 60).ok_or_else(invalid)?),
        _ => return Err(invalid()),
    };
    Ok(duration)
}
