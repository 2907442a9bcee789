//! Configuration types for the gallery rotator

use crate::select::SelectionRequest;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the gallery folder created inside the library when no explicit
/// gallery path is configured
pub const DEFAULT_GALLERY_NAME: &str = "Gallery";

/// View history document name
pub const HISTORY_FILENAME: &str = "viewed_photos.json";

/// Metadata cache document name
pub const METADATA_FILENAME: &str = "photo_metadata.json";

/// Format of the main trigger time
pub const TIME_FORMAT: &str = "%H:%M";

/// Ordering policy used when picking photos from the library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OrderMode {
    /// Uniform random sample of the unviewed photos
    #[default]
    Random,
    /// Photos with the latest capture date first
    Newest,
    /// Photos with the earliest capture date first
    Oldest,
}

/// Orientation filter applied before ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OrientationFilter {
    /// No filtering
    Both,
    /// Height greater than or equal to width
    Portrait,
    /// Width greater than height
    #[default]
    Landscape,
}

/// Tunable limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Upper bound for the number of photos shown at once
    pub max_photo_count: usize,

    /// Upper bound for the number of rotations per day
    pub max_switches_per_day: u32,

    /// Flush the metadata cache every N photos scanned by date
    pub cache_flush_interval: usize,

    /// How long shutdown waits for a running worker, in milliseconds
    pub shutdown_grace_ms: u64,

    /// Scheduler poll interval, in seconds
    pub poll_interval_secs: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_photo_count: 10_000,
            max_switches_per_day: 100,
            cache_flush_interval: 5_000,
            shutdown_grace_ms: 2_000,
            poll_interval_secs: 60,
        }
    }
}

/// Configuration for the gallery rotator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Large folder holding every photo not currently displayed
    pub library_dir: PathBuf,

    /// Folder the display reads from (defaults to `<library>/Gallery`)
    pub gallery_dir: Option<PathBuf>,

    /// Number of photos to place in the gallery per rotation
    pub photo_count: usize,

    /// Ordering policy
    pub order: OrderMode,

    /// Orientation filter
    pub orientation: OrientationFilter,

    /// First trigger time of the day, `HH:MM`
    pub main_time: String,

    /// Rotations per day, spread evenly from `main_time`
    pub switches_per_day: u32,

    /// Directory holding the history and metadata documents (and logs)
    pub state_dir: Option<PathBuf>,

    /// Fixed seed for the random selector (reproducible runs)
    pub seed: Option<u64>,

    /// Photo extensions (lowercase, without dot)
    pub image_extensions: Vec<String>,

    /// Tunable limits
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library_dir: PathBuf::new(),
            gallery_dir: None,
            photo_count: 50,
            order: OrderMode::default(),
            orientation: OrientationFilter::default(),
            main_time: "21:15".into(),
            switches_per_day: 1,
            state_dir: None,
            seed: None,
            image_extensions: vec![
                "jpg".into(), "jpeg".into(), "png".into(), "gif".into(),
                "bmp".into(), "tiff".into(), "tif".into(), "webp".into(),
            ],
            limits: Limits::default(),
        }
    }
}

impl Config {
    /// Gallery directory, derived from the library when not set
    pub fn gallery_path(&self) -> PathBuf {
        self.gallery_dir
            .clone()
            .unwrap_or_else(|| self.library_dir.join(DEFAULT_GALLERY_NAME))
    }

    /// Directory holding persisted state
    pub fn state_path(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// View history document path
    pub fn history_file(&self) -> PathBuf {
        self.state_path().join(HISTORY_FILENAME)
    }

    /// Metadata cache document path
    pub fn metadata_file(&self) -> PathBuf {
        self.state_path().join(METADATA_FILENAME)
    }

    /// Parsed main trigger time
    pub fn parsed_main_time(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(self.main_time.trim(), TIME_FORMAT).ok()
    }

    /// Grace period granted to a running worker on shutdown
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.limits.shutdown_grace_ms)
    }

    /// Interval between schedule checks
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.limits.poll_interval_secs.max(1))
    }

    /// Selection request built from the current settings
    pub fn selection_request(&self) -> SelectionRequest {
        SelectionRequest {
            source_dir: self.library_dir.clone(),
            count: self
                .photo_count
                .clamp(1, self.limits.max_photo_count.max(1)),
            order: self.order,
            orientation: self.orientation,
        }
    }

    /// Validate the schedule settings, collecting every problem
    pub fn validate_schedule(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        self.check_schedule(&mut errors);
        ConfigError::from_messages(errors)
    }

    /// Validate everything a rotation needs, collecting every problem
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.photo_count < 1 {
            errors.push("Photo count must be at least 1".to_string());
        } else if self.photo_count > self.limits.max_photo_count {
            errors.push(format!(
                "Photo count cannot exceed {}",
                self.limits.max_photo_count
            ));
        }

        self.check_schedule(&mut errors);

        if let Err(e) = self.validate_paths() {
            errors.extend(e.messages().iter().cloned());
        }

        ConfigError::from_messages(errors)
    }

    /// Ensure library and gallery are set and distinct
    pub fn validate_paths(&self) -> Result<(), ConfigError> {
        if self.library_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(vec![
                "Library path is not set".to_string(),
            ]));
        }

        let library = normalize(&self.library_dir);
        let gallery = normalize(&self.gallery_path());
        if library == gallery {
            return Err(ConfigError::Invalid(vec![
                "Gallery path cannot be the same as library path".to_string(),
            ]));
        }

        Ok(())
    }

    fn check_schedule(&self, errors: &mut Vec<String>) {
        if self.parsed_main_time().is_none() {
            errors.push("Main time must be in HH:MM format (e.g., 21:15)".to_string());
        }

        if self.switches_per_day == 0 {
            errors.push("Switches per day must be positive".to_string());
        } else if self.switches_per_day > self.limits.max_switches_per_day {
            errors.push(format!(
                "Switches per day cannot exceed {}",
                self.limits.max_switches_per_day
            ));
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            source: e,
        })?;

        fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"# Gallery Rotator Configuration File
# This file uses TOML format (https://toml.io)

# Folder holding the whole photo collection
library_dir = "/media/photos/Library"

# Folder the photo frame displays. Defaults to "<library_dir>/Gallery".
# gallery_dir = "/media/photos/Gallery"

# Number of photos placed in the gallery per rotation
photo_count = 50

# Ordering: "random", "newest" or "oldest"
order = "random"

# Orientation filter: "both", "portrait" or "landscape"
# Photos whose orientation cannot be determined always match.
orientation = "landscape"

# First rotation of the day (HH:MM) and number of rotations per day.
# With main_time = "21:15" and switches_per_day = 3 the gallery changes
# at 05:15, 13:15 and 21:15.
main_time = "21:15"
switches_per_day = 1

# Where viewed_photos.json, photo_metadata.json and Log/ are kept
# state_dir = "/var/lib/gallery-rotator"

# Fixed random seed (optional, for reproducible selections)
# seed = 42

image_extensions = ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp"]

[limits]
max_photo_count = 10000
max_switches_per_day = 100
# Flush the metadata cache every N photos while scanning by date
cache_flush_interval = 5000
# How long shutdown waits for a running rotation (milliseconds)
shutdown_grace_ms = 2000
# Scheduler poll interval (seconds)
poll_interval_secs = 60
"#
        .to_string()
    }
}

/// Canonical form of a path when it exists, the path itself otherwise
fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Errors that can occur when loading, saving or validating configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Settings rejected before any filesystem change
    Invalid(Vec<String>),
    /// Failed to read configuration file
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse configuration file
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Failed to write configuration file
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to serialize configuration
    SerializeError {
        source: toml::ser::Error,
    },
}

impl ConfigError {
    fn from_messages(errors: Vec<String>) -> Result<(), ConfigError> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Validation messages (empty for I/O failures)
    pub fn messages(&self) -> &[String] {
        match self {
            ConfigError::Invalid(errors) => errors,
            _ => &[],
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid(errors) => write!(f, "Invalid settings: {}", errors.join("; ")),
            ConfigError::ReadError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
            ConfigError::WriteError { path, source } => {
                write!(f, "Failed to write config file '{}': {}", path.display(), source)
            }
            ConfigError::SerializeError { source } => {
                write!(f, "Failed to serialize config: {}", source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Invalid(_) => None,
            ConfigError::ReadError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::WriteError { source, .. } => Some(source),
            ConfigError::SerializeError { source } => Some(source),
        }
    }
}
