//! CLI argument parsing with clap

use crate::config::{Config, OrderMode, OrientationFilter};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

/// Gallery Rotator - keeps a photo frame folder fresh
///
/// Moves a bounded set of photos from a large library folder into a gallery
/// folder on a daily schedule, remembering which photos were already shown
/// so nothing repeats until the whole library has been displayed.
#[derive(Parser, Debug)]
#[command(name = "gallery-rotator")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file (TOML format)
    ///
    /// When specified, settings from the config file are used as defaults.
    /// CLI arguments will override config file settings.
    #[arg(short = 'C', long, global = true, env = "GALLERY_ROTATOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Library folder holding every photo
    #[arg(short, long, global = true)]
    pub library: Option<PathBuf>,

    /// Gallery folder (defaults to <library>/Gallery)
    #[arg(short, long, global = true)]
    pub gallery: Option<PathBuf>,

    /// Number of photos per rotation
    #[arg(short = 'n', long, global = true)]
    pub count: Option<usize>,

    /// Ordering policy
    #[arg(short, long, global = true, value_enum)]
    pub order: Option<OrderMode>,

    /// Orientation filter
    #[arg(short = 'r', long, global = true, value_enum)]
    pub orientation: Option<OrientationFilter>,

    /// First rotation of the day (HH:MM)
    #[arg(short = 't', long, global = true)]
    pub main_time: Option<String>,

    /// Rotations per day
    #[arg(short, long, global = true)]
    pub switches: Option<u32>,

    /// Directory for the history, metadata cache and logs
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Fixed random seed
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output log format as JSON
    #[arg(long, global = true)]
    pub json_log: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Rotate the gallery once
    Rotate,
    /// Move every gallery photo back to the library
    Clear,
    /// Forget viewed photos and cached metadata
    Reset,
    /// Show the next scheduled switch
    Next,
    /// Rotate on schedule until stopped (stdin: now, clear, reset, next, cancel, quit)
    Run,
    /// Write a sample configuration file
    InitConfig {
        /// Destination path
        #[arg(default_value = "gallery-rotator.toml")]
        path: PathBuf,
    },
}

impl Cli {
    /// Get config file name (without extension) for log naming
    pub fn config_name(&self) -> Option<String> {
        self.config.as_ref().and_then(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
        })
    }

    /// Name of the subcommand, used for log file names
    pub fn command_name(&self) -> &'static str {
        match self.command {
            Command::Rotate => "Rotate",
            Command::Clear => "Clear",
            Command::Reset => "Reset",
            Command::Next => "Next",
            Command::Run => "Run",
            Command::InitConfig { .. } => "InitConfig",
        }
    }

    /// Merge CLI arguments with config from file
    /// CLI arguments take precedence over config file settings
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if let Some(ref library) = self.library {
            config.library_dir = library.clone();
        }
        if let Some(ref gallery) = self.gallery {
            config.gallery_dir = Some(gallery.clone());
        }
        if let Some(count) = self.count {
            config.photo_count = count;
        }
        if let Some(order) = self.order {
            config.order = order;
        }
        if let Some(orientation) = self.orientation {
            config.orientation = orientation;
        }
        if let Some(ref main_time) = self.main_time {
            config.main_time = main_time.clone();
        }
        if let Some(switches) = self.switches {
            config.switches_per_day = switches;
        }
        if let Some(ref state_dir) = self.state_dir {
            config.state_dir = Some(state_dir.clone());
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }

        config
    }

    /// Convert CLI arguments to Config (when no config file is used)
    pub fn to_config(&self) -> Config {
        self.merge_with_config(Config::default())
    }
}

/// Commands typed on stdin while `run` is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Rotate immediately
    Now,
    Clear,
    Reset,
    Next,
    /// Cancel the running operation
    Cancel,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "now" | "switch" | "rotate" => Ok(Self::Now),
            "clear" => Ok(Self::Clear),
            "reset" => Ok(Self::Reset),
            "next" => Ok(Self::Next),
            "cancel" => Ok(Self::Cancel),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(format!(
                "Unknown command '{}' (expected now, clear, reset, next, cancel or quit)",
                other
            )),
        }
    }
}
