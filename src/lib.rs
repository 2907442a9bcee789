//! Gallery Rotator - rotates photos from a large library into a gallery folder
//!
//! This library provides:
//! - A persisted metadata cache (EXIF capture date, orientation) keyed by file name
//! - A persisted view history so photos do not repeat until the library is exhausted
//! - Streaming selection (reservoir sampling, bounded top-K by date)
//! - Gallery reconciliation through no-replace moves
//! - A coordinator running one operation at a time with cooperative cancellation
//! - Daily switch schedule arithmetic

pub mod cancel;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod history;
pub mod metadata;
pub mod os;
pub mod rotation;
pub mod scan;
pub mod schedule;
pub mod select;
pub mod state;
pub mod sync;
pub mod time;

pub use cancel::CancelToken;
pub use cli::{Cli, Command, ConsoleCommand};
pub use config::{Config, ConfigError, Limits, OrderMode, OrientationFilter};
pub use coordinator::{Admission, Coordinator, OperationEvent, OperationKind};
pub use error::{Error, Result};
pub use history::ViewHistory;
pub use metadata::{MetadataRecord, MetadataStore, Orientation};
pub use rotation::{OperationStatus, Rotator};
pub use schedule::{NextSwitch, Scheduler, next_switch, switch_times};
pub use select::{Selection, SelectionRequest, Selector};
pub use sync::{ReconcileReport, Synchronizer};
