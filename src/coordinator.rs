//! Operation coordinator
//!
//! Admits at most one mutating operation at a time. An admitted rotation or
//! clear runs on its own worker thread; progress reaches the host only through
//! the event channel returned by [`Coordinator::new`]. Requests arriving while
//! an operation runs are dropped and reported as [`Admission::Busy`].

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::rotation::{OperationStatus, Rotator};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// Mutating operations run on the worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Rotate,
    Clear,
}

/// Notifications published to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationEvent {
    Started(OperationKind),
    Finished {
        kind: OperationKind,
        status: OperationStatus,
    },
}

/// Answer to a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Busy,
}

/// Holds the busy flag for the lifetime of one operation
struct BusyGuard {
    busy: Arc<AtomicBool>,
    done: Option<Sender<()>>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
        // Dropping the sender wakes up `wait`
        self.done.take();
    }
}

/// Serializes rotations, clears and history resets
pub struct Coordinator {
    engine: Arc<Mutex<Rotator>>,
    busy: Arc<AtomicBool>,
    cancel: CancelToken,
    events: Sender<OperationEvent>,
    done: Mutex<Option<Receiver<()>>>,
    grace: Duration,
}

impl Coordinator {
    /// Wrap an engine; events are delivered on the returned receiver
    pub fn new(engine: Rotator) -> (Self, Receiver<OperationEvent>) {
        let (events, receiver) = mpsc::channel();
        let coordinator = Self {
            cancel: engine.cancel_token(),
            grace: engine.config().shutdown_grace(),
            engine: Arc::new(Mutex::new(engine)),
            busy: Arc::new(AtomicBool::new(false)),
            events,
            done: Mutex::new(None),
        };
        (coordinator, receiver)
    }

    /// Validate the settings and start a rotation in the background
    pub fn start_rotation(&self, config: &Config) -> Result<Admission> {
        config.validate()?;
        self.start(OperationKind::Rotate, config.clone())
    }

    /// Validate the paths and start clearing the gallery in the background
    pub fn start_clear(&self, config: &Config) -> Result<Admission> {
        config.validate_paths()?;
        self.start(OperationKind::Clear, config.clone())
    }

    /// Reset history and metadata on the calling thread, unless busy
    pub fn reset_history(&self) -> Result<Admission> {
        let Some(_guard) = self.acquire(None) else {
            warn!("Cannot reset during operation");
            return Ok(Admission::Busy);
        };
        lock(&self.engine).reset_history()?;
        Ok(Admission::Accepted)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Ask the running operation to stop at its next suspension point
    pub fn cancel(&self) {
        if self.is_busy() {
            info!("Cancelling current operation");
        }
        self.cancel.cancel();
    }

    /// Wait for the running worker; `true` once nothing is running
    pub fn wait(&self, timeout: Duration) -> bool {
        let mut done = lock(&self.done);
        let Some(receiver) = done.as_ref() else {
            return true;
        };
        match receiver.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                *done = None;
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    /// Cancel, wait up to the grace period, and flush the stores if the
    /// worker finished. Returns whether the worker finished in time.
    pub fn shutdown(&self) -> bool {
        self.cancel();
        let finished = self.wait(self.grace);
        if !finished {
            warn!(
                grace_ms = self.grace.as_millis() as u64,
                "Worker still running after grace period, latest cache updates may be lost"
            );
            return false;
        }

        if let Err(e) = lock(&self.engine).flush() {
            error!(error = %e, "Error saving state on shutdown");
        }
        true
    }

    fn acquire(&self, done: Option<Sender<()>>) -> Option<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| BusyGuard {
                busy: Arc::clone(&self.busy),
                done,
            })
    }

    fn start(&self, kind: OperationKind, config: Config) -> Result<Admission> {
        let (done_tx, done_rx) = mpsc::channel();
        let Some(guard) = self.acquire(Some(done_tx)) else {
            warn!(?kind, "Operation already in progress");
            return Ok(Admission::Busy);
        };

        self.cancel.reset();
        *lock(&self.done) = Some(done_rx);
        let _ = self.events.send(OperationEvent::Started(kind));

        let engine = Arc::clone(&self.engine);
        let events = self.events.clone();
        thread::Builder::new()
            .name(format!("{kind:?}-worker").to_lowercase())
            .spawn(move || {
                let status = run_operation(&engine, kind, config);
                info!(?kind, %status, "Operation finished");
                let _ = events.send(OperationEvent::Finished { kind, status });
                drop(guard);
            })
            .map_err(|e| Error::Worker(e.to_string()))?;

        Ok(Admission::Accepted)
    }
}

fn run_operation(engine: &Mutex<Rotator>, kind: OperationKind, config: Config) -> OperationStatus {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut engine = lock(engine);
        engine.set_config(config);
        match kind {
            OperationKind::Rotate => engine.rotate(),
            OperationKind::Clear => engine.clear(),
        }
    }));

    outcome.unwrap_or_else(|_| {
        error!(?kind, "Worker panicked");
        OperationStatus::Failed("worker panicked".into())
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OrderMode, OrientationFilter};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn config(library: &Path) -> Config {
        Config {
            library_dir: library.to_path_buf(),
            state_dir: Some(library.join(".state")),
            photo_count: 1,
            order: OrderMode::Random,
            orientation: OrientationFilter::Both,
            seed: Some(1),
            ..Config::default()
        }
    }

    fn next_finished(events: &Receiver<OperationEvent>) -> OperationStatus {
        loop {
            match events.recv_timeout(Duration::from_secs(10)).unwrap() {
                OperationEvent::Finished { status, .. } => return status,
                OperationEvent::Started(_) => {}
            }
        }
    }

    #[test]
    fn test_rotation_reports_events() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        let cfg = config(dir.path());
        let (coordinator, events) = Coordinator::new(Rotator::new(cfg.clone()));

        assert_eq!(coordinator.start_rotation(&cfg).unwrap(), Admission::Accepted);
        assert_eq!(
            events.recv_timeout(Duration::from_secs(10)).unwrap(),
            OperationEvent::Started(OperationKind::Rotate)
        );
        assert_eq!(next_finished(&events).to_string(), "Switched to 1 photos");
        assert!(coordinator.wait(Duration::from_secs(10)));
        assert!(!coordinator.is_busy());
        assert!(dir.path().join("Gallery").join("a.jpg").exists());
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let dir = tempdir().unwrap();
        let cfg = Config {
            photo_count: 0,
            main_time: "25:99".into(),
            ..config(dir.path())
        };
        let (coordinator, events) = Coordinator::new(Rotator::new(cfg.clone()));

        let err = coordinator.start_rotation(&cfg).unwrap_err();
        match err {
            Error::Config(e) => assert_eq!(e.messages().len(), 2),
            other => panic!("unexpected error: {other}"),
        }
        assert!(events.try_recv().is_err());
        assert!(!coordinator.is_busy());
    }

    #[test]
    fn test_busy_requests_are_dropped() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        let (coordinator, _events) = Coordinator::new(Rotator::new(cfg.clone()));

        // Hold the flag as a running operation would
        let guard = coordinator.acquire(None).unwrap();
        assert!(coordinator.is_busy());
        assert_eq!(coordinator.start_rotation(&cfg).unwrap(), Admission::Busy);
        assert_eq!(coordinator.start_clear(&cfg).unwrap(), Admission::Busy);
        assert_eq!(coordinator.reset_history().unwrap(), Admission::Busy);

        drop(guard);
        assert!(!coordinator.is_busy());
        assert_eq!(coordinator.reset_history().unwrap(), Admission::Accepted);
    }

    #[test]
    fn test_shutdown_when_idle_flushes() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        let rotator = Rotator::new(cfg.clone());
        rotator.history().add("a.jpg");
        let (coordinator, _events) = Coordinator::new(rotator);

        assert!(coordinator.shutdown());
        assert!(cfg.history_file().exists());
    }
}
