//! Progress handler trait and events

use crate::backend::HardwareProfile;
use std::path::PathBuf;
use std::time::Duration;

/// Events emitted while a backend is being set up
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Host hardware was profiled
    HardwareProfiled { profile: HardwareProfile },

    /// Informational message for the user
    Notice { message: String },

    /// Something went wrong but setup continues
    Warning { message: String },

    /// Artifact download started
    DownloadStarted {
        name: String,
        url: String,
        total_bytes: Option<u64>,
    },

    /// More bytes of the artifact were written
    DownloadProgress {
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
    },

    /// Artifact fully written and registered
    DownloadComplete {
        name: String,
        path: PathBuf,
        bytes: u64,
    },

    /// Artifact download failed
    DownloadFailed { name: String, error: String },

    /// Backend process spawned, waiting for readiness
    LaunchStarted { executable: PathBuf, pid: u32 },

    /// Backend printed its readiness marker
    BackendReady { pid: u32, elapsed: Duration },

    /// Backend did not become ready and was terminated
    LaunchFailed { error: String },

    /// External helper command running (e.g. `ollama pull`)
    CommandStarted { command: String },

    /// Model chosen for the session
    ModelSelected { model: String },
}

/// Trait for handling progress events during setup
pub trait ProgressHandler: Send + Sync {
    /// Called when a progress event occurs
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    impl ProgressHandler for CountingHandler {
        fn on_progress(&self, _event: &ProgressEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_noop_handler() {
        let handler = NoOpHandler;
        handler.on_progress(&ProgressEvent::Notice {
            message: "hello".to_string(),
        });
    }

    #[test]
    fn test_progress_events() {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = CountingHandler {
            count: count.clone(),
        };

        handler.on_progress(&ProgressEvent::HardwareProfiled {
            profile: HardwareProfile::new(16.0, 100.0),
        });
        handler.on_progress(&ProgressEvent::DownloadProgress {
            downloaded_bytes: 10,
            total_bytes: Some(100),
        });
        handler.on_progress(&ProgressEvent::BackendReady {
            pid: 42,
            elapsed: Duration::from_secs(3),
        });

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_event_debug() {
        let event = ProgressEvent::ModelSelected {
            model: "llama3".to_string(),
        };
        let debug_str = format!("{:?}", event);
        assert!(debug_str.contains("ModelSelected"));
        assert!(debug_str.contains("llama3"));
    }
}
