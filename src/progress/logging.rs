//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::HardwareProfiled { profile } => {
                info!(
                    total_ram_gb = profile.total_ram_gb,
                    free_disk_gb = profile.free_disk_gb,
                    "Hardware profiled"
                );
            }
            ProgressEvent::Notice { message } => {
                info!("{}", message);
            }
            ProgressEvent::Warning { message } => {
                warn!("{}", message);
            }
            ProgressEvent::DownloadStarted {
                name,
                url,
                total_bytes,
            } => {
                info!(model = %name, url = %url, total_bytes, "Download started");
            }
            ProgressEvent::DownloadProgress {
                downloaded_bytes,
                total_bytes,
            } => {
                debug!(downloaded_bytes, total_bytes, "Download progress");
            }
            ProgressEvent::DownloadComplete { name, path, bytes } => {
                info!(model = %name, path = %path.display(), bytes, "Download complete");
            }
            ProgressEvent::DownloadFailed { name, error } => {
                warn!(model = %name, error = %error, "Download failed");
            }
            ProgressEvent::LaunchStarted { executable, pid } => {
                info!(executable = %executable.display(), pid, "Backend process started");
            }
            ProgressEvent::BackendReady { pid, elapsed } => {
                info!(pid, elapsed_ms = elapsed.as_millis(), "Backend ready");
            }
            ProgressEvent::LaunchFailed { error } => {
                warn!(error = %error, "Backend launch failed");
            }
            ProgressEvent::CommandStarted { command } => {
                debug!(command = %command, "Running external command");
            }
            ProgressEvent::ModelSelected { model } => {
                info!(model = %model, "Model selected");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_logging_handler_accepts_all_events() {
        let handler = LoggingHandler;
        let events = vec![
            ProgressEvent::Notice {
                message: "note".to_string(),
            },
            ProgressEvent::Warning {
                message: "careful".to_string(),
            },
            ProgressEvent::DownloadStarted {
                name: "Phi-2".to_string(),
                url: "https://example.com/phi-2.llamafile".to_string(),
                total_bytes: None,
            },
            ProgressEvent::DownloadComplete {
                name: "Phi-2".to_string(),
                path: PathBuf::from("/tmp/phi-2.llamafile"),
                bytes: 10,
            },
            ProgressEvent::LaunchStarted {
                executable: PathBuf::from("/tmp/phi-2.llamafile"),
                pid: 1,
            },
            ProgressEvent::BackendReady {
                pid: 1,
                elapsed: Duration::from_millis(5),
            },
        ];

        for event in &events {
            handler.on_progress(event);
        }
    }
}
