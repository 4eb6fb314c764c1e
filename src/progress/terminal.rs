//! Terminal progress handler for interactive sessions

use super::{ProgressEvent, ProgressHandler};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

const BAR_TEMPLATE: &str =
    "{spinner} [{elapsed_precise}] [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str = "{spinner} [{elapsed_precise}] {bytes} ({bytes_per_sec})";

/// Writes user-facing messages to stderr and draws a download progress bar.
///
/// Stdout stays reserved for command output such as the rendered configuration.
#[derive(Default)]
pub struct TerminalHandler {
    bar: Mutex<Option<ProgressBar>>,
}

impl TerminalHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn start_bar(&self, total_bytes: Option<u64>) {
        let bar = match total_bytes {
            Some(total) => {
                let bar = ProgressBar::new(total);
                if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
                    bar.set_style(style.progress_chars("=> "));
                }
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::with_template(SPINNER_TEMPLATE) {
                    bar.set_style(style);
                }
                bar
            }
        };

        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }

    fn print(&self, message: &str) {
        let slot = self.bar.lock().ok();
        match slot.as_ref().and_then(|slot| slot.as_ref()) {
            Some(bar) => bar.suspend(|| eprintln!("{}", message)),
            None => eprintln!("{}", message),
        }
    }
}

impl ProgressHandler for TerminalHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::HardwareProfiled { profile } => {
                self.print(&format!("Your machine has {}.", profile));
            }
            ProgressEvent::Notice { message } => self.print(message),
            ProgressEvent::Warning { message } => self.print(&format!("Warning: {}", message)),
            ProgressEvent::DownloadStarted {
                name, total_bytes, ..
            } => {
                self.print(&format!("\nDownloading {}...\n", name));
                self.start_bar(*total_bytes);
            }
            ProgressEvent::DownloadProgress {
                downloaded_bytes, ..
            } => {
                if let Ok(slot) = self.bar.lock() {
                    if let Some(bar) = slot.as_ref() {
                        bar.set_position(*downloaded_bytes);
                    }
                }
            }
            ProgressEvent::DownloadComplete { name, .. } => {
                self.finish_bar();
                self.print(&format!("\nModel '{}' downloaded successfully.\n", name));
            }
            ProgressEvent::DownloadFailed { name, error } => {
                self.finish_bar();
                self.print(&format!("\nFailed to download '{}': {}\n", name, error));
            }
            ProgressEvent::LaunchStarted { executable, .. } => {
                let name = executable
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| executable.display().to_string());
                self.print(&format!("Starting {}...", name));
            }
            ProgressEvent::BackendReady { elapsed, .. } => {
                self.print(&format!(
                    "Local server ready after {:.1}s.",
                    elapsed.as_secs_f64()
                ));
            }
            ProgressEvent::LaunchFailed { error } => {
                self.print(&format!("Model process terminated: {}", error));
            }
            ProgressEvent::CommandStarted { .. } => {}
            ProgressEvent::ModelSelected { model } => {
                self.print(&format!("> Model set to `{}`", model));
            }
        }
    }
}
