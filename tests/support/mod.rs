//! Shared helpers for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use localbox::progress::{ProgressEvent, ProgressHandler};
use localbox::runner::{display_command, CommandError, CommandOutput, CommandRunner};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};

pub const MARKER: &str = "llama server listening at http://127.0.0.1:8080";

/// Write an executable `/bin/sh` script that stands in for a llamafile
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to chmod script");
    path
}

/// True while `pid` names a live, non-zombie process
pub fn pid_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    sys.process(pid)
        .map(|p| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
        .unwrap_or(false)
}

/// Poll until `pid` is gone or `within` elapses
pub async fn wait_until_gone(pid: u32, within: Duration) -> bool {
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if !pid_alive(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    !pid_alive(pid)
}

/// Collects every progress event
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressHandler for RecordingProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Canned result for one command line
#[derive(Debug, Clone)]
pub enum MockResponse {
    Stdout(String),
    Exit(i32),
}

/// Command runner answering from a table. Unknown programs are "not installed".
#[derive(Default)]
pub struct MockRunner {
    responses: HashMap<String, MockResponse>,
    calls: Mutex<Vec<String>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, command: &str, response: MockResponse) -> Self {
        self.responses.insert(command.to_string(), response);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn respond(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
        let command = display_command(program, args);
        self.calls.lock().unwrap().push(command.clone());

        match self.responses.get(&command) {
            Some(MockResponse::Stdout(stdout)) => Ok(CommandOutput {
                exit_code: Some(0),
                stdout: stdout.clone(),
                stderr: String::new(),
            }),
            Some(MockResponse::Exit(code)) => Ok(CommandOutput {
                exit_code: Some(*code),
                stdout: String::new(),
                stderr: "mock failure".to_string(),
            }),
            None => Err(CommandError::NotFound {
                program: program.to_string(),
            }),
        }
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn output(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
        self.respond(program, args)
    }

    async fn status(&self, program: &str, args: &[&str]) -> Result<(), CommandError> {
        let output = self.respond(program, args)?;
        if output.success() {
            Ok(())
        } else {
            Err(CommandError::Failed {
                command: display_command(program, args),
                exit_code: output.exit_code,
                stderr: output.stderr,
            })
        }
    }
}
