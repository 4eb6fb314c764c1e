//! Local inference backend lifecycle
//!
//! This module profiles the host, recommends llamafile artifacts that fit on it, downloads
//! them into the models directory and supervises the resulting server process until it
//! reports that its listener is live.

mod catalog;
mod download;
mod hardware;
mod installed;
mod supervisor;

pub use catalog::{ModelCatalog, ModelSpec, Tier};
pub use download::{file_name_from_url, make_executable, ArtifactDownloader, DownloadError};
pub use hardware::{HardwareProfile, HardwareProfiler};
pub use installed::{InstalledArtifact, InstalledModels, ARTIFACT_EXTENSION};
pub use supervisor::{
    OutputLines, ProcessSupervisor, SupervisedProcess, SupervisorError, SupervisorState,
};
