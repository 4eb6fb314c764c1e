//! Discovery of artifacts already present in the models directory

use serde::Serialize;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extension every completed artifact carries
pub const ARTIFACT_EXTENSION: &str = "llamafile";

/// An artifact found on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledArtifact {
    pub file_name: String,
    pub local_path: PathBuf,
}

impl InstalledArtifact {
    pub fn new(local_path: PathBuf) -> Option<Self> {
        let file_name = local_path.file_name()?.to_str()?.to_string();
        Some(Self {
            file_name,
            local_path,
        })
    }
}

/// Snapshot of the models directory
#[derive(Debug, Clone, Default)]
pub struct InstalledModels {
    artifacts: Vec<InstalledArtifact>,
}

impl InstalledModels {
    /// List completed artifacts in `dir`, sorted by file name.
    ///
    /// A missing directory yields an empty set. In-progress downloads (`*.partial`) and
    /// anything that is not a regular `.llamafile` file are ignored.
    pub fn scan(dir: &Path) -> io::Result<Self> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Models directory {} does not exist yet", dir.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e),
        };

        let mut artifacts: Vec<InstalledArtifact> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(ARTIFACT_EXTENSION))
            .filter_map(InstalledArtifact::new)
            .collect();

        artifacts.sort_by(|a, b| a.file_name.cmp(&b.file_name));

        debug!(
            "Found {} installed artifacts in {}",
            artifacts.len(),
            dir.display()
        );

        Ok(Self { artifacts })
    }

    pub fn artifacts(&self) -> &[InstalledArtifact] {
        &self.artifacts
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn file_names(&self) -> HashSet<String> {
        self.artifacts.iter().map(|a| a.file_name.clone()).collect()
    }

    pub fn get(&self, file_name: &str) -> Option<&InstalledArtifact> {
        self.artifacts.iter().find(|a| a.file_name == file_name)
    }

    /// Delete an installed artifact from `dir`.
    ///
    /// Only plain file names of completed artifacts are accepted.
    pub fn remove(dir: &Path, file_name: &str) -> io::Result<InstalledArtifact> {
        let installed = Self::scan(dir)?;
        let artifact = installed.get(file_name).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("No installed model named '{}'", file_name),
            )
        })?;

        std::fs::remove_file(&artifact.local_path)?;
        info!("Deleted model {}", artifact.local_path.display());

        Ok(artifact)
    }
}
