//! Hardware profiling for local model recommendation

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use sysinfo::{Disks, System};
use tracing::{debug, info, warn};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Memory and storage available to local models
///
/// Computed once per session and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// Total physical memory in gigabytes
    pub total_ram_gb: f64,
    /// Free space on the filesystem holding the models directory, in gigabytes
    pub free_disk_gb: f64,
}

impl HardwareProfile {
    pub fn new(total_ram_gb: f64, free_disk_gb: f64) -> Self {
        Self {
            total_ram_gb,
            free_disk_gb,
        }
    }

    /// Builds a profile from raw byte counts
    pub fn from_bytes(total_ram_bytes: u64, free_disk_bytes: u64) -> Self {
        Self {
            total_ram_gb: total_ram_bytes as f64 / BYTES_PER_GB,
            free_disk_gb: free_disk_bytes as f64 / BYTES_PER_GB,
        }
    }

    /// Minimal profile used when the platform cannot be queried.
    ///
    /// Recommendation logic treats it as "insufficient": no artifact fits in zero bytes.
    pub fn conservative() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl std::fmt::Display for HardwareProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.2}GB of RAM, {:.2}GB of free storage space",
            self.total_ram_gb, self.free_disk_gb
        )
    }
}

/// Reads host memory and disk capacity
pub struct HardwareProfiler;

impl HardwareProfiler {
    /// Profile the host for the filesystem that holds `models_dir`.
    ///
    /// Never fails. Values that cannot be read are replaced by the conservative defaults
    /// and a warning is logged.
    pub fn profile(models_dir: &Path) -> HardwareProfile {
        let mut sys = System::new();
        sys.refresh_memory();
        let total_ram_bytes = sys.total_memory();

        let disks = Disks::new_with_refreshed_list();
        let mounts: Vec<(PathBuf, u64)> = disks
            .list()
            .iter()
            .map(|disk| (disk.mount_point().to_path_buf(), disk.available_space()))
            .collect();

        let probe = existing_ancestor(models_dir);
        let free_disk_bytes = free_space_for(&probe, &mounts);

        if total_ram_bytes == 0 {
            warn!("Could not read total memory, assuming none is available");
        }
        if free_disk_bytes.is_none() {
            warn!(
                "Could not determine free disk space for {}, assuming none is available",
                probe.display()
            );
        }

        let profile = HardwareProfile::from_bytes(total_ram_bytes, free_disk_bytes.unwrap_or(0));

        info!(
            "Hardware detected: {:.1}GB RAM, {:.1}GB free disk",
            profile.total_ram_gb, profile.free_disk_gb
        );
        debug!(
            models_dir = %models_dir.display(),
            probe = %probe.display(),
            mounts = mounts.len(),
            "Hardware profile: {:?}",
            profile
        );

        profile
    }
}

/// Closest existing ancestor of `path`, falling back to the filesystem root
fn existing_ancestor(path: &Path) -> PathBuf {
    path.ancestors()
        .find(|p| !p.as_os_str().is_empty() && p.exists())
        .and_then(|p| p.canonicalize().ok())
        .unwrap_or_else(|| PathBuf::from("/"))
}

/// Available bytes on the mount that contains `path`.
///
/// Picks the deepest mount point that is a prefix of `path`, then the root mount.
fn free_space_for(path: &Path, mounts: &[(PathBuf, u64)]) -> Option<u64> {
    mounts
        .iter()
        .filter(|(mount, _)| path.starts_with(mount))
        .max_by_key(|(mount, _)| mount.components().count())
        .or_else(|| mounts.iter().find(|(mount, _)| mount == Path::new("/")))
        .map(|(_, available)| *available)
}
