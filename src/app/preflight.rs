//! Disk space preflight
//!
//! Compares free space on the destination volume against the transfer size
//! plus a safety margin before any file is created. The check is advisory: if
//! free space cannot be determined the transfer proceeds.

use std::path::{Path, PathBuf};

use sysinfo::Disks;
use tracing::{debug, warn};

use crate::constants::transfer;
use crate::errors::PreflightError;

/// Result of a preflight check that did not block the transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreflightOutcome {
    /// Enough space was confirmed
    Passed { required: u64, available: u64 },
    /// Size unknown, nothing to check
    Skipped,
    /// Free space could not be determined
    Unverified,
}

/// Free-space check against the destination volume
#[derive(Debug, Clone, Copy)]
pub struct DiskPreflight {
    margin_percent: u64,
}

impl Default for DiskPreflight {
    fn default() -> Self {
        Self::new(transfer::DISK_SAFETY_MARGIN_PERCENT)
    }
}

impl DiskPreflight {
    pub fn new(margin_percent: u64) -> Self {
        Self { margin_percent }
    }

    /// Bytes required for a transfer of `total_size` including the margin
    pub fn required_space(&self, total_size: u64) -> u64 {
        let margin = (total_size as u128 * self.margin_percent as u128) / 100;
        (total_size as u128 + margin).min(u64::MAX as u128) as u64
    }

    /// Check that `destination` has room for `total_size` bytes
    ///
    /// # Errors
    ///
    /// Returns `PreflightError::InsufficientSpace` when the volume is too full.
    /// Failures to query the volume are logged and never returned.
    pub fn check(
        &self,
        destination: &Path,
        total_size: u64,
    ) -> Result<PreflightOutcome, PreflightError> {
        if total_size == 0 {
            debug!("Size unknown, skipping disk space preflight");
            return Ok(PreflightOutcome::Skipped);
        }

        let required = self.required_space(total_size);
        match available_space(destination) {
            Ok(available) => evaluate(required, available),
            Err(e) => {
                warn!("{}; proceeding without disk space check", e);
                Ok(PreflightOutcome::Unverified)
            }
        }
    }
}

/// Compare required against available bytes
pub fn evaluate(required: u64, available: u64) -> Result<PreflightOutcome, PreflightError> {
    if available < required {
        return Err(PreflightError::InsufficientSpace {
            required,
            available,
        });
    }
    debug!(
        "Disk preflight passed: {} bytes required, {} available",
        required, available
    );
    Ok(PreflightOutcome::Passed {
        required,
        available,
    })
}

/// Free bytes on the volume holding `path`
///
/// `path` need not exist yet; the nearest existing ancestor is inspected and
/// matched against the longest mount point that contains it.
pub fn available_space(path: &Path) -> Result<u64, PreflightError> {
    let unavailable = |reason: String| PreflightError::Unavailable {
        path: path.to_path_buf(),
        reason,
    };

    let anchor = existing_ancestor(path)
        .ok_or_else(|| unavailable("no existing ancestor directory".to_string()))?;
    let anchor = anchor
        .canonicalize()
        .map_err(|e| unavailable(e.to_string()))?;

    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| anchor.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
        .ok_or_else(|| unavailable("no mounted volume contains the destination".to_string()))
}

fn existing_ancestor(path: &Path) -> Option<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    absolute
        .ancestors()
        .find(|candidate| candidate.exists())
        .map(Path::to_path_buf)
}
