//! Repository archive handling
//!
//! A downloaded repository archive is unpacked into the destination directory
//! and then removed. Extraction runs on the blocking pool.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::errors::{ArchiveError, ArchiveResult};

/// First candidate directory under `dest_dir` that already exists
pub fn find_extracted(dest_dir: &Path, candidates: &[String]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|name| dest_dir.join(name))
        .find(|path| path.is_dir())
}

/// Extract `archive` into `dest_dir` and delete the archive
///
/// Returns the extracted root: the archive's single top-level directory when
/// it has one, otherwise `dest_dir` itself. If extraction fails part way, a
/// root directory created by this call is removed again.
///
/// # Errors
///
/// Returns `ArchiveError::Corrupted` if the file is not a valid zip archive.
pub async fn extract_and_remove(archive: &Path, dest_dir: &Path) -> ArchiveResult<PathBuf> {
    let archive_path = archive.to_path_buf();
    let target = dest_dir.to_path_buf();

    let root = tokio::task::spawn_blocking(move || extract_zip(&archive_path, &target))
        .await
        .map_err(|e| ArchiveError::TaskFailed(e.to_string()))??;

    if let Err(e) = tokio::fs::remove_file(archive).await {
        warn!(
            "Cleanup failed: could not remove archive {}: {}",
            archive.display(),
            e
        );
    }

    info!("Extracted {} to {}", archive.display(), root.display());
    Ok(root)
}

fn extract_zip(archive: &Path, dest_dir: &Path) -> ArchiveResult<PathBuf> {
    let file = File::open(archive)?;
    let corrupted = |e: zip::result::ZipError| ArchiveError::Corrupted {
        path: archive.to_path_buf(),
        reason: e.to_string(),
    };

    let mut zip = ZipArchive::new(file).map_err(corrupted)?;
    let root = single_root(&zip).map(|name| dest_dir.join(name));
    let created_root = root.as_ref().filter(|path| !path.exists()).cloned();
    debug!("Extracting {} entries from {}", zip.len(), archive.display());

    if let Err(e) = zip.extract(dest_dir) {
        if let Some(partial) = created_root {
            remove_partial(&partial);
        }
        return Err(corrupted(e));
    }

    Ok(root.unwrap_or_else(|| dest_dir.to_path_buf()))
}

fn remove_partial(path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => debug!("Removed partially extracted {}", path.display()),
        Err(e) => warn!(
            "Cleanup failed: could not remove partially extracted {}: {}",
            path.display(),
            e
        ),
    }
}

/// The top-level directory shared by every entry, if there is exactly one
fn single_root<R: Read + Seek>(zip: &ZipArchive<R>) -> Option<String> {
    let mut root: Option<String> = None;
    for name in zip.file_names() {
        let first = match Path::new(name).components().next() {
            Some(Component::Normal(first)) => first.to_string_lossy().to_string(),
            _ => return None,
        };
        // A bare file at the top level means there is no single root
        if !name.contains('/') {
            return None;
        }
        match &root {
            Some(existing) if *existing != first => return None,
            Some(_) => {}
            None => root = Some(first),
        }
    }
    root
}
