//! Integrity checks and atomic installation
//!
//! Chunk part files live in a per-transfer directory beside the destination.
//! After every chunk is verified they are concatenated in range order into a
//! staging file `<filename>.tmp`, which is size-checked and renamed over the
//! destination. The destination is never opened for writing directly.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};
use url::Url;

use crate::app::models::ByteRange;
use crate::app::worker::{ChunkTask, StreamJob};
use crate::constants::files;
use crate::errors::{DownloadError, DownloadResult};

/// Staging path `<destination>.tmp` used before the final rename
pub fn staging_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(files::TEMP_FILE_SUFFIX);
    destination.with_file_name(name)
}

/// Per-transfer directory holding chunk part files
#[derive(Debug)]
pub struct ChunkWorkspace {
    dir: PathBuf,
}

impl ChunkWorkspace {
    /// Create `<dest_dir>/.tmp_<filename>_<timestamp>`
    pub async fn create(dest_dir: &Path, filename: &str) -> DownloadResult<Self> {
        let dir = dest_dir.join(format!(
            "{}{}_{}",
            files::CHUNK_DIR_PREFIX,
            filename,
            Utc::now().timestamp_millis()
        ));
        fs::create_dir_all(&dir).await?;
        debug!("Created chunk directory {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of chunk `index`
    pub fn part_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}{}", files::CHUNK_FILE_PREFIX, index))
    }

    /// Remove the directory and every part file, logging failures
    pub async fn cleanup(self) {
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => debug!("Removed chunk directory {}", self.dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Cleanup failed: could not remove chunk directory {}: {}",
                self.dir.display(),
                e
            ),
        }
    }
}

/// Check that every part file holds exactly its declared range
///
/// # Errors
///
/// Returns `ChunkSizeMismatch` for the first chunk whose length is off by
/// any amount, or `Io` if a part file cannot be inspected.
pub async fn verify_chunks(tasks: &[ChunkTask]) -> DownloadResult<()> {
    for task in tasks {
        let actual = fs::metadata(&task.part_path).await?.len();
        if actual != task.expected_len() {
            return Err(DownloadError::ChunkSizeMismatch {
                index: task.index,
                expected: task.expected_len(),
                actual,
            });
        }
    }
    Ok(())
}

/// Concatenate part files in range order into `output`
///
/// Returns the number of bytes written.
pub async fn merge_chunks(tasks: &[ChunkTask], output: &Path) -> DownloadResult<u64> {
    let mut ordered: Vec<&ChunkTask> = tasks.iter().collect();
    ordered.sort_by_key(|task| task.range.start);

    let mut writer = BufWriter::with_capacity(files::MERGE_BUFFER_SIZE, File::create(output).await?);
    let mut buffer = vec![0u8; files::MERGE_BUFFER_SIZE];
    let mut total: u64 = 0;

    for task in ordered {
        let mut part = File::open(&task.part_path).await?;
        loop {
            let read = part.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            writer.write_all(&buffer[..read]).await?;
            total += read as u64;
        }
    }

    writer.flush().await?;
    writer.get_ref().sync_all().await?;
    debug!("Merged chunks into {} ({} bytes)", output.display(), total);
    Ok(total)
}

/// Check that `path` is exactly `expected` bytes
pub async fn verify_size(path: &Path, expected: u64) -> DownloadResult<()> {
    let actual = fs::metadata(path).await?.len();
    if actual != expected {
        return Err(DownloadError::SizeMismatch { expected, actual });
    }
    Ok(())
}

/// Replace `destination` with the verified `staging` file
///
/// # Errors
///
/// Returns `AtomicOperationFailed` if an existing destination cannot be
/// removed or the rename fails.
pub async fn install(staging: &Path, destination: &Path) -> DownloadResult<()> {
    let failed = || DownloadError::AtomicOperationFailed {
        temp_path: staging.to_path_buf(),
        final_path: destination.to_path_buf(),
    };

    if fs::try_exists(destination).await.unwrap_or(false) {
        debug!("Replacing existing file {}", destination.display());
        fs::remove_file(destination).await.map_err(|_| failed())?;
    }
    fs::rename(staging, destination).await.map_err(|_| failed())?;

    info!("Installed {}", destination.display());
    Ok(())
}

/// Remove a staging file, logging failures
pub async fn discard(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed staging file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            "Cleanup failed: could not remove staging file {}: {}",
            path.display(),
            e
        ),
    }
}

/// Build the chunk tasks of a parallel plan inside `workspace`
pub fn chunk_tasks(workspace: &ChunkWorkspace, ranges: &[ByteRange]) -> Vec<ChunkTask> {
    ranges
        .iter()
        .enumerate()
        .map(|(index, range)| ChunkTask::new(index, *range, workspace.part_path(index)))
        .collect()
}

/// Staging job for a single-stream transfer
pub fn single_stream_job(url: &Url, planned_total: u64, destination: &Path) -> StreamJob {
    StreamJob::whole(url, planned_total, staging_path(destination))
}
