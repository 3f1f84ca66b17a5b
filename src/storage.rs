// THEORY:
// Retention keeps a hard floor of free space on the filesystem holding the
// recordings. It never guesses how much a deletion will free: it measures, deletes
// the single oldest segment, and measures again. Only files that look like our
// own segments are candidates, so pointing `output_dir` at a shared directory
// cannot eat unrelated data.
//
// A pass ends in one of three ways:
// - `Satisfied`: free space is at or above the floor.
// - `Exhausted`: no segments are left, the floor still isn't met. Loud warning.
// - `Aborted`: the probe or a deletion failed. We stop instead of spinning on
//   the same undeletable file.

use async_trait::async_trait;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use sysinfo::Disks;
use tracing::{debug, error, info, warn};

/// Extensions recognised as recorded segments.
pub const SEGMENT_EXTENSIONS: [&str; 2] = ["mp4", "h264"];

/// Result of one retention pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionOutcome {
    Satisfied { deleted: usize },
    Exhausted { deleted: usize },
    Aborted { deleted: usize },
}

impl RetentionOutcome {
    pub fn deleted(&self) -> usize {
        match *self {
            RetentionOutcome::Satisfied { deleted }
            | RetentionOutcome::Exhausted { deleted }
            | RetentionOutcome::Aborted { deleted } => deleted,
        }
    }
}

/// What the controller needs from storage.
#[async_trait]
pub trait Retention: Send + Sync {
    /// Deletes oldest segments until the free-space floor holds or nothing is left.
    async fn ensure_free_space(&self) -> RetentionOutcome;
}

/// Measures free space available to unprivileged writers under `path`.
pub trait FreeSpaceProbe: Send + Sync {
    fn free_bytes(&self, path: &Path) -> io::Result<u64>;
}

/// Free space from the mounted disk whose mount point is the longest prefix of
/// the path.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskProbe;

impl FreeSpaceProbe for DiskProbe {
    fn free_bytes(&self, path: &Path) -> io::Result<u64> {
        let path = path.canonicalize()?;
        let disks = Disks::new_with_refreshed_list();
        disks
            .list()
            .iter()
            .filter(|disk| path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| disk.available_space())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no mounted filesystem contains {}", path.display()),
                )
            })
    }
}

/// A recorded segment on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size: u64,
}

fn is_segment(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SEGMENT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Segments directly under `dir`, oldest first.
pub fn list_segments(dir: &Path) -> io::Result<Vec<Segment>> {
    let mut segments = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !is_segment(&path) {
            continue;
        }
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        segments.push(Segment {
            path,
            modified: metadata.modified()?,
            size: metadata.len(),
        });
    }
    segments.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
    Ok(segments)
}

/// Free-space floor enforcement over one output directory.
#[derive(Clone)]
pub struct StorageManager {
    output_dir: PathBuf,
    min_free_bytes: u64,
    probe: Arc<dyn FreeSpaceProbe>,
}

impl StorageManager {
    pub fn new(output_dir: impl Into<PathBuf>, min_free_bytes: u64) -> Self {
        Self::with_probe(output_dir, min_free_bytes, Arc::new(DiskProbe))
    }

    pub fn with_probe(
        output_dir: impl Into<PathBuf>,
        min_free_bytes: u64,
        probe: Arc<dyn FreeSpaceProbe>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            min_free_bytes,
            probe,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// One blocking retention pass.
    pub fn prune(&self) -> RetentionOutcome {
        let dir = self.output_dir.as_path();
        if let Err(e) = fs::create_dir_all(dir) {
            error!(dir = %dir.display(), error = %e, "cannot create output directory");
            return RetentionOutcome::Aborted { deleted: 0 };
        }

        let mut deleted = 0;
        loop {
            let free = match self.probe.free_bytes(dir) {
                Ok(free) => free,
                Err(e) => {
                    error!(dir = %dir.display(), error = %e, "free space probe failed");
                    return RetentionOutcome::Aborted { deleted };
                }
            };
            if free >= self.min_free_bytes {
                debug!(free_mb = free / (1024 * 1024), deleted, "free space OK");
                if deleted > 0 {
                    info!(deleted, free_mb = free / (1024 * 1024), "retention pass freed space");
                }
                return RetentionOutcome::Satisfied { deleted };
            }

            let oldest = match list_segments(dir) {
                Ok(segments) => segments.into_iter().next(),
                Err(e) => {
                    error!(dir = %dir.display(), error = %e, "cannot list segments");
                    return RetentionOutcome::Aborted { deleted };
                }
            };
            let Some(oldest) = oldest else {
                warn!(
                    dir = %dir.display(),
                    free_mb = free / (1024 * 1024),
                    floor_mb = self.min_free_bytes / (1024 * 1024),
                    "below free-space floor and no segments left to delete"
                );
                return RetentionOutcome::Exhausted { deleted };
            };

            match fs::remove_file(&oldest.path) {
                Ok(()) => {
                    warn!(
                        path = %oldest.path.display(),
                        size = oldest.size,
                        "deleted oldest segment to free space"
                    );
                    deleted += 1;
                }
                Err(e) => {
                    error!(path = %oldest.path.display(), error = %e, "failed to delete segment");
                    return RetentionOutcome::Aborted { deleted };
                }
            }
        }
    }
}

#[async_trait]
impl Retention for StorageManager {
    async fn ensure_free_space(&self) -> RetentionOutcome {
        let manager = self.clone();
        match tokio::task::spawn_blocking(move || manager.prune()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "retention task failed");
                RetentionOutcome::Aborted { deleted: 0 }
            }
        }
    }
}
