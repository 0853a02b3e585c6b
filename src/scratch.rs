//! Per-request scratch space and work directory cleanup

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{Result, SpotmixError};

/// Private temporary directory for one request
///
/// Created under the work directory with a random name and removed, with
/// everything in it, when dropped. Removal failures are logged and never
/// returned.
#[derive(Debug)]
pub struct Scratch {
    dir: PathBuf,
}

impl Scratch {
    pub fn new(workdir: &Path) -> Result<Self> {
        let dir = workdir.join(format!("req-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir)?;
        debug!("Created scratch directory {}", dir.display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Path of a file inside the scratch directory
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => debug!("Removed scratch directory {}", self.dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                let err = SpotmixError::Cleanup {
                    path: self.dir.clone(),
                    source: e,
                };
                warn!("{} (left for the next workdir purge)", err);
            }
        }
    }
}

/// Outcome of a work directory purge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub files_removed: usize,
    pub dirs_removed: usize,
    pub failures: usize,
}

/// Delete everything inside `workdir`, keeping the directory itself
///
/// Entries that cannot be removed are logged and counted; they never abort
/// the purge. A missing work directory is an empty purge.
pub fn purge_workdir(workdir: &Path) -> PurgeReport {
    let mut report = PurgeReport::default();
    if !workdir.exists() {
        return report;
    }

    for entry in WalkDir::new(workdir).min_depth(1).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cannot read work directory entry: {}", e);
                report.failures += 1;
                continue;
            }
        };

        let path = entry.path();
        let removed = if entry.file_type().is_dir() {
            fs::remove_dir(path).map(|_| report.dirs_removed += 1)
        } else {
            fs::remove_file(path).map(|_| report.files_removed += 1)
        };

        if let Err(e) = removed {
            let err = SpotmixError::Cleanup {
                path: path.to_path_buf(),
                source: e,
            };
            warn!("{}", err);
            report.failures += 1;
        }
    }

    info!(
        "Purged {}: {} files, {} directories, {} failures",
        workdir.display(),
        report.files_removed,
        report.dirs_removed,
        report.failures
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_scratch_removed_on_drop() {
        let workdir = tempdir().unwrap();
        let kept_path;
        {
            let scratch = Scratch::new(workdir.path()).unwrap();
            fs::write(scratch.path_for("voice.wav"), b"data").unwrap();
            kept_path = scratch.path().to_path_buf();
            assert!(kept_path.exists());
        }
        assert!(!kept_path.exists());
        assert!(workdir.path().exists());
    }

    #[test]
    fn test_scratch_dirs_are_private() {
        let workdir = tempdir().unwrap();
        let a = Scratch::new(workdir.path()).unwrap();
        let b = Scratch::new(workdir.path()).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_scratch_removed_on_error_path() {
        fn failing_request(workdir: &Path) -> Result<PathBuf> {
            let scratch = Scratch::new(workdir)?;
            fs::write(scratch.path_for("partial.mp3"), b"partial")?;
            Err(SpotmixError::MusicNotFound {
                filename: "missing.mp3".to_string(),
            })
        }

        let workdir = tempdir().unwrap();
        assert!(failing_request(workdir.path()).is_err());
        assert_eq!(fs::read_dir(workdir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_purge_empties_workdir() {
        let workdir = tempdir().unwrap();
        fs::write(workdir.path().join("combined_u1.mp3"), b"x").unwrap();
        fs::write(workdir.path().join("adjusted_music.mp3"), b"y").unwrap();
        let nested = workdir.path().join("req-stale");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("voice.wav"), b"z").unwrap();

        let report = purge_workdir(workdir.path());

        assert_eq!(
            report,
            PurgeReport {
                files_removed: 3,
                dirs_removed: 1,
                failures: 0,
            }
        );
        assert!(workdir.path().exists());
        assert_eq!(fs::read_dir(workdir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_purge_missing_workdir() {
        let report = purge_workdir(Path::new("/nonexistent/spotmix/workdir"));
        assert_eq!(report, PurgeReport::default());
    }
}
