//! Scratch space shared by every provider.
//!
//! A [`TempDirGenerator`] issues uniquely named temporary directories and
//! remembers them, so one [`TempDirGenerator::cleanup`] call at shutdown
//! removes everything acquisition left on disk.

use std::path::{Path, PathBuf};

use imgscope_core::error::{Result, ScopeError};
use imgscope_core::ScopeConfig;
use parking_lot::Mutex;
use tempfile::TempDir;

/// Generator of tracked temporary directories.
///
/// Issuance is safe from concurrent callers. Cleanup is expected to run once
/// all in-flight acquisitions have finished.
#[derive(Debug)]
pub struct TempDirGenerator {
    /// Directory the scratch directories are created in
    root: PathBuf,
    /// Name prefix for every issued directory
    prefix: String,
    /// Directories issued and not yet cleaned up
    issued: Mutex<Vec<TempDir>>,
}

impl TempDirGenerator {
    /// Create a generator issuing directories under `root`.
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
            issued: Mutex::new(Vec::new()),
        }
    }

    /// Create a generator from the configured root and prefix.
    pub fn from_config(config: &ScopeConfig) -> Self {
        Self::new(config.temp_root.clone(), config.temp_prefix.clone())
    }

    /// Directory the scratch directories are created in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Issue a fresh directory named `<prefix><name>-<random>` and record it.
    pub fn new_directory(&self, name: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            ScopeError::Other(format!(
                "Failed to create scratch root {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("{}{}-", self.prefix, name))
            .tempdir_in(&self.root)
            .map_err(|e| {
                ScopeError::Other(format!(
                    "Failed to create scratch directory in {}: {}",
                    self.root.display(),
                    e
                ))
            })?;

        let path = dir.path().to_path_buf();
        self.issued.lock().push(dir);

        tracing::trace!(path = %path.display(), "Issued scratch directory");
        Ok(path)
    }

    /// Number of directories issued and not yet cleaned up.
    pub fn issued(&self) -> usize {
        self.issued.lock().len()
    }

    /// Remove every issued directory and clear the record.
    ///
    /// Every entry is attempted even when an earlier removal fails; the
    /// returned error counts the failures and carries the first one. A
    /// directory that is already gone counts as removed. Calling this with
    /// nothing issued, or repeatedly, succeeds.
    pub fn cleanup(&self) -> Result<()> {
        let dirs = std::mem::take(&mut *self.issued.lock());
        if dirs.is_empty() {
            return Ok(());
        }

        let total = dirs.len();
        let mut failures = Vec::new();
        for dir in dirs {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove scratch directory");
                    failures.push(format!("{}: {}", path.display(), e));
                }
            }
        }

        tracing::debug!(
            removed = total - failures.len(),
            failed = failures.len(),
            "Cleaned up scratch space"
        );

        match failures.first() {
            None => Ok(()),
            Some(first) => Err(ScopeError::Cleanup {
                failed: failures.len(),
                first: first.clone(),
            }),
        }
    }
}

impl Default for TempDirGenerator {
    fn default() -> Self {
        Self::from_config(&ScopeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn generator(root: &Path) -> TempDirGenerator {
        TempDirGenerator::new(root, "imgscope-test-")
    }

    #[test]
    fn test_new_directory_is_created_under_root() {
        let root = TempDir::new().unwrap();
        let gen = generator(root.path());

        let dir = gen.new_directory("oci").unwrap();

        assert!(dir.is_dir());
        assert_eq!(dir.parent(), Some(root.path()));
        let name = dir.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("imgscope-test-oci-"), "{}", name);
        assert_eq!(gen.issued(), 1);
    }

    #[test]
    fn test_new_directory_names_are_unique() {
        let root = TempDir::new().unwrap();
        let gen = generator(root.path());

        let a = gen.new_directory("layer").unwrap();
        let b = gen.new_directory("layer").unwrap();

        assert_ne!(a, b);
        assert_eq!(gen.issued(), 2);
    }

    #[test]
    fn test_new_directory_creates_missing_root() {
        let base = TempDir::new().unwrap();
        let root = base.path().join("nested/scratch");
        let gen = generator(&root);

        let dir = gen.new_directory("x").unwrap();
        assert!(dir.starts_with(&root));
    }

    #[test]
    fn test_cleanup_with_nothing_issued() {
        let root = TempDir::new().unwrap();
        let gen = generator(root.path());

        assert!(gen.cleanup().is_ok());
        assert!(gen.cleanup().is_ok());
    }

    #[test]
    fn test_cleanup_removes_all_and_is_idempotent() {
        let root = TempDir::new().unwrap();
        let gen = generator(root.path());

        let dirs: Vec<PathBuf> = (0..3)
            .map(|i| gen.new_directory(&format!("d{}", i)).unwrap())
            .collect();
        std::fs::write(dirs[0].join("file.txt"), b"content").unwrap();
        std::fs::create_dir_all(dirs[1].join("a/b/c")).unwrap();

        gen.cleanup().unwrap();

        assert!(dirs.iter().all(|d| !d.exists()));
        assert_eq!(gen.issued(), 0);
        assert!(gen.cleanup().is_ok());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_cleanup_tolerates_already_removed_directory() {
        let root = TempDir::new().unwrap();
        let gen = generator(root.path());

        let gone = gen.new_directory("gone").unwrap();
        let kept = gen.new_directory("kept").unwrap();
        std::fs::remove_dir_all(&gone).unwrap();

        assert!(gen.cleanup().is_ok());
        assert!(!kept.exists());
    }

    #[test]
    fn test_concurrent_issuance() {
        let root = TempDir::new().unwrap();
        let gen = Arc::new(generator(root.path()));

        std::thread::scope(|s| {
            for t in 0..8 {
                let gen = Arc::clone(&gen);
                s.spawn(move || {
                    for i in 0..10 {
                        gen.new_directory(&format!("t{}-{}", t, i)).unwrap();
                    }
                });
            }
        });

        assert_eq!(gen.issued(), 80);
        gen.cleanup().unwrap();
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_removes_remaining_directories() {
        let root = TempDir::new().unwrap();
        let dir = {
            let gen = generator(root.path());
            gen.new_directory("dropped").unwrap()
        };
        assert!(!dir.exists());
    }
}
