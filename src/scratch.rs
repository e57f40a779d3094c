//! Per-request scratch directories.

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::LipsyncResult;

pub const SCRATCH_PREFIX: &str = "lipsync-video-";

/// A uniquely named working directory removed, with everything under it, when dropped.
///
/// Removal failures are logged and swallowed so they never replace the outcome of the request
/// that owned the directory.
#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<tempfile::TempDir>,
    path: PathBuf,
}

impl ScratchDir {
    /// Create a fresh directory under `root`, or under the system temp dir when `None`.
    pub fn create(root: Option<&Path>) -> LipsyncResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)
                    .with_context(|| format!("create scratch root '{}'", root.display()))?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .context("create scratch directory")?;

        let path = dir.path().to_path_buf();
        tracing::debug!(path = %path.display(), "scratch directory created");
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    /// Remove the directory now instead of at drop time.
    pub fn close(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match dir.close() {
            Ok(()) => tracing::debug!(path = %self.path.display(), "scratch directory removed"),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove scratch directory"
            ),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        self.remove();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_is_removed_on_drop_with_contents() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchDir::create(Some(root.path())).unwrap();
            std::fs::create_dir_all(scratch.join("frames")).unwrap();
            std::fs::write(scratch.join("frames/frame_00000.png"), b"x").unwrap();
            assert!(
                scratch
                    .path()
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .starts_with(SCRATCH_PREFIX)
            );
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn directories_are_unique_and_close_is_idempotent_with_drop() {
        let root = tempfile::tempdir().unwrap();
        let a = ScratchDir::create(Some(root.path())).unwrap();
        let b = ScratchDir::create(Some(root.path())).unwrap();
        assert_ne!(a.path(), b.path());

        let a_path = a.path().to_path_buf();
        a.close();
        assert!(!a_path.exists());
        assert!(b.path().exists());
    }

    #[test]
    fn already_deleted_directory_does_not_panic() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(Some(root.path())).unwrap();
        std::fs::remove_dir_all(scratch.path()).unwrap();
        drop(scratch);
    }
}
