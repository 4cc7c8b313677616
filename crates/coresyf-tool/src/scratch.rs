use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

const SCRATCH_PREFIX: &str = "coresyf-";

/// Uniquely named scratch directory owned by a single invocation.
///
/// Removed by [`ScratchDir::close`], or on drop if `close` was never reached.
#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchDir {
    pub fn create_in(root: &Path) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(root)?;
        let path = dir.path().to_path_buf();
        debug!("Created scratch directory {}", path.display());
        Ok(ScratchDir {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn close(mut self) -> io::Result<()> {
        if let Some(dir) = self.dir.take() {
            dir.close()?;
            debug!("Removed scratch directory {}", self.path.display());
        }
        Ok(())
    }
}
