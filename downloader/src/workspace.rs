/// Per-request temporary directories.
///
/// A `Workspace` is exclusively owned by one request. Dropping it removes the
/// directory and everything inside, whichever way the request ended.
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

/// Directory name prefix, followed by the workspace id.
const PREFIX: &str = "clipdrop-";

#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// Create a fresh, uniquely named directory under `root`.
    pub fn create(root: &Path) -> io::Result<Self> {
        let id = Uuid::new_v4();
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}{}-", PREFIX, id))
            .tempdir_in(root)?;
        let path = dir.path().to_path_buf();
        debug!("Opened workspace {}", path.display());
        Ok(Self {
            id,
            dir: Some(dir),
            path,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => debug!("Removed workspace {}", self.path.display()),
                Err(e) => warn!("Failed to remove workspace {}: {}", self.path.display(), e),
            }
        }
    }
}
