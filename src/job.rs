//! Per-job scratch arena. Every download and rendered document of one job lives under
//! `{scratch_root}/{job id}` and the whole tree is removed when the job is dropped.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Scratch directories for one packaging job.
#[derive(Debug)]
pub struct Job {
    id: Uuid,
    root: PathBuf,
    downloads: PathBuf,
    images: PathBuf,
}

impl Job {
    /// Create `{scratch_root}/{uuid}/downloads`. The images directory is created on first use.
    pub fn create(scratch_root: &Path) -> io::Result<Self> {
        let id = Uuid::new_v4();
        let root = scratch_root.join(id.to_string());
        let downloads = root.join("downloads");
        let images = root.join("images");
        std::fs::create_dir_all(&downloads)?;
        debug!(job = %id, root = %root.display(), "job scratch created");
        Ok(Self {
            id,
            root,
            downloads,
            images,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rendered documents and archives.
    pub fn downloads_dir(&self) -> &Path {
        &self.downloads
    }

    /// Downloaded images.
    pub fn images_dir(&self) -> &Path {
        &self.images
    }

    /// Best-effort removal of the image cache.
    pub fn clear_images(&self) {
        remove_tree(&self.images);
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        remove_tree(&self.root);
        debug!(job = %self.id, "job scratch removed");
    }
}

fn remove_tree(path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove scratch directory"),
    }
}
