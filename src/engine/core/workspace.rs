use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Job-scoped scratch directory for clips, the concat manifest and the
/// timeline. Removed when dropped, including while unwinding.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: TempDir,
}

impl JobWorkspace {
    /// Create a fresh, uniquely named workspace under the system temp dir
    /// (or under `root` when given).
    pub fn create(root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("stillcut-job-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        tracing::debug!(path = %dir.path().display(), "created job workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn clip_path(&self, index: usize) -> PathBuf {
        self.path().join(format!("clip_{:04}.mp4", index))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.path().join("concat.txt")
    }

    pub fn concat_output_path(&self) -> PathBuf {
        self.path().join("concat_output.mp4")
    }

    pub fn dissolve_output_path(&self) -> PathBuf {
        self.path().join("dissolve_output.mp4")
    }

    /// Remove the directory now and report failures instead of ignoring them.
    pub fn close(self) -> io::Result<()> {
        let path = self.path().to_path_buf();
        self.dir.close()?;
        tracing::debug!(path = %path.display(), "removed job workspace");
        Ok(())
    }
}
