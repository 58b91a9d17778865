//! Snapshot provider backed by the git CLI.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

use super::{Revision, SnapshotProvider};
use crate::error::Error;

/// Reads committed and staged content with `git show`, working-tree content
/// straight from disk.
#[derive(Debug, Clone)]
pub struct GitSnapshots {
    repo_root: PathBuf,
}

impl GitSnapshots {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    fn git_show(&self, object: &str) -> Result<String, Error> {
        debug!(object, "git show");
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_root)
            .args(["show", object])
            .output()
            .map_err(|e| Error::Git(format!("failed to run git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Git(format!(
                "git show {} failed: {}",
                object,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|_| Error::Git(format!("{} is not valid UTF-8", object)))
    }
}

impl SnapshotProvider for GitSnapshots {
    fn show(&self, revision: &Revision, path: &str) -> Result<String, Error> {
        // `./` makes git resolve the path from `repo_root`, not the top level.
        match revision {
            Revision::Commit(rev) => self.git_show(&format!("{}:./{}", rev, path)),
            Revision::Index => self.git_show(&format!(":./{}", path)),
            Revision::WorkingTree => Ok(fs::read_to_string(self.repo_root.join(path))?),
        }
    }
}
