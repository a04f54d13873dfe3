//! Output-directory backed store
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<logical path>                 files written by assets
//! <root>/<state_dir>/<identity>.state  persisted asset state
//! ```
//!
//! Commits are staged in a temporary directory inside the root and renamed
//! into place. If any step fails, targets already replaced are restored from
//! their backups, so a failed commit leaves the directory as it was.

use crate::pattern;
use crate::store::{CommitBatch, FileFetcher, Store, StoreError};
use assetgraph_core::{AssetIdentity, File};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

const DEFAULT_STATE_DIR: &str = ".assetgraph";
const STAGING_PREFIX: &str = ".staging-";

/// Store backed by a directory on the local file system
#[derive(Debug, Clone)]
pub struct DiskStore {
    /// Output directory
    root: PathBuf,

    /// Subdirectory of `root` holding asset state
    state_dir: String,
}

impl DiskStore {
    /// Create a store rooted at `root`
    ///
    /// The directory is not created until the first commit.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state_dir: DEFAULT_STATE_DIR.to_string(),
        }
    }

    /// Use a custom state subdirectory
    pub fn with_state_dir(mut self, state_dir: impl Into<String>) -> Self {
        self.state_dir = state_dir.into();
        self
    }

    /// Output directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the persisted state for an identity
    pub fn state_path(&self, identity: &AssetIdentity) -> PathBuf {
        self.root.join(&self.state_dir).join(identity.state_file_name())
    }

    /// Resolve a logical path to a path under the root
    ///
    /// Paths inside the state directory or a staging directory belong to the
    /// store and are rejected.
    pub fn file_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        let normalized = File::normalize_path(name).map_err(StoreError::InvalidPath)?;
        if self.is_internal(&normalized) {
            return Err(StoreError::InvalidPath(format!(
                "path '{}' is reserved for the store's own data",
                name
            )));
        }
        Ok(self.root.join(normalized))
    }

    fn relative_name(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    fn is_internal(&self, name: &str) -> bool {
        let first = name.split('/').next().unwrap_or_default();
        first == self.state_dir || first.starts_with(STAGING_PREFIX)
    }
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

#[async_trait::async_trait]
impl FileFetcher for DiskStore {
    async fn fetch_by_name(&self, name: &str) -> Result<Option<File>, StoreError> {
        let path = self.file_path(name)?;
        Ok(read_optional(&path).await?.map(|data| File::new(name, data)))
    }

    async fn fetch_by_pattern(&self, glob: &str) -> Result<Vec<File>, StoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
                StoreError::io(path, std::io::Error::other(e.to_string()))
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            if let Some(name) = self.relative_name(entry.path()) {
                if !self.is_internal(&name) && pattern::matches(glob, &name) {
                    names.push(name);
                }
            }
        }
        names.sort();

        let mut files = Vec::with_capacity(names.len());
        for name in names {
            if let Some(file) = self.fetch_by_name(&name).await? {
                files.push(file);
            }
        }
        Ok(files)
    }
}

#[async_trait::async_trait]
impl Store for DiskStore {
    fn name(&self) -> &'static str {
        "Disk"
    }

    fn as_fetcher(&self) -> &dyn FileFetcher {
        self
    }

    async fn load(&self, identity: &AssetIdentity) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.state_path(identity);
        match read_optional(&path).await? {
            Some(data) if data.is_empty() => Err(StoreError::Corrupt {
                path: path.display().to_string(),
                reason: "empty state file".to_string(),
            }),
            other => Ok(other),
        }
    }

    async fn commit(&self, batch: CommitBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut entries = Vec::with_capacity(batch.files.len() + batch.states.len());
        for file in batch.files {
            let target = self.file_path(&file.path)?;
            entries.push((target, file.data));
        }
        for (identity, bytes) in batch.states {
            entries.push((self.state_path(&identity), bytes));
        }

        let root = self.root.clone();
        debug!(root = %root.display(), entries = entries.len(), "committing to disk store");

        tokio::task::spawn_blocking(move || commit_entries(&root, entries))
            .await
            .map_err(|e| StoreError::io(&self.root, std::io::Error::other(e.to_string())))?
    }
}

/// A target replaced during a commit, with the backup of what it held
struct Installed {
    target: PathBuf,
    backup: Option<PathBuf>,
}

fn commit_entries(root: &Path, entries: Vec<(PathBuf, Vec<u8>)>) -> Result<(), StoreError> {
    let created_root = !root.exists();
    std::fs::create_dir_all(root).map_err(|e| StoreError::io(root, e))?;

    let staging = match tempfile::Builder::new().prefix(STAGING_PREFIX).tempdir_in(root) {
        Ok(dir) => dir,
        Err(e) => {
            remove_created_root(root, created_root);
            return Err(StoreError::io(root, e));
        }
    };

    let mut installed = Vec::new();
    let mut created_dirs = Vec::new();
    let result = stage_and_install(staging.path(), entries, &mut installed, &mut created_dirs);

    if result.is_err() {
        rollback(&installed);
        remove_created_dirs(&created_dirs);
    }

    // Backups live in the staging directory and go away with it.
    drop(staging);

    if result.is_err() {
        remove_created_root(root, created_root);
    }
    result
}

fn stage_and_install(
    staging: &Path,
    entries: Vec<(PathBuf, Vec<u8>)>,
    installed: &mut Vec<Installed>,
    created_dirs: &mut Vec<PathBuf>,
) -> Result<(), StoreError> {
    let mut staged = Vec::with_capacity(entries.len());
    for (index, (target, data)) in entries.into_iter().enumerate() {
        let staged_path = staging.join(format!("entry-{index}"));
        std::fs::write(&staged_path, &data).map_err(|e| StoreError::io(&staged_path, e))?;
        staged.push((staged_path, target));
    }

    for (index, (staged_path, target)) in staged.into_iter().enumerate() {
        if let Some(parent) = target.parent() {
            create_parents(parent, created_dirs)?;
        }

        let backup = if target.exists() {
            let backup_path = staging.join(format!("backup-{index}"));
            std::fs::rename(&target, &backup_path).map_err(|e| StoreError::io(&target, e))?;
            Some(backup_path)
        } else {
            None
        };

        if let Err(e) = std::fs::rename(&staged_path, &target) {
            if let Some(backup_path) = &backup {
                if let Err(restore) = std::fs::rename(backup_path, &target) {
                    warn!(target = %target.display(), error = %restore, "failed to restore file after failed install");
                }
            }
            return Err(StoreError::io(&target, e));
        }

        installed.push(Installed { target, backup });
    }

    Ok(())
}

/// Create `dir` and any missing ancestors, recording each one created
///
/// Directories are recorded shallowest first as soon as they exist, so a
/// partial failure still leaves an accurate record.
fn create_parents(dir: &Path, created_dirs: &mut Vec<PathBuf>) -> Result<(), StoreError> {
    let mut missing = Vec::new();
    let mut current = Some(dir);
    while let Some(path) = current {
        if path.exists() {
            break;
        }
        missing.push(path);
        current = path.parent();
    }

    for path in missing.into_iter().rev() {
        std::fs::create_dir(path).map_err(|e| StoreError::io(path, e))?;
        created_dirs.push(path.to_path_buf());
    }
    Ok(())
}

fn rollback(installed: &[Installed]) {
    for entry in installed.iter().rev() {
        let restored = match &entry.backup {
            Some(backup) => std::fs::rename(backup, &entry.target),
            None => std::fs::remove_file(&entry.target),
        };
        if let Err(e) = restored {
            warn!(target = %entry.target.display(), error = %e, "failed to roll back committed file");
        }
    }
}

fn remove_created_dirs(created_dirs: &[PathBuf]) {
    for dir in created_dirs.iter().rev() {
        if let Err(e) = std::fs::remove_dir(dir) {
            warn!(dir = %dir.display(), error = %e, "failed to remove directory after failed commit");
        }
    }
}

fn remove_created_root(root: &Path, created_root: bool) {
    if created_root {
        if let Err(e) = std::fs::remove_dir_all(root) {
            warn!(root = %root.display(), error = %e, "failed to remove output directory after failed commit");
        }
    }
}
