//! Per-invocation filesystem workspace for pipeline runs
//!
//! A workspace holds the input directory (resources referenced by the user),
//! the output directory (artifacts produced by executed code), and matching
//! backup directories. The default workspace is a fresh temporary directory
//! per pipeline invocation, so concurrent runs never share state; a
//! persistent root can be supplied instead, in which case the reset stage
//! moves any leftover output files into backups under a randomized prefix
//! before the next run collects artifacts.

use crate::errors::PipelineError;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

const INPUT_DIR: &str = "input";
const OUTPUT_DIR: &str = "output";
const INPUT_BACKUP_DIR: &str = "input_backups";
const OUTPUT_BACKUP_DIR: &str = "output_backups";

/// An input file surfaced to the model: absolute path plus lowercase
/// extension (empty when the file has none).
#[derive(Debug, Clone)]
pub struct InputFile {
    pub path: PathBuf,
    pub extension: String,
}

pub struct Workspace {
    root: PathBuf,
    // Keeps an ephemeral root alive for the lifetime of the workspace.
    _tempdir: Option<TempDir>,
}

impl Workspace {
    /// Fresh temporary workspace, removed when dropped.
    pub fn ephemeral() -> Result<Self, PipelineError> {
        let tempdir = tempfile::Builder::new()
            .prefix("kiln-ws-")
            .tempdir()
            .map_err(|e| PipelineError::WorkspaceError(format!("Could not create workspace: {}", e)))?;
        let root = tempdir.path().to_path_buf();
        Self::ensure_layout(&root)?;
        Ok(Self {
            root,
            _tempdir: Some(tempdir),
        })
    }

    /// Persistent workspace rooted at `root`; directories are created as
    /// needed and survive across runs.
    pub fn at(root: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let root = root.into();
        Self::ensure_layout(&root)?;
        Ok(Self {
            root,
            _tempdir: None,
        })
    }

    fn ensure_layout(root: &Path) -> Result<(), PipelineError> {
        for dir in [INPUT_DIR, OUTPUT_DIR, INPUT_BACKUP_DIR, OUTPUT_BACKUP_DIR] {
            fs::create_dir_all(root.join(dir))?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root.join(INPUT_DIR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    /// Moves every file in the output directory into the output backups under
    /// a random 8-hex prefix, leaving the live directory empty for the next
    /// run. A no-op on an empty directory. Per-file failures are logged and
    /// skipped. Returns the backup paths of the moved files.
    pub fn reset_output(&self) -> Result<Vec<PathBuf>, PipelineError> {
        let backup_dir = self.root.join(OUTPUT_BACKUP_DIR);
        let mut moved = Vec::new();

        for entry in fs::read_dir(self.output_dir())? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name();
            let prefix = short_token();
            let destination = backup_dir.join(format!("{}_{}", prefix, name.to_string_lossy()));
            match fs::rename(&path, &destination) {
                Ok(()) => {
                    log::debug!("Backed up {} to {}", path.display(), destination.display());
                    moved.push(destination);
                }
                Err(e) => {
                    log::warn!("Failed to back up {}: {}", path.display(), e);
                }
            }
        }

        Ok(moved)
    }

    /// Files currently present in the input directory, for prompt
    /// augmentation.
    pub fn input_manifest(&self) -> Result<Vec<InputFile>, PipelineError> {
        let mut files = Vec::new();
        for entry in fs::read_dir(self.input_dir())? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let extension = path
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            files.push(InputFile { path, extension });
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Files currently present in the output directory, i.e. the artifacts of
    /// the run that just finished.
    pub fn output_files(&self) -> Result<Vec<PathBuf>, PipelineError> {
        let mut files = Vec::new();
        for entry in fs::read_dir(self.output_dir())? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn short_token() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}
