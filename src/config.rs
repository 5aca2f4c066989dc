//! Configuration for the memory store and its compaction job.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Compaction job configuration.
///
/// Deserialized from TOML; every field has a workable default so an empty
/// config section is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompactionConfig {
    /// Workspace directory scanned for compaction candidates.
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,

    /// Database location, resolved against `workspace_dir` when relative.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Owner recorded on compacted memories.
    #[serde(default = "default_owner")]
    pub owner: String,

    /// Glob patterns (relative to `workspace_dir`) for candidate files.
    /// Empty means "use the dated daily-file defaults at run time".
    #[serde(default)]
    pub patterns: Vec<String>,

    /// How many critical records get an access-pattern touch per run.
    #[serde(default = "default_access_sample_size")]
    pub access_sample_size: usize,
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_db_path() -> String {
    "memory/memory.db".to_string()
}

fn default_owner() -> String {
    "assistant".to_string()
}

fn default_access_sample_size() -> usize {
    5
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            workspace_dir: default_workspace_dir(),
            db_path: default_db_path(),
            owner: default_owner(),
            patterns: Vec::new(),
            access_sample_size: default_access_sample_size(),
        }
    }
}

impl CompactionConfig {
    /// Absolute database path, resolving relative paths under the workspace.
    pub fn resolved_db_path(&self) -> PathBuf {
        let path = Path::new(&self.db_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_dir.join(path)
        }
    }
}
