use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_IGNORED_DIRS;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatcherConfig {
    /// Project tree watched by the `devgate` binary.
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,

    /// Subscribe to every directory below `project_root`, not just the root.
    #[serde(default = "default_recursive")]
    pub recursive: bool,

    /// Directory names skipped during recursive setup, in addition to the
    /// built-in VCS and build-cache deny-list.
    #[serde(default)]
    pub extra_ignored_dirs: Vec<String>,

    /// Deepest directory level registered below a recursive root.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// After a watched directory is renamed, start watching it under its new
    /// name with the same handler. Off by default: the rename target may lie
    /// outside the project tree.
    #[serde(default)]
    pub reestablish_on_rename: bool,

    /// A change identical to one the same handler received within this
    /// window (same path, same kind) is not delivered again. The OS reports
    /// some changes once per watched directory involved. 0 disables.
    #[serde(default = "default_coalesce_window_ms")]
    pub coalesce_window_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            recursive: default_recursive(),
            extra_ignored_dirs: Vec::new(),
            max_depth: default_max_depth(),
            reestablish_on_rename: false,
            coalesce_window_ms: default_coalesce_window_ms(),
        }
    }
}

impl WatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(Error::InvalidConfig("max_depth must be greater than 0".into()));
        }

        if let Some(bad) = self
            .extra_ignored_dirs
            .iter()
            .find(|name| name.is_empty() || name.contains('/') || name.contains('\\'))
        {
            return Err(Error::InvalidConfig(format!(
                "extra_ignored_dirs entry {bad:?} must be a bare directory name"
            )));
        }

        Ok(())
    }

    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_window_ms)
    }

    /// Whether a directory with this name is skipped during recursive setup.
    pub fn is_ignored_dir(
        &self,
        name: &str,
    ) -> bool {
        DEFAULT_IGNORED_DIRS.contains(&name) || self.extra_ignored_dirs.iter().any(|d| d == name)
    }
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_recursive() -> bool {
    true
}
fn default_max_depth() -> usize {
    32
}
fn default_coalesce_window_ms() -> u64 {
    50
}
