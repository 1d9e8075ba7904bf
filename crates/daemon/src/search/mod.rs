// Filesystem search capabilities used by the script and file locators.
//
// Both capabilities are blocking and take an explicit deadline; callers run
// them on the blocking pool.

pub mod process;
pub mod walk;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::{SearchBackend, SearchConfig};

pub use process::{CommandExecutor, CommandResult, ProcessCommandExecutor, ProcessSearch};
pub use walk::WalkSearch;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("search under `{}` timed out after {}s", .root.display(), .timeout.as_secs_f32())]
    TimedOut { root: PathBuf, timeout: Duration },

    #[error("failed to run `{command}`: {message}")]
    SpawnFailed { command: String, message: String },
}

/// Recursive content search.
pub trait TextSearch: Send + Sync {
    /// Files under `root` with extension `extension` whose contents contain
    /// `term` literally, in the order the backend reports them.
    fn files_containing(
        &self,
        root: &Path,
        term: &str,
        extension: &str,
        timeout: Duration,
    ) -> Result<Vec<PathBuf>, SearchError>;
}

/// Recursive file-name search.
pub trait PathSearch: Send + Sync {
    /// First regular file under `root` named exactly `file_name`.
    fn first_named(
        &self,
        root: &Path,
        file_name: &str,
        timeout: Duration,
    ) -> Result<Option<PathBuf>, SearchError>;
}

/// The pair of search capabilities handed to the locators.
#[derive(Clone)]
pub struct SearchTools {
    pub text: Arc<dyn TextSearch>,
    pub path: Arc<dyn PathSearch>,
}

impl SearchTools {
    pub fn from_config(config: &SearchConfig) -> Self {
        match config.backend {
            // Only the script search prunes excluded directories; plot files
            // may live anywhere.
            SearchBackend::Native => Self {
                text: Arc::new(WalkSearch::skipping(config.excluded_segments.clone())),
                path: Arc::new(WalkSearch::new()),
            },
            SearchBackend::Process => {
                let process = Arc::new(ProcessSearch::new());
                Self { text: process.clone(), path: process }
            }
        }
    }
}

impl std::fmt::Debug for SearchTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchTools").finish_non_exhaustive()
    }
}
