// In-process search backend built on a directory walk.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use walkdir::{DirEntry, WalkDir};

use super::{PathSearch, SearchError, TextSearch};

/// Walks the tree itself instead of spawning tools. Entries are visited in
/// file-name order, so results are stable across runs.
#[derive(Debug, Clone, Default)]
pub struct WalkSearch {
    skip_dirs: Vec<String>,
}

impl WalkSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not descend into directories whose name contains any of `segments`.
    pub fn skipping(segments: Vec<String>) -> Self {
        Self { skip_dirs: segments }
    }

    fn is_skipped(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        self.skip_dirs.iter().any(|segment| name.contains(segment.as_str()))
    }

    fn walk<'a>(&'a self, root: &Path) -> impl Iterator<Item = DirEntry> + 'a {
        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !self.is_skipped(entry))
            .filter_map(Result::ok)
    }
}

impl TextSearch for WalkSearch {
    fn files_containing(
        &self,
        root: &Path,
        term: &str,
        extension: &str,
        timeout: Duration,
    ) -> Result<Vec<PathBuf>, SearchError> {
        let deadline = Instant::now() + timeout;
        let needle = term.as_bytes();
        let mut matches = Vec::new();

        for entry in self.walk(root) {
            if Instant::now() >= deadline {
                return Err(SearchError::TimedOut { root: root.to_path_buf(), timeout });
            }
            if !entry.file_type().is_file()
                || entry.path().extension().and_then(OsStr::to_str) != Some(extension)
            {
                continue;
            }
            // Unreadable files are skipped, like `grep -s`.
            let Ok(contents) = fs::read(entry.path()) else {
                continue;
            };
            if contains(&contents, needle) {
                matches.push(entry.into_path());
            }
        }

        Ok(matches)
    }
}

impl PathSearch for WalkSearch {
    fn first_named(
        &self,
        root: &Path,
        file_name: &str,
        timeout: Duration,
    ) -> Result<Option<PathBuf>, SearchError> {
        let deadline = Instant::now() + timeout;
        for entry in self.walk(root) {
            if Instant::now() >= deadline {
                return Err(SearchError::TimedOut { root: root.to_path_buf(), timeout });
            }
            if entry.file_type().is_file() && entry.file_name() == OsStr::new(file_name) {
                return Ok(Some(entry.into_path()));
            }
        }
        Ok(None)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}
