// Candidate roots for the script and file searches.
//
// Script roots are rebuilt on every call from the metadata history plus a few
// conventional project directories. They come back as a `BTreeSet`, so the
// locator tries them in lexicographic order.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::SearchConfig;
use crate::store::{PersistenceStore, StoreError};

/// Closest ancestor of `path` (the path itself excluded) that holds one of
/// the `markers`, e.g. a `.git` directory or a `pyproject.toml`.
pub fn nearest_project_root(path: &Path, markers: &[String]) -> Option<PathBuf> {
    path.ancestors()
        .skip(1)
        .filter(|dir| !dir.as_os_str().is_empty())
        .find(|dir| markers.iter().any(|marker| dir.join(marker).exists()))
        .map(Path::to_path_buf)
}

/// Roots likely to contain the user's plotting scripts.
pub fn infer_script_roots(
    store: &dyn PersistenceStore,
    config: &SearchConfig,
) -> Result<BTreeSet<PathBuf>, StoreError> {
    let mut roots = BTreeSet::new();

    for record in store.history()? {
        if let Some(regen_cwd) = record.regen_cwd.filter(|cwd| !cwd.is_empty()) {
            roots.insert(PathBuf::from(regen_cwd));
        }
        if let Some(source) = record.source.filter(|source| !source.is_empty()) {
            if let Some(root) = nearest_project_root(Path::new(&source), &config.project_markers) {
                roots.insert(root);
            }
        }
    }

    let bases = config.resolved_home().into_iter().chain([config.secondary_root.clone()]);
    for base in bases {
        for name in &config.conventional_dirs {
            let candidate = base.join(name);
            if candidate.is_dir() {
                roots.insert(candidate);
            }
        }
    }

    debug!(count = roots.len(), "inferred script roots");
    Ok(roots)
}

/// Roots searched for a plot file by name, in priority order: the secondary
/// mount first, then home. Roots that do not exist are dropped.
pub fn file_search_roots(config: &SearchConfig) -> Vec<PathBuf> {
    std::iter::once(config.secondary_root.clone())
        .chain(config.resolved_home())
        .filter(|root| root.is_dir())
        .collect()
}
