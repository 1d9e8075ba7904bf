// Script and file locators.
//
// The script locator greps candidate project roots for a script mentioning
// the plot's base name; the file locator finds a plot image by exact name.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use annotator_common::protocol::LocateScriptResponse;
use tracing::{info, warn};

use crate::config::SearchConfig;
use crate::roots::{file_search_roots, infer_script_roots, nearest_project_root};
use crate::search::SearchTools;
use crate::store::{PersistenceStore, StoreError};

/// Search term for a plot file: its name without the extension.
pub fn search_term(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub struct Locator {
    store: Arc<dyn PersistenceStore>,
    tools: SearchTools,
    config: SearchConfig,
}

impl Locator {
    pub fn new(store: Arc<dyn PersistenceStore>, tools: SearchTools, config: SearchConfig) -> Self {
        Self { store, tools, config }
    }

    /// Find a script mentioning `term` under the inferred roots.
    ///
    /// Roots are tried in set order and the first root with a usable match
    /// wins. Within a root the first match the backend reports is taken; with
    /// the process backend that order depends on the filesystem.
    pub fn find_script(&self, term: &str) -> Result<Option<PathBuf>, StoreError> {
        let roots = infer_script_roots(self.store.as_ref(), &self.config)?;
        let timeout = self.config.script_timeout();

        for root in &roots {
            let matches = match self.tools.text.files_containing(
                root,
                term,
                &self.config.script_extension,
                timeout,
            ) {
                Ok(matches) => matches,
                Err(error) => {
                    warn!(root = %root.display(), %error, "script search gave up on root");
                    continue;
                }
            };

            if let Some(script) = matches.into_iter().find(|path| !self.is_excluded(path)) {
                return Ok(Some(script));
            }
        }

        Ok(None)
    }

    /// Search for the script behind `filename` and, when found, merge it into
    /// the current metadata record.
    pub fn locate_script(&self, filename: &str) -> Result<LocateScriptResponse, StoreError> {
        let term = search_term(filename);
        let script = self.find_script(&term)?;

        if let Some(script) = &script {
            let mut record = self.store.load_metadata()?.unwrap_or_default();
            let regen_cwd = nearest_project_root(script, &self.config.project_markers)
                .map(|root| root.to_string_lossy().into_owned());
            record.merge_script(&term, script.to_string_lossy(), regen_cwd);
            self.store.store_metadata(&record)?;
            info!(script = %script.display(), filename, "script found");
        } else {
            info!(filename, "no script found");
        }

        Ok(LocateScriptResponse {
            found: script.is_some(),
            script: script.map(|path| path.to_string_lossy().into_owned()),
            filename: filename.to_string(),
        })
    }

    /// First file named exactly `filename`, checking the secondary mount
    /// before home.
    pub fn find_file(&self, filename: &str) -> Option<PathBuf> {
        let timeout = self.config.file_timeout();
        for root in file_search_roots(&self.config) {
            match self.tools.path.first_named(&root, filename, timeout) {
                Ok(Some(found)) => return Some(found),
                Ok(None) => {}
                Err(error) => warn!(root = %root.display(), %error, "file search gave up on root"),
            }
        }
        None
    }

    fn is_excluded(&self, path: &Path) -> bool {
        path.components().any(|component| match component {
            Component::Normal(name) => {
                let name = name.to_string_lossy();
                self.config.excluded_segments.iter().any(|segment| name.contains(segment.as_str()))
            }
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{PathSearch, SearchError, TextSearch, WalkSearch};
    use crate::store::{MemoryStore, Slot};
    use annotator_common::metadata::MetadataRecord;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Canned per-root answers; records which roots were asked.
    #[derive(Default)]
    struct ScriptedSearch {
        text: HashMap<PathBuf, Result<Vec<PathBuf>, SearchError>>,
        files: HashMap<PathBuf, Result<Option<PathBuf>, SearchError>>,
        asked: Mutex<Vec<PathBuf>>,
    }

    impl TextSearch for ScriptedSearch {
        fn files_containing(
            &self,
            root: &Path,
            _term: &str,
            _extension: &str,
            _timeout: Duration,
        ) -> Result<Vec<PathBuf>, SearchError> {
            self.asked.lock().unwrap().push(root.to_path_buf());
            self.text.get(root).cloned().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    impl PathSearch for ScriptedSearch {
        fn first_named(
            &self,
            root: &Path,
            _file_name: &str,
            _timeout: Duration,
        ) -> Result<Option<PathBuf>, SearchError> {
            self.asked.lock().unwrap().push(root.to_path_buf());
            self.files.get(root).cloned().unwrap_or(Ok(None))
        }
    }

    struct Fixture {
        tmp: TempDir,
        config: SearchConfig,
        store: Arc<MemoryStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let home = tmp.path().join("home");
            let data = tmp.path().join("data");
            fs::create_dir_all(&home).unwrap();
            fs::create_dir_all(&data).unwrap();
            let config = SearchConfig {
                home_dir: Some(home),
                secondary_root: data,
                ..SearchConfig::default()
            };
            Self { tmp, config, store: Arc::new(MemoryStore::new()) }
        }

        fn home(&self) -> PathBuf {
            self.config.home_dir.clone().unwrap()
        }

        fn locator_with(&self, search: Arc<ScriptedSearch>) -> Locator {
            let tools = SearchTools { text: search.clone(), path: search };
            Locator::new(self.store.clone(), tools, self.config.clone())
        }

        fn native_locator(&self) -> Locator {
            let walk = Arc::new(WalkSearch::skipping(self.config.excluded_segments.clone()));
            let tools = SearchTools { text: walk.clone(), path: walk };
            Locator::new(self.store.clone(), tools, self.config.clone())
        }
    }

    #[test]
    fn search_term_strips_extension() {
        assert_eq!(search_term("foo.csv"), "foo");
        assert_eq!(search_term("albedo_trend.png"), "albedo_trend");
        assert_eq!(search_term("archive.tar.gz"), "archive.tar");
        assert_eq!(search_term("noext"), "noext");
        assert_eq!(search_term(""), "");
    }

    #[test]
    fn not_found_leaves_metadata_untouched() {
        let fx = Fixture::new();
        fx.store.store_metadata(&MetadataRecord::for_source("/plots/foo.png", "foo")).unwrap();
        let before = fx.store.read(Slot::Metadata).unwrap();

        let response = fx.native_locator().locate_script("foo.csv").unwrap();

        assert_eq!(
            response,
            LocateScriptResponse { found: false, script: None, filename: "foo.csv".into() }
        );
        assert_eq!(fx.store.read(Slot::Metadata).unwrap(), before);
    }

    #[test]
    fn found_script_is_merged_into_metadata() {
        let fx = Fixture::new();
        let proj = fx.home().join("Github/glacier");
        fs::create_dir_all(proj.join(".git")).unwrap();
        fs::create_dir_all(proj.join("scripts")).unwrap();
        let script = proj.join("scripts/plot_albedo.py");
        fs::write(&script, "plt.savefig('albedo_trend.png')\n").unwrap();

        fx.store
            .store_metadata(&MetadataRecord::for_source("/data/albedo_trend.png", "old"))
            .unwrap();

        let response = fx.native_locator().locate_script("albedo_trend.png").unwrap();
        assert!(response.found);
        assert_eq!(response.script.as_deref(), Some(script.to_str().unwrap()));

        let record = fx.store.load_metadata().unwrap().unwrap();
        assert_eq!(record.source.as_deref(), Some("/data/albedo_trend.png"));
        assert_eq!(record.name.as_deref(), Some("albedo_trend"));
        assert_eq!(record.source_script.as_deref(), Some(script.to_str().unwrap()));
        assert_eq!(record.regen_cwd.as_deref(), Some(proj.to_str().unwrap()));
    }

    #[test]
    fn found_script_without_prior_metadata_creates_record() {
        let fx = Fixture::new();
        let dev = fx.home().join("Dev");
        fs::create_dir_all(&dev).unwrap();
        fs::write(dev.join("make.py"), "name = 'ndvi_map'\n").unwrap();

        let response = fx.native_locator().locate_script("ndvi_map.png").unwrap();
        assert!(response.found);
        let record = fx.store.load_metadata().unwrap().unwrap();
        assert_eq!(record.name.as_deref(), Some("ndvi_map"));
        assert!(record.source.is_none());
    }

    #[test]
    fn virtualenv_and_cache_matches_are_ignored() {
        let fx = Fixture::new();
        let root = fx.home().join("Code");
        let search = Arc::new(ScriptedSearch {
            text: HashMap::from([(
                root.clone(),
                Ok(vec![
                    root.join("env/.venv/lib/site.py"),
                    root.join("pkg/__pycache__/x.py"),
                    root.join("pkg/real.py"),
                ]),
            )]),
            ..ScriptedSearch::default()
        });
        fs::create_dir_all(&root).unwrap();

        let found = fx.locator_with(search).find_script("term").unwrap();
        assert_eq!(found, Some(root.join("pkg/real.py")));
    }

    #[test]
    fn timed_out_root_is_skipped_and_next_root_searched() {
        let fx = Fixture::new();
        let first = fx.home().join("Code");
        let second = fx.home().join("Projects");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();

        let search = Arc::new(ScriptedSearch {
            text: HashMap::from([
                (
                    first.clone(),
                    Err(SearchError::TimedOut { root: first.clone(), timeout: Duration::ZERO }),
                ),
                (second.clone(), Ok(vec![second.join("fig.py")])),
            ]),
            ..ScriptedSearch::default()
        });

        let locator = fx.locator_with(search.clone());
        assert_eq!(locator.find_script("fig").unwrap(), Some(second.join("fig.py")));
        assert_eq!(*search.asked.lock().unwrap(), vec![first, second]);
    }

    #[test]
    fn first_root_with_match_stops_the_search() {
        let fx = Fixture::new();
        let a = fx.home().join("Code");
        let b = fx.home().join("Dev");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();

        let search = Arc::new(ScriptedSearch {
            text: HashMap::from([
                (a.clone(), Ok(vec![a.join("one.py"), a.join("two.py")])),
                (b.clone(), Ok(vec![b.join("three.py")])),
            ]),
            ..ScriptedSearch::default()
        });

        let locator = fx.locator_with(search.clone());
        assert_eq!(locator.find_script("x").unwrap(), Some(a.join("one.py")));
        assert_eq!(search.asked.lock().unwrap().len(), 1);
    }

    #[test]
    fn find_file_prefers_secondary_mount() {
        let fx = Fixture::new();
        let data = fx.config.secondary_root.clone();
        let home = fx.home();
        let search = Arc::new(ScriptedSearch {
            files: HashMap::from([
                (data.clone(), Ok(Some(data.join("figs/a.png")))),
                (home.clone(), Ok(Some(home.join("a.png")))),
            ]),
            ..ScriptedSearch::default()
        });

        let locator = fx.locator_with(search.clone());
        assert_eq!(locator.find_file("a.png"), Some(data.join("figs/a.png")));
        assert_eq!(*search.asked.lock().unwrap(), vec![data]);
    }

    #[test]
    fn find_file_falls_back_to_home_after_timeout() {
        let fx = Fixture::new();
        let data = fx.config.secondary_root.clone();
        let home = fx.home();
        let search = Arc::new(ScriptedSearch {
            files: HashMap::from([
                (
                    data.clone(),
                    Err(SearchError::TimedOut { root: data.clone(), timeout: Duration::ZERO }),
                ),
                (home.clone(), Ok(Some(home.join("a.png")))),
            ]),
            ..ScriptedSearch::default()
        });

        assert_eq!(fx.locator_with(search).find_file("a.png"), Some(home.join("a.png")));
    }

    #[test]
    fn find_file_none_when_nothing_matches() {
        let fx = Fixture::new();
        fs::write(fx.tmp.path().join("home/other.png"), b"x").unwrap();
        assert_eq!(fx.native_locator().find_file("missing.png"), None);
    }
}
