//! Insight Registry & Hot-Reload Loader
//!
//! The registry is a process-wide mapping `id -> InsightDescriptor`. It is
//! never mutated in place: every rescan or per-file reload builds a new
//! [`RegistrySnapshot`] and swaps it in atomically, so readers always see a
//! complete mapping without taking a lock. Writers are serialized among
//! themselves.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let registry = Arc::new(InsightRegistry::new(dirs, InsightCatalog::builtin(), FilterEngine::probe()));
//! let errors = registry.rescan();
//! let handle = RegistryWatcher::new(registry.clone()).start(|report| { ... })?;
//! ```

pub mod loader;
pub mod watcher;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ai::AIConfig;
use crate::filter::{FilterEngine, FilterSpec};
use crate::insights::{Insight, InsightCatalog};

pub use loader::{
    discover, is_definition_file, is_hidden_under, load_all, load_definition, LoadError,
    LoadErrorKind,
};
pub use watcher::{Debouncer, RegistryWatcher, ReloadReport, WatchHandle, DEFAULT_DEBOUNCE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    /// Filter spec plus post-processor
    Declarative,
    /// Compiled-in implementation from the catalog
    Procedural,
}

impl InsightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightKind::Declarative => "declarative",
            InsightKind::Procedural => "procedural",
        }
    }
}

impl fmt::Display for InsightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated, published insight
///
/// Replaced wholesale on reload; its filter spec and AI config never change
/// after publication.
#[derive(Clone, Serialize)]
pub struct InsightDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: InsightKind,
    /// Definition file this descriptor was loaded from
    pub source: PathBuf,
    pub folder: Option<String>,
    /// Declarative insights only
    pub filter: Option<Arc<FilterSpec>>,
    pub ai: AIConfig,
    pub loaded_at: DateTime<Utc>,
    #[serde(skip)]
    pub insight: Arc<dyn Insight>,
}

impl fmt::Debug for InsightDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsightDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("source", &self.source)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

/// One complete, immutable view of the registry
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    by_id: IndexMap<String, Arc<InsightDescriptor>>,
}

impl RegistrySnapshot {
    pub fn get(&self, id: &str) -> Option<&Arc<InsightDescriptor>> {
        self.by_id.get(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Descriptors in publication order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<InsightDescriptor>> {
        self.by_id.values()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.by_id.keys().map(String::as_str).collect()
    }

    /// The descriptor published from `path`, if any
    pub fn for_source(&self, path: &Path) -> Option<&Arc<InsightDescriptor>> {
        self.by_id.values().find(|d| d.source == path)
    }

    /// Sources at or below `path` (a removed directory takes its files along)
    pub fn sources_under(&self, path: &Path) -> Vec<PathBuf> {
        self.by_id
            .values()
            .filter(|d| d.source.starts_with(path))
            .map(|d| d.source.clone())
            .collect()
    }

    pub(crate) fn insert(&mut self, descriptor: Arc<InsightDescriptor>) {
        self.by_id.insert(descriptor.id.clone(), descriptor);
    }

    /// Drop whatever `path` published; returns the withdrawn id
    pub(crate) fn withdraw_source(&mut self, path: &Path) -> Option<String> {
        let id = self.for_source(path)?.id.clone();
        self.by_id.shift_remove(&id);
        Some(id)
    }
}

/// The live, hot-reloadable set of insights
pub struct InsightRegistry {
    current: ArcSwap<RegistrySnapshot>,
    writer: Mutex<()>,
    directories: Vec<PathBuf>,
    catalog: InsightCatalog,
    engine: FilterEngine,
}

impl InsightRegistry {
    /// Empty registry; call [`rescan`](Self::rescan) for the initial load
    pub fn new(directories: Vec<PathBuf>, catalog: InsightCatalog, engine: FilterEngine) -> Self {
        Self {
            current: ArcSwap::from_pointee(RegistrySnapshot::default()),
            writer: Mutex::new(()),
            directories,
            catalog,
            engine,
        }
    }

    /// The current complete mapping
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.load_full()
    }

    pub fn get(&self, id: &str) -> Option<Arc<InsightDescriptor>> {
        self.current.load().get(id).cloned()
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    fn write_lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Rebuild the registry from every configured directory
    ///
    /// A file that fails to load keeps its previously published descriptor,
    /// unless it lost its id to another file or the id is now taken.
    pub fn rescan(&self) -> Vec<LoadError> {
        let _guard = self.write_lock();
        let previous = self.current.load_full();

        let (mut next, errors) = load_all(&self.directories, &self.catalog, &self.engine);

        for err in &errors {
            if err.kind == LoadErrorKind::DuplicateId {
                continue;
            }
            if let Some(prior) = previous.for_source(&err.path) {
                if next.get(&prior.id).is_none() && err.path.exists() {
                    debug!(path = %err.path.display(), id = %prior.id, "Keeping last good descriptor");
                    next.insert(prior.clone());
                }
            }
        }

        info!(insights = next.len(), errors = errors.len(), "Registry published");
        self.current.store(Arc::new(next));
        errors
    }

    /// Re-validate and re-publish only the given paths
    ///
    /// - missing path: every descriptor published from it or under it is withdrawn
    /// - directory: every definition file under it is reloaded
    /// - path under a hidden entry: ignored
    /// - load error: its last good descriptor stays
    /// - id owned by another file: `DuplicateId`, its descriptor is withdrawn
    pub fn reload_paths(&self, paths: &[PathBuf]) -> Vec<LoadError> {
        let _guard = self.write_lock();
        let mut next = RegistrySnapshot::clone(&self.current.load());
        let mut errors = Vec::new();

        for path in paths {
            if !path.exists() {
                let removed = next.sources_under(path);
                for source in removed {
                    if let Some(id) = next.withdraw_source(&source) {
                        info!(path = %source.display(), id = %id, "Insight removed");
                    }
                }
                continue;
            }

            if is_hidden_under(path, &self.directories) {
                debug!(path = %path.display(), "Ignoring hidden path");
                continue;
            }

            if path.is_dir() {
                for file in discover(std::slice::from_ref(path)) {
                    self.reload_file(&mut next, &file, &mut errors);
                }
            } else if path.is_file() && is_definition_file(path) {
                self.reload_file(&mut next, path, &mut errors);
            }
        }

        self.current.store(Arc::new(next));
        errors
    }

    fn reload_file(&self, next: &mut RegistrySnapshot, path: &Path, errors: &mut Vec<LoadError>) {
        match load_definition(path, &self.catalog, &self.engine) {
            Ok(descriptor) => {
                let owner = next.get(&descriptor.id).map(|d| d.source.clone());
                match owner {
                    Some(owner) if owner.as_path() != path => {
                        warn!(path = %path.display(), id = %descriptor.id, "Duplicate insight id on reload");
                        next.withdraw_source(path);
                        errors.push(LoadError::new(
                            path,
                            LoadErrorKind::DuplicateId,
                            format!(
                                "id '{}' is already defined by {}",
                                descriptor.id,
                                owner.display()
                            ),
                        ));
                    }
                    Some(_) => {
                        info!(path = %path.display(), id = %descriptor.id, "Insight reloaded");
                        next.insert(Arc::new(descriptor));
                    }
                    None => {
                        // The file may have been renamed to a new id
                        next.withdraw_source(path);
                        info!(path = %path.display(), id = %descriptor.id, "Insight added");
                        next.insert(Arc::new(descriptor));
                    }
                }
            }
            Err(err) => {
                warn!(path = %path.display(), kind = err.kind.as_str(), error = %err.message, "Reload failed, keeping last good version");
                errors.push(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::tests::write_file;
    use std::fs;
    use tempfile::TempDir;

    fn def(id: &str, pattern: &str) -> String {
        format!(
            "metadata:\n  id: {id}\n  name: {id} insight\nfilters:\n  line_pattern: '{pattern}'\n"
        )
    }

    fn registry(dir: &TempDir) -> InsightRegistry {
        InsightRegistry::new(
            vec![dir.path().to_path_buf()],
            InsightCatalog::builtin(),
            FilterEngine::direct_only(),
        )
    }

    fn pattern_of(registry: &InsightRegistry, id: &str) -> String {
        registry
            .get(id)
            .unwrap()
            .filter
            .as_ref()
            .unwrap()
            .line_pattern
            .clone()
    }

    #[test]
    fn test_rescan_publishes() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "a.yaml", &def("alpha", "ERROR"));
        write_file(&dir, "b.yaml", &def("beta", "WARN"));

        let registry = registry(&dir);
        assert!(registry.snapshot().is_empty());
        assert!(registry.rescan().is_empty());
        assert_eq!(registry.snapshot().ids(), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_old_snapshot_stays_complete() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.yaml", &def("alpha", "ERROR"));
        let registry = registry(&dir);
        registry.rescan();

        let before = registry.snapshot();
        fs::write(&a, def("alpha", "FATAL")).unwrap();
        write_file(&dir, "b.yaml", &def("beta", "WARN"));
        registry.rescan();

        assert_eq!(before.ids(), vec!["alpha"]);
        assert_eq!(before.get("alpha").unwrap().filter.as_ref().unwrap().line_pattern, "ERROR");
        assert_eq!(registry.snapshot().ids(), vec!["alpha", "beta"]);
        assert_eq!(pattern_of(&registry, "alpha"), "FATAL");
    }

    #[test]
    fn test_reload_only_touches_affected_path() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.yaml", &def("alpha", "ERROR"));
        write_file(&dir, "b.yaml", &def("beta", "WARN"));
        let registry = registry(&dir);
        registry.rescan();
        let beta_before = registry.get("beta").unwrap();

        fs::write(&a, def("alpha", "FATAL")).unwrap();
        assert!(registry.reload_paths(&[a]).is_empty());

        assert_eq!(pattern_of(&registry, "alpha"), "FATAL");
        assert!(Arc::ptr_eq(&beta_before, &registry.get("beta").unwrap()));
        assert_eq!(registry.snapshot().ids(), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_parse_error_keeps_last_good() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.yaml", &def("alpha", "ERROR"));
        let registry = registry(&dir);
        registry.rescan();

        fs::write(&a, "metadata: [broken").unwrap();
        let errors = registry.reload_paths(&[a.clone()]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, LoadErrorKind::Parse);
        assert_eq!(pattern_of(&registry, "alpha"), "ERROR");

        // A full rescan keeps it too
        let errors = registry.rescan();
        assert_eq!(errors.len(), 1);
        assert_eq!(pattern_of(&registry, "alpha"), "ERROR");
    }

    #[test]
    fn test_deleted_file_is_withdrawn() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.yaml", &def("alpha", "ERROR"));
        write_file(&dir, "b.yaml", &def("beta", "WARN"));
        let registry = registry(&dir);
        registry.rescan();

        fs::remove_file(&a).unwrap();
        assert!(registry.reload_paths(&[a]).is_empty());
        assert_eq!(registry.snapshot().ids(), vec!["beta"]);
    }

    #[test]
    fn test_deleted_directory_withdraws_its_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("team")).unwrap();
        write_file(&dir, "team/a.yaml", &def("alpha", "ERROR"));
        write_file(&dir, "b.yaml", &def("beta", "WARN"));
        let registry = registry(&dir);
        registry.rescan();

        fs::remove_dir_all(dir.path().join("team")).unwrap();
        registry.reload_paths(&[dir.path().join("team")]);
        assert_eq!(registry.snapshot().ids(), vec!["beta"]);
    }

    #[test]
    fn test_directory_moved_in_is_loaded() {
        let outside = TempDir::new().unwrap();
        fs::create_dir_all(outside.path().join("team/nested")).unwrap();
        fs::create_dir_all(outside.path().join("team/.drafts")).unwrap();
        write_file(&outside, "team/a.yaml", &def("alpha", "ERROR"));
        write_file(&outside, "team/nested/b.yml", &def("beta", "WARN"));
        write_file(&outside, "team/.drafts/c.yaml", &def("gamma", "TODO"));

        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        registry.rescan();
        assert!(registry.snapshot().is_empty());

        let moved = dir.path().join("team");
        fs::rename(outside.path().join("team"), &moved).unwrap();
        assert!(registry.reload_paths(&[moved]).is_empty());

        let snapshot = registry.snapshot();
        let mut ids = snapshot.ids();
        ids.sort();
        assert_eq!(ids, vec!["alpha", "beta"]);
        assert_eq!(
            registry.get("alpha").unwrap().source,
            dir.path().join("team/a.yaml")
        );
    }

    #[test]
    fn test_hidden_paths_are_not_published_on_reload() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        registry.rescan();

        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::create_dir_all(dir.path().join("team/.cache")).unwrap();
        let in_git = write_file(&dir, ".git/hooks.yaml", &def("hooks", "ERROR"));
        let hidden_file = write_file(&dir, ".scratch.yaml", &def("scratch", "ERROR"));
        let hidden_dir = dir.path().join(".git");
        write_file(&dir, "team/.cache/d.yaml", &def("cached", "ERROR"));

        let errors = registry.reload_paths(&[
            in_git,
            hidden_file,
            hidden_dir,
            dir.path().join("team/.cache/d.yaml"),
            dir.path().join("team"),
        ]);
        assert!(errors.is_empty());
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_is_hidden_under() {
        let roots = vec![PathBuf::from("/srv/.config/insights")];
        assert!(!is_hidden_under(Path::new("/srv/.config/insights/a.yaml"), &roots));
        assert!(!is_hidden_under(Path::new("/srv/.config/insights/team/a.yaml"), &roots));
        assert!(is_hidden_under(Path::new("/srv/.config/insights/.git/a.yaml"), &roots));
        assert!(is_hidden_under(Path::new("/srv/.config/insights/team/.a.yaml"), &roots));
        assert!(!is_hidden_under(Path::new("/elsewhere/.git/a.yaml"), &roots));
    }

    #[test]
    fn test_duplicate_on_reload() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "a.yaml", &def("alpha", "ERROR"));
        let b = write_file(&dir, "b.yaml", &def("beta", "WARN"));
        let registry = registry(&dir);
        registry.rescan();

        fs::write(&b, def("alpha", "OTHER")).unwrap();
        let errors = registry.reload_paths(&[b.clone()]);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, LoadErrorKind::DuplicateId);
        assert_eq!(registry.snapshot().ids(), vec!["alpha"]);
        assert_eq!(pattern_of(&registry, "alpha"), "ERROR");
    }

    #[test]
    fn test_renamed_id_replaces_old_entry() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.yaml", &def("alpha", "ERROR"));
        let registry = registry(&dir);
        registry.rescan();

        fs::write(&a, def("gamma", "ERROR")).unwrap();
        registry.reload_paths(&[a.clone()]);
        assert_eq!(registry.snapshot().ids(), vec!["gamma"]);
        assert_eq!(registry.get("gamma").unwrap().source, a);
    }

    #[test]
    fn test_new_file_added_on_reload() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        registry.rescan();

        let c = write_file(&dir, "c.yml", "implementation: android_crash_analyzer\n");
        let ignored = write_file(&dir, "notes.txt", "not a definition");
        assert!(registry.reload_paths(&[c, ignored]).is_empty());
        assert_eq!(registry.snapshot().ids(), vec!["android_crash_analyzer"]);
    }

    #[test]
    fn test_concurrent_readers_see_complete_snapshots() {
        let dir = TempDir::new().unwrap();
        for i in 0..5 {
            write_file(&dir, &format!("{i}.yaml"), &def(&format!("insight{i}"), "x"));
        }
        let registry = Arc::new(registry(&dir));
        registry.rescan();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let snapshot = registry.snapshot();
                        assert_eq!(snapshot.len(), 5);
                    }
                })
            })
            .collect();

        for _ in 0..20 {
            registry.rescan();
        }
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
