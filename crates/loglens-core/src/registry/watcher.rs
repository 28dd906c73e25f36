//! Hot reload
//!
//! A `notify` watcher forwards create/modify/remove events for definition
//! files into a tokio task. Events are coalesced per path: every event for a
//! path pushes its deadline out by the debounce window, and the path is
//! reloaded once when the deadline passes. Different paths keep independent
//! deadlines.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Result;

use super::loader::{is_definition_file, is_hidden_under, LoadError};
use super::{InsightRegistry, RegistrySnapshot};

/// Quiet period after the last event for a path before it is reloaded
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Per-path trailing debounce
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Note an event for `path` at `now`
    pub fn record(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path, now + self.window);
    }

    /// Paths whose quiet period has elapsed at `now`, sorted
    pub fn due(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &ready {
            self.pending.remove(path);
        }
        ready.sort();
        ready
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// What one debounced reload did
#[derive(Debug, Clone)]
pub struct ReloadReport {
    pub paths: Vec<PathBuf>,
    pub errors: Vec<LoadError>,
    /// The registry as published after the reload
    pub snapshot: Arc<RegistrySnapshot>,
}

/// Starts the background observer for an [`InsightRegistry`]
pub struct RegistryWatcher {
    registry: Arc<InsightRegistry>,
    debounce: Duration,
}

impl RegistryWatcher {
    pub fn new(registry: Arc<InsightRegistry>) -> Self {
        Self {
            registry,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Override the debounce window
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Watch the registry's directories and reload on change
    ///
    /// Must be called from within a tokio runtime. `on_change` runs after
    /// every debounced reload. The watcher stops when the returned handle is
    /// stopped or dropped.
    pub fn start<F>(self, on_change: F) -> Result<WatchHandle>
    where
        F: Fn(ReloadReport) + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<Vec<PathBuf>>();
        let forward = self.registry.clone();

        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    let paths =
                        relevant_paths(&event, &forward.snapshot(), forward.directories());
                    if !paths.is_empty() {
                        let _ = tx.send(paths);
                    }
                }
                Err(e) => warn!(error = %e, "Insight watcher error"),
            },
            notify::Config::default(),
        )?;

        for dir in self.registry.directories() {
            if !dir.is_dir() {
                warn!(dir = %dir.display(), "Insight directory not found, not watching");
                continue;
            }
            watcher.watch(dir, RecursiveMode::Recursive)?;
            info!(dir = %dir.display(), "Watching for insight changes");
        }

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run(
            watcher,
            rx,
            self.registry,
            self.debounce,
            shutdown.clone(),
            on_change,
        ));

        Ok(WatchHandle {
            shutdown,
            task: Some(task),
        })
    }
}

/// Definition files and directories touched by an event
///
/// Removing a directory reports the directory itself, so the sources
/// published from under it are included as well. A directory that appears
/// is passed through whole; the registry walks it on reload.
fn relevant_paths(event: &Event, snapshot: &RegistrySnapshot, roots: &[PathBuf]) -> Vec<PathBuf> {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return Vec::new();
    }

    let mut paths = Vec::new();
    for path in &event.paths {
        if is_hidden_under(path, roots) {
            continue;
        }
        if is_definition_file(path) || is_watched_dir(path, roots) {
            paths.push(path.clone());
        } else if !path.exists() {
            paths.extend(snapshot.sources_under(path));
        }
    }
    paths
}

/// An existing directory strictly below a watched root
fn is_watched_dir(path: &Path, roots: &[PathBuf]) -> bool {
    path.is_dir() && roots.iter().any(|root| path != root && path.starts_with(root))
}

async fn run<F>(
    watcher: RecommendedWatcher,
    mut rx: mpsc::UnboundedReceiver<Vec<PathBuf>>,
    registry: Arc<InsightRegistry>,
    window: Duration,
    shutdown: CancellationToken,
    on_change: F,
) where
    F: Fn(ReloadReport) + Send + Sync + 'static,
{
    // Dropping the notify watcher stops event delivery
    let _watcher = watcher;
    let mut debouncer = Debouncer::new(window);

    loop {
        let deadline = debouncer.next_deadline();
        tokio::select! {
            _ = shutdown.cancelled() => break,
            maybe = rx.recv() => {
                let Some(paths) = maybe else { break; };
                let now = Instant::now();
                for path in paths {
                    debug!(path = %path.display(), "Insight change queued");
                    debouncer.record(path, now);
                }
            }
            _ = sleep_until(deadline), if deadline.is_some() => {
                let due = debouncer.due(Instant::now());
                if due.is_empty() {
                    continue;
                }

                let worker = registry.clone();
                let batch = due.clone();
                let errors = match tokio::task::spawn_blocking(move || worker.reload_paths(&batch)).await {
                    Ok(errors) => errors,
                    Err(e) => {
                        error!(error = %e, "Insight reload task failed");
                        continue;
                    }
                };

                info!(paths = due.len(), errors = errors.len(), "Insights reloaded");
                on_change(ReloadReport {
                    paths: due,
                    errors,
                    snapshot: registry.snapshot(),
                });
            }
        }
    }

    debug!("Insight watcher stopped");
}

async fn sleep_until(deadline: Option<Instant>) {
    if let Some(deadline) = deadline {
        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
    }
}

/// Running watcher; stopping or dropping it tears the observer down
pub struct WatchHandle {
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Stop watching and wait for the background task to finish
    pub async fn stop(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
