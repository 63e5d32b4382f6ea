//! File system watcher for incremental updates.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use ontograph_core::{UpdateOp, UpdateQueue};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::error::ServerResult;
use crate::loader::RecordLoader;

/// How often pending events are checked against the debounce interval.
const TICK: Duration = Duration::from_millis(50);

/// Kind of change seen for a path, after merging bursts of events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Change {
    Written,
    Removed,
}

impl Change {
    fn from_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) | EventKind::Modify(_) => Some(Change::Written),
            EventKind::Remove(_) => Some(Change::Removed),
            _ => None,
        }
    }
}

/// Per-path events waiting for their quiet period to elapse.
#[derive(Debug)]
pub struct PendingChanges {
    debounce: Duration,
    pending: HashMap<PathBuf, (Change, Instant)>,
}

impl PendingChanges {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            pending: HashMap::new(),
        }
    }

    /// Record a change; a later change to the same path replaces the earlier
    /// one and restarts its quiet period.
    pub fn record(&mut self, path: PathBuf, change: Change, at: Instant) {
        self.pending.insert(path, (change, at));
    }

    /// Take every change whose quiet period has elapsed by `now`, in path order.
    pub fn take_ready(&mut self, now: Instant) -> Vec<(PathBuf, Change)> {
        let debounce = self.debounce;
        let mut ready = Vec::new();
        self.pending.retain(|path, (change, at)| {
            if now.duration_since(*at) >= debounce {
                ready.push((path.clone(), *change));
                false
            } else {
                true
            }
        });
        ready.sort();
        ready
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Turn settled changes into one update batch.
///
/// A written path that no longer exists (renamed away, or deleted right
/// after the write) is treated as removed. Files that fail to parse keep
/// their previous concepts.
pub async fn build_batch(loader: &RecordLoader, changes: Vec<(PathBuf, Change)>) -> Vec<UpdateOp> {
    let mut ops = Vec::new();
    for (path, change) in changes {
        if !loader.is_record_file(&path) {
            continue;
        }
        if change == Change::Written && path.is_file() {
            match loader.load_file(&path).await {
                Ok(file_ops) => {
                    tracing::debug!("Reloaded {}", path.display());
                    ops.extend(file_ops);
                }
                Err(e) => tracing::warn!("Error processing {}: {}", path.display(), e),
            }
        } else {
            let removed = loader.remove_file(&path);
            if !removed.is_empty() {
                tracing::debug!("Removed records of {}", path.display());
            }
            ops.extend(removed);
        }
    }
    ops
}

/// File system watcher that feeds record changes into the update queue.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create a new file watcher with debouncing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        loader: Arc<RecordLoader>,
        queue: UpdateQueue,
        debounce: Duration,
    ) -> ServerResult<Self> {
        let (tx, mut rx) = mpsc::channel::<Event>(100);

        let watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                // Called from notify's own thread
                Ok(event) => {
                    let _ = tx.blocking_send(event);
                }
                Err(e) => tracing::warn!("Watch error: {}", e),
            },
            Config::default(),
        )?;

        tokio::spawn(async move {
            let mut pending = PendingChanges::new(debounce);

            loop {
                tokio::select! {
                    event = rx.recv() => {
                        match event {
                            Some(event) => {
                                if let Some(change) = Change::from_kind(&event.kind) {
                                    let now = Instant::now();
                                    for path in event.paths {
                                        pending.record(path, change, now);
                                    }
                                }
                            }
                            None => break,
                        }
                    }
                    _ = tokio::time::sleep(TICK) => {
                        let ready = pending.take_ready(Instant::now());
                        if ready.is_empty() {
                            continue;
                        }

                        let ops = build_batch(&loader, ready).await;
                        if ops.is_empty() {
                            continue;
                        }

                        match queue.submit(ops).await {
                            Ok(report) => tracing::info!(
                                "Applied file changes: v{} ({} upserted, {} removed, {} failed)",
                                report.version,
                                report.upserted,
                                report.removed,
                                report.failures.len()
                            ),
                            Err(e) => {
                                tracing::error!("Stopping watcher: {}", e);
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(Self { _watcher: watcher })
    }

    /// Start watching a directory.
    pub fn watch(&mut self, path: &Path) -> ServerResult<()> {
        self._watcher.watch(path, RecursiveMode::Recursive)?;
        Ok(())
    }

    /// Stop watching a directory.
    pub fn unwatch(&mut self, path: &Path) -> ServerResult<()> {
        self._watcher.unwatch(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use std::fs;
    use tempfile::TempDir;

    // ==========================================
    // Debouncing
    // ==========================================

    #[test]
    fn test_change_from_event_kind() {
        assert_eq!(
            Change::from_kind(&EventKind::Create(CreateKind::File)),
            Some(Change::Written)
        );
        assert_eq!(
            Change::from_kind(&EventKind::Modify(ModifyKind::Any)),
            Some(Change::Written)
        );
        assert_eq!(
            Change::from_kind(&EventKind::Remove(RemoveKind::File)),
            Some(Change::Removed)
        );
        assert_eq!(Change::from_kind(&EventKind::Any), None);
    }

    #[test]
    fn test_pending_waits_for_quiet_period() {
        let start = Instant::now();
        let mut pending = PendingChanges::new(Duration::from_millis(300));
        pending.record(PathBuf::from("a.json"), Change::Written, start);

        assert!(pending.take_ready(start + Duration::from_millis(100)).is_empty());
        assert_eq!(pending.len(), 1);

        let ready = pending.take_ready(start + Duration::from_millis(300));
        assert_eq!(ready, vec![(PathBuf::from("a.json"), Change::Written)]);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_pending_burst_collapses_to_last_change() {
        let start = Instant::now();
        let mut pending = PendingChanges::new(Duration::from_millis(300));
        pending.record(PathBuf::from("a.json"), Change::Written, start);
        pending.record(
            PathBuf::from("a.json"),
            Change::Removed,
            start + Duration::from_millis(200),
        );

        // Quiet period restarted by the second event
        assert!(pending.take_ready(start + Duration::from_millis(400)).is_empty());
        let ready = pending.take_ready(start + Duration::from_millis(500));
        assert_eq!(ready, vec![(PathBuf::from("a.json"), Change::Removed)]);
    }

    // ==========================================
    // Batch Building
    // ==========================================

    #[tokio::test]
    async fn test_build_batch_write_then_remove() {
        let dir = TempDir::new().unwrap();
        let loader = RecordLoader::new(&Settings::for_records(dir.path())).unwrap();
        let path = loader.root().join("a.json");
        fs::write(&path, r#"{"id": "a", "pref_label": "A"}"#).unwrap();

        let ops = build_batch(&loader, vec![(path.clone(), Change::Written)]).await;
        assert_eq!(ops.len(), 1);
        assert!(matches!(ops[0], UpdateOp::Upsert { .. }));

        fs::remove_file(&path).unwrap();
        let ops = build_batch(&loader, vec![(path, Change::Removed)]).await;
        assert_eq!(ops, vec![UpdateOp::remove("a")]);
    }

    #[tokio::test]
    async fn test_build_batch_missing_written_file_is_removal() {
        let dir = TempDir::new().unwrap();
        let loader = RecordLoader::new(&Settings::for_records(dir.path())).unwrap();
        let path = loader.root().join("a.json");
        fs::write(&path, r#"{"id": "a", "pref_label": "A"}"#).unwrap();
        build_batch(&loader, vec![(path.clone(), Change::Written)]).await;

        fs::remove_file(&path).unwrap();
        let ops = build_batch(&loader, vec![(path, Change::Written)]).await;
        assert_eq!(ops, vec![UpdateOp::remove("a")]);
    }

    #[tokio::test]
    async fn test_build_batch_ignores_other_files() {
        let dir = TempDir::new().unwrap();
        let loader = RecordLoader::new(&Settings::for_records(dir.path())).unwrap();
        let path = loader.root().join("notes.md");
        fs::write(&path, "# Notes").unwrap();

        let ops = build_batch(&loader, vec![(path, Change::Written)]).await;
        assert!(ops.is_empty());
    }

    #[tokio::test]
    async fn test_build_batch_keeps_records_of_broken_file() {
        let dir = TempDir::new().unwrap();
        let loader = RecordLoader::new(&Settings::for_records(dir.path())).unwrap();
        let path = loader.root().join("a.json");
        fs::write(&path, r#"{"id": "a", "pref_label": "A"}"#).unwrap();
        build_batch(&loader, vec![(path.clone(), Change::Written)]).await;

        fs::write(&path, "{ half written").unwrap();
        let ops = build_batch(&loader, vec![(path.clone(), Change::Written)]).await;
        assert!(ops.is_empty());
        assert_eq!(loader.ids_for(&path), vec!["a".to_string()]);
    }

    // ==========================================
    // Watch Registration
    // ==========================================

    #[tokio::test]
    async fn test_watch_then_unwatch_root() {
        use ontograph_core::UpdateCoordinator;

        let dir = TempDir::new().unwrap();
        let loader = Arc::new(RecordLoader::new(&Settings::for_records(dir.path())).unwrap());
        let (queue, _worker) = UpdateQueue::spawn(Arc::new(UpdateCoordinator::new()), 4);
        let mut watcher =
            FileWatcher::new(Arc::clone(&loader), queue, Duration::from_millis(50)).unwrap();

        watcher.watch(loader.root()).unwrap();
        assert!(watcher.unwatch(loader.root()).is_ok());
    }
}
