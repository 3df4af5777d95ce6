//! Polling directory watcher.
//!
//! Detects external file changes without OS-level file-event APIs: each
//! watcher lists its directory on a fixed interval and diffs the listing
//! against the previous scan's modification times.
//!
//! # Diff contract
//!
//! - a path seen for the first time emits [`WatchEvent::Added`]
//! - a path whose mtime strictly increased emits [`WatchEvent::Changed`]
//! - a previously recorded path missing from the listing emits
//!   [`WatchEvent::Removed`]
//!
//! After each scan the recorded map is replaced wholesale by the new
//! listing, so "last observed" always reflects the most recent scan.
//!
//! # Lifecycle
//!
//! Watchers live in a [`WatchRegistry`] owned by the server (not a process
//! global), keyed by directory. Starting a watch performs an immediate
//! initial scan; stopping it prevents further scans but does not claw back
//! events already dispatched. A failed directory listing emits
//! [`WatchEvent::ScanFailed`] and the next tick retries independently.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};
use tokio::sync::{mpsc, watch};

use anyhow::{Result, bail};
use serde::Serialize;

/// Map of file path to the mtime observed at the last scan.
type Listing = FxHashMap<PathBuf, SystemTime>;

// ============================================================================
// Events
// ============================================================================

/// A change detected by a directory scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Added(PathBuf),
    Changed(PathBuf),
    Removed(PathBuf),
    ScanFailed { dir: PathBuf, error: String },
}

/// Snapshot of one active watcher, for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct WatcherStatus {
    pub directory: PathBuf,
    #[serde(rename = "intervalSecs")]
    pub interval_secs: u64,
    #[serde(rename = "lastCheck")]
    pub last_check: Option<DateTime<Utc>>,
}

// ============================================================================
// Scanning
// ============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// List the directory's regular files with their mtimes.
///
/// Subdirectories and editor temp files are skipped; the scan is flat, not
/// recursive.
async fn list_dir(dir: &Path) -> std::io::Result<Listing> {
    let mut listing = Listing::default();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if is_temp_file(&path) {
            continue;
        }
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        if let Ok(modified) = metadata.modified() {
            listing.insert(path, modified);
        }
    }

    Ok(listing)
}

/// Diff two scans into events: adds and changes from the new listing,
/// removals from recorded paths the new listing no longer has.
fn diff_listing(previous: &Listing, current: &Listing) -> Vec<WatchEvent> {
    let mut events = Vec::new();

    for (path, modified) in current {
        match previous.get(path) {
            None => events.push(WatchEvent::Added(path.clone())),
            Some(last) if modified > last => events.push(WatchEvent::Changed(path.clone())),
            Some(_) => {}
        }
    }

    for path in previous.keys() {
        if !current.contains_key(path) {
            events.push(WatchEvent::Removed(path.clone()));
        }
    }

    events
}

// ============================================================================
// Poll Loop
// ============================================================================

struct PollWatcher {
    dir: PathBuf,
    seen: Listing,
    events: mpsc::Sender<WatchEvent>,
    last_check: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl PollWatcher {
    fn new(
        dir: PathBuf,
        events: mpsc::Sender<WatchEvent>,
        last_check: Arc<RwLock<Option<DateTime<Utc>>>>,
    ) -> Self {
        Self {
            dir,
            seen: Listing::default(),
            events,
            last_check,
        }
    }

    /// One scan: list, diff against the recorded map, dispatch, replace.
    async fn scan_once(&mut self) {
        *self.last_check.write() = Some(Utc::now());

        match list_dir(&self.dir).await {
            Ok(current) => {
                for event in diff_listing(&self.seen, &current) {
                    if self.events.send(event).await.is_err() {
                        return;
                    }
                }
                self.seen = current;
            }
            Err(err) => {
                let _ = self
                    .events
                    .send(WatchEvent::ScanFailed {
                        dir: self.dir.clone(),
                        error: err.to_string(),
                    })
                    .await;
            }
        }
    }

    /// Scan on every tick until stopped. The first tick fires immediately,
    /// giving the initial scan.
    async fn run(mut self, interval: Duration, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.scan_once().await;
                    if self.events.is_closed() {
                        break;
                    }
                }
                _ = stop.changed() => break,
            }
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

struct WatchHandle {
    interval: Duration,
    last_check: Arc<RwLock<Option<DateTime<Utc>>>>,
    stop: watch::Sender<bool>,
}

/// Owned registry of active watchers, keyed by directory.
///
/// All watchers feed one event channel; the consumer decides what the
/// events mean. Dropping the registry (or calling [`Self::stop_all`]) ends
/// every poll loop.
pub struct WatchRegistry {
    events: mpsc::Sender<WatchEvent>,
    watchers: RwLock<FxHashMap<PathBuf, WatchHandle>>,
}

impl WatchRegistry {
    pub fn new(events: mpsc::Sender<WatchEvent>) -> Self {
        Self {
            events,
            watchers: RwLock::new(FxHashMap::default()),
        }
    }

    /// Start watching a directory. Errors if the path is not a directory or
    /// is already being watched.
    pub fn start(&self, dir: PathBuf, interval: Duration) -> Result<()> {
        if !dir.is_dir() {
            bail!("not a directory: {}", dir.display());
        }

        let mut watchers = self.watchers.write();
        if watchers.contains_key(&dir) {
            bail!("already watching {}", dir.display());
        }

        let last_check = Arc::new(RwLock::new(None));
        let (stop_tx, stop_rx) = watch::channel(false);
        let poller = PollWatcher::new(dir.clone(), self.events.clone(), Arc::clone(&last_check));
        tokio::spawn(poller.run(interval, stop_rx));

        watchers.insert(
            dir,
            WatchHandle {
                interval,
                last_check,
                stop: stop_tx,
            },
        );
        Ok(())
    }

    /// Stop watching a directory. Returns false when it was not watched.
    ///
    /// Prevents further scheduled scans; events already dispatched from an
    /// in-flight scan still reach the consumer.
    pub fn stop(&self, dir: &Path) -> bool {
        match self.watchers.write().remove(dir) {
            Some(handle) => {
                let _ = handle.stop.send(true);
                true
            }
            None => false,
        }
    }

    /// Stop every watcher.
    pub fn stop_all(&self) {
        for (_, handle) in self.watchers.write().drain() {
            let _ = handle.stop.send(true);
        }
    }

    /// Snapshot of all active watchers.
    pub fn status(&self) -> Vec<WatcherStatus> {
        let mut statuses: Vec<WatcherStatus> = self
            .watchers
            .read()
            .iter()
            .map(|(dir, handle)| WatcherStatus {
                directory: dir.clone(),
                interval_secs: handle.interval.as_secs(),
                last_check: *handle.last_check.read(),
            })
            .collect();
        statuses.sort_by(|a, b| a.directory.cmp(&b.directory));
        statuses
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::TempDir;
    use tokio::time::timeout;

    fn collector() -> (mpsc::Sender<WatchEvent>, mpsc::Receiver<WatchEvent>) {
        mpsc::channel(64)
    }

    fn watcher_for(dir: &Path, tx: mpsc::Sender<WatchEvent>) -> PollWatcher {
        PollWatcher::new(dir.to_path_buf(), tx, Arc::new(RwLock::new(None)))
    }

    async fn drain(rx: &mut mpsc::Receiver<WatchEvent>) -> Vec<WatchEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn bump_mtime(path: &Path) {
        let later = SystemTime::now() + Duration::from_secs(5);
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(later)
            .unwrap();
    }

    #[test]
    fn test_is_temp_file() {
        assert!(is_temp_file(Path::new("/d/.hidden")));
        assert!(is_temp_file(Path::new("/d/draft.md~")));
        assert!(is_temp_file(Path::new("/d/draft.swp")));
        assert!(is_temp_file(Path::new("/d/draft.bak")));
        assert!(!is_temp_file(Path::new("/d/draft.md")));
    }

    #[test]
    fn test_diff_listing_add_change_remove() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let t1 = SystemTime::UNIX_EPOCH + Duration::from_secs(200);

        let mut previous = Listing::default();
        previous.insert(PathBuf::from("a.md"), t0);
        previous.insert(PathBuf::from("b.md"), t0);

        let mut current = Listing::default();
        current.insert(PathBuf::from("a.md"), t1); // touched
        current.insert(PathBuf::from("c.md"), t1); // new
        // b.md gone

        let events = diff_listing(&previous, &current);
        assert_eq!(events.len(), 3);
        assert!(events.contains(&WatchEvent::Changed(PathBuf::from("a.md"))));
        assert!(events.contains(&WatchEvent::Added(PathBuf::from("c.md"))));
        assert!(events.contains(&WatchEvent::Removed(PathBuf::from("b.md"))));
    }

    #[test]
    fn test_diff_listing_unchanged_mtime_is_silent() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);

        let mut previous = Listing::default();
        previous.insert(PathBuf::from("a.md"), t0);
        let current = previous.clone();

        assert!(diff_listing(&previous, &current).is_empty());
    }

    #[tokio::test]
    async fn test_scan_emits_adds_then_nothing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.md"), "A").unwrap();
        fs::write(dir.path().join("b.md"), "B").unwrap();

        let (tx, mut rx) = collector();
        let mut watcher = watcher_for(dir.path(), tx);

        // Initial scan: one add per file, order unspecified
        watcher.scan_once().await;
        let events = drain(&mut rx).await;
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(e, WatchEvent::Added(_))));

        // Steady state: nothing new
        watcher.scan_once().await;
        assert!(drain(&mut rx).await.is_empty());
    }

    #[tokio::test]
    async fn test_scan_emits_change_only_for_touched_file() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.md");
        fs::write(&a, "A").unwrap();
        fs::write(dir.path().join("b.md"), "B").unwrap();

        let (tx, mut rx) = collector();
        let mut watcher = watcher_for(dir.path(), tx);
        watcher.scan_once().await;
        drain(&mut rx).await;

        bump_mtime(&a);
        watcher.scan_once().await;
        let events = drain(&mut rx).await;
        assert_eq!(events, vec![WatchEvent::Changed(a)]);
    }

    #[tokio::test]
    async fn test_scan_emits_unlink_and_forgets_path() {
        let dir = TempDir::new().unwrap();
        let b = dir.path().join("b.md");
        fs::write(dir.path().join("a.md"), "A").unwrap();
        fs::write(&b, "B").unwrap();

        let (tx, mut rx) = collector();
        let mut watcher = watcher_for(dir.path(), tx);
        watcher.scan_once().await;
        drain(&mut rx).await;

        fs::remove_file(&b).unwrap();
        watcher.scan_once().await;
        let events = drain(&mut rx).await;
        assert_eq!(events, vec![WatchEvent::Removed(b)]);

        // The forgotten path does not fire again
        watcher.scan_once().await;
        assert!(drain(&mut rx).await.is_empty());
    }

    #[tokio::test]
    async fn test_scan_skips_subdirs_and_temp_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("real.md"), "ok").unwrap();
        fs::write(dir.path().join(".hidden"), "no").unwrap();
        fs::write(dir.path().join("swap.swp"), "no").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let (tx, mut rx) = collector();
        let mut watcher = watcher_for(dir.path(), tx);
        watcher.scan_once().await;

        let events = drain(&mut rx).await;
        assert_eq!(events, vec![WatchEvent::Added(dir.path().join("real.md"))]);
    }

    #[tokio::test]
    async fn test_scan_failure_emits_error_and_recovers() {
        let dir = TempDir::new().unwrap();
        let watched = dir.path().join("sub");
        fs::create_dir(&watched).unwrap();

        let (tx, mut rx) = collector();
        let mut watcher = watcher_for(&watched, tx);
        watcher.scan_once().await;
        drain(&mut rx).await;

        // Directory vanishes: error event, loop survives
        fs::remove_dir(&watched).unwrap();
        watcher.scan_once().await;
        let events = drain(&mut rx).await;
        assert!(matches!(events.as_slice(), [WatchEvent::ScanFailed { .. }]));

        // Directory comes back with a file: next scan works again
        fs::create_dir(&watched).unwrap();
        fs::write(watched.join("back.md"), "hi").unwrap();
        watcher.scan_once().await;
        let events = drain(&mut rx).await;
        assert_eq!(events, vec![WatchEvent::Added(watched.join("back.md"))]);
    }

    #[tokio::test]
    async fn test_registry_lifecycle() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("seed.md"), "hi").unwrap();

        let (tx, mut rx) = collector();
        let registry = WatchRegistry::new(tx);

        registry
            .start(dir.path().to_path_buf(), Duration::from_millis(25))
            .unwrap();

        // Starting twice is an error
        assert!(
            registry
                .start(dir.path().to_path_buf(), Duration::from_millis(25))
                .is_err()
        );

        // Initial scan reaches the channel
        let event = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("initial scan timed out")
            .unwrap();
        assert_eq!(event, WatchEvent::Added(dir.path().join("seed.md")));

        let status = registry.status();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].directory, dir.path());
        assert!(status[0].last_check.is_some());

        assert!(registry.stop(dir.path()));
        assert!(!registry.stop(dir.path()));
        assert!(registry.status().is_empty());
    }

    #[tokio::test]
    async fn test_registry_rejects_missing_directory() {
        let (tx, _rx) = collector();
        let registry = WatchRegistry::new(tx);
        assert!(
            registry
                .start(PathBuf::from("/no/such/dir"), Duration::from_secs(1))
                .is_err()
        );
    }
}
