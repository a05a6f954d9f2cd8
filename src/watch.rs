//! Component I — change-notification bus.
//!
//! A recursive filesystem watcher over configured roots (`artefacts`,
//! `memory`, `runs`), bridging `notify`'s sync callback into an async
//! channel exactly as the teacher pack's TUI watcher does. Raw events are
//! coalesced by a single timer per subscription key (the changed path) —
//! not a per-event sleep — before ordered subscriber fan-out: cache
//! invalidators first, then a WebSocket-fan-out stand-in, then post-hooks.

use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc as sync_mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc as async_mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// The default debounce window per changed path.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

fn convert_event(event: &Event) -> Option<ChangeEvent> {
    let path = event.paths.first()?.clone();
    let kind = match &event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Removed,
        EventKind::Access(_) | EventKind::Other | EventKind::Any => return None,
    };
    Some(ChangeEvent { path, kind })
}

/// Translate a simple glob (`*` = any run of characters, no `?`/`[]`) into an
/// anchored regex. Used for per-subscription pattern filtering (e.g. `*.md`).
fn glob_to_regex(pattern: &str) -> Regex {
    let mut out = String::from("^");
    for part in pattern.split('*') {
        out.push_str(&regex::escape(part));
        out.push_str(".*");
    }
    // split('*') on "a*b" yields ["a","b"]; trailing ".*" after the final
    // literal is harmless noise, so trim it back off.
    out.truncate(out.len() - 2);
    out.push('$');
    Regex::new(&out).unwrap_or_else(|_| Regex::new("$^").expect("empty-match regex is always valid"))
}

struct Subscription {
    name: String,
    pattern: Option<Regex>,
    handler: Arc<dyn Fn(&ChangeEvent) + Send + Sync>,
}

impl Subscription {
    fn matches(&self, event: &ChangeEvent) -> bool {
        match &self.pattern {
            None => true,
            Some(re) => event
                .path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| re.is_match(name)),
        }
    }
}

/// Accumulates ordered subscriptions before the watcher starts. Registration
/// order is fan-out order: cache invalidators, then external fan-out, then
/// post-hooks.
#[derive(Default)]
pub struct WatchBusBuilder {
    subscriptions: Vec<Subscription>,
}

impl WatchBusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `pattern` is an optional glob matched against the file name only
    /// (e.g. `Some("*.md")`); `None` matches every event.
    pub fn subscribe(
        mut self,
        name: impl Into<String>,
        pattern: Option<&str>,
        handler: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Self {
        self.subscriptions.push(Subscription {
            name: name.into(),
            pattern: pattern.map(glob_to_regex),
            handler: Arc::new(handler),
        });
        self
    }

    pub fn start(self, roots: &[PathBuf], debounce: Duration) -> notify::Result<WatchBus> {
        let (raw_tx, raw_rx) = async_mpsc::channel::<ChangeEvent>(256);
        let (sync_tx, sync_rx) = sync_mpsc::channel::<Event>();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                if let Ok(event) = result {
                    let _ = sync_tx.send(event);
                }
            },
            NotifyConfig::default().with_poll_interval(Duration::from_millis(500)),
        )?;

        for root in roots {
            if root.exists() {
                watcher.watch(root, RecursiveMode::Recursive)?;
            }
        }

        let bridge_tx = raw_tx.clone();
        let bridge = tokio::spawn(async move {
            loop {
                match sync_rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(event) => {
                        if let Some(change) = convert_event(&event) {
                            if bridge_tx.send(change).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(sync_mpsc::RecvTimeoutError::Timeout) => {
                        if bridge_tx.is_closed() {
                            break;
                        }
                    }
                    Err(sync_mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
        });
        drop(raw_tx);

        let subscriptions = self.subscriptions;
        let debounce_task = tokio::spawn(Self::run_debounce(raw_rx, subscriptions, debounce));

        Ok(WatchBus { _watcher: watcher, bridge, debounce_task })
    }

    /// One coalescing timer per changed path: a later event for the same
    /// path within the debounce window replaces the pending one rather than
    /// scheduling a second flush.
    async fn run_debounce(
        mut raw_rx: async_mpsc::Receiver<ChangeEvent>,
        subscriptions: Vec<Subscription>,
        debounce: Duration,
    ) {
        let mut pending: HashMap<PathBuf, (ChangeEvent, Instant)> = HashMap::new();

        loop {
            let next_deadline = pending.values().map(|(_, deadline)| *deadline).min();
            let sleep = match next_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline),
                None => tokio::time::sleep(Duration::from_secs(3600)),
            };
            tokio::pin!(sleep);

            tokio::select! {
                received = raw_rx.recv() => {
                    match received {
                        Some(event) => {
                            let deadline = Instant::now() + debounce;
                            pending.insert(event.path.clone(), (event, deadline));
                        }
                        None => {
                            Self::flush_all(&mut pending, &subscriptions);
                            break;
                        }
                    }
                }
                _ = &mut sleep, if next_deadline.is_some() => {
                    Self::flush_due(&mut pending, &subscriptions);
                }
            }
        }
    }

    fn flush_due(pending: &mut HashMap<PathBuf, (ChangeEvent, Instant)>, subscriptions: &[Subscription]) {
        let now = Instant::now();
        let due: Vec<PathBuf> = pending
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        for path in due {
            if let Some((event, _)) = pending.remove(&path) {
                Self::dispatch(&event, subscriptions);
            }
        }
    }

    fn flush_all(pending: &mut HashMap<PathBuf, (ChangeEvent, Instant)>, subscriptions: &[Subscription]) {
        for (_, (event, _)) in pending.drain() {
            Self::dispatch(&event, subscriptions);
        }
    }

    fn dispatch(event: &ChangeEvent, subscriptions: &[Subscription]) {
        for sub in subscriptions {
            if sub.matches(event) {
                tracing::debug!(subscriber = %sub.name, path = %event.path.display(), "change-bus dispatch");
                (sub.handler)(event);
            }
        }
    }
}

/// A running watcher. Dropping it stops the watch (the `notify::Watcher` is
/// unwatched on drop) but leaves the background tasks to drain; call
/// [`WatchBus::stop`] for a deterministic shutdown.
pub struct WatchBus {
    _watcher: RecommendedWatcher,
    bridge: JoinHandle<()>,
    debounce_task: JoinHandle<()>,
}

impl WatchBus {
    pub fn stop(self) {
        self.bridge.abort();
        self.debounce_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[test]
    fn glob_to_regex_matches_suffix_patterns() {
        let re = glob_to_regex("*.md");
        assert!(re.is_match("E001.md"));
        assert!(!re.is_match("E001.log"));
    }

    #[test]
    fn glob_to_regex_matches_exact_names() {
        let re = glob_to_regex("state.json");
        assert!(re.is_match("state.json"));
        assert!(!re.is_match("other-state.json"));
    }

    #[tokio::test]
    async fn watch_bus_dispatches_in_registration_order_and_filters_by_pattern() {
        let dir = tempdir().unwrap();
        let order: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let md_hits = Arc::new(AtomicUsize::new(0));

        let order_a = order.clone();
        let order_b = order.clone();
        let md_hits_clone = md_hits.clone();
        let bus = WatchBusBuilder::new()
            .subscribe("cache-invalidator", None, move |_e| {
                order_a.lock().unwrap().push("cache-invalidator".to_string());
            })
            .subscribe("post-hook", Some("*.md"), move |_e| {
                order_b.lock().unwrap().push("post-hook".to_string());
                md_hits_clone.fetch_add(1, Ordering::SeqCst);
            })
            .start(&[dir.path().to_path_buf()], Duration::from_millis(50))
            .unwrap();

        std::fs::write(dir.path().join("E001.md"), "hello").unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(md_hits.load(Ordering::SeqCst), 1);
        let seen = order.lock().unwrap().clone();
        assert_eq!(seen, vec!["cache-invalidator".to_string(), "post-hook".to_string()]);

        bus.stop();
    }

    #[tokio::test]
    async fn rapid_writes_to_the_same_path_coalesce_into_one_dispatch() {
        let dir = tempdir().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();

        let bus = WatchBusBuilder::new()
            .subscribe("counter", None, move |_e| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            })
            .start(&[dir.path().to_path_buf()], Duration::from_millis(300))
            .unwrap();

        let path = dir.path().join("T001.log");
        for i in 0..5 {
            std::fs::write(&path, format!("line {i}")).unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(800)).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        bus.stop();
    }
}
