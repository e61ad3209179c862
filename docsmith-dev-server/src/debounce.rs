//! Filesystem event debouncing.
//!
//! Editors emit several raw events per save; this coalesces them into one
//! event per path so a burst of saves triggers one rebuild.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use docsmith_core::ChangeKind;

/// A debounced filesystem event with its normalized change kind.
#[derive(Clone, Debug)]
pub struct FsEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

struct PendingEvent {
    kind: ChangeKind,
    deadline: Instant,
}

/// Thread-safe debouncer. `record` runs on the notify callback thread,
/// `drain_ready` on the rebuild task; the map is the shared state between
/// them, so it sits behind a mutex.
pub struct EventDebouncer {
    pending: Mutex<HashMap<PathBuf, PendingEvent>>,
    window: Duration,
}

impl EventDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            window,
        }
    }

    /// Record a raw event, pushing the path's deadline out by one window.
    pub fn record(&self, path: PathBuf, kind: ChangeKind) {
        use std::collections::hash_map::Entry;

        let mut pending = self.pending.lock().unwrap();
        let deadline = Instant::now() + self.window;

        match pending.entry(path) {
            Entry::Vacant(entry) => {
                entry.insert(PendingEvent { kind, deadline });
            }
            Entry::Occupied(mut entry) => {
                if let Some(kind) = coalesce(entry.get().kind, kind) {
                    entry.get_mut().kind = kind;
                    entry.get_mut().deadline = deadline;
                } else {
                    // Added then Removed inside one window: the file never
                    // existed as far as the build is concerned.
                    entry.remove();
                }
            }
        }
    }

    /// Take every event whose debounce window has elapsed.
    pub fn drain_ready(&self) -> Vec<FsEvent> {
        let mut pending = self.pending.lock().unwrap();
        let now = Instant::now();

        let ready: Vec<PathBuf> = pending
            .iter()
            .filter(|(_, event)| event.deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();

        let mut events: Vec<FsEvent> = ready
            .into_iter()
            .filter_map(|path| {
                let event = pending.remove(&path)?;
                Some(FsEvent {
                    path,
                    kind: event.kind,
                })
            })
            .collect();
        events.sort_by(|a, b| a.path.cmp(&b.path));
        events
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().unwrap().is_empty()
    }
}

fn coalesce(existing: ChangeKind, new: ChangeKind) -> Option<ChangeKind> {
    use ChangeKind::{Added, Changed, Removed};

    match (existing, new) {
        (Added, Removed) => None,
        (Added, _) => Some(Added),
        (Changed, Added) => Some(Added),
        (Changed, kind) => Some(kind),
        // A remove directly followed by a create is a file replacement.
        (Removed, Added) => Some(Changed),
        (Removed, _) => Some(Removed),
    }
}
