use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::draft::DraftSnapshot;

/// Quiet period used when the caller does not configure one.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    #[default]
    Unsaved,
    Saving,
    Saved,
    Error,
}

impl SaveStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unsaved => "Unsaved changes",
            Self::Saving => "Saving...",
            Self::Saved => "All changes saved",
            Self::Error => "Save failed",
        }
    }
}

/// Save progress reported to the status indicator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AutoSaveState {
    pub status: SaveStatus,
    pub last_saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
    #[error("draft storage unavailable: {0}")]
    Unavailable(String),
    #[error("draft rejected by storage: {0}")]
    Rejected(String),
}

/// The single I/O boundary of the wizard: stores a draft snapshot somewhere durable.
#[async_trait]
pub trait DraftPersistence: Send + Sync {
    async fn persist(&self, snapshot: DraftSnapshot) -> Result<(), PersistenceError>;
}

#[derive(Default)]
struct Inner {
    /// Bumped by `cancel`; completions from an older generation are dropped.
    generation: u64,
    /// Bumped by every recorded change.
    ticket: u64,
    /// Ticket of the most recent save that started.
    fired: u64,
    latest: Option<DraftSnapshot>,
    pending: Option<(u64, JoinHandle<()>)>,
}

struct Shared {
    inner: Mutex<Inner>,
    state: watch::Sender<AutoSaveState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: SaveStatus) {
        self.state.send_if_modified(|state| {
            let changed = state.status != status;
            state.status = status;
            changed
        });
    }
}

/// Debounces draft changes into persistence calls.
///
/// Each [`notify_change`](Self::notify_change) restarts the quiet period; only
/// the snapshot recorded last before the period elapses is persisted. A failed
/// save is not retried on its own: the next change starts a fresh cycle.
/// Dropping the controller cancels any pending timer.
///
/// Timers are tokio tasks. A change recorded outside a runtime is kept as the
/// latest snapshot but arms no timer, so it waits for the next change or for
/// [`save_now`](Self::save_now).
pub struct AutoSaveController {
    persistence: Arc<dyn DraftPersistence>,
    quiet_period: Duration,
    shared: Arc<Shared>,
}

impl AutoSaveController {
    pub fn new(persistence: Arc<dyn DraftPersistence>, quiet_period: Duration) -> Self {
        let (state, _) = watch::channel(AutoSaveState::default());
        Self {
            persistence,
            quiet_period,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                state,
            }),
        }
    }

    pub fn with_default_quiet_period(persistence: Arc<dyn DraftPersistence>) -> Self {
        Self::new(persistence, DEFAULT_QUIET_PERIOD)
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    pub fn state(&self) -> AutoSaveState {
        self.shared.state.borrow().clone()
    }

    /// Receives every status transition from now on.
    pub fn subscribe(&self) -> watch::Receiver<AutoSaveState> {
        self.shared.state.subscribe()
    }

    /// Whether a debounce timer is armed and has not fired yet.
    pub fn is_pending(&self) -> bool {
        self.shared.lock().pending.is_some()
    }

    /// Records `snapshot` as the latest draft and restarts the quiet period.
    pub fn notify_change(&self, snapshot: DraftSnapshot) {
        let mut inner = self.shared.lock();
        inner.ticket += 1;
        let ticket = inner.ticket;
        let generation = inner.generation;
        let revision = snapshot.revision;
        inner.latest = Some(snapshot);

        if let Some((_, timer)) = inner.pending.take() {
            timer.abort();
        }

        self.shared.state.send_if_modified(|state| {
            if state.status == SaveStatus::Saved {
                state.status = SaveStatus::Unsaved;
                true
            } else {
                false
            }
        });

        let Ok(runtime) = Handle::try_current() else {
            warn!(revision, ticket, "no runtime, auto-save timer not armed");
            return;
        };
        let shared = Arc::clone(&self.shared);
        let persistence = Arc::clone(&self.persistence);
        let quiet_period = self.quiet_period;
        let timer = runtime.spawn(async move {
            tokio::time::sleep(quiet_period).await;
            fire(shared, persistence, generation, ticket).await;
        });
        inner.pending = Some((ticket, timer));

        debug!(revision, ticket, ?quiet_period, "auto-save debounce armed");
    }

    /// Persists `snapshot` right away, dropping any armed timer. This is the
    /// manual retry path after a failed save.
    pub async fn save_now(&self, snapshot: DraftSnapshot) -> AutoSaveState {
        let (generation, ticket) = {
            let mut inner = self.shared.lock();
            inner.ticket += 1;
            inner.fired = inner.ticket;
            if let Some((_, timer)) = inner.pending.take() {
                timer.abort();
            }
            inner.latest = Some(snapshot.clone());
            self.shared.set_status(SaveStatus::Saving);
            (inner.generation, inner.ticket)
        };

        let revision = snapshot.revision;
        let result = self.persistence.persist(snapshot).await;
        complete(&self.shared, generation, ticket, revision, result);
        self.state()
    }

    /// Drops the armed timer and disowns any save already in flight. The state
    /// returns to its initial value.
    pub fn cancel(&self) {
        let mut inner = self.shared.lock();
        inner.generation += 1;
        inner.latest = None;
        if let Some((ticket, timer)) = inner.pending.take() {
            timer.abort();
            debug!(ticket, "pending auto-save cancelled");
        }
        self.shared.state.send_replace(AutoSaveState::default());
    }
}

impl Drop for AutoSaveController {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        inner.generation += 1;
        if let Some((_, timer)) = inner.pending.take() {
            timer.abort();
        }
    }
}

impl std::fmt::Debug for AutoSaveController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoSaveController")
            .field("quiet_period", &self.quiet_period)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

async fn fire(
    shared: Arc<Shared>,
    persistence: Arc<dyn DraftPersistence>,
    generation: u64,
    ticket: u64,
) {
    let snapshot = {
        let mut inner = shared.lock();
        if inner.generation != generation {
            return;
        }
        match &inner.pending {
            Some((armed, _)) if *armed == ticket => {}
            _ => return,
        }
        inner.pending = None;
        inner.fired = ticket;
        let Some(snapshot) = inner.latest.clone() else {
            return;
        };
        shared.set_status(SaveStatus::Saving);
        snapshot
    };

    let revision = snapshot.revision;
    let result = persistence.persist(snapshot).await;
    complete(&shared, generation, ticket, revision, result);
}

fn complete(
    shared: &Shared,
    generation: u64,
    ticket: u64,
    revision: u64,
    result: Result<(), PersistenceError>,
) {
    let inner = shared.lock();
    if inner.generation != generation {
        debug!(revision, "discarding save result from a cancelled session");
        return;
    }
    if inner.fired != ticket {
        debug!(revision, "discarding save result superseded by a newer save");
        return;
    }

    match result {
        Ok(()) => {
            let newer_change = inner.ticket != ticket;
            shared.state.send_modify(|state| {
                state.last_saved_at = Some(Utc::now());
                state.status = if newer_change {
                    SaveStatus::Unsaved
                } else {
                    SaveStatus::Saved
                };
            });
            info!(revision, newer_change, "draft saved");
        }
        Err(err) => {
            warn!(revision, error = %err, "draft auto-save failed");
            shared.set_status(SaveStatus::Error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::draft::WizardDraft;

    struct Unreachable;

    #[async_trait]
    impl DraftPersistence for Unreachable {
        async fn persist(&self, _snapshot: DraftSnapshot) -> Result<(), PersistenceError> {
            Err(PersistenceError::Unavailable("offline".to_string()))
        }
    }

    #[test]
    fn starts_unsaved_without_timestamp() {
        let controller = AutoSaveController::with_default_quiet_period(Arc::new(Unreachable));
        assert_eq!(controller.state(), AutoSaveState::default());
        assert_eq!(controller.state().status, SaveStatus::Unsaved);
        assert_eq!(controller.quiet_period(), Duration::from_millis(3000));
        assert!(!controller.is_pending());
    }

    #[test]
    fn changes_outside_a_runtime_are_kept_without_a_timer() {
        let controller = AutoSaveController::with_default_quiet_period(Arc::new(Unreachable));
        controller.notify_change(DraftSnapshot {
            revision: 1,
            draft: WizardDraft::default(),
        });

        assert!(!controller.is_pending());
        assert_eq!(controller.state().status, SaveStatus::Unsaved);
        let latest = controller.shared.lock().latest.clone();
        assert_eq!(latest.map(|snapshot| snapshot.revision), Some(1));
    }

    #[test]
    fn status_serializes_as_indicator_keys() {
        let json = serde_json::to_value(AutoSaveState {
            status: SaveStatus::Error,
            last_saved_at: None,
        })
        .expect("state serializes");
        assert_eq!(json["status"], "error");
        assert!(json["last_saved_at"].is_null());
    }
}
