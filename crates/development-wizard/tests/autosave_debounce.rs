use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use development_wizard::wizard::{
    AutoSaveController, AutoSaveState, DraftPersistence, DraftSnapshot, PersistenceError,
    SaveStatus, WizardDraft,
};
use tokio::sync::Semaphore;
use tokio::time::{sleep, Instant};

const QUIET: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone)]
struct PersistCall {
    revision: u64,
    name: String,
    at: Instant,
}

/// Records every call. Saves fail while `failing` is set, and block until a
/// permit is released when the store is gated.
struct RecordingPersistence {
    calls: Mutex<Vec<PersistCall>>,
    failing: AtomicBool,
    gate: Option<Semaphore>,
}

impl RecordingPersistence {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            gate: None,
        }
    }

    fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    fn failing() -> Self {
        let store = Self::new();
        store.failing.store(true, Ordering::SeqCst);
        store
    }

    fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    fn calls(&self) -> Vec<PersistCall> {
        self.calls.lock().expect("calls mutex").clone()
    }
}

#[async_trait]
impl DraftPersistence for RecordingPersistence {
    async fn persist(&self, snapshot: DraftSnapshot) -> Result<(), PersistenceError> {
        self.calls.lock().expect("calls mutex").push(PersistCall {
            revision: snapshot.revision,
            name: snapshot.draft.identity.name.clone(),
            at: Instant::now(),
        });

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate open").forget();
        }

        if self.failing.load(Ordering::SeqCst) {
            Err(PersistenceError::Unavailable(
                "connection reset".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

fn snapshot(revision: u64, name: &str) -> DraftSnapshot {
    let mut draft = WizardDraft::default();
    draft.identity.name = name.to_string();
    DraftSnapshot { revision, draft }
}

#[tokio::test(start_paused = true)]
async fn rapid_changes_collapse_into_the_last_snapshot() {
    let store = Arc::new(RecordingPersistence::new());
    let controller = AutoSaveController::new(store.clone(), QUIET);
    let start = Instant::now();

    controller.notify_change(snapshot(1, "Har"));
    sleep(Duration::from_millis(500)).await;
    controller.notify_change(snapshot(2, "Harbour"));
    sleep(Duration::from_millis(400)).await;
    controller.notify_change(snapshot(3, "Harbour View"));

    sleep(Duration::from_millis(2999)).await;
    assert!(store.calls().is_empty(), "quiet period has not elapsed yet");
    assert!(controller.is_pending());

    sleep(Duration::from_millis(2)).await;
    let calls = store.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].revision, 3);
    assert_eq!(calls[0].name, "Harbour View");
    let fired_after = calls[0].at.duration_since(start);
    assert!(
        fired_after >= Duration::from_millis(3900) && fired_after < Duration::from_millis(3905),
        "persisted at {fired_after:?}"
    );
    assert!(!controller.is_pending());

    sleep(Duration::from_secs(30)).await;
    assert_eq!(store.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn status_moves_through_saving_to_saved() {
    let store = Arc::new(RecordingPersistence::gated());
    let controller = AutoSaveController::new(store.clone(), QUIET);
    let mut updates = controller.subscribe();

    controller.notify_change(snapshot(1, "Oak Lane"));
    assert_eq!(controller.state().status, SaveStatus::Unsaved);

    sleep(QUIET + Duration::from_millis(1)).await;
    assert_eq!(controller.state().status, SaveStatus::Saving);
    assert!(controller.state().last_saved_at.is_none());

    store.release();
    sleep(Duration::from_millis(1)).await;
    let state = controller.state();
    assert_eq!(state.status, SaveStatus::Saved);
    assert!(state.last_saved_at.is_some());
    assert!(updates.has_changed().expect("sender alive"));
    assert_eq!(updates.borrow_and_update().status, SaveStatus::Saved);

    controller.notify_change(snapshot(2, "Oak Lane Estate"));
    assert_eq!(controller.state().status, SaveStatus::Unsaved);
    assert_eq!(controller.state().last_saved_at, state.last_saved_at);
}

#[tokio::test(start_paused = true)]
async fn failed_save_waits_for_the_next_change() {
    let store = Arc::new(RecordingPersistence::failing());
    let controller = AutoSaveController::new(store.clone(), QUIET);

    controller.notify_change(snapshot(1, "Dunes"));
    sleep(QUIET + Duration::from_millis(1)).await;
    assert_eq!(controller.state().status, SaveStatus::Error);
    assert_eq!(store.calls().len(), 1);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(store.calls().len(), 1, "no automatic retry");
    assert!(!controller.is_pending());

    store.failing.store(false, Ordering::SeqCst);
    controller.notify_change(snapshot(2, "Dunes Estate"));
    assert_eq!(
        controller.state().status,
        SaveStatus::Error,
        "error stays visible until the next save starts"
    );

    sleep(QUIET + Duration::from_millis(1)).await;
    let calls = store.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].revision, 2);
    assert_eq!(controller.state().status, SaveStatus::Saved);
}

#[tokio::test(start_paused = true)]
async fn dropping_mid_debounce_never_persists() {
    let store = Arc::new(RecordingPersistence::new());
    let controller = AutoSaveController::new(store.clone(), QUIET);

    controller.notify_change(snapshot(1, "Vineyard"));
    sleep(Duration::from_millis(1200)).await;
    drop(controller);

    sleep(Duration::from_secs(10)).await;
    assert!(store.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_disowns_an_in_flight_save() {
    let store = Arc::new(RecordingPersistence::gated());
    let controller = AutoSaveController::new(store.clone(), QUIET);

    controller.notify_change(snapshot(1, "Quarry Heights"));
    sleep(QUIET + Duration::from_millis(1)).await;
    assert_eq!(controller.state().status, SaveStatus::Saving);

    controller.cancel();
    store.release();
    sleep(Duration::from_millis(1)).await;

    assert_eq!(store.calls().len(), 1, "started call is allowed to finish");
    assert_eq!(controller.state(), AutoSaveState::default());
}

#[tokio::test(start_paused = true)]
async fn change_during_in_flight_save_keeps_draft_unsaved() {
    let store = Arc::new(RecordingPersistence::gated());
    let controller = AutoSaveController::new(store.clone(), QUIET);

    controller.notify_change(snapshot(1, "Mill"));
    sleep(QUIET + Duration::from_millis(1)).await;
    controller.notify_change(snapshot(2, "Mill Street"));

    store.release();
    sleep(Duration::from_millis(1)).await;
    let state = controller.state();
    assert_eq!(state.status, SaveStatus::Unsaved);
    assert!(state.last_saved_at.is_some());

    store.release();
    sleep(QUIET).await;
    let calls = store.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].revision, 2);
    assert_eq!(controller.state().status, SaveStatus::Saved);
}

#[tokio::test(start_paused = true)]
async fn save_now_skips_the_quiet_period() {
    let store = Arc::new(RecordingPersistence::new());
    let controller = AutoSaveController::new(store.clone(), QUIET);

    controller.notify_change(snapshot(1, "Bay"));
    let state = controller.save_now(snapshot(2, "Bay Point")).await;

    assert_eq!(state.status, SaveStatus::Saved);
    assert!(!controller.is_pending());
    sleep(Duration::from_secs(10)).await;
    let calls = store.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].revision, 2);
}
