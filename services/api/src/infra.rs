use async_trait::async_trait;
use chrono::{DateTime, Utc};
use development_wizard::error::AppError;
use development_wizard::wizard::{
    AutoSaveState, DraftPersistence, DraftSnapshot, PersistenceError, WizardDraft, WizardPhase,
    WizardSession,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub(crate) struct DraftId(pub(crate) String);

impl DraftId {
    fn generate() -> Self {
        static SEQUENCE: AtomicU64 = AtomicU64::new(1);
        let id = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self(format!("draft-{id:06}"))
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StoredDraft {
    pub(crate) revision: u64,
    pub(crate) saved_at: DateTime<Utc>,
    pub(crate) draft: WizardDraft,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PublishedDraft {
    pub(crate) draft_id: DraftId,
    pub(crate) published_at: DateTime<Utc>,
    pub(crate) draft: WizardDraft,
}

#[derive(Debug, Clone)]
enum DraftRecord {
    Saved(StoredDraft),
    /// Left behind by `discard` so a save still in flight cannot bring the draft back.
    Discarded,
}

/// Draft storage shared by every session. Saved drafts are keyed by draft id;
/// published listings are kept in a separate log.
#[derive(Default, Clone)]
pub(crate) struct InMemoryDraftRepository {
    saved: Arc<Mutex<HashMap<DraftId, DraftRecord>>>,
    published: Arc<Mutex<Vec<PublishedDraft>>>,
    failures_remaining: Arc<AtomicUsize>,
}

impl InMemoryDraftRepository {
    /// Repository whose first `count` writes fail as if storage were offline.
    pub(crate) fn failing_first(count: usize) -> Self {
        Self {
            failures_remaining: Arc::new(AtomicUsize::new(count)),
            ..Self::default()
        }
    }

    pub(crate) fn for_draft(&self, draft_id: DraftId) -> Arc<dyn DraftPersistence> {
        Arc::new(DraftSlot {
            draft_id,
            repository: self.clone(),
        })
    }

    fn store(&self, draft_id: &DraftId, snapshot: DraftSnapshot) -> Result<(), PersistenceError> {
        let outage = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok();
        if outage {
            return Err(PersistenceError::Unavailable(
                "draft store is offline".to_string(),
            ));
        }

        let mut guard = self.saved.lock().expect("draft repository mutex poisoned");
        match guard.get(draft_id) {
            Some(DraftRecord::Discarded) => {
                return Err(PersistenceError::Rejected(format!(
                    "draft {draft_id} was deleted"
                )));
            }
            // Single writer per draft, but a cancelled save may still land late.
            Some(DraftRecord::Saved(existing)) if existing.revision > snapshot.revision => {
                return Ok(());
            }
            _ => {}
        }
        guard.insert(
            draft_id.clone(),
            DraftRecord::Saved(StoredDraft {
                revision: snapshot.revision,
                saved_at: Utc::now(),
                draft: snapshot.draft,
            }),
        );
        Ok(())
    }

    pub(crate) fn fetch(&self, draft_id: &DraftId) -> Option<StoredDraft> {
        let guard = self.saved.lock().expect("draft repository mutex poisoned");
        match guard.get(draft_id) {
            Some(DraftRecord::Saved(stored)) => Some(stored.clone()),
            Some(DraftRecord::Discarded) | None => None,
        }
    }

    /// Forgets the saved copy and refuses any later write for the same draft.
    pub(crate) fn discard(&self, draft_id: &DraftId) {
        let mut guard = self.saved.lock().expect("draft repository mutex poisoned");
        guard.insert(draft_id.clone(), DraftRecord::Discarded);
    }

    pub(crate) fn record_published(
        &self,
        draft_id: &DraftId,
        draft: WizardDraft,
    ) -> PublishedDraft {
        let record = PublishedDraft {
            draft_id: draft_id.clone(),
            published_at: Utc::now(),
            draft,
        };
        let mut guard = self.published.lock().expect("published mutex poisoned");
        guard.push(record.clone());
        record
    }

    pub(crate) fn published(&self) -> Vec<PublishedDraft> {
        self.published
            .lock()
            .expect("published mutex poisoned")
            .clone()
    }
}

struct DraftSlot {
    draft_id: DraftId,
    repository: InMemoryDraftRepository,
}

#[async_trait]
impl DraftPersistence for DraftSlot {
    async fn persist(&self, snapshot: DraftSnapshot) -> Result<(), PersistenceError> {
        self.repository.store(&self.draft_id, snapshot)
    }
}

pub(crate) type SharedSession = Arc<tokio::sync::Mutex<WizardSession>>;

/// What the API returns for a draft after every call.
#[derive(Debug, Serialize)]
pub(crate) struct DraftView {
    pub(crate) draft_id: DraftId,
    pub(crate) revision: u64,
    pub(crate) current_phase: WizardPhase,
    pub(crate) autosave: AutoSaveState,
    pub(crate) saved_revision: Option<u64>,
    pub(crate) draft: WizardDraft,
}

/// Open wizard sessions, one per draft id.
#[derive(Clone)]
pub(crate) struct DraftSessions {
    sessions: Arc<Mutex<HashMap<DraftId, SharedSession>>>,
    repository: InMemoryDraftRepository,
    quiet_period: Duration,
}

impl DraftSessions {
    pub(crate) fn new(repository: InMemoryDraftRepository, quiet_period: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            repository,
            quiet_period,
        }
    }

    pub(crate) fn repository(&self) -> &InMemoryDraftRepository {
        &self.repository
    }

    pub(crate) fn open(&self) -> (DraftId, SharedSession) {
        let draft_id = DraftId::generate();
        let session = WizardSession::new(
            self.repository.for_draft(draft_id.clone()),
            self.quiet_period,
        );
        let session = Arc::new(tokio::sync::Mutex::new(session));
        let mut guard = self.sessions.lock().expect("session registry mutex poisoned");
        guard.insert(draft_id.clone(), session.clone());
        (draft_id, session)
    }

    pub(crate) fn get(&self, draft_id: &str) -> Result<(DraftId, SharedSession), AppError> {
        let draft_id = DraftId(draft_id.to_string());
        let guard = self.sessions.lock().expect("session registry mutex poisoned");
        match guard.get(&draft_id) {
            Some(session) => Ok((draft_id.clone(), session.clone())),
            None => Err(AppError::DraftNotFound(draft_id.0)),
        }
    }

    /// Drops the session, which cancels its pending save, and forgets the saved copy.
    pub(crate) fn close(&self, draft_id: &str) -> Result<(), AppError> {
        let draft_id = DraftId(draft_id.to_string());
        let removed = self
            .sessions
            .lock()
            .expect("session registry mutex poisoned")
            .remove(&draft_id);
        match removed {
            Some(_) => {
                self.repository.discard(&draft_id);
                Ok(())
            }
            None => Err(AppError::DraftNotFound(draft_id.0)),
        }
    }

    pub(crate) fn view(&self, draft_id: &DraftId, session: &WizardSession) -> DraftView {
        DraftView {
            draft_id: draft_id.clone(),
            revision: session.store().revision(),
            current_phase: session.current_phase(),
            autosave: session.autosave_state(),
            saved_revision: self.repository.fetch(draft_id).map(|saved| saved.revision),
            draft: session.draft().clone(),
        }
    }
}
