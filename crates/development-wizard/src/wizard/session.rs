use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use super::autosave::{AutoSaveController, AutoSaveState, DraftPersistence};
use super::draft::{
    ClassificationPatch, FinalisationPatch, IdentityPatch, LocationPatch, MediaId, MediaItem,
    NewMedia, OverviewPatch, UnitTypeId, UnitTypeInput, UnitTypePatch, WizardDraft,
};
use super::phase::WizardPhase;
use super::store::{WizardError, WizardStateStore};
use super::validation::PhaseValidation;

/// One user's pass through the wizard: a state store with auto-save wired on top.
///
/// Every mutation that changes the draft hands a fresh snapshot to the
/// auto-save controller. Validation and failed mutations never trigger a save.
/// Debounced saves need a tokio runtime; without one, edits still apply and
/// wait for [`save_now`](Self::save_now).
#[derive(Debug)]
pub struct WizardSession {
    store: WizardStateStore,
    autosave: AutoSaveController,
}

impl WizardSession {
    pub fn new(persistence: Arc<dyn DraftPersistence>, quiet_period: Duration) -> Self {
        Self::with_store(WizardStateStore::new(), persistence, quiet_period)
    }

    /// Resumes a draft loaded elsewhere. Nothing is saved until the first edit.
    pub fn resume(
        draft: WizardDraft,
        persistence: Arc<dyn DraftPersistence>,
        quiet_period: Duration,
    ) -> Self {
        Self::with_store(WizardStateStore::hydrate(draft), persistence, quiet_period)
    }

    fn with_store(
        store: WizardStateStore,
        persistence: Arc<dyn DraftPersistence>,
        quiet_period: Duration,
    ) -> Self {
        Self {
            store,
            autosave: AutoSaveController::new(persistence, quiet_period),
        }
    }

    pub fn draft(&self) -> &WizardDraft {
        self.store.draft()
    }

    pub fn current_phase(&self) -> WizardPhase {
        self.store.current_phase()
    }

    pub fn store(&self) -> &WizardStateStore {
        &self.store
    }

    pub fn autosave_state(&self) -> AutoSaveState {
        self.autosave.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<AutoSaveState> {
        self.autosave.subscribe()
    }

    pub fn has_pending_save(&self) -> bool {
        self.autosave.is_pending()
    }

    pub fn set_identity(&mut self, patch: IdentityPatch) -> Result<(), WizardError> {
        self.store.set_identity(patch)?;
        self.changed();
        Ok(())
    }

    pub fn set_location(&mut self, patch: LocationPatch) -> Result<(), WizardError> {
        self.store.set_location(patch)?;
        self.changed();
        Ok(())
    }

    pub fn set_classification(&mut self, patch: ClassificationPatch) -> Result<(), WizardError> {
        self.store.set_classification(patch)?;
        self.changed();
        Ok(())
    }

    pub fn set_overview(&mut self, patch: OverviewPatch) -> Result<(), WizardError> {
        self.store.set_overview(patch)?;
        self.changed();
        Ok(())
    }

    pub fn set_finalisation(&mut self, patch: FinalisationPatch) -> Result<(), WizardError> {
        self.store.set_finalisation(patch)?;
        self.changed();
        Ok(())
    }

    pub fn set_unit_types(
        &mut self,
        inputs: Vec<UnitTypeInput>,
    ) -> Result<Vec<UnitTypeId>, WizardError> {
        let ids = self.store.set_unit_types(inputs)?;
        self.changed();
        Ok(ids)
    }

    pub fn add_unit_type(&mut self, input: UnitTypeInput) -> Result<UnitTypeId, WizardError> {
        let id = self.store.add_unit_type(input)?;
        self.changed();
        Ok(id)
    }

    pub fn update_unit_type(
        &mut self,
        id: &UnitTypeId,
        patch: UnitTypePatch,
    ) -> Result<(), WizardError> {
        self.store.update_unit_type(id, patch)?;
        self.changed();
        Ok(())
    }

    pub fn remove_unit_type(&mut self, id: &UnitTypeId) -> Result<(), WizardError> {
        self.store.remove_unit_type(id)?;
        self.changed();
        Ok(())
    }

    pub fn add_media(&mut self, media: NewMedia) -> Result<MediaId, WizardError> {
        let id = self.store.add_media(media)?;
        self.changed();
        Ok(id)
    }

    pub fn remove_media(&mut self, id: &MediaId) -> Result<Option<MediaItem>, WizardError> {
        let removed = self.store.remove_media(id)?;
        if removed.is_some() {
            self.changed();
        }
        Ok(removed)
    }

    pub fn set_primary_image(&mut self, id: &MediaId) -> Result<bool, WizardError> {
        let changed = self.store.set_primary_image(id)?;
        if changed {
            self.changed();
        }
        Ok(changed)
    }

    pub fn go_to(&mut self, phase: u8) -> Result<WizardPhase, WizardError> {
        let before = self.store.revision();
        let phase = self.store.set_phase(phase)?;
        if self.store.revision() != before {
            self.changed();
        }
        Ok(phase)
    }

    pub fn back(&mut self) -> Result<WizardPhase, WizardError> {
        let before = self.store.revision();
        let phase = self.store.back()?;
        if self.store.revision() != before {
            self.changed();
        }
        Ok(phase)
    }

    pub fn advance(&mut self) -> Result<WizardPhase, WizardError> {
        let before = self.store.revision();
        let phase = self.store.advance()?;
        if self.store.revision() != before {
            self.changed();
        }
        Ok(phase)
    }

    pub fn validate(&self, phase: u8) -> PhaseValidation {
        self.store.validate_phase(phase)
    }

    /// Persists the current draft immediately.
    pub async fn save_now(&self) -> AutoSaveState {
        self.autosave.save_now(self.store.snapshot()).await
    }

    /// Discards the draft and any save still waiting on its quiet period.
    pub fn reset(&mut self) {
        self.autosave.cancel();
        self.store.reset();
    }

    /// Hands back the finished draft and starts the session over. The draft is
    /// left untouched when any phase is incomplete.
    pub fn publish(&mut self) -> Result<WizardDraft, WizardError> {
        let published = self.store.publish()?;
        self.autosave.cancel();
        info!(name = %published.identity.name, "development draft published");
        Ok(published)
    }

    fn changed(&self) {
        self.autosave.notify_change(self.store.snapshot());
    }
}
