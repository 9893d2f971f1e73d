use std::collections::BTreeMap;

use tracing::debug;

use super::draft::{
    ClassificationPatch, DraftSnapshot, FinalisationPatch, IdentityPatch, LocationPatch, MediaId,
    MediaItem, NewMedia, OverviewPatch, UnitTypeId, UnitTypeInput, UnitTypePatch, WizardDraft,
};
use super::phase::WizardPhase;
use super::validation::{self, PhaseValidation};

/// Error raised by store operations that cannot be expressed as a no-op.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("draft has been published and can no longer be edited")]
    DraftPublished,
    #[error("phase {0} is outside the wizard (expected 1-5)")]
    PhaseOutOfRange(u8),
    #[error("unit type {0} not found")]
    UnitTypeNotFound(UnitTypeId),
    #[error("{phase} is incomplete: {}", .errors.join("; "))]
    PhaseIncomplete {
        phase: WizardPhase,
        errors: Vec<String>,
    },
    #[error("draft cannot be published: {}", summarize(.failures))]
    NotPublishable {
        failures: BTreeMap<WizardPhase, Vec<String>>,
    },
}

fn summarize(failures: &BTreeMap<WizardPhase, Vec<String>>) -> String {
    failures
        .iter()
        .map(|(phase, errors)| format!("{}: {}", phase.label(), errors.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Caller-owned source of truth for one wizard session's draft.
///
/// The store only holds state and applies mutations; it never performs I/O.
/// Persistence is layered on top by feeding [`snapshot`](Self::snapshot) to an
/// [`AutoSaveController`](super::AutoSaveController).
#[derive(Debug, Default)]
pub struct WizardStateStore {
    draft: WizardDraft,
    revision: u64,
    media_sequence: u64,
    unit_sequence: u64,
}

impl WizardStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a draft produced by an external loader. Generated ids continue past
    /// any ids already present in the draft.
    pub fn hydrate(draft: WizardDraft) -> Self {
        let media_sequence = draft
            .identity
            .media
            .iter()
            .filter_map(|item| sequence_of(&item.id.0, "media-"))
            .max()
            .unwrap_or(0);
        let unit_sequence = draft
            .unit_types
            .iter()
            .filter_map(|unit| sequence_of(&unit.id.0, "unit-"))
            .max()
            .unwrap_or(0);

        Self {
            draft,
            revision: 0,
            media_sequence,
            unit_sequence,
        }
    }

    pub fn draft(&self) -> &WizardDraft {
        &self.draft
    }

    pub fn current_phase(&self) -> WizardPhase {
        self.draft.current_phase
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_published(&self) -> bool {
        self.draft.is_published
    }

    pub fn snapshot(&self) -> DraftSnapshot {
        DraftSnapshot {
            revision: self.revision,
            draft: self.draft.clone(),
        }
    }

    pub fn set_identity(&mut self, patch: IdentityPatch) -> Result<(), WizardError> {
        self.mutate(|draft| patch.apply(&mut draft.identity))
    }

    pub fn set_location(&mut self, patch: LocationPatch) -> Result<(), WizardError> {
        self.mutate(|draft| patch.apply(&mut draft.identity.location))
    }

    pub fn set_classification(&mut self, patch: ClassificationPatch) -> Result<(), WizardError> {
        self.mutate(|draft| patch.apply(&mut draft.classification))
    }

    pub fn set_overview(&mut self, patch: OverviewPatch) -> Result<(), WizardError> {
        self.mutate(|draft| patch.apply(&mut draft.overview))
    }

    pub fn set_finalisation(&mut self, patch: FinalisationPatch) -> Result<(), WizardError> {
        self.mutate(|draft| patch.apply(&mut draft.finalisation))
    }

    /// Replaces the unit type list, assigning fresh ids.
    pub fn set_unit_types(
        &mut self,
        inputs: Vec<UnitTypeInput>,
    ) -> Result<Vec<UnitTypeId>, WizardError> {
        self.ensure_editable()?;
        let units: Vec<_> = inputs
            .into_iter()
            .map(|input| {
                let id = self.next_unit_id();
                input.into_unit_type(id)
            })
            .collect();
        let ids = units.iter().map(|unit| unit.id.clone()).collect();
        self.draft.unit_types = units;
        self.touch();
        Ok(ids)
    }

    pub fn add_unit_type(&mut self, input: UnitTypeInput) -> Result<UnitTypeId, WizardError> {
        self.ensure_editable()?;
        let id = self.next_unit_id();
        self.draft.unit_types.push(input.into_unit_type(id.clone()));
        self.touch();
        Ok(id)
    }

    pub fn update_unit_type(
        &mut self,
        id: &UnitTypeId,
        patch: UnitTypePatch,
    ) -> Result<(), WizardError> {
        self.ensure_editable()?;
        let unit = self
            .draft
            .unit_types
            .iter_mut()
            .find(|unit| &unit.id == id)
            .ok_or_else(|| WizardError::UnitTypeNotFound(id.clone()))?;
        patch.apply(unit);
        self.touch();
        Ok(())
    }

    pub fn remove_unit_type(&mut self, id: &UnitTypeId) -> Result<(), WizardError> {
        self.ensure_editable()?;
        let position = self
            .draft
            .unit_types
            .iter()
            .position(|unit| &unit.id == id)
            .ok_or_else(|| WizardError::UnitTypeNotFound(id.clone()))?;
        self.draft.unit_types.remove(position);
        self.touch();
        Ok(())
    }

    /// Adds an upload and returns its id.
    ///
    /// The first upload into an empty media set becomes the primary image and
    /// takes the hero slot. Later uploads flagged `as_hero` take the hero slot
    /// only while it is empty; everything else is appended to the photos.
    pub fn add_media(&mut self, media: NewMedia) -> Result<MediaId, WizardError> {
        self.ensure_editable()?;
        let id = self.next_media_id();
        let set = &mut self.draft.identity.media;
        let first_upload = set.is_empty();

        let item = MediaItem {
            id: id.clone(),
            file_handle: media.file_handle,
            url: media.url,
            media_type: media.media_type,
            category: media.category,
            is_primary: first_upload,
        };

        if first_upload || (media.as_hero && set.hero_image.is_none()) {
            set.hero_image = Some(item);
        } else {
            set.photos.push(item);
        }

        debug!(media_id = %id, first_upload, "media added to draft");
        self.touch();
        Ok(id)
    }

    /// Removes the item from whichever slot holds it. Removing the primary
    /// image leaves the draft without one; nothing is promoted in its place.
    pub fn remove_media(&mut self, id: &MediaId) -> Result<Option<MediaItem>, WizardError> {
        self.ensure_editable()?;
        let set = &mut self.draft.identity.media;

        let removed = if set.hero_image.as_ref().is_some_and(|hero| &hero.id == id) {
            set.hero_image.take()
        } else {
            set.photos
                .iter()
                .position(|item| &item.id == id)
                .map(|position| set.photos.remove(position))
        };

        if removed.is_some() {
            self.touch();
        }
        Ok(removed)
    }

    /// Moves the primary flag to `id`. Returns `false`, changing nothing, when
    /// the id is not part of the draft.
    pub fn set_primary_image(&mut self, id: &MediaId) -> Result<bool, WizardError> {
        self.ensure_editable()?;
        let set = &mut self.draft.identity.media;
        if set.get(id).is_none() {
            return Ok(false);
        }

        for item in set.iter_mut() {
            item.is_primary = &item.id == id;
        }
        self.touch();
        Ok(true)
    }

    /// Unconditional navigation, used for "back" and tab jumps. Staying on the
    /// current phase leaves the revision untouched.
    pub fn set_phase(&mut self, number: u8) -> Result<WizardPhase, WizardError> {
        let phase = WizardPhase::from_number(number).ok_or(WizardError::PhaseOutOfRange(number))?;
        if phase == self.draft.current_phase {
            self.ensure_editable()?;
            return Ok(phase);
        }
        self.mutate(|draft| draft.current_phase = phase)?;
        Ok(phase)
    }

    pub fn validate_phase(&self, number: u8) -> PhaseValidation {
        validation::validate(number, &self.draft)
    }

    /// Validates the current phase and moves forward when it passes. The last
    /// phase stays put.
    pub fn advance(&mut self) -> Result<WizardPhase, WizardError> {
        self.ensure_editable()?;
        let current = self.draft.current_phase;
        let result = validation::validate_phase(current, &self.draft);
        if !result.is_valid {
            return Err(WizardError::PhaseIncomplete {
                phase: current,
                errors: result.errors,
            });
        }

        match current.next() {
            Some(next) => {
                self.draft.current_phase = next;
                self.touch();
                Ok(next)
            }
            None => Ok(current),
        }
    }

    /// Moves one phase back without validating. Stays on the first phase.
    pub fn back(&mut self) -> Result<WizardPhase, WizardError> {
        let target = self
            .draft
            .current_phase
            .previous()
            .unwrap_or(WizardPhase::FIRST);
        self.set_phase(target.number())
    }

    /// Returns the published draft when every phase validates, and clears the
    /// store for the next listing.
    pub fn publish(&mut self) -> Result<WizardDraft, WizardError> {
        self.ensure_editable()?;
        let failures: BTreeMap<_, _> = validation::validate_all(&self.draft)
            .into_iter()
            .filter(|(_, result)| !result.is_valid)
            .map(|(phase, result)| (phase, result.errors))
            .collect();
        if !failures.is_empty() {
            return Err(WizardError::NotPublishable { failures });
        }

        let mut published = std::mem::take(&mut self.draft);
        published.is_published = true;
        self.touch();
        Ok(published)
    }

    /// Clears the draft back to its default and returns to the first phase.
    pub fn reset(&mut self) {
        self.draft = WizardDraft::default();
        self.touch();
    }

    fn mutate(&mut self, apply: impl FnOnce(&mut WizardDraft)) -> Result<(), WizardError> {
        self.ensure_editable()?;
        apply(&mut self.draft);
        self.touch();
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), WizardError> {
        if self.draft.is_published {
            Err(WizardError::DraftPublished)
        } else {
            Ok(())
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn next_media_id(&mut self) -> MediaId {
        loop {
            self.media_sequence += 1;
            let candidate = MediaId(format!("media-{:04}", self.media_sequence));
            if self.draft.identity.media.get(&candidate).is_none() {
                return candidate;
            }
        }
    }

    fn next_unit_id(&mut self) -> UnitTypeId {
        loop {
            self.unit_sequence += 1;
            let candidate = UnitTypeId(format!("unit-{:04}", self.unit_sequence));
            if self.draft.unit_type(&candidate).is_none() {
                return candidate;
            }
        }
    }
}

fn sequence_of(id: &str, prefix: &str) -> Option<u64> {
    id.strip_prefix(prefix)?.parse().ok()
}
