//! Development listing wizard: draft model, phase validation, state store and
//! debounced auto-save.

pub mod autosave;
pub mod draft;
mod phase;
mod session;
mod store;
pub mod validation;

pub use autosave::{
    AutoSaveController, AutoSaveState, DraftPersistence, PersistenceError, SaveStatus,
    DEFAULT_QUIET_PERIOD,
};
pub use draft::{
    Classification, ClassificationPatch, DevelopmentIdentity, DevelopmentStatus, DevelopmentType,
    DraftSnapshot, Finalisation, FinalisationPatch, IdentityPatch, Location, LocationPatch, MediaId,
    MediaItem, MediaSet, MediaType, NatureOfDevelopment, NewMedia, Overview, OverviewPatch,
    OwnershipType, UnitType, UnitTypeId, UnitTypeInput, UnitTypePatch, WizardDraft,
};
pub use phase::WizardPhase;
pub use session::WizardSession;
pub use store::{WizardError, WizardStateStore};
pub use validation::{validate, validate_all, PhaseValidation};
