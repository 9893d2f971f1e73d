//! Multi-phase development listing wizard.
//!
//! The [`wizard`] module holds the draft model, per-phase validation, the
//! caller-owned state store and the debounced auto-save controller. The
//! remaining modules carry the service plumbing shared with `services/api`.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod wizard;
