use std::collections::BTreeMap;

use serde::Serialize;

use super::draft::WizardDraft;
use super::phase::WizardPhase;

/// Outcome of checking one phase. `is_valid` is true exactly when `errors` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl PhaseValidation {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Validates `phase_number` against `draft`.
///
/// Every failing rule contributes its own message. Unknown phase numbers yield a
/// single "Invalid phase" error instead of panicking.
pub fn validate(phase_number: u8, draft: &WizardDraft) -> PhaseValidation {
    match WizardPhase::from_number(phase_number) {
        Some(phase) => validate_phase(phase, draft),
        None => PhaseValidation::from_errors(vec![format!("Invalid phase: {phase_number}")]),
    }
}

pub fn validate_phase(phase: WizardPhase, draft: &WizardDraft) -> PhaseValidation {
    let mut errors = Vec::new();
    match phase {
        WizardPhase::Identity => identity_rules(draft, &mut errors),
        WizardPhase::Classification => classification_rules(draft, &mut errors),
        WizardPhase::Overview => overview_rules(draft, &mut errors),
        WizardPhase::UnitTypes => unit_type_rules(draft, &mut errors),
        WizardPhase::Finalisation => finalisation_rules(draft, &mut errors),
    }
    PhaseValidation::from_errors(errors)
}

/// Validates every phase, keyed by phase.
pub fn validate_all(draft: &WizardDraft) -> BTreeMap<WizardPhase, PhaseValidation> {
    WizardPhase::ordered()
        .into_iter()
        .map(|phase| (phase, validate_phase(phase, draft)))
        .collect()
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn identity_rules(draft: &WizardDraft, errors: &mut Vec<String>) {
    let identity = &draft.identity;
    if is_blank(&identity.name) {
        errors.push("Development name is required".to_string());
    }
    if is_blank(&identity.location.address) {
        errors.push("Address is required".to_string());
    }
    if let Some(latitude) = identity.location.latitude {
        if !(-90.0..=90.0).contains(&latitude) {
            errors.push("Latitude must be between -90 and 90".to_string());
        }
    }
    if let Some(longitude) = identity.location.longitude {
        if !(-180.0..=180.0).contains(&longitude) {
            errors.push("Longitude must be between -180 and 180".to_string());
        }
    }
}

fn classification_rules(draft: &WizardDraft, errors: &mut Vec<String>) {
    let classification = &draft.classification;
    if classification.development_type.is_none() {
        errors.push("Development type is required".to_string());
    }
    if classification.ownership.is_none() {
        errors.push("Ownership type is required".to_string());
    }
    if classification.status.is_none() {
        errors.push("Development status is required".to_string());
    }
}

fn overview_rules(draft: &WizardDraft, errors: &mut Vec<String>) {
    let overview = &draft.overview;
    if is_blank(&overview.description) {
        errors.push("Description is required".to_string());
    }
    if overview.total_units.unwrap_or(0) == 0 {
        errors.push("Total units must be greater than zero".to_string());
    }
}

fn unit_type_rules(draft: &WizardDraft, errors: &mut Vec<String>) {
    if draft.unit_types.is_empty() {
        errors.push("At least one unit type is required".to_string());
        return;
    }

    for (index, unit) in draft.unit_types.iter().enumerate() {
        let position = index + 1;
        if is_blank(&unit.name) {
            errors.push(format!("Unit type {position}: name is required"));
        }
        if unit.price_from == 0 {
            errors.push(format!(
                "Unit type {position}: starting price must be greater than zero"
            ));
        }
        if let Some(price_to) = unit.price_to {
            if price_to < unit.price_from {
                errors.push(format!(
                    "Unit type {position}: maximum price cannot be below starting price"
                ));
            }
        }
    }
}

fn finalisation_rules(draft: &WizardDraft, errors: &mut Vec<String>) {
    let finalisation = &draft.finalisation;
    if is_blank(&finalisation.contact_name) {
        errors.push("Contact name is required".to_string());
    }
    if is_blank(&finalisation.contact_email) {
        errors.push("Contact email is required".to_string());
    } else if !looks_like_email(finalisation.contact_email.trim()) {
        errors.push("Contact email is invalid".to_string());
    }
    if !finalisation.terms_accepted {
        errors.push("Terms must be accepted".to_string());
    }
    if draft.identity.media.primary().is_none() {
        errors.push("A primary image is required".to_string());
    }
}

fn looks_like_email(value: &str) -> bool {
    let mut parts = value.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !value.contains(char::is_whitespace)
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        _ => false,
    }
}
