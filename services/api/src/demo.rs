use crate::infra::{DraftSessions, InMemoryDraftRepository};
use chrono::NaiveDate;
use clap::Args;
use development_wizard::error::AppError;
use development_wizard::wizard::{
    AutoSaveState, ClassificationPatch, DevelopmentStatus, DevelopmentType, FinalisationPatch,
    IdentityPatch, LocationPatch, MediaType, NewMedia, OverviewPatch, OwnershipType, SaveStatus,
    UnitTypeInput, WizardError, WizardSession,
};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Quiet period before a change is auto-saved, in milliseconds.
    #[arg(long, default_value_t = 250)]
    pub(crate) quiet_period_ms: u64,
    /// Make the first save fail to show the error status and a manual retry.
    #[arg(long)]
    pub(crate) fail_first_save: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        quiet_period_ms,
        fail_first_save,
    } = args;

    let quiet_period = Duration::from_millis(quiet_period_ms.max(1));
    let repository = if fail_first_save {
        InMemoryDraftRepository::failing_first(1)
    } else {
        InMemoryDraftRepository::default()
    };
    let sessions = DraftSessions::new(repository.clone(), quiet_period);
    let (draft_id, shared) = sessions.open();
    let mut session = shared.lock().await;

    println!(
        "Development wizard demo ({draft_id}, auto-save after {} ms idle)",
        quiet_period.as_millis()
    );
    let watcher = watch_autosave(session.subscribe());

    let empty = session.validate(1);
    println!("\nIdentity checks on an empty draft:");
    print_errors(&empty.errors);

    println!("\nCapturing identity (typed in bursts, saved once)");
    for partial in ["Harbour", "Harbour View", "Harbour View Residences"] {
        session.set_identity(IdentityPatch {
            name: Some(partial.to_string()),
            ..IdentityPatch::default()
        })?;
    }
    session.set_location(LocationPatch {
        address: Some("12 Dock Road".to_string()),
        city: Some("Cape Town".to_string()),
        province: Some("Western Cape".to_string()),
        latitude: Some(-33.9036),
        longitude: Some(18.4207),
    })?;
    let hero = session.add_media(NewMedia {
        file_handle: Some("uploads/harbour-aerial.jpg".to_string()),
        url: "https://cdn.example.test/harbour-aerial.jpg".to_string(),
        media_type: MediaType::Image,
        category: "aerial".to_string(),
        as_hero: true,
    })?;
    println!("- uploaded {hero} as the hero image");
    settle(quiet_period).await;
    retry_if_failed(&session).await;
    advance(&mut session)?;

    println!("\nTrying to skip classification");
    advance(&mut session)?;
    session.set_classification(ClassificationPatch {
        development_type: Some(DevelopmentType::MixedUse),
        ownership: Some(OwnershipType::SectionalTitle),
        status: Some(DevelopmentStatus::Launching),
    })?;
    advance(&mut session)?;

    session.set_overview(OverviewPatch {
        description: Some("Waterfront apartments and retail above the marina.".to_string()),
        highlights: Some(vec!["Marina views".to_string(), "Retail podium".to_string()]),
        amenities: Some(vec!["Gym".to_string(), "Rooftop pool".to_string()]),
        total_units: Some(64),
        expected_completion: NaiveDate::from_ymd_opt(2027, 6, 30),
    })?;
    advance(&mut session)?;

    session.set_unit_types(vec![
        UnitTypeInput {
            name: "One Bedroom".to_string(),
            bedrooms: 1,
            bathrooms: 1.0,
            floor_size_m2: Some(52),
            price_from: 1_650_000,
            price_to: Some(1_850_000),
            available_units: 28,
        },
        UnitTypeInput {
            name: "Two Bedroom".to_string(),
            bedrooms: 2,
            bathrooms: 2.0,
            floor_size_m2: Some(86),
            price_from: 2_450_000,
            price_to: Some(2_900_000),
            available_units: 36,
        },
    ])?;
    advance(&mut session)?;

    session.set_finalisation(FinalisationPatch {
        contact_name: Some("Harbour Sales Office".to_string()),
        contact_email: Some("sales@harbourview.example".to_string()),
        contact_phone: Some("+27 21 555 0100".to_string()),
        marketing_headline: Some("Live above the marina".to_string()),
        terms_accepted: Some(true),
    })?;
    settle(quiet_period).await;
    retry_if_failed(&session).await;

    if let Some(stored) = repository.fetch(&draft_id) {
        println!(
            "- last saved copy: revision {} of {}",
            stored.revision,
            session.store().revision()
        );
    }

    let published = match session.publish() {
        Ok(draft) => draft,
        Err(WizardError::NotPublishable { failures }) => {
            println!("\nPublish blocked:");
            for (phase, errors) in &failures {
                println!("  {phase}");
                print_errors(errors);
            }
            return Ok(());
        }
        Err(other) => return Err(other.into()),
    };
    let record = repository.record_published(&draft_id, published);
    println!("\nPublished listing:");
    match serde_json::to_string_pretty(&record) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("  Published payload unavailable: {err}"),
    }
    println!(
        "Published listings on record: {}",
        repository.published().len()
    );

    drop(session);
    drop(shared);
    sessions.close(&draft_id.0)?;
    let _ = tokio::time::timeout(Duration::from_millis(100), watcher).await;
    Ok(())
}

fn watch_autosave(mut updates: watch::Receiver<AutoSaveState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            match state.last_saved_at {
                Some(at) if state.status == SaveStatus::Saved => {
                    println!(
                        "  [auto-save] {} at {}",
                        state.status.label(),
                        at.format("%H:%M:%S%.3f")
                    );
                }
                _ => println!("  [auto-save] {}", state.status.label()),
            }
        }
    })
}

async fn settle(quiet_period: Duration) {
    tokio::time::sleep(quiet_period + Duration::from_millis(50)).await;
}

async fn retry_if_failed(session: &WizardSession) {
    if session.autosave_state().status != SaveStatus::Error {
        return;
    }
    println!("- auto-save failed, retrying by hand");
    let state = session.save_now().await;
    println!("- manual save: {}", state.status.label());
}

fn advance(session: &mut WizardSession) -> Result<(), AppError> {
    let from = session.current_phase();
    match session.advance() {
        Ok(to) if to == from => println!("- {from} is the last phase"),
        Ok(to) => println!("- {from} complete, moving to {to}"),
        Err(WizardError::PhaseIncomplete { phase, errors }) => {
            println!("- {phase} is not ready:");
            print_errors(&errors);
        }
        Err(other) => return Err(other.into()),
    }
    Ok(())
}

fn print_errors(errors: &[String]) {
    for error in errors {
        println!("    * {error}");
    }
}
