use crate::infra::{AppState, DraftSessions, DraftView};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post, put};
use axum::{Extension, Json, Router};
use development_wizard::error::AppError;
use development_wizard::wizard::{
    AutoSaveState, ClassificationPatch, FinalisationPatch, IdentityPatch, LocationPatch, MediaId,
    NewMedia, OverviewPatch, PersistenceError, PhaseValidation, SaveStatus, UnitTypeInput,
    WizardError, WizardSession,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize)]
pub(crate) struct PhaseRequest {
    pub(crate) phase: u8,
}

#[derive(Debug, Serialize)]
pub(crate) struct MediaAdded {
    pub(crate) media_id: MediaId,
    #[serde(flatten)]
    pub(crate) view: DraftView,
}

/// Draft endpoints plus health, readiness and metrics.
pub(crate) fn with_draft_routes(sessions: DraftSessions) -> Router {
    draft_router(sessions)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) fn draft_router(sessions: DraftSessions) -> Router {
    Router::new()
        .route("/api/v1/drafts", post(create_draft))
        .route(
            "/api/v1/drafts/:draft_id",
            get(get_draft).delete(delete_draft),
        )
        .route("/api/v1/drafts/:draft_id/identity", patch(patch_identity))
        .route("/api/v1/drafts/:draft_id/location", patch(patch_location))
        .route(
            "/api/v1/drafts/:draft_id/classification",
            patch(patch_classification),
        )
        .route("/api/v1/drafts/:draft_id/overview", patch(patch_overview))
        .route(
            "/api/v1/drafts/:draft_id/finalisation",
            patch(patch_finalisation),
        )
        .route("/api/v1/drafts/:draft_id/unit-types", put(put_unit_types))
        .route("/api/v1/drafts/:draft_id/media", post(add_media))
        .route(
            "/api/v1/drafts/:draft_id/media/:media_id",
            axum::routing::delete(remove_media),
        )
        .route(
            "/api/v1/drafts/:draft_id/media/:media_id/primary",
            post(set_primary_image),
        )
        .route("/api/v1/drafts/:draft_id/phase", post(go_to_phase))
        .route("/api/v1/drafts/:draft_id/advance", post(advance))
        .route(
            "/api/v1/drafts/:draft_id/validation/:phase",
            get(validate_phase),
        )
        .route("/api/v1/drafts/:draft_id/save", post(save_draft))
        .route("/api/v1/drafts/:draft_id/reset", post(reset_draft))
        .route("/api/v1/drafts/:draft_id/publish", post(publish_draft))
        .with_state(sessions)
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Locks the session, applies one mutation and renders the resulting draft.
async fn edit<F>(
    sessions: &DraftSessions,
    draft_id: &str,
    apply: F,
) -> Result<Json<DraftView>, AppError>
where
    F: FnOnce(&mut WizardSession) -> Result<(), WizardError> + Send,
{
    let (id, session) = sessions.get(draft_id)?;
    let mut session = session.lock().await;
    apply(&mut *session)?;
    Ok(Json(sessions.view(&id, &session)))
}

pub(crate) async fn create_draft(State(sessions): State<DraftSessions>) -> impl IntoResponse {
    let (id, session) = sessions.open();
    let session = session.lock().await;
    (StatusCode::CREATED, Json(sessions.view(&id, &session)))
}

pub(crate) async fn get_draft(
    State(sessions): State<DraftSessions>,
    Path(draft_id): Path<String>,
) -> Result<Json<DraftView>, AppError> {
    let (id, session) = sessions.get(&draft_id)?;
    let session = session.lock().await;
    Ok(Json(sessions.view(&id, &session)))
}

pub(crate) async fn delete_draft(
    State(sessions): State<DraftSessions>,
    Path(draft_id): Path<String>,
) -> Result<StatusCode, AppError> {
    sessions.close(&draft_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn patch_identity(
    State(sessions): State<DraftSessions>,
    Path(draft_id): Path<String>,
    Json(patch): Json<IdentityPatch>,
) -> Result<Json<DraftView>, AppError> {
    edit(&sessions, &draft_id, |session| session.set_identity(patch)).await
}

pub(crate) async fn patch_location(
    State(sessions): State<DraftSessions>,
    Path(draft_id): Path<String>,
    Json(patch): Json<LocationPatch>,
) -> Result<Json<DraftView>, AppError> {
    edit(&sessions, &draft_id, |session| session.set_location(patch)).await
}

pub(crate) async fn patch_classification(
    State(sessions): State<DraftSessions>,
    Path(draft_id): Path<String>,
    Json(patch): Json<ClassificationPatch>,
) -> Result<Json<DraftView>, AppError> {
    edit(&sessions, &draft_id, |session| {
        session.set_classification(patch)
    })
    .await
}

pub(crate) async fn patch_overview(
    State(sessions): State<DraftSessions>,
    Path(draft_id): Path<String>,
    Json(patch): Json<OverviewPatch>,
) -> Result<Json<DraftView>, AppError> {
    edit(&sessions, &draft_id, |session| session.set_overview(patch)).await
}

pub(crate) async fn patch_finalisation(
    State(sessions): State<DraftSessions>,
    Path(draft_id): Path<String>,
    Json(patch): Json<FinalisationPatch>,
) -> Result<Json<DraftView>, AppError> {
    edit(&sessions, &draft_id, |session| {
        session.set_finalisation(patch)
    })
    .await
}

pub(crate) async fn put_unit_types(
    State(sessions): State<DraftSessions>,
    Path(draft_id): Path<String>,
    Json(inputs): Json<Vec<UnitTypeInput>>,
) -> Result<Json<DraftView>, AppError> {
    edit(&sessions, &draft_id, |session| {
        session.set_unit_types(inputs).map(|_| ())
    })
    .await
}

pub(crate) async fn add_media(
    State(sessions): State<DraftSessions>,
    Path(draft_id): Path<String>,
    Json(media): Json<NewMedia>,
) -> Result<impl IntoResponse, AppError> {
    let (id, session) = sessions.get(&draft_id)?;
    let mut session = session.lock().await;
    let media_id = session.add_media(media)?;
    let body = MediaAdded {
        media_id,
        view: sessions.view(&id, &session),
    };
    Ok((StatusCode::CREATED, Json(body)))
}

/// Unknown media ids are a no-op, so both media endpoints answer with the draft.
pub(crate) async fn remove_media(
    State(sessions): State<DraftSessions>,
    Path((draft_id, media_id)): Path<(String, String)>,
) -> Result<Json<DraftView>, AppError> {
    edit(&sessions, &draft_id, |session| {
        session.remove_media(&MediaId(media_id)).map(|_| ())
    })
    .await
}

pub(crate) async fn set_primary_image(
    State(sessions): State<DraftSessions>,
    Path((draft_id, media_id)): Path<(String, String)>,
) -> Result<Json<DraftView>, AppError> {
    edit(&sessions, &draft_id, |session| {
        session.set_primary_image(&MediaId(media_id)).map(|_| ())
    })
    .await
}

pub(crate) async fn go_to_phase(
    State(sessions): State<DraftSessions>,
    Path(draft_id): Path<String>,
    Json(request): Json<PhaseRequest>,
) -> Result<Json<DraftView>, AppError> {
    edit(&sessions, &draft_id, |session| {
        session.go_to(request.phase).map(|_| ())
    })
    .await
}

pub(crate) async fn advance(
    State(sessions): State<DraftSessions>,
    Path(draft_id): Path<String>,
) -> Result<Json<DraftView>, AppError> {
    edit(&sessions, &draft_id, |session| {
        session.advance().map(|_| ())
    })
    .await
}

pub(crate) async fn validate_phase(
    State(sessions): State<DraftSessions>,
    Path((draft_id, phase)): Path<(String, u8)>,
) -> Result<Json<PhaseValidation>, AppError> {
    let (_, session) = sessions.get(&draft_id)?;
    let session = session.lock().await;
    Ok(Json(session.validate(phase)))
}

pub(crate) async fn save_draft(
    State(sessions): State<DraftSessions>,
    Path(draft_id): Path<String>,
) -> Result<Json<AutoSaveState>, AppError> {
    let (id, session) = sessions.get(&draft_id)?;
    let session = session.lock().await;
    let state = session.save_now().await;
    if state.status == SaveStatus::Error {
        let reason = format!("draft {id} could not be saved");
        return Err(PersistenceError::Unavailable(reason).into());
    }
    Ok(Json(state))
}

pub(crate) async fn reset_draft(
    State(sessions): State<DraftSessions>,
    Path(draft_id): Path<String>,
) -> Result<Json<DraftView>, AppError> {
    edit(&sessions, &draft_id, |session| {
        session.reset();
        Ok(())
    })
    .await
}

pub(crate) async fn publish_draft(
    State(sessions): State<DraftSessions>,
    Path(draft_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (id, session) = sessions.get(&draft_id)?;
    let mut session = session.lock().await;
    let published = session.publish()?;
    let record = sessions.repository().record_published(&id, published);
    Ok((StatusCode::OK, Json(record)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::InMemoryDraftRepository;
    use axum::body::Body;
    use axum::http::Request;
    use axum::response::Response;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    fn sessions() -> DraftSessions {
        DraftSessions::new(InMemoryDraftRepository::default(), Duration::from_secs(60))
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds")
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request builds")
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response: Response = app
            .clone()
            .oneshot(request)
            .await
            .expect("router responds");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }

    async fn create(app: &Router) -> String {
        let (status, body) = send(app, empty_request("POST", "/api/v1/drafts")).await;
        assert_eq!(status, StatusCode::CREATED);
        body["draft_id"].as_str().expect("draft id").to_string()
    }

    #[tokio::test]
    async fn healthcheck_returns_ok() {
        let app = with_draft_routes(sessions());
        let (status, body) = send(&app, empty_request("GET", "/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn new_drafts_start_on_the_first_phase() {
        let app = draft_router(sessions());
        let id = create(&app).await;

        let uri = format!("/api/v1/drafts/{id}");
        let (status, body) = send(&app, empty_request("GET", &uri)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["current_phase"], 1);
        assert_eq!(body["autosave"]["status"], "unsaved");
        assert!(body["saved_revision"].is_null());
        assert_eq!(body["draft"]["is_published"], false);
    }

    #[tokio::test]
    async fn patches_merge_into_the_draft() {
        let app = draft_router(sessions());
        let id = create(&app).await;

        send(
            &app,
            json_request(
                "PATCH",
                &format!("/api/v1/drafts/{id}/identity"),
                json!({ "name": "Harbour View" }),
            ),
        )
        .await;
        let (status, body) = send(
            &app,
            json_request(
                "PATCH",
                &format!("/api/v1/drafts/{id}/location"),
                json!({ "address": "12 Dock Road", "city": "Cape Town" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["draft"]["identity"]["name"], "Harbour View");
        assert_eq!(body["draft"]["identity"]["location"]["city"], "Cape Town");
        assert_eq!(body["revision"], 2);
    }

    #[tokio::test]
    async fn advancing_an_incomplete_phase_lists_the_errors() {
        let app = draft_router(sessions());
        let id = create(&app).await;

        let uri = format!("/api/v1/drafts/{id}/advance");
        let (status, body) = send(&app, empty_request("POST", &uri)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["phase"], 1);
        assert_eq!(
            body["errors"],
            json!(["Development name is required", "Address is required"])
        );
    }

    #[tokio::test]
    async fn phase_numbers_outside_the_wizard_are_rejected() {
        let app = draft_router(sessions());
        let id = create(&app).await;

        let uri = format!("/api/v1/drafts/{id}/phase");
        let (status, _) = send(&app, json_request("POST", &uri, json!({ "phase": 7 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/v1/drafts/{id}/validation/9");
        let (status, body) = send(&app, empty_request("GET", &uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_valid"], false);
        assert_eq!(body["errors"], json!(["Invalid phase: 9"]));
    }

    #[tokio::test]
    async fn first_upload_becomes_primary_and_can_be_switched() {
        let app = draft_router(sessions());
        let id = create(&app).await;
        let upload = |url: &str| {
            json_request(
                "POST",
                &format!("/api/v1/drafts/{id}/media"),
                json!({ "url": url, "media_type": "image", "category": "exterior" }),
            )
        };

        let (status, first) = send(&app, upload("a.jpg")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first["media_id"], "media-0001");
        assert_eq!(first["draft_id"], id.as_str());
        assert_eq!(first["revision"], 1);
        let hero = &first["draft"]["identity"]["media"]["hero_image"];
        assert_eq!(hero["is_primary"], true);
        let (_, second) = send(&app, upload("b.jpg")).await;
        let second_id = second["media_id"].as_str().expect("media id").to_string();

        let uri = format!("/api/v1/drafts/{id}/media/{second_id}/primary");
        let (status, body) = send(&app, empty_request("POST", &uri)).await;

        assert_eq!(status, StatusCode::OK);
        let media = &body["draft"]["identity"]["media"];
        assert_eq!(media["hero_image"]["is_primary"], false);
        assert_eq!(media["photos"][0]["is_primary"], true);
    }

    #[tokio::test]
    async fn manual_save_persists_the_draft() {
        let sessions = sessions();
        let app = draft_router(sessions.clone());
        let id = create(&app).await;
        send(
            &app,
            json_request(
                "PATCH",
                &format!("/api/v1/drafts/{id}/identity"),
                json!({ "name": "Oak Lane" }),
            ),
        )
        .await;

        let uri = format!("/api/v1/drafts/{id}/save");
        let (status, body) = send(&app, empty_request("POST", &uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "saved");

        let (_, view) = send(&app, empty_request("GET", &format!("/api/v1/drafts/{id}"))).await;
        assert_eq!(view["saved_revision"], 1);
    }

    #[tokio::test]
    async fn failed_manual_save_is_a_bad_gateway() {
        let sessions = DraftSessions::new(
            InMemoryDraftRepository::failing_first(1),
            Duration::from_secs(60),
        );
        let app = draft_router(sessions);
        let id = create(&app).await;

        let uri = format!("/api/v1/drafts/{id}/save");
        let (status, body) = send(&app, empty_request("POST", &uri)).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let message = body["error"].as_str().expect("error message");
        assert!(message.contains("could not be saved"));
    }

    #[tokio::test]
    async fn publishing_an_empty_draft_reports_every_phase() {
        let app = draft_router(sessions());
        let id = create(&app).await;

        let uri = format!("/api/v1/drafts/{id}/publish");
        let (status, body) = send(&app, empty_request("POST", &uri)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let phases = body["phases"].as_object().expect("phase map");
        assert_eq!(phases.len(), 5);
        let finalisation = phases["5"].as_array().expect("finalisation errors");
        assert!(finalisation.contains(&json!("A primary image is required")));
    }

    #[tokio::test]
    async fn complete_draft_publishes_and_resets() {
        let sessions = sessions();
        let app = draft_router(sessions.clone());
        let id = create(&app).await;
        let base = format!("/api/v1/drafts/{id}");

        let edits = [
            ("PATCH", "identity", json!({ "name": "Harbour View" })),
            ("PATCH", "location", json!({ "address": "12 Dock Road" })),
            (
                "PATCH",
                "classification",
                json!({
                    "development_type": "residential",
                    "ownership": "sectional_title",
                    "status": "launching"
                }),
            ),
            (
                "PATCH",
                "overview",
                json!({ "description": "Marina apartments", "total_units": 64 }),
            ),
            (
                "PUT",
                "unit-types",
                json!([{
                    "name": "Two Bedroom",
                    "bedrooms": 2,
                    "bathrooms": 2.0,
                    "price_from": 2450000
                }]),
            ),
            (
                "PATCH",
                "finalisation",
                json!({
                    "contact_name": "Harbour Sales",
                    "contact_email": "sales@harbourview.co.za",
                    "terms_accepted": true
                }),
            ),
            (
                "POST",
                "media",
                json!({ "url": "hero.jpg", "media_type": "image", "category": "aerial" }),
            ),
        ];
        for (method, path, body) in edits {
            let (status, response) =
                send(&app, json_request(method, &format!("{base}/{path}"), body)).await;
            assert!(status.is_success(), "{path} failed: {response}");
        }

        let (status, body) = send(&app, empty_request("POST", &format!("{base}/publish"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["draft"]["is_published"], true);
        assert_eq!(body["draft_id"], id.as_str());

        let published = sessions.repository().published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].draft.identity.name, "Harbour View");

        let (_, view) = send(&app, empty_request("GET", &base)).await;
        assert_eq!(view["draft"]["identity"]["name"], "");
        assert_eq!(view["current_phase"], 1);
    }

    #[tokio::test]
    async fn deleted_drafts_are_gone() {
        let app = draft_router(sessions());
        let id = create(&app).await;

        let uri = format!("/api/v1/drafts/{id}");
        let (status, _) = send(&app, empty_request("DELETE", &uri)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, empty_request("GET", &uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], format!("draft {id} not found"));
    }
}
