use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::wizard::{PersistenceError, WizardError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Wizard(WizardError),
    Persistence(PersistenceError),
    DraftNotFound(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Wizard(WizardError::DraftPublished) => StatusCode::CONFLICT,
            AppError::Wizard(WizardError::PhaseOutOfRange(_)) => StatusCode::BAD_REQUEST,
            AppError::Wizard(WizardError::UnitTypeNotFound(_)) | AppError::DraftNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::Wizard(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Persistence(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Wizard(err) => write!(f, "wizard error: {}", err),
            AppError::Persistence(err) => write!(f, "persistence error: {}", err),
            AppError::DraftNotFound(id) => write!(f, "draft {} not found", id),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Wizard(err) => Some(err),
            AppError::Persistence(err) => Some(err),
            AppError::DraftNotFound(_) => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Wizard(WizardError::PhaseIncomplete { phase, errors }) => json!({
                "error": self.to_string(),
                "phase": phase.number(),
                "errors": errors,
            }),
            AppError::Wizard(WizardError::NotPublishable { failures }) => {
                let phases: serde_json::Map<String, serde_json::Value> = failures
                    .iter()
                    .map(|(phase, errors)| (phase.number().to_string(), json!(errors)))
                    .collect();
                json!({ "error": self.to_string(), "phases": phases })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<WizardError> for AppError {
    fn from(value: WizardError) -> Self {
        Self::Wizard(value)
    }
}

impl From<PersistenceError> for AppError {
    fn from(value: PersistenceError) -> Self {
        Self::Persistence(value)
    }
}
