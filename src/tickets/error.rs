use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde::Serialize;

use super::models::{CategoryId, UserId};
use crate::security::validation::ValidationResult;

pub type HelpdeskResult<T> = Result<T, HelpdeskError>;

#[derive(Debug, thiserror::Error)]
pub enum HelpdeskError {
    #[error("Validation failed: {0}")]
    Validation(ValidationResult),
    #[error("Agent {agent_id} cannot be assigned to tickets in category {category_id}")]
    InvalidAgent {
        agent_id: UserId,
        category_id: CategoryId,
    },
    #[error("Category {category_id} has no agent to assign the ticket to")]
    NoEligibleAgent { category_id: CategoryId },
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("Connection error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HelpdeskError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidAgent { .. } => StatusCode::BAD_REQUEST,
            Self::NoEligibleAgent { .. } => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Database(_) | Self::Pool(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ValidationResult> for HelpdeskError {
    fn from(result: ValidationResult) -> Self {
        Self::Validation(result)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SafeErrorResponse {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl SafeErrorResponse {
    /// User-facing kinds keep their message; storage failures are logged in
    /// full and replaced by a generic text.
    pub fn from_error(err: &HelpdeskError) -> Self {
        match err {
            HelpdeskError::Validation(result) => Self {
                error: "validation_error",
                message: "The submitted ticket is invalid".to_string(),
                details: result.to_error_messages(),
            },
            HelpdeskError::InvalidAgent { .. } => Self::plain("invalid_agent", err.to_string()),
            HelpdeskError::NoEligibleAgent { .. } => {
                Self::plain("no_eligible_agent", err.to_string())
            }
            HelpdeskError::Forbidden(_) => {
                Self::plain("forbidden", "You are not permitted to do this".to_string())
            }
            HelpdeskError::NotFound { .. } => {
                Self::plain("not_found", "The requested resource is missing".to_string())
            }
            HelpdeskError::Unauthenticated => Self::plain("unauthorized", err.to_string()),
            HelpdeskError::Database(_) | HelpdeskError::Pool(_) | HelpdeskError::Internal(_) => {
                error!("Helpdesk request failed: {}", err);
                Self::plain("internal_error", "An internal error occurred".to_string())
            }
        }
    }

    fn plain(error: &'static str, message: String) -> Self {
        Self {
            error,
            message,
            details: Vec::new(),
        }
    }
}

impl IntoResponse for HelpdeskError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(SafeErrorResponse::from_error(&self))).into_response()
    }
}
