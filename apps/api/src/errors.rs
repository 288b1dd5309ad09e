#![allow(dead_code)]

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Entitlement denials are NOT errors: the check endpoint answers them
/// with a decision body carrying a price or a register-to-continue
/// resolution. Only verification failures and infrastructure outages
/// surface here. Store outages fail closed: deny with a generic retry
/// message, never guess a free or unlimited grant.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("No payment found for reference {0}")]
    PaymentNotFound(String),

    #[error("Payment {reference} has not succeeded (status: {status})")]
    PaymentNotSucceeded { reference: String, status: String },

    #[error("Payment could not be verified: {0}")]
    PaymentUnverifiable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::PaymentNotFound(reference) => (
                StatusCode::NOT_FOUND,
                "PAYMENT_NOT_FOUND",
                format!("No payment was found for reference {reference}. Please retry checkout."),
            ),
            AppError::PaymentNotSucceeded { reference, .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "PAYMENT_NOT_SUCCEEDED",
                format!("Payment {reference} has not completed. Please retry checkout."),
            ),
            AppError::PaymentUnverifiable(msg) => {
                tracing::error!("Payment verification failed: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "PAYMENT_UNVERIFIABLE",
                    "The payment could not be verified. Please try again.".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_UNAVAILABLE",
                    "The service is temporarily unavailable. Please try again.".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
