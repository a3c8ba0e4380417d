//! API handlers for the bidding engine
//!
//! Every endpoint speaks the `{action, payload}` envelope and answers with
//! `{"success": true, "data": ...}` or `{"success": false, "error": ...}`.

pub mod auto_bid;
pub mod submit_bid;
pub mod withdraw_bid;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::services::bidding::BiddingError;

// ============================================================================
// Response envelope
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    /// Structured context for errors a client can re-render, e.g. the full
    /// list of violated bid rules
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

pub type ApiResult = Result<Json<ApiResponse>, (StatusCode, Json<ApiResponse>)>;

/// Wrap a successful payload in the response envelope
pub fn ok<T: Serialize>(data: T) -> ApiResult {
    match serde_json::to_value(data) {
        Ok(value) => Ok(Json(ApiResponse {
            success: true,
            data: Some(value),
            error: None,
        })),
        Err(e) => {
            tracing::error!("Failed to serialize response payload: {}", e);
            Err(internal_error("Failed to serialize response"))
        }
    }
}

fn error(status: StatusCode, code: &str, message: String, details: Option<Value>) -> (StatusCode, Json<ApiResponse>) {
    (
        status,
        Json(ApiResponse {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: code.to_string(),
                message,
                details,
            }),
        }),
    )
}

fn internal_error(message: &str) -> (StatusCode, Json<ApiResponse>) {
    error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        message.to_string(),
        None,
    )
}

/// Map an engine error to an HTTP status, a stable machine code and a
/// human-readable message
pub fn error_response(e: BiddingError) -> (StatusCode, Json<ApiResponse>) {
    let message = e.to_string();
    match e {
        BiddingError::SessionNotFound(_) => {
            error(StatusCode::NOT_FOUND, "SESSION_NOT_FOUND", message, None)
        }
        BiddingError::UserNotFound(_) => {
            error(StatusCode::NOT_FOUND, "USER_NOT_FOUND", message, None)
        }
        BiddingError::NotAParticipant { .. } => {
            error(StatusCode::BAD_REQUEST, "NOT_A_PARTICIPANT", message, None)
        }
        BiddingError::SessionNotActive { .. } => {
            error(StatusCode::CONFLICT, "SESSION_NOT_ACTIVE", message, None)
        }
        BiddingError::SessionExpired(_) => {
            error(StatusCode::CONFLICT, "SESSION_EXPIRED", message, None)
        }
        BiddingError::BidRejected { validation } => error(
            StatusCode::BAD_REQUEST,
            "BID_REJECTED",
            message,
            serde_json::to_value(&validation).ok(),
        ),
        BiddingError::NotEligible(check) => error(
            StatusCode::BAD_REQUEST,
            "NOT_ELIGIBLE",
            message,
            Some(json!({ "reasons": check.reasons })),
        ),
        BiddingError::SessionConflict { .. } => {
            error(StatusCode::CONFLICT, "SESSION_CONFLICT", message, None)
        }
        BiddingError::InvalidRequest(_) | BiddingError::WrongParticipantCount { .. } => {
            error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message, None)
        }
        BiddingError::CannotWithdrawAsLeader(_) => error(
            StatusCode::CONFLICT,
            "CANNOT_WITHDRAW_AS_LEADER",
            message,
            None,
        ),
        BiddingError::NoBidsToSettle(_) => {
            error(StatusCode::CONFLICT, "NO_BIDS_TO_SETTLE", message, None)
        }
        BiddingError::AlreadyFinalized(_) => {
            error(StatusCode::CONFLICT, "ALREADY_FINALIZED", message, None)
        }
        BiddingError::Database(db_err) => {
            tracing::error!("Database error: {}", db_err);
            error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "DB_ERROR",
                "Internal database error".to_string(),
                None,
            )
        }
    }
}
