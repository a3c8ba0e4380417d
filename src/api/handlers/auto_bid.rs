//! Auto-bid endpoint
//!
//! POST /api/v1/bidding/set-auto-bid — manage the caller's proxy-bid ceiling
//! for an active session.

use axum::{extract::State, Extension, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{error_response, ok, ApiResult};
use crate::auth::middleware::AuthUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "snake_case")]
pub enum AutoBidAction {
    Set { session_id: Uuid, max_amount: Decimal },
    Get { session_id: Uuid },
    Clear { session_id: Uuid },
}

pub async fn set_auto_bid(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<AutoBidAction>,
) -> ApiResult {
    let service = &state.bidding_service;

    match req {
        AutoBidAction::Set {
            session_id,
            max_amount,
        } => {
            let settings = service
                .set_max_auto_bid(session_id, auth_user.user_id, max_amount)
                .await
                .map_err(error_response)?;
            ok(settings)
        }
        AutoBidAction::Get { session_id } => {
            let settings = service
                .get_auto_bid_settings(session_id, auth_user.user_id)
                .await
                .map_err(error_response)?;
            ok(settings)
        }
        AutoBidAction::Clear { session_id } => {
            let settings = service
                .clear_auto_bid(session_id, auth_user.user_id)
                .await
                .map_err(error_response)?;
            ok(settings)
        }
    }
}
