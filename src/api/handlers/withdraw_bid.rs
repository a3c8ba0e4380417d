//! Withdraw-bid endpoint
//!
//! POST /api/v1/bidding/withdraw-bid — concede an active bidding session or
//! query withdrawal state.

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{error_response, ok, ApiResult};
use crate::auth::middleware::AuthUser;
use crate::models::SessionResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "snake_case")]
pub enum WithdrawBidAction {
    Withdraw {
        session_id: Uuid,
        #[serde(default)]
        reason: Option<String>,
    },
    GetWithdrawalStatus {
        session_id: Uuid,
    },
}

#[derive(Debug, Serialize)]
pub struct WithdrawData {
    pub session: SessionResponse,
    pub withdrawn_user_id: Uuid,
}

pub async fn withdraw_bid(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<WithdrawBidAction>,
) -> ApiResult {
    let service = &state.bidding_service;

    match req {
        WithdrawBidAction::Withdraw { session_id, reason } => {
            let session = service
                .withdraw_from_session(session_id, auth_user.user_id, reason)
                .await
                .map_err(error_response)?;
            ok(WithdrawData {
                session: session.into(),
                withdrawn_user_id: auth_user.user_id,
            })
        }
        WithdrawBidAction::GetWithdrawalStatus { session_id } => {
            let status = service
                .get_withdrawal_status(session_id, auth_user.user_id)
                .await
                .map_err(error_response)?;
            ok(status)
        }
    }
}
