//! Submit-bid endpoint
//!
//! POST /api/v1/bidding/submit-bid — bid placement plus the session reads
//! and session creation that bidding clients need.

use axum::{extract::Path, extract::State, Extension, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{error_response, ok, ApiResult};
use crate::auth::middleware::AuthUser;
use crate::models::{BidResponse, CreateSessionRequest, ParticipantResponse, SessionResponse};
use crate::services::bidding::types::PlaceBidOutcome;
use crate::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "snake_case")]
pub enum SubmitBidAction {
    Submit {
        session_id: Uuid,
        amount: Decimal,
    },
    GetSession {
        session_id: Uuid,
    },
    GetBidHistory {
        session_id: Uuid,
    },
    CreateSession(CreateSessionRequest),
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelSessionRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SubmitBidData {
    pub bid: BidResponse,
    /// Proxy counter-bid fired in the same critical section, if any
    pub auto_bid: Option<BidResponse>,
    pub new_high_bidder: Uuid,
    pub finalized: bool,
}

impl From<PlaceBidOutcome> for SubmitBidData {
    fn from(o: PlaceBidOutcome) -> Self {
        Self {
            bid: o.bid.into(),
            auto_bid: o.auto_bid.map(Into::into),
            new_high_bidder: o.new_high_bidder,
            finalized: o.finalized,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionDetailData {
    pub session: SessionResponse,
    pub participants: Vec<ParticipantResponse>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn submit_bid(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<SubmitBidAction>,
) -> ApiResult {
    let service = &state.bidding_service;

    match req {
        SubmitBidAction::Submit { session_id, amount } => {
            let outcome = service
                .place_bid(session_id, auth_user.user_id, amount)
                .await
                .map_err(error_response)?;
            ok(SubmitBidData::from(outcome))
        }
        SubmitBidAction::GetSession { session_id } => {
            let session = service.get_session(session_id).await.map_err(error_response)?;
            let participants = service
                .get_participants(session_id)
                .await
                .map_err(error_response)?;
            ok(SessionDetailData {
                session: session.into(),
                participants: participants.iter().map(Into::into).collect(),
            })
        }
        SubmitBidAction::GetBidHistory { session_id } => {
            let bids = service
                .get_bid_history(session_id)
                .await
                .map_err(error_response)?;
            let bids: Vec<BidResponse> = bids.into_iter().map(Into::into).collect();
            ok(bids)
        }
        SubmitBidAction::CreateSession(request) => {
            let session = service
                .create_session(auth_user.user_id, request)
                .await
                .map_err(error_response)?;
            ok(SessionResponse::from(session))
        }
    }
}

/// Administrative session abort
/// POST /admin/bidding/sessions/:session_id/cancel
pub async fn cancel_session(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<CancelSessionRequest>,
) -> ApiResult {
    tracing::info!(
        "Admin {} cancelling bidding session {}",
        auth_user.user_id,
        session_id
    );

    let session = state
        .bidding_service
        .cancel_session(session_id, req.reason)
        .await
        .map_err(error_response)?;

    ok(SessionResponse::from(session))
}
