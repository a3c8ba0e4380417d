//! Bid model
//!
//! Bids are append-only placement events. Ordering within a session uses a
//! monotonic sequence number assigned inside the placement critical section,
//! not wall-clock time. Rejected bids are never persisted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One immutable bid placement event
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bid {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub round_number: i32,
    /// Monotonic per-session ordering, assigned under the session lock
    pub sequence: i64,

    /// True for system-generated proxy bids
    pub is_auto_bid: bool,
    pub previous_high_bid: Decimal,
    pub increment_amount: Decimal,
    pub increment_percent: Decimal,

    pub placed_at: DateTime<Utc>,
}

/// Bid view returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct BidResponse {
    pub bid_id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub round_number: i32,
    pub sequence: i64,
    pub is_auto_bid: bool,
    pub previous_high_bid: Decimal,
    pub increment_amount: Decimal,
    pub increment_percent: Decimal,
    pub placed_at: DateTime<Utc>,
}

impl From<Bid> for BidResponse {
    fn from(b: Bid) -> Self {
        Self {
            bid_id: b.id,
            session_id: b.session_id,
            user_id: b.user_id,
            amount: b.amount,
            round_number: b.round_number,
            sequence: b.sequence,
            is_auto_bid: b.is_auto_bid,
            previous_high_bid: b.previous_high_bid,
            increment_amount: b.increment_amount,
            increment_percent: b.increment_percent,
            placed_at: b.placed_at,
        }
    }
}
