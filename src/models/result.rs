//! Settlement record model
//!
//! Exactly one immutable result row is written per finalized session.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Why a session was finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "finalization_reason", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FinalizationReason {
    /// Both participants used all their rounds
    RoundsExhausted,
    /// Time ran out with a standing leader
    Expired,
    /// The trailing participant withdrew
    Withdrawal,
}

impl fmt::Display for FinalizationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FinalizationReason::RoundsExhausted => "rounds_exhausted",
            FinalizationReason::Expired => "expired",
            FinalizationReason::Withdrawal => "withdrawal",
        };
        write!(f, "{}", s)
    }
}

/// Immutable settlement record for a finalized session
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BiddingResult {
    pub id: Uuid,
    pub session_id: Uuid,
    pub winner_user_id: Uuid,
    pub loser_user_id: Uuid,
    pub winning_bid_amount: Decimal,
    pub loser_compensation_amount: Decimal,
    pub platform_revenue: Decimal,
    pub reason: FinalizationReason,
    pub finalized_at: DateTime<Utc>,
}
