//! Bidding engine types and errors

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Bid, SessionStatus};

/// Engine configuration knobs, loaded from `AppConfig` at startup
#[derive(Debug, Clone)]
pub struct BiddingConfig {
    /// Absolute platform floor for any bid
    pub minimum_bid_amount: Decimal,
    /// Absolute ceiling applied when a session has no current high bid
    pub maximum_bid_amount: Decimal,
    /// Loser compensation as a percent of the winning bid
    pub compensation_percent: Decimal,
    /// Target night must fall within this many days from now
    pub eligibility_window_days: i64,
    pub default_max_rounds: i32,
    pub default_round_duration_seconds: i64,
    pub default_minimum_increment_percent: Decimal,
}

impl Default for BiddingConfig {
    fn default() -> Self {
        Self {
            minimum_bid_amount: Decimal::new(5000, 2),    // $50.00
            maximum_bid_amount: Decimal::new(1000000, 2), // $10,000.00
            compensation_percent: Decimal::from(super::calculators::DEFAULT_COMPENSATION_PERCENT),
            eligibility_window_days: 30,
            default_max_rounds: 3,
            default_round_duration_seconds: 3600,
            default_minimum_increment_percent: Decimal::from(
                super::calculators::DEFAULT_MINIMUM_INCREMENT_PERCENT,
            ),
        }
    }
}

/// Outcome of `validate_bid`. Errors accumulate; a bid is valid only when
/// the list is empty. The suggested bid is advisory UI guidance, never a
/// validity rule.
#[derive(Debug, Clone, Serialize)]
pub struct BidValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub minimum_next_bid: Decimal,
    pub maximum_allowed: Decimal,
    pub suggested_bid: Decimal,
}

/// Outcome of the eligibility check for opening a session
#[derive(Debug, Clone, Serialize)]
pub struct EligibilityCheck {
    pub eligible: bool,
    pub reasons: Vec<String>,
}

/// Synthesized counter-bid computed by `process_auto_bid`
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AutoBidCounter {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub previous_high_bid: Decimal,
}

/// Outcome of `process_auto_bid`
#[derive(Debug, Clone, Serialize)]
pub struct AutoBidDecision {
    pub triggered: bool,
    pub counter: Option<AutoBidCounter>,
    pub reason: String,
}

/// Winner/loser settlement figures computed by `determine_winner`
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SessionOutcome {
    pub winner_user_id: Uuid,
    pub loser_user_id: Uuid,
    pub winning_bid_amount: Decimal,
    pub loser_compensation: Decimal,
    pub platform_revenue: Decimal,
}

/// Result of a successful `place_bid` call
#[derive(Debug, Clone, Serialize)]
pub struct PlaceBidOutcome {
    pub bid: Bid,
    /// Proxy counter-bid fired within the same critical section, if any
    pub auto_bid: Option<Bid>,
    pub new_high_bidder: Uuid,
    pub finalized: bool,
}

/// Bidding engine errors. The service layer is the sole thrower; rules and
/// calculators stay pure and report through their return values.
#[derive(Debug, thiserror::Error)]
pub enum BiddingError {
    #[error("Bidding session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("User {user_id} is not a participant in session {session_id}")]
    NotAParticipant { session_id: Uuid, user_id: Uuid },

    #[error("Session {session_id} is not active (status: {status})")]
    SessionNotActive {
        session_id: Uuid,
        status: SessionStatus,
    },

    #[error("Bidding window for session {0} has expired")]
    SessionExpired(Uuid),

    #[error("Bid rejected: {}", .validation.errors.join("; "))]
    BidRejected { validation: BidValidation },

    #[error("Bidding eligibility check failed: {}", .0.reasons.join("; "))]
    NotEligible(EligibilityCheck),

    #[error("An active session already exists for property {property_id} on {target_night}")]
    SessionConflict {
        property_id: Uuid,
        target_night: NaiveDate,
    },

    #[error("{0}")]
    InvalidRequest(String),

    #[error("The current high bidder cannot withdraw from session {0}")]
    CannotWithdrawAsLeader(Uuid),

    #[error("Cannot settle session {0}: no bids were placed")]
    NoBidsToSettle(Uuid),

    #[error("Session {session_id} has {found} participants, expected 2")]
    WrongParticipantCount { session_id: Uuid, found: usize },

    #[error("Session {0} has already been finalized")]
    AlreadyFinalized(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
