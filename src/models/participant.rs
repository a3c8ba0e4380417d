//! Bidding participant model
//!
//! Exactly two participants exist per session, created atomically with it.
//! Participants are never added or removed; setting the auto-bid ceiling to
//! zero signals withdrawal.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::user::UserArchetype;

/// One of the two contenders in a session
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BiddingParticipant {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub user_archetype: UserArchetype,

    /// Highest bid this participant has placed so far (0 before first bid)
    pub current_bid_amount: Decimal,
    /// Proxy-bid ceiling; None = no auto-bid, Some(0) = withdrawn
    pub max_auto_bid_amount: Option<Decimal>,
    pub last_bid_at: Option<DateTime<Utc>>,
    pub total_bids_placed: i32,

    // Settlement
    pub is_winner: bool,
    pub compensation_amount: Option<Decimal>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BiddingParticipant {
    /// A ceiling of exactly zero marks the participant as withdrawn
    pub fn has_withdrawn(&self) -> bool {
        self.max_auto_bid_amount == Some(Decimal::ZERO)
    }

    /// Active proxy ceiling, if one is set and not a withdrawal marker
    pub fn auto_bid_ceiling(&self) -> Option<Decimal> {
        self.max_auto_bid_amount.filter(|c| *c > Decimal::ZERO)
    }
}

/// Auto-bid settings view for the calling participant
#[derive(Debug, Clone, Serialize)]
pub struct AutoBidSettings {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub max_auto_bid_amount: Option<Decimal>,
    pub enabled: bool,
}

impl From<&BiddingParticipant> for AutoBidSettings {
    fn from(p: &BiddingParticipant) -> Self {
        Self {
            session_id: p.session_id,
            user_id: p.user_id,
            max_auto_bid_amount: p.max_auto_bid_amount,
            enabled: p.auto_bid_ceiling().is_some(),
        }
    }
}

/// Participant view returned to clients. Proxy ceilings are private to
/// their owner and never exposed here.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantResponse {
    pub user_id: Uuid,
    pub current_bid_amount: Decimal,
    pub total_bids_placed: i32,
    pub last_bid_at: Option<DateTime<Utc>>,
    pub has_withdrawn: bool,
    pub is_winner: bool,
    pub compensation_amount: Option<Decimal>,
}

impl From<&BiddingParticipant> for ParticipantResponse {
    fn from(p: &BiddingParticipant) -> Self {
        Self {
            user_id: p.user_id,
            current_bid_amount: p.current_bid_amount,
            total_bids_placed: p.total_bids_placed,
            last_bid_at: p.last_bid_at,
            has_withdrawn: p.has_withdrawn(),
            is_winner: p.is_winner,
            compensation_amount: p.compensation_amount,
        }
    }
}

/// Withdrawal status view for the calling participant
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalStatus {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub has_withdrawn: bool,
    pub session_status: super::session::SessionStatus,
    pub is_winner: bool,
    pub compensation_amount: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn participant(ceiling: Option<Decimal>) -> BiddingParticipant {
        BiddingParticipant {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            user_archetype: UserArchetype::BigSpender,
            current_bid_amount: Decimal::ZERO,
            max_auto_bid_amount: ceiling,
            last_bid_at: None,
            total_bids_placed: 0,
            is_winner: false,
            compensation_amount: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_withdrawal_marker() {
        assert!(participant(Some(dec!(0))).has_withdrawn());
        assert!(!participant(Some(dec!(700))).has_withdrawn());
        assert!(!participant(None).has_withdrawn());
    }

    #[test]
    fn test_auto_bid_ceiling_ignores_withdrawal_marker() {
        assert_eq!(participant(Some(dec!(700))).auto_bid_ceiling(), Some(dec!(700)));
        assert_eq!(participant(Some(dec!(0))).auto_bid_ceiling(), None);
        assert_eq!(participant(None).auto_bid_ceiling(), None);
    }
}
