//! Bidding session model
//!
//! A session is the contest for one scarce rental night between exactly two
//! participants. Status transitions are monotonic:
//! pending → active → {completed | expired | cancelled}.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "session_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Active,
    Completed,
    Expired,
    Cancelled,
}

impl SessionStatus {
    /// Check if the session still accepts bids
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Active)
    }

    /// Check if the session has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Expired | SessionStatus::Cancelled
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Expired => "expired",
            SessionStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SessionStatus::Pending),
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            "expired" => Ok(SessionStatus::Expired),
            "cancelled" => Ok(SessionStatus::Cancelled),
            _ => Err(format!("Invalid session status: {}", s)),
        }
    }
}

/// One bidding session: a single property night under contention
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BiddingSession {
    pub id: Uuid,
    pub property_id: Uuid,
    pub listing_id: Option<Uuid>,

    /// The calendar night both parties are bidding for
    pub target_night: NaiveDate,

    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    // Rules configuration, frozen at creation
    pub max_rounds: i32,
    pub round_duration_seconds: i64,
    pub minimum_increment_percent: Decimal,

    // Running state
    pub current_round: i32,
    pub current_high_bid_id: Option<Uuid>,
    pub winner_user_id: Option<Uuid>,
    /// Seeded with the starting bid at creation, then tracks the high bid
    pub winning_bid_amount: Decimal,

    // Settlement figures, written exactly once at finalization
    pub loser_compensation_amount: Option<Decimal>,
    pub platform_revenue: Option<Decimal>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BiddingSession {
    /// Current high bid amount the next bid must beat.
    /// This includes the starting-bid seed before any bid is placed.
    pub fn current_high_bid(&self) -> Decimal {
        self.winning_bid_amount
    }

    /// Whether at least one real bid has been placed
    pub fn has_bids(&self) -> bool {
        self.winner_user_id.is_some()
    }
}

/// Request to open a session for a property night
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionRequest {
    pub property_id: Uuid,
    pub listing_id: Option<Uuid>,
    pub target_night: NaiveDate,
    /// Exactly two user ids; both must carry the qualifying archetype
    pub participant_user_ids: Vec<Uuid>,
    pub starting_bid: Decimal,
    pub max_rounds: Option<i32>,
    pub round_duration_seconds: Option<i64>,
    pub minimum_increment_percent: Option<Decimal>,
}

/// Session view returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub property_id: Uuid,
    pub listing_id: Option<Uuid>,
    pub target_night: NaiveDate,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub max_rounds: i32,
    pub round_duration_seconds: i64,
    pub minimum_increment_percent: Decimal,
    pub current_round: i32,
    pub current_high_bid_id: Option<Uuid>,
    pub winner_user_id: Option<Uuid>,
    pub winning_bid_amount: Decimal,
    pub loser_compensation_amount: Option<Decimal>,
    pub platform_revenue: Option<Decimal>,
}

impl From<BiddingSession> for SessionResponse {
    fn from(s: BiddingSession) -> Self {
        Self {
            session_id: s.id,
            property_id: s.property_id,
            listing_id: s.listing_id,
            target_night: s.target_night,
            status: s.status,
            started_at: s.started_at,
            expires_at: s.expires_at,
            completed_at: s.completed_at,
            max_rounds: s.max_rounds,
            round_duration_seconds: s.round_duration_seconds,
            minimum_increment_percent: s.minimum_increment_percent,
            current_round: s.current_round,
            current_high_bid_id: s.current_high_bid_id,
            winner_user_id: s.winner_user_id,
            winning_bid_amount: s.winning_bid_amount,
            loser_compensation_amount: s.loser_compensation_amount,
            platform_revenue: s.platform_revenue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_active() {
        assert!(SessionStatus::Active.is_active());
        assert!(!SessionStatus::Pending.is_active());
        assert!(!SessionStatus::Completed.is_active());
        assert!(!SessionStatus::Expired.is_active());
        assert!(!SessionStatus::Cancelled.is_active());
    }

    #[test]
    fn test_status_is_terminal() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Expired.is_terminal());
        assert!(SessionStatus::Cancelled.is_terminal());
        assert!(!SessionStatus::Active.is_terminal());
        assert!(!SessionStatus::Pending.is_terminal());
    }

    #[test]
    fn test_status_roundtrip() {
        for s in ["pending", "active", "completed", "expired", "cancelled"] {
            let parsed: SessionStatus = s.parse().unwrap();
            assert_eq!(parsed.to_string(), s);
        }
        assert!("open".parse::<SessionStatus>().is_err());
    }
}
