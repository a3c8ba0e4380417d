//! Pure bidding rules
//!
//! Predicates and validation over session state. Nothing here touches
//! storage or the clock; callers pass `now` explicitly. Rules never fail:
//! `validate_bid` accumulates every violated rule instead of
//! short-circuiting, so a client can re-render the exact constraints.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::calculators::minimum_next_bid;
use super::types::{BiddingConfig, BidValidation, EligibilityCheck};
use crate::models::{Bid, BiddingSession, FinalizationReason, SessionStatus, User};

/// Advisory suggested-bid markup over the current high (percent)
const SUGGESTED_BID_PERCENT: i64 = 15;

/// Anti-abuse ceiling: a bid may be at most double the current high
const MAX_BID_MULTIPLIER: i64 = 2;

/// A session without a deadline never expires by time.
pub fn is_session_expired(session: &BiddingSession, now: DateTime<Utc>) -> bool {
    match session.expires_at {
        Some(expires_at) => now > expires_at,
        None => false,
    }
}

/// Validate a proposed bid against the session and its bid history.
/// All rules are evaluated independently; errors accumulate.
pub fn validate_bid(
    proposed_bid: Decimal,
    session: &BiddingSession,
    user_id: Uuid,
    bid_history: &[Bid],
    config: &BiddingConfig,
    now: DateTime<Utc>,
) -> BidValidation {
    let mut errors = Vec::new();

    let current_high = session.current_high_bid();
    let min_next = minimum_next_bid(current_high, session.minimum_increment_percent);

    let maximum_allowed = if current_high > Decimal::ZERO {
        current_high * Decimal::from(MAX_BID_MULTIPLIER)
    } else {
        config.maximum_bid_amount
    };

    let suggested_bid = if current_high > Decimal::ZERO {
        (current_high * (Decimal::ONE + Decimal::new(SUGGESTED_BID_PERCENT, 2))).round_dp(2)
    } else {
        config.minimum_bid_amount
    };

    // 1. Must strictly exceed the current high, and beat it by the required
    // increment. The exceed check stands on its own so a degenerate
    // increment percent can never let a bid tie or undercut the high.
    if current_high > Decimal::ZERO && proposed_bid <= current_high {
        errors.push(format!(
            "Bid must exceed the current high bid of ${:.2}",
            current_high
        ));
    }
    if current_high > Decimal::ZERO && proposed_bid < min_next {
        errors.push(format!(
            "Minimum bid is ${:.2} ({}% increment required)",
            min_next, session.minimum_increment_percent
        ));
    }

    // 2. The standing high bidder cannot out-bid themselves
    if session.winner_user_id == Some(user_id) {
        errors.push("You already have the high bid".to_string());
    }

    // 3. Session must be active and inside its time window
    if session.status != SessionStatus::Active {
        errors.push(format!("Session is not active (status: {})", session.status));
    } else if is_session_expired(session, now) {
        errors.push("Bidding window has closed".to_string());
    }

    // 4. Per-participant round limit, auto-bids included
    let bids_by_user = bid_history.iter().filter(|b| b.user_id == user_id).count();
    if bids_by_user >= session.max_rounds as usize {
        errors.push(format!(
            "Maximum of {} bids per participant reached",
            session.max_rounds
        ));
    }

    // 5. Anti-abuse ceiling
    if proposed_bid > maximum_allowed {
        errors.push(format!("Bid cannot exceed ${:.2}", maximum_allowed));
    }

    // 6. Absolute platform floor
    if proposed_bid < config.minimum_bid_amount {
        errors.push(format!(
            "Minimum bid amount is ${:.2}",
            config.minimum_bid_amount
        ));
    }

    BidValidation {
        valid: errors.is_empty(),
        errors,
        minimum_next_bid: min_next,
        maximum_allowed,
        suggested_bid,
    }
}

/// Settings a new session may be created with. Errors accumulate.
pub fn validate_session_settings(
    max_rounds: i32,
    round_duration_seconds: i64,
    minimum_increment_percent: Decimal,
) -> Vec<String> {
    let mut errors = Vec::new();
    if max_rounds <= 0 {
        errors.push("Max rounds must be positive".to_string());
    }
    if round_duration_seconds <= 0 {
        errors.push("Round duration must be positive".to_string());
    }
    if minimum_increment_percent <= Decimal::ZERO {
        errors.push("Minimum increment percent must be positive".to_string());
    }
    errors
}

/// A session can settle only while still active. A second finalization
/// attempt must be rejected rather than rewrite settlement figures.
pub fn can_finalize(session: &BiddingSession) -> bool {
    session.status == SessionStatus::Active
}

/// The standing high bidder cannot abandon a session they are winning.
pub fn can_withdraw(session: &BiddingSession, user_id: Uuid) -> bool {
    session.winner_user_id != Some(user_id)
}

/// How a finalization triggered by `should_finalize_session` settles:
/// past the deadline it counts as expiry, otherwise as round exhaustion.
pub fn finalization_reason(session: &BiddingSession, now: DateTime<Utc>) -> FinalizationReason {
    if is_session_expired(session, now) {
        FinalizationReason::Expired
    } else {
        FinalizationReason::RoundsExhausted
    }
}

/// Whether the session must be settled now.
///
/// True only for an active session that is either past its deadline, or in
/// which both participants have bid and both have used all their rounds.
/// A session with a single bidder never force-finalizes on round count.
pub fn should_finalize_session(
    session: &BiddingSession,
    bid_history: &[Bid],
    now: DateTime<Utc>,
) -> bool {
    if session.status != SessionStatus::Active {
        return false;
    }

    if is_session_expired(session, now) {
        return true;
    }

    let mut bidders: Vec<Uuid> = bid_history.iter().map(|b| b.user_id).collect();
    bidders.sort();
    bidders.dedup();

    if bidders.len() < 2 {
        return false;
    }

    bidders.iter().all(|user_id| {
        let count = bid_history.iter().filter(|b| b.user_id == *user_id).count();
        count >= session.max_rounds as usize
    })
}

/// Both contenders must carry the qualifying archetype, and the target
/// night must fall between today and the eligibility window, inclusive.
pub fn check_bidding_eligibility(
    requester: &User,
    roommate: &User,
    target_night: NaiveDate,
    config: &BiddingConfig,
    now: DateTime<Utc>,
) -> EligibilityCheck {
    let mut reasons = Vec::new();

    if !requester.user_archetype.qualifies_for_bidding() {
        reasons.push(format!(
            "User {} does not qualify for bidding (archetype: {})",
            requester.id, requester.user_archetype
        ));
    }
    if !roommate.user_archetype.qualifies_for_bidding() {
        reasons.push(format!(
            "User {} does not qualify for bidding (archetype: {})",
            roommate.id, roommate.user_archetype
        ));
    }

    let today = now.date_naive();
    let latest = today + chrono::Duration::days(config.eligibility_window_days);
    if target_night < today {
        reasons.push(format!("Target night {} is in the past", target_night));
    } else if target_night > latest {
        reasons.push(format!(
            "Target night {} is more than {} days out",
            target_night, config.eligibility_window_days
        ));
    }

    EligibilityCheck {
        eligible: reasons.is_empty(),
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserArchetype;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn session(winning: Decimal, winner: Option<Uuid>) -> BiddingSession {
        let now = Utc::now();
        BiddingSession {
            id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            listing_id: None,
            target_night: now.date_naive() + Duration::days(7),
            status: SessionStatus::Active,
            started_at: now,
            expires_at: Some(now + Duration::hours(3)),
            completed_at: None,
            max_rounds: 3,
            round_duration_seconds: 3600,
            minimum_increment_percent: dec!(10),
            current_round: 1,
            current_high_bid_id: None,
            winner_user_id: winner,
            winning_bid_amount: winning,
            loser_compensation_amount: None,
            platform_revenue: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn bid(session_id: Uuid, user_id: Uuid, amount: Decimal, sequence: i64) -> Bid {
        Bid {
            id: Uuid::new_v4(),
            session_id,
            user_id,
            amount,
            round_number: 1,
            sequence,
            is_auto_bid: false,
            previous_high_bid: Decimal::ZERO,
            increment_amount: Decimal::ZERO,
            increment_percent: Decimal::ZERO,
            placed_at: Utc::now(),
        }
    }

    fn user(archetype: UserArchetype) -> User {
        User {
            id: Uuid::new_v4(),
            display_name: "test".to_string(),
            user_archetype: archetype,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let mut s = session(dec!(500), None);
        assert!(!is_session_expired(&s, now));
        assert!(is_session_expired(&s, now + Duration::hours(4)));

        s.expires_at = None;
        assert!(!is_session_expired(&s, now + Duration::days(365)));
    }

    // Scenario A: seeded at $500, 10% increment
    #[test]
    fn test_valid_bid_over_seed() {
        let s = session(dec!(500), None);
        let v = validate_bid(
            dec!(560),
            &s,
            Uuid::new_v4(),
            &[],
            &BiddingConfig::default(),
            Utc::now(),
        );
        assert!(v.valid, "errors: {:?}", v.errors);
        assert_eq!(v.minimum_next_bid, dec!(550.00));
    }

    #[test]
    fn test_self_outbid_rejected() {
        let user_id = Uuid::new_v4();
        let s = session(dec!(560), Some(user_id));
        let history = vec![bid(s.id, user_id, dec!(560), 1)];
        let v = validate_bid(
            dec!(700),
            &s,
            user_id,
            &history,
            &BiddingConfig::default(),
            Utc::now(),
        );
        assert!(!v.valid);
        assert!(v.errors.iter().any(|e| e.contains("already have the high bid")));
    }

    #[test]
    fn test_bid_below_increment_rejected() {
        let s = session(dec!(500), Some(Uuid::new_v4()));
        let v = validate_bid(
            dec!(540),
            &s,
            Uuid::new_v4(),
            &[],
            &BiddingConfig::default(),
            Utc::now(),
        );
        assert!(!v.valid);
        assert!(v.errors.iter().any(|e| e.contains("Minimum bid is $550.00")));
    }

    #[test]
    fn test_inactive_session_rejected() {
        let mut s = session(dec!(500), None);
        s.status = SessionStatus::Completed;
        let v = validate_bid(
            dec!(560),
            &s,
            Uuid::new_v4(),
            &[],
            &BiddingConfig::default(),
            Utc::now(),
        );
        assert!(!v.valid);
        assert!(v.errors.iter().any(|e| e.contains("not active")));
    }

    #[test]
    fn test_expired_session_rejected() {
        let s = session(dec!(500), None);
        let v = validate_bid(
            dec!(560),
            &s,
            Uuid::new_v4(),
            &[],
            &BiddingConfig::default(),
            Utc::now() + Duration::hours(4),
        );
        assert!(!v.valid);
        assert!(v.errors.iter().any(|e| e.contains("window has closed")));
    }

    #[test]
    fn test_round_limit_rejected() {
        let user_id = Uuid::new_v4();
        let s = session(dec!(800), Some(Uuid::new_v4()));
        let history = vec![
            bid(s.id, user_id, dec!(550), 1),
            bid(s.id, user_id, dec!(650), 3),
            bid(s.id, user_id, dec!(750), 5),
        ];
        let v = validate_bid(
            dec!(900),
            &s,
            user_id,
            &history,
            &BiddingConfig::default(),
            Utc::now(),
        );
        assert!(!v.valid);
        assert!(v.errors.iter().any(|e| e.contains("Maximum of 3 bids")));
    }

    #[test]
    fn test_anti_abuse_ceiling() {
        let s = session(dec!(500), Some(Uuid::new_v4()));
        let v = validate_bid(
            dec!(1001),
            &s,
            Uuid::new_v4(),
            &[],
            &BiddingConfig::default(),
            Utc::now(),
        );
        assert!(!v.valid);
        assert_eq!(v.maximum_allowed, dec!(1000));
        assert!(v.errors.iter().any(|e| e.contains("cannot exceed $1000.00")));
    }

    #[test]
    fn test_absolute_floor() {
        let mut s = session(dec!(0), None);
        s.winning_bid_amount = Decimal::ZERO;
        let v = validate_bid(
            dec!(20),
            &s,
            Uuid::new_v4(),
            &[],
            &BiddingConfig::default(),
            Utc::now(),
        );
        assert!(!v.valid);
        assert!(v.errors.iter().any(|e| e.contains("Minimum bid amount is $50.00")));
    }

    #[test]
    fn test_bid_tying_high_rejected_with_zero_increment() {
        let mut s = session(dec!(500), Some(Uuid::new_v4()));
        s.minimum_increment_percent = dec!(0);
        let v = validate_bid(
            dec!(500),
            &s,
            Uuid::new_v4(),
            &[],
            &BiddingConfig::default(),
            Utc::now(),
        );
        assert!(!v.valid);
        assert!(v.errors.iter().any(|e| e.contains("must exceed the current high bid")));
    }

    #[test]
    fn test_bid_below_high_rejected_with_negative_increment() {
        let mut s = session(dec!(500), Some(Uuid::new_v4()));
        s.minimum_increment_percent = dec!(-50);
        let v = validate_bid(
            dec!(300),
            &s,
            Uuid::new_v4(),
            &[],
            &BiddingConfig::default(),
            Utc::now(),
        );
        assert!(!v.valid);
        assert!(v.errors.iter().any(|e| e.contains("must exceed the current high bid")));
    }

    #[test]
    fn test_session_settings_validation() {
        assert!(validate_session_settings(3, 3600, dec!(10)).is_empty());
        assert_eq!(validate_session_settings(0, 0, dec!(0)).len(), 3);
        assert_eq!(validate_session_settings(3, 3600, dec!(-5)).len(), 1);
        assert_eq!(validate_session_settings(3, 3600, dec!(0)).len(), 1);
    }

    #[test]
    fn test_finalize_guard_rejects_settled_session() {
        let mut s = session(dec!(605), Some(Uuid::new_v4()));
        assert!(can_finalize(&s));
        for terminal in [
            SessionStatus::Completed,
            SessionStatus::Expired,
            SessionStatus::Cancelled,
        ] {
            s.status = terminal;
            assert!(!can_finalize(&s), "finalize allowed in status {}", terminal);
        }
    }

    // Scenario D: the standing leader cannot abandon a winning position
    #[test]
    fn test_leader_cannot_withdraw() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let s = session(dec!(605), Some(a));
        assert!(!can_withdraw(&s, a));
        assert!(can_withdraw(&s, b));

        // With no bids placed either side may withdraw
        let open = session(dec!(500), None);
        assert!(can_withdraw(&open, a));
        assert!(can_withdraw(&open, b));
    }

    #[test]
    fn test_finalization_reason_follows_expiry() {
        let now = Utc::now();
        let s = session(dec!(605), Some(Uuid::new_v4()));
        assert_eq!(
            finalization_reason(&s, now),
            FinalizationReason::RoundsExhausted
        );
        assert_eq!(
            finalization_reason(&s, now + Duration::hours(4)),
            FinalizationReason::Expired
        );
    }

    #[test]
    fn test_errors_accumulate() {
        // Too low AND self-outbid AND session expired: all three reported
        let user_id = Uuid::new_v4();
        let s = session(dec!(500), Some(user_id));
        let v = validate_bid(
            dec!(510),
            &s,
            user_id,
            &[],
            &BiddingConfig::default(),
            Utc::now() + Duration::hours(4),
        );
        assert!(!v.valid);
        assert_eq!(v.errors.len(), 3);
    }

    #[test]
    fn test_suggested_bid_is_advisory() {
        let s = session(dec!(500), None);
        let v = validate_bid(
            dec!(560),
            &s,
            Uuid::new_v4(),
            &[],
            &BiddingConfig::default(),
            Utc::now(),
        );
        // 500 + 15% = 575, but 560 is still valid
        assert_eq!(v.suggested_bid, dec!(575.00));
        assert!(v.valid);
    }

    // Scenario C: both participants exhaust their rounds
    #[test]
    fn test_finalize_on_round_exhaustion() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let s = session(dec!(2000), Some(b));
        let mut history = Vec::new();
        for i in 0..3 {
            history.push(bid(s.id, a, dec!(550) + Decimal::from(i * 200), i * 2 + 1));
            history.push(bid(s.id, b, dec!(650) + Decimal::from(i * 200), i * 2 + 2));
        }
        assert!(should_finalize_session(&s, &history, Utc::now()));
    }

    #[test]
    fn test_no_finalize_single_bidder_rounds() {
        let a = Uuid::new_v4();
        let s = session(dec!(900), Some(a));
        let history = vec![
            bid(s.id, a, dec!(550), 1),
            bid(s.id, a, dec!(700), 2),
            bid(s.id, a, dec!(900), 3),
        ];
        // Only one bidder: round count never triggers finalization
        assert!(!should_finalize_session(&s, &history, Utc::now()));
        // ...but time expiry still does
        assert!(should_finalize_session(&s, &history, Utc::now() + Duration::hours(4)));
    }

    #[test]
    fn test_no_finalize_when_rounds_remain() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let s = session(dec!(650), Some(b));
        let history = vec![bid(s.id, a, dec!(550), 1), bid(s.id, b, dec!(650), 2)];
        assert!(!should_finalize_session(&s, &history, Utc::now()));
    }

    #[test]
    fn test_no_finalize_inactive_session() {
        let mut s = session(dec!(500), None);
        s.status = SessionStatus::Expired;
        assert!(!should_finalize_session(&s, &[], Utc::now() + Duration::hours(4)));
    }

    #[test]
    fn test_eligibility() {
        let config = BiddingConfig::default();
        let now = Utc::now();
        let night = now.date_naive() + Duration::days(7);

        let ok = check_bidding_eligibility(
            &user(UserArchetype::BigSpender),
            &user(UserArchetype::BigSpender),
            night,
            &config,
            now,
        );
        assert!(ok.eligible);

        let wrong_archetype = check_bidding_eligibility(
            &user(UserArchetype::Budget),
            &user(UserArchetype::BigSpender),
            night,
            &config,
            now,
        );
        assert!(!wrong_archetype.eligible);
        assert_eq!(wrong_archetype.reasons.len(), 1);

        let too_far = check_bidding_eligibility(
            &user(UserArchetype::BigSpender),
            &user(UserArchetype::BigSpender),
            now.date_naive() + Duration::days(31),
            &config,
            now,
        );
        assert!(!too_far.eligible);

        let in_past = check_bidding_eligibility(
            &user(UserArchetype::BigSpender),
            &user(UserArchetype::BigSpender),
            now.date_naive() - Duration::days(1),
            &config,
            now,
        );
        assert!(!in_past.eligible);

        // 30 days out is inclusive
        let boundary = check_bidding_eligibility(
            &user(UserArchetype::BigSpender),
            &user(UserArchetype::BigSpender),
            now.date_naive() + Duration::days(30),
            &config,
            now,
        );
        assert!(boundary.eligible);
    }
}
