//! Pure state transformations
//!
//! Auto-bid counter computation and winner determination. Both operate on
//! snapshots; persistence and notification stay in the service layer.

use rust_decimal::Decimal;

use super::calculators::{loser_compensation, minimum_next_bid};
use super::types::{AutoBidCounter, AutoBidDecision, BiddingError, SessionOutcome};
use crate::models::{Bid, BiddingParticipant, BiddingSession};

/// eBay-style proxy bidding: after `new_bid` lands, decide whether the
/// other participant's standing ceiling fires a counter-bid.
///
/// The counter is the minimum legal increment over `new_bid`, capped at the
/// ceiling. The synthesized bid re-enters the normal placement path, so it
/// is validated like any bid and can trigger a further cascade; each step
/// strictly increases the amount against two finite ceilings, which bounds
/// the recursion.
pub fn process_auto_bid(
    session: &BiddingSession,
    participants: &[BiddingParticipant],
    new_bid: &Bid,
) -> AutoBidDecision {
    let opponent = participants.iter().find(|p| p.user_id != new_bid.user_id);

    let opponent = match opponent {
        Some(p) => p,
        None => {
            return AutoBidDecision {
                triggered: false,
                counter: None,
                reason: "No opposing participant found".to_string(),
            }
        }
    };

    let ceiling = match opponent.auto_bid_ceiling() {
        Some(c) => c,
        None => {
            return AutoBidDecision {
                triggered: false,
                counter: None,
                reason: "Opponent has no auto-bid ceiling set".to_string(),
            }
        }
    };

    if ceiling <= new_bid.amount {
        return AutoBidDecision {
            triggered: false,
            counter: None,
            reason: format!(
                "Opponent ceiling ${:.2} does not exceed the new bid ${:.2}",
                ceiling, new_bid.amount
            ),
        };
    }

    let minimum = minimum_next_bid(new_bid.amount, session.minimum_increment_percent);
    let amount = minimum.min(ceiling);

    AutoBidDecision {
        triggered: true,
        counter: Some(AutoBidCounter {
            user_id: opponent.user_id,
            amount,
            previous_high_bid: new_bid.amount,
        }),
        reason: format!(
            "Auto-bid of ${:.2} for participant {} (ceiling ${:.2})",
            amount, opponent.user_id, ceiling
        ),
    }
}

/// Compute the final winner, loser and settlement figures.
///
/// Finalizing a session with zero bids or a malformed participant set is a
/// caller error, not a valid outcome.
pub fn determine_winner(
    session: &BiddingSession,
    participants: &[BiddingParticipant],
    compensation_percent: Decimal,
) -> Result<SessionOutcome, BiddingError> {
    if participants.len() != 2 {
        return Err(BiddingError::WrongParticipantCount {
            session_id: session.id,
            found: participants.len(),
        });
    }

    let winner_user_id = session
        .winner_user_id
        .ok_or(BiddingError::NoBidsToSettle(session.id))?;

    let loser = participants
        .iter()
        .find(|p| p.user_id != winner_user_id)
        .ok_or(BiddingError::WrongParticipantCount {
            session_id: session.id,
            found: participants.len(),
        })?;

    // Both rows matching the winner would mean corrupted participant data
    if !participants.iter().any(|p| p.user_id == winner_user_id) {
        return Err(BiddingError::NotAParticipant {
            session_id: session.id,
            user_id: winner_user_id,
        });
    }

    let winning_bid_amount = session.winning_bid_amount;
    let compensation = loser_compensation(winning_bid_amount, compensation_percent);

    Ok(SessionOutcome {
        winner_user_id,
        loser_user_id: loser.user_id,
        winning_bid_amount,
        loser_compensation: compensation,
        platform_revenue: winning_bid_amount - compensation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SessionStatus, UserArchetype};
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

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

    fn participant(session_id: Uuid, user_id: Uuid, ceiling: Option<Decimal>) -> BiddingParticipant {
        BiddingParticipant {
            id: Uuid::new_v4(),
            session_id,
            user_id,
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

    fn bid(session_id: Uuid, user_id: Uuid, amount: Decimal) -> Bid {
        Bid {
            id: Uuid::new_v4(),
            session_id,
            user_id,
            amount,
            round_number: 1,
            sequence: 1,
            is_auto_bid: false,
            previous_high_bid: Decimal::ZERO,
            increment_amount: Decimal::ZERO,
            increment_percent: Decimal::ZERO,
            placed_at: Utc::now(),
        }
    }

    // Scenario B: A bids $550, B's ceiling is $700 → counter of $605
    #[test]
    fn test_auto_bid_fires_with_minimum_increment() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let s = session(dec!(550), Some(a));
        let participants = vec![
            participant(s.id, a, None),
            participant(s.id, b, Some(dec!(700))),
        ];
        let decision = process_auto_bid(&s, &participants, &bid(s.id, a, dec!(550)));
        assert!(decision.triggered);
        let counter = decision.counter.unwrap();
        assert_eq!(counter.user_id, b);
        assert_eq!(counter.amount, dec!(605.00));
        assert_eq!(counter.previous_high_bid, dec!(550));
    }

    #[test]
    fn test_auto_bid_capped_at_ceiling() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let s = session(dec!(550), Some(a));
        let participants = vec![
            participant(s.id, a, None),
            participant(s.id, b, Some(dec!(580))),
        ];
        let decision = process_auto_bid(&s, &participants, &bid(s.id, a, dec!(550)));
        assert!(decision.triggered);
        // min increment would be 605, but the ceiling wins
        assert_eq!(decision.counter.unwrap().amount, dec!(580));
    }

    #[test]
    fn test_auto_bid_not_triggered_without_ceiling() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let s = session(dec!(550), Some(a));
        let participants = vec![participant(s.id, a, None), participant(s.id, b, None)];
        let decision = process_auto_bid(&s, &participants, &bid(s.id, a, dec!(550)));
        assert!(!decision.triggered);
        assert!(decision.counter.is_none());
    }

    #[test]
    fn test_auto_bid_not_triggered_when_ceiling_reached() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let s = session(dec!(700), Some(a));
        let participants = vec![
            participant(s.id, a, None),
            participant(s.id, b, Some(dec!(700))),
        ];
        // Ceiling must strictly exceed the new bid
        let decision = process_auto_bid(&s, &participants, &bid(s.id, a, dec!(700)));
        assert!(!decision.triggered);
    }

    #[test]
    fn test_auto_bid_ignores_withdrawal_marker() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let s = session(dec!(550), Some(a));
        let participants = vec![
            participant(s.id, a, None),
            participant(s.id, b, Some(dec!(0))),
        ];
        let decision = process_auto_bid(&s, &participants, &bid(s.id, a, dec!(550)));
        assert!(!decision.triggered);
    }

    #[test]
    fn test_determine_winner() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let s = session(dec!(605), Some(b));
        let participants = vec![
            participant(s.id, a, None),
            participant(s.id, b, Some(dec!(700))),
        ];
        let outcome = determine_winner(&s, &participants, dec!(25)).unwrap();
        assert_eq!(outcome.winner_user_id, b);
        assert_eq!(outcome.loser_user_id, a);
        assert_eq!(outcome.winning_bid_amount, dec!(605));
        assert_eq!(outcome.loser_compensation, dec!(151.25));
        assert_eq!(outcome.platform_revenue, dec!(453.75));
    }

    #[test]
    fn test_determine_winner_no_bids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let s = session(dec!(500), None);
        let participants = vec![participant(s.id, a, None), participant(s.id, b, None)];
        let err = determine_winner(&s, &participants, dec!(25)).unwrap_err();
        assert!(matches!(err, BiddingError::NoBidsToSettle(_)));
    }

    #[test]
    fn test_determine_winner_wrong_participant_count() {
        let a = Uuid::new_v4();
        let s = session(dec!(605), Some(a));
        let participants = vec![participant(s.id, a, None)];
        let err = determine_winner(&s, &participants, dec!(25)).unwrap_err();
        assert!(matches!(err, BiddingError::WrongParticipantCount { found: 1, .. }));
    }

    #[test]
    fn test_cascade_can_end_with_original_bidder_leading() {
        // A bids 550; B's 605 ceiling counters at its cap, then A's own
        // ceiling counters back over it. The cascade ends with A leading,
        // so it is B who lost the lead, not A.
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut s = session(dec!(550), Some(a));
        let participants = vec![
            participant(s.id, a, Some(dec!(900))),
            participant(s.id, b, Some(dec!(605))),
        ];

        let mut last = bid(s.id, a, dec!(550));
        loop {
            let decision = process_auto_bid(&s, &participants, &last);
            let counter = match decision.counter {
                Some(c) => c,
                None => break,
            };
            s.winner_user_id = Some(counter.user_id);
            s.winning_bid_amount = counter.amount;
            last = bid(s.id, counter.user_id, counter.amount);
        }

        assert_eq!(last.user_id, a);
        assert_eq!(last.amount, dec!(665.50));
    }

    #[test]
    fn test_cascade_terminates() {
        // Two finite ceilings: alternate auto-bids until one ceiling is
        // passed; amounts strictly increase so the loop is bounded.
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut s = session(dec!(550), Some(a));
        let participants = vec![
            participant(s.id, a, Some(dec!(900))),
            participant(s.id, b, Some(dec!(800))),
        ];

        let mut last = bid(s.id, a, dec!(550));
        let mut steps = 0;
        loop {
            let decision = process_auto_bid(&s, &participants, &last);
            let counter = match decision.counter {
                Some(c) => c,
                None => break,
            };
            assert!(counter.amount > last.amount);
            s.winner_user_id = Some(counter.user_id);
            s.winning_bid_amount = counter.amount;
            last = bid(s.id, counter.user_id, counter.amount);
            steps += 1;
            assert!(steps < 20, "cascade did not terminate");
        }
        // 550 → 605 (B) → 665.50 (A) → 732.05 (B) → 805.26 (A) → B capped at 800? ...
        // the exact path depends on rounding; what matters is termination
        // and that every step respects its ceiling.
        assert!(steps > 0);
    }
}
