//! Bidding service
//!
//! Stateful orchestrator over the pure calculators, rules and processors.
//! Owns persistence of sessions, participants, bids and results, and queues
//! participant notifications.
//!
//! # Concurrency
//!
//! Two participants can submit bids for the same session at nearly the same
//! instant. Every read-validate-write sequence runs under a per-session
//! `tokio::sync::Mutex`, including the whole auto-bid cascade, so the session
//! is never observably left in a state where a cascade was computed but not
//! applied. Bid ordering uses a monotonic per-session sequence number
//! assigned inside the critical section, not wall-clock time.

use chrono::{Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::calculators::bid_increment;
use super::processors::{determine_winner, process_auto_bid};
use super::rules::{
    can_finalize, can_withdraw, check_bidding_eligibility, finalization_reason,
    is_session_expired, should_finalize_session, validate_bid, validate_session_settings,
};
use super::types::{BiddingConfig, BiddingError, PlaceBidOutcome};
use crate::models::{
    AutoBidSettings, Bid, BiddingParticipant, BiddingResult, BiddingSession,
    CreateSessionRequest, FinalizationReason, SessionStatus, User, WithdrawalStatus,
};
use crate::services::notifications::{NotificationRequest, NotificationSender};

/// Hard stop for the proxy-bid cascade. The cascade is naturally bounded by
/// two finite ceilings and strictly increasing amounts; this guard caps the
/// critical section under adversarial configurations.
const MAX_AUTO_BID_STEPS: usize = 16;

const SESSION_COLUMNS: &str = "id, property_id, listing_id, target_night, status, started_at, \
     expires_at, completed_at, max_rounds, round_duration_seconds, minimum_increment_percent, \
     current_round, current_high_bid_id, winner_user_id, winning_bid_amount, \
     loser_compensation_amount, platform_revenue, created_at, updated_at";

const PARTICIPANT_COLUMNS: &str = "id, session_id, user_id, user_archetype, current_bid_amount, \
     max_auto_bid_amount, last_bid_at, total_bids_placed, is_winner, compensation_amount, \
     created_at, updated_at";

const BID_COLUMNS: &str = "id, session_id, user_id, amount, round_number, sequence, is_auto_bid, \
     previous_high_bid, increment_amount, increment_percent, placed_at";

/// A bid waiting to enter the placement path (manual or synthesized)
struct PendingBid {
    user_id: Uuid,
    amount: Decimal,
    is_auto_bid: bool,
}

/// Snapshot returned by `apply_bid`: the persisted bid plus post-update state
struct AppliedBid {
    bid: Bid,
    session: BiddingSession,
    participants: Vec<BiddingParticipant>,
}

pub struct BiddingService {
    pool: PgPool,
    config: BiddingConfig,
    notifier: NotificationSender,
    /// Per-session critical sections for the read-validate-write path
    session_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl BiddingService {
    pub fn new(pool: PgPool, config: BiddingConfig, notifier: NotificationSender) -> Self {
        Self {
            pool,
            config,
            notifier,
            session_locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &BiddingConfig {
        &self.config
    }

    fn session_lock(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        self.session_locks
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the lock entry once a session reaches a terminal status. Tasks
    /// already waiting hold their own `Arc` and will observe the terminal
    /// status after they acquire it.
    fn discard_session_lock(&self, session_id: Uuid) {
        self.session_locks.remove(&session_id);
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn get_session(&self, session_id: Uuid) -> Result<BiddingSession, BiddingError> {
        let session: Option<BiddingSession> = sqlx::query_as(&format!(
            "SELECT {} FROM bidding_sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        session.ok_or(BiddingError::SessionNotFound(session_id))
    }

    pub async fn get_participants(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<BiddingParticipant>, BiddingError> {
        let participants: Vec<BiddingParticipant> = sqlx::query_as(&format!(
            "SELECT {} FROM bidding_participants WHERE session_id = $1 ORDER BY created_at",
            PARTICIPANT_COLUMNS
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(participants)
    }

    pub async fn get_participant(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<BiddingParticipant, BiddingError> {
        let participant: Option<BiddingParticipant> = sqlx::query_as(&format!(
            "SELECT {} FROM bidding_participants WHERE session_id = $1 AND user_id = $2",
            PARTICIPANT_COLUMNS
        ))
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        participant.ok_or(BiddingError::NotAParticipant {
            session_id,
            user_id,
        })
    }

    /// Full bid history for a session, ordered by placement sequence
    pub async fn get_bid_history(&self, session_id: Uuid) -> Result<Vec<Bid>, BiddingError> {
        // Surface an unknown session as not-found rather than an empty list
        self.get_session(session_id).await?;

        let bids: Vec<Bid> = sqlx::query_as(&format!(
            "SELECT {} FROM bids WHERE session_id = $1 ORDER BY sequence",
            BID_COLUMNS
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bids)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<User, BiddingError> {
        let user: Option<User> = sqlx::query_as(
            "SELECT id, display_name, user_archetype, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        user.ok_or(BiddingError::UserNotFound(user_id))
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Open a bidding session for a property night with exactly two
    /// participants. Rejects when an active session already exists for the
    /// same (property, night) pair.
    pub async fn create_session(
        &self,
        caller_user_id: Uuid,
        request: CreateSessionRequest,
    ) -> Result<BiddingSession, BiddingError> {
        if request.participant_user_ids.len() != 2 {
            return Err(BiddingError::InvalidRequest(format!(
                "A bidding session requires exactly 2 participants, got {}",
                request.participant_user_ids.len()
            )));
        }
        if request.participant_user_ids[0] == request.participant_user_ids[1] {
            return Err(BiddingError::InvalidRequest(
                "Participants must be two distinct users".to_string(),
            ));
        }
        if !request.participant_user_ids.contains(&caller_user_id) {
            return Err(BiddingError::InvalidRequest(
                "The caller must be one of the session participants".to_string(),
            ));
        }
        if request.starting_bid <= Decimal::ZERO {
            return Err(BiddingError::InvalidRequest(
                "Starting bid must be positive".to_string(),
            ));
        }

        let roommate_user_id = if request.participant_user_ids[0] == caller_user_id {
            request.participant_user_ids[1]
        } else {
            request.participant_user_ids[0]
        };

        let requester = self.get_user(caller_user_id).await?;
        let roommate = self.get_user(roommate_user_id).await?;

        let now = Utc::now();
        let eligibility = check_bidding_eligibility(
            &requester,
            &roommate,
            request.target_night,
            &self.config,
            now,
        );
        if !eligibility.eligible {
            return Err(BiddingError::NotEligible(eligibility));
        }

        // One active session per (property, night)
        let conflict: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM bidding_sessions \
             WHERE property_id = $1 AND target_night = $2 AND status = 'active'",
        )
        .bind(request.property_id)
        .bind(request.target_night)
        .fetch_optional(&self.pool)
        .await?;

        if conflict.is_some() {
            return Err(BiddingError::SessionConflict {
                property_id: request.property_id,
                target_night: request.target_night,
            });
        }

        let max_rounds = request.max_rounds.unwrap_or(self.config.default_max_rounds);
        let round_duration_seconds = request
            .round_duration_seconds
            .unwrap_or(self.config.default_round_duration_seconds);
        let minimum_increment_percent = request
            .minimum_increment_percent
            .unwrap_or(self.config.default_minimum_increment_percent);

        let settings_errors =
            validate_session_settings(max_rounds, round_duration_seconds, minimum_increment_percent);
        if !settings_errors.is_empty() {
            return Err(BiddingError::InvalidRequest(settings_errors.join("; ")));
        }

        let session_id = Uuid::new_v4();
        let expires_at = now + Duration::seconds(round_duration_seconds * max_rounds as i64);

        // Session and both participants are created atomically
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO bidding_sessions (
                id, property_id, listing_id, target_night, status, started_at,
                expires_at, max_rounds, round_duration_seconds,
                minimum_increment_percent, current_round, winning_bid_amount,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, 'active', $5, $6, $7, $8, $9, 1, $10, $5, $5)
            "#,
        )
        .bind(session_id)
        .bind(request.property_id)
        .bind(request.listing_id)
        .bind(request.target_night)
        .bind(now)
        .bind(expires_at)
        .bind(max_rounds)
        .bind(round_duration_seconds)
        .bind(minimum_increment_percent)
        .bind(request.starting_bid)
        .execute(&mut *tx)
        .await?;

        for user in [&requester, &roommate] {
            sqlx::query(
                r#"
                INSERT INTO bidding_participants (
                    id, session_id, user_id, user_archetype, current_bid_amount,
                    total_bids_placed, is_winner, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, 0, 0, FALSE, $5, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(session_id)
            .bind(user.id)
            .bind(user.user_archetype)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let session = self.get_session(session_id).await?;

        info!(
            "Bidding session {} created for property {} night {} (seed ${:.2})",
            session_id, request.property_id, request.target_night, request.starting_bid
        );
        metrics::counter!("bidding_sessions_created_total").increment(1);

        for user_id in [caller_user_id, roommate_user_id] {
            self.notify(
                session_id,
                user_id,
                "session_created",
                "Bidding war started",
                &format!(
                    "A bidding session for the night of {} is open. Starting bid: ${:.2}",
                    request.target_night, request.starting_bid
                ),
            );
        }

        Ok(session)
    }

    // ========================================================================
    // Bid placement
    // ========================================================================

    /// Place a manual bid. Runs the whole validate-persist-cascade-finalize
    /// sequence inside the session's critical section.
    pub async fn place_bid(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        amount: Decimal,
    ) -> Result<PlaceBidOutcome, BiddingError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let session = self.get_session(session_id).await?;
        if session.status != SessionStatus::Active {
            return Err(BiddingError::SessionNotActive {
                session_id,
                status: session.status,
            });
        }
        if is_session_expired(&session, Utc::now()) {
            // Lazy expiration: one state transition even though the call fails
            self.expire_locked(session_id).await?;
            return Err(BiddingError::SessionExpired(session_id));
        }
        self.get_participant(session_id, user_id).await?;

        let manual = self
            .apply_bid(
                session_id,
                PendingBid {
                    user_id,
                    amount,
                    is_auto_bid: false,
                },
            )
            .await?;
        metrics::counter!("bidding_bids_placed_total", "kind" => "manual").increment(1);

        // Proxy-bid cascade as an explicit bounded loop; each synthesized bid
        // re-enters apply_bid and is validated like any other.
        let mut auto_bid: Option<Bid> = None;
        let mut latest = manual.bid.clone();
        let mut snapshot = (manual.session.clone(), manual.participants.clone());
        let mut steps = 0;

        loop {
            let decision = process_auto_bid(&snapshot.0, &snapshot.1, &latest);
            let counter = match decision.counter {
                Some(c) if decision.triggered => c,
                _ => break,
            };

            steps += 1;
            if steps > MAX_AUTO_BID_STEPS {
                warn!(
                    "Auto-bid cascade for session {} hit the step guard after {} counters",
                    session_id, MAX_AUTO_BID_STEPS
                );
                break;
            }

            match self
                .apply_bid(
                    session_id,
                    PendingBid {
                        user_id: counter.user_id,
                        amount: counter.amount,
                        is_auto_bid: true,
                    },
                )
                .await
            {
                Ok(applied) => {
                    metrics::counter!("bidding_bids_placed_total", "kind" => "auto").increment(1);
                    debug!(
                        "Auto-bid of ${:.2} placed for participant {} in session {}",
                        applied.bid.amount, applied.bid.user_id, session_id
                    );
                    auto_bid = Some(applied.bid.clone());
                    latest = applied.bid.clone();
                    snapshot = (applied.session, applied.participants);
                }
                Err(BiddingError::BidRejected { validation }) => {
                    // A rejected proxy bid ends the cascade without failing
                    // the manual bid that triggered it
                    debug!(
                        "Auto-bid for session {} rejected: {}",
                        session_id,
                        validation.errors.join("; ")
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        // Notify whichever party holds the losing side once the cascade has
        // settled; a cascade can end on the manual bidder's own proxy bid,
        // in which case the opponent is the one who lost the lead
        if latest.user_id != user_id {
            self.notify(
                session_id,
                user_id,
                "auto_bid_countered",
                "Your bid was auto-countered",
                &format!(
                    "An automatic proxy bid of ${:.2} reclaimed the lead after your ${:.2} bid",
                    latest.amount, manual.bid.amount
                ),
            );
        } else if let Some(opponent) = snapshot.1.iter().find(|p| p.user_id != user_id) {
            self.notify(
                session_id,
                opponent.user_id,
                "outbid",
                "You've been outbid",
                &format!(
                    "A new high bid of ${:.2} was placed. Minimum to respond: ${:.2}",
                    latest.amount,
                    super::calculators::minimum_next_bid(
                        latest.amount,
                        snapshot.0.minimum_increment_percent
                    )
                ),
            );
        }

        // Re-evaluate finalization against the post-cascade state; a
        // deadline that passed mid-call settles as expiry, not exhaustion
        let session = self.get_session(session_id).await?;
        let history = self.get_bid_history(session_id).await?;
        let now = Utc::now();
        let mut finalized = false;
        if should_finalize_session(&session, &history, now) {
            self.finalize_locked(session_id, finalization_reason(&session, now))
                .await?;
            finalized = true;
        }

        let new_high_bidder = session.winner_user_id.unwrap_or(user_id);

        Ok(PlaceBidOutcome {
            bid: manual.bid,
            auto_bid,
            new_high_bidder,
            finalized,
        })
    }

    /// Validate and persist one bid, updating session and participant state
    /// in a single transaction. Callers hold the session lock.
    async fn apply_bid(
        &self,
        session_id: Uuid,
        pending: PendingBid,
    ) -> Result<AppliedBid, BiddingError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let session: Option<BiddingSession> = sqlx::query_as(&format!(
            "SELECT {} FROM bidding_sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?;
        let session = session.ok_or(BiddingError::SessionNotFound(session_id))?;

        let history: Vec<Bid> = sqlx::query_as(&format!(
            "SELECT {} FROM bids WHERE session_id = $1 ORDER BY sequence",
            BID_COLUMNS
        ))
        .bind(session_id)
        .fetch_all(&mut *tx)
        .await?;

        let validation = validate_bid(
            pending.amount,
            &session,
            pending.user_id,
            &history,
            &self.config,
            now,
        );
        if !validation.valid {
            return Err(BiddingError::BidRejected { validation });
        }

        let previous_high = session.current_high_bid();
        let increment = bid_increment(pending.amount, previous_high);
        let sequence = history.last().map(|b| b.sequence).unwrap_or(0) + 1;
        let round_number = history
            .iter()
            .filter(|b| b.user_id == pending.user_id)
            .count() as i32
            + 1;

        let bid_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO bids (
                id, session_id, user_id, amount, round_number, sequence,
                is_auto_bid, previous_high_bid, increment_amount,
                increment_percent, placed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(bid_id)
        .bind(session_id)
        .bind(pending.user_id)
        .bind(pending.amount)
        .bind(round_number)
        .bind(sequence)
        .bind(pending.is_auto_bid)
        .bind(previous_high)
        .bind(increment.amount)
        .bind(increment.percent)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE bidding_sessions
            SET current_high_bid_id = $1,
                winner_user_id = $2,
                winning_bid_amount = $3,
                current_round = GREATEST(current_round, $4),
                updated_at = $5
            WHERE id = $6
            "#,
        )
        .bind(bid_id)
        .bind(pending.user_id)
        .bind(pending.amount)
        .bind(round_number)
        .bind(now)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE bidding_participants
            SET current_bid_amount = $1,
                last_bid_at = $2,
                total_bids_placed = total_bids_placed + 1,
                updated_at = $2
            WHERE session_id = $3 AND user_id = $4
            "#,
        )
        .bind(pending.amount)
        .bind(now)
        .bind(session_id)
        .bind(pending.user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let bid: Bid = sqlx::query_as(&format!(
            "SELECT {} FROM bids WHERE id = $1",
            BID_COLUMNS
        ))
        .bind(bid_id)
        .fetch_one(&self.pool)
        .await?;

        let session = self.get_session(session_id).await?;
        let participants = self.get_participants(session_id).await?;

        info!(
            "Bid ${:.2} accepted on session {} (user {}, round {}, auto: {})",
            bid.amount, session_id, bid.user_id, bid.round_number, bid.is_auto_bid
        );

        Ok(AppliedBid {
            bid,
            session,
            participants,
        })
    }

    // ========================================================================
    // Auto-bid settings
    // ========================================================================

    pub async fn set_max_auto_bid(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        max_amount: Decimal,
    ) -> Result<AutoBidSettings, BiddingError> {
        if max_amount <= Decimal::ZERO {
            return Err(BiddingError::InvalidRequest(
                "Auto-bid ceiling must be positive".to_string(),
            ));
        }

        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        self.require_active(session_id).await?;
        self.get_participant(session_id, user_id).await?;

        sqlx::query(
            "UPDATE bidding_participants SET max_auto_bid_amount = $1, updated_at = NOW() \
             WHERE session_id = $2 AND user_id = $3",
        )
        .bind(max_amount)
        .bind(session_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        info!(
            "Auto-bid ceiling ${:.2} set for user {} in session {}",
            max_amount, user_id, session_id
        );

        let participant = self.get_participant(session_id, user_id).await?;
        Ok(AutoBidSettings::from(&participant))
    }

    pub async fn clear_auto_bid(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<AutoBidSettings, BiddingError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        self.require_active(session_id).await?;
        self.get_participant(session_id, user_id).await?;

        sqlx::query(
            "UPDATE bidding_participants SET max_auto_bid_amount = NULL, updated_at = NOW() \
             WHERE session_id = $1 AND user_id = $2",
        )
        .bind(session_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        let participant = self.get_participant(session_id, user_id).await?;
        Ok(AutoBidSettings::from(&participant))
    }

    pub async fn get_auto_bid_settings(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<AutoBidSettings, BiddingError> {
        self.require_active(session_id).await?;
        let participant = self.get_participant(session_id, user_id).await?;
        Ok(AutoBidSettings::from(&participant))
    }

    // ========================================================================
    // Withdrawal
    // ========================================================================

    /// Withdraw the calling participant. The current high bidder cannot
    /// abandon a position they are winning; for everyone else the session
    /// finalizes immediately with the remaining participant as winner.
    pub async fn withdraw_from_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        reason: Option<String>,
    ) -> Result<BiddingSession, BiddingError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let session = self.get_session(session_id).await?;
        if session.status != SessionStatus::Active {
            return Err(BiddingError::SessionNotActive {
                session_id,
                status: session.status,
            });
        }
        if !can_withdraw(&session, user_id) {
            return Err(BiddingError::CannotWithdrawAsLeader(session_id));
        }
        self.get_participant(session_id, user_id).await?;

        let participants = self.get_participants(session_id).await?;
        let remaining = participants
            .iter()
            .find(|p| p.user_id != user_id)
            .ok_or(BiddingError::WrongParticipantCount {
                session_id,
                found: participants.len(),
            })?;

        // Ceiling of zero is the durable withdrawal marker
        sqlx::query(
            "UPDATE bidding_participants SET max_auto_bid_amount = 0, updated_at = NOW() \
             WHERE session_id = $1 AND user_id = $2",
        )
        .bind(session_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        // With no bids placed yet the remaining participant wins by default
        // at the starting seed
        if session.winner_user_id.is_none() {
            sqlx::query(
                "UPDATE bidding_sessions SET winner_user_id = $1, updated_at = NOW() \
                 WHERE id = $2",
            )
            .bind(remaining.user_id)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        }

        info!(
            "User {} withdrew from session {} ({})",
            user_id,
            session_id,
            reason.as_deref().unwrap_or("no reason given")
        );

        self.notify(
            session_id,
            user_id,
            "withdrawal",
            "Withdrawal confirmed",
            "You have withdrawn from the bidding session",
        );

        self.finalize_locked(session_id, FinalizationReason::Withdrawal)
            .await?;

        self.get_session(session_id).await
    }

    pub async fn get_withdrawal_status(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<WithdrawalStatus, BiddingError> {
        let session = self.get_session(session_id).await?;
        let participant = self.get_participant(session_id, user_id).await?;

        Ok(WithdrawalStatus {
            session_id,
            user_id,
            has_withdrawn: participant.has_withdrawn(),
            session_status: session.status,
            is_winner: participant.is_winner,
            compensation_amount: participant.compensation_amount,
        })
    }

    // ========================================================================
    // Finalization / expiry / cancellation
    // ========================================================================

    /// Settle an active session. Idempotent: a second attempt is rejected
    /// without rewriting settlement figures.
    pub async fn finalize_session(
        &self,
        session_id: Uuid,
        reason: FinalizationReason,
    ) -> Result<BiddingResult, BiddingError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;
        self.finalize_locked(session_id, reason).await
    }

    async fn finalize_locked(
        &self,
        session_id: Uuid,
        reason: FinalizationReason,
    ) -> Result<BiddingResult, BiddingError> {
        let session = self.get_session(session_id).await?;
        if !can_finalize(&session) {
            return Err(BiddingError::AlreadyFinalized(session_id));
        }

        let participants = self.get_participants(session_id).await?;
        let outcome = determine_winner(&session, &participants, self.config.compensation_percent)?;

        // A timed-out session settles into `expired`; every other path
        // completes normally
        let terminal_status = match reason {
            FinalizationReason::Expired => SessionStatus::Expired,
            _ => SessionStatus::Completed,
        };

        let now = Utc::now();
        let result_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        // Status guard inside the transaction backs up the in-process lock
        let updated = sqlx::query(
            r#"
            UPDATE bidding_sessions
            SET status = $1,
                completed_at = $2,
                loser_compensation_amount = $3,
                platform_revenue = $4,
                updated_at = $2
            WHERE id = $5 AND status = 'active'
            "#,
        )
        .bind(terminal_status)
        .bind(now)
        .bind(outcome.loser_compensation)
        .bind(outcome.platform_revenue)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(BiddingError::AlreadyFinalized(session_id));
        }

        sqlx::query(
            "UPDATE bidding_participants SET is_winner = TRUE, updated_at = $1 \
             WHERE session_id = $2 AND user_id = $3",
        )
        .bind(now)
        .bind(session_id)
        .bind(outcome.winner_user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE bidding_participants SET is_winner = FALSE, compensation_amount = $1, \
             updated_at = $2 WHERE session_id = $3 AND user_id = $4",
        )
        .bind(outcome.loser_compensation)
        .bind(now)
        .bind(session_id)
        .bind(outcome.loser_user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO bidding_results (
                id, session_id, winner_user_id, loser_user_id,
                winning_bid_amount, loser_compensation_amount, platform_revenue,
                reason, finalized_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(result_id)
        .bind(session_id)
        .bind(outcome.winner_user_id)
        .bind(outcome.loser_user_id)
        .bind(outcome.winning_bid_amount)
        .bind(outcome.loser_compensation)
        .bind(outcome.platform_revenue)
        .bind(reason)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.discard_session_lock(session_id);

        info!(
            "Session {} finalized ({}): winner {} at ${:.2}, compensation ${:.2}, revenue ${:.2}",
            session_id,
            reason,
            outcome.winner_user_id,
            outcome.winning_bid_amount,
            outcome.loser_compensation,
            outcome.platform_revenue
        );
        metrics::counter!("bidding_sessions_finalized_total", "reason" => reason.to_string())
            .increment(1);

        self.notify(
            session_id,
            outcome.winner_user_id,
            "session_won",
            "You won the bidding war",
            &format!(
                "Your bid of ${:.2} won the night. Payment will be collected shortly",
                outcome.winning_bid_amount
            ),
        );
        self.notify(
            session_id,
            outcome.loser_user_id,
            "session_lost",
            "Bidding war ended",
            &format!(
                "The winning bid was ${:.2}. A compensation of ${:.2} will be credited to you",
                outcome.winning_bid_amount, outcome.loser_compensation
            ),
        );

        let result: BiddingResult = sqlx::query_as(
            "SELECT id, session_id, winner_user_id, loser_user_id, winning_bid_amount, \
             loser_compensation_amount, platform_revenue, reason, finalized_at \
             FROM bidding_results WHERE id = $1",
        )
        .bind(result_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    /// Mark a session past its deadline as expired. With a standing leader
    /// this still produces a winner/loser settlement; with zero bids no
    /// settlement record is written.
    pub async fn expire_session(&self, session_id: Uuid) -> Result<BiddingSession, BiddingError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;
        self.expire_locked(session_id).await?;
        self.get_session(session_id).await
    }

    async fn expire_locked(&self, session_id: Uuid) -> Result<(), BiddingError> {
        let session = self.get_session(session_id).await?;
        if !can_finalize(&session) {
            return Err(BiddingError::AlreadyFinalized(session_id));
        }

        if session.has_bids() {
            self.finalize_locked(session_id, FinalizationReason::Expired)
                .await?;
            return Ok(());
        }

        let updated = sqlx::query(
            "UPDATE bidding_sessions SET status = 'expired', completed_at = NOW(), \
             updated_at = NOW() WHERE id = $1 AND status = 'active'",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(BiddingError::AlreadyFinalized(session_id));
        }
        self.discard_session_lock(session_id);

        info!("Session {} expired with no bids; no settlement", session_id);
        metrics::counter!("bidding_sessions_expired_total").increment(1);

        for participant in self.get_participants(session_id).await? {
            self.notify(
                session_id,
                participant.user_id,
                "session_expired",
                "Bidding session expired",
                "The bidding window closed without any bids",
            );
        }

        Ok(())
    }

    /// Administrative abort. Terminal, no settlement.
    pub async fn cancel_session(
        &self,
        session_id: Uuid,
        reason: Option<String>,
    ) -> Result<BiddingSession, BiddingError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let session = self.get_session(session_id).await?;
        if session.status.is_terminal() {
            return Err(BiddingError::AlreadyFinalized(session_id));
        }

        sqlx::query(
            "UPDATE bidding_sessions SET status = 'cancelled', completed_at = NOW(), \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        self.discard_session_lock(session_id);

        info!(
            "Session {} cancelled ({})",
            session_id,
            reason.as_deref().unwrap_or("no reason given")
        );
        metrics::counter!("bidding_sessions_cancelled_total").increment(1);

        for participant in self.get_participants(session_id).await? {
            self.notify(
                session_id,
                participant.user_id,
                "session_cancelled",
                "Bidding session cancelled",
                reason.as_deref().unwrap_or("The bidding session was cancelled"),
            );
        }

        self.get_session(session_id).await
    }

    /// Force-expire every active session past its deadline. Run by the
    /// periodic sweep; the core itself only observes expiry lazily.
    pub async fn sweep_expired_sessions(&self) -> Result<usize, BiddingError> {
        let overdue: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM bidding_sessions \
             WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at < NOW()",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut expired = 0;
        for (session_id,) in overdue {
            match self.expire_session(session_id).await {
                Ok(_) => expired += 1,
                // A bid can land between the scan and the lock; skip quietly
                Err(BiddingError::AlreadyFinalized(_)) => {}
                Err(e) => error!("Failed to expire session {}: {}", session_id, e),
            }
        }

        Ok(expired)
    }

    fn notify(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        notification_type: &str,
        title: &str,
        message: &str,
    ) {
        self.notifier.send(NotificationRequest {
            session_id,
            user_id,
            notification_type: notification_type.to_string(),
            title: title.to_string(),
            message: message.to_string(),
            action_url: Some(format!("/bidding/sessions/{}", session_id)),
            channels: vec!["in_app".to_string(), "push".to_string()],
        });
    }

    async fn require_active(&self, session_id: Uuid) -> Result<BiddingSession, BiddingError> {
        let session = self.get_session(session_id).await?;
        if session.status != SessionStatus::Active {
            return Err(BiddingError::SessionNotActive {
                session_id,
                status: session.status,
            });
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> BiddingService {
        // Lazy pool: never connects, which is all these tests need
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/bidding")
            .unwrap();
        BiddingService::new(pool, BiddingConfig::default(), NotificationSender::disconnected())
    }

    #[tokio::test]
    async fn test_session_lock_reused_until_discarded() {
        let svc = service();
        let session_id = Uuid::new_v4();

        let first = svc.session_lock(session_id);
        let second = svc.session_lock(session_id);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(svc.session_locks.len(), 1);

        // Terminal transitions discard the entry so the map stays bounded
        svc.discard_session_lock(session_id);
        assert!(svc.session_locks.is_empty());

        let fresh = svc.session_lock(session_id);
        assert!(!Arc::ptr_eq(&first, &fresh));
    }
}
