//! Notification dispatch
//!
//! Notifications are queued through an in-process channel and persisted by a
//! background worker; actual delivery (email/push) is an external
//! collaborator reading the `notifications` collection. Dispatch is
//! fire-and-forget relative to the business transaction: a failed send is
//! logged and never rolls back a bid or a finalization.

use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// One notification to a participant
#[derive(Debug, Clone, Serialize)]
pub struct NotificationRequest {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub action_url: Option<String>,
    pub channels: Vec<String>,
}

/// Cloneable queue handle held by the bidding service
#[derive(Clone)]
pub struct NotificationSender {
    queue_tx: mpsc::Sender<NotificationRequest>,
}

impl NotificationSender {
    /// Queue a notification. Best-effort: a full or closed queue is logged
    /// and dropped, never surfaced to the caller.
    pub fn send(&self, request: NotificationRequest) {
        if let Err(e) = self.queue_tx.try_send(request) {
            warn!("Failed to queue notification: {}", e);
        }
    }

    /// A sender with no worker behind it; queued notifications are dropped.
    #[cfg(test)]
    pub fn disconnected() -> Self {
        let (queue_tx, _queue_rx) = mpsc::channel(1);
        Self { queue_tx }
    }
}

/// Notification dispatcher with a persistence worker
pub struct NotificationDispatcher {
    pool: PgPool,
    queue_tx: mpsc::Sender<NotificationRequest>,
    queue_rx: Option<mpsc::Receiver<NotificationRequest>>,
}

impl NotificationDispatcher {
    pub fn new(pool: PgPool) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(1000);
        Self {
            pool,
            queue_tx,
            queue_rx: Some(queue_rx),
        }
    }

    /// Start the dispatch worker and return the queue handle
    pub fn start_worker(mut self) -> NotificationSender {
        let sender = NotificationSender {
            queue_tx: self.queue_tx.clone(),
        };
        let mut queue_rx = match self.queue_rx.take() {
            Some(rx) => rx,
            None => {
                warn!("Notification worker already started");
                return sender;
            }
        };

        tokio::spawn(async move {
            info!("Notification worker started");

            while let Some(request) = queue_rx.recv().await {
                if let Err(e) = self.persist(&request).await {
                    // Logged but never propagated; delivery is best-effort
                    error!(
                        "Failed to persist notification for user {} in session {}: {}",
                        request.user_id, request.session_id, e
                    );
                }
            }

            info!("Notification worker stopped");
        });

        sender
    }

    async fn persist(&self, request: &NotificationRequest) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, session_id, user_id, notification_type, title, message,
                action_url, channels, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.session_id)
        .bind(request.user_id)
        .bind(&request.notification_type)
        .bind(&request.title)
        .bind(&request.message)
        .bind(&request.action_url)
        .bind(&request.channels)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
