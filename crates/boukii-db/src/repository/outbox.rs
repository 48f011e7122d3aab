//! # Notification Outbox Repository
//!
//! Queue of confirmation mails produced by settlements.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Pattern Implementation                        │
//! │                                                                         │
//! │  WEBHOOK SETTLEMENT                                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │                                                                 │   │
//! │  │  1. UPDATE bookings SET paid = 1 ... WHERE paid = 0            │   │
//! │  │  2. INSERT INTO payments (...)                                  │   │
//! │  │  3. INSERT INTO notification_outbox (kind, recipient, payload) │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← mail is queued iff the payment is recorded                   │
//! │       │                                                                 │
//! │       ▼  (webhook already answered "OK")                               │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            NOTIFICATION DISPATCHER (async)                      │   │
//! │  │                                                                 │   │
//! │  │  1. SELECT * FROM notification_outbox WHERE sent_at IS NULL    │   │
//! │  │  2. For each entry:                                            │   │
//! │  │     a. Mailer::send                                            │   │
//! │  │     b. On success: UPDATE ... SET sent_at = NOW()              │   │
//! │  │     c. On failure: UPDATE ... SET attempts += 1, last_error    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use boukii_core::{NewNotification, NotificationOutboxEntry};

/// Repository for notification outbox operations.
#[derive(Debug, Clone)]
pub struct NotificationOutboxRepository {
    pool: SqlitePool,
}

impl NotificationOutboxRepository {
    /// Creates a new NotificationOutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        NotificationOutboxRepository { pool }
    }

    /// Queues a notification inside an open transaction.
    ///
    /// Only the settlement calls this, so the entry commits or rolls back
    /// together with the state change that caused it.
    pub async fn enqueue_tx(
        tx: &mut Transaction<'_, Sqlite>,
        notification: &NewNotification,
        now: DateTime<Utc>,
    ) -> DbResult<String> {
        let id = Uuid::new_v4().to_string();

        debug!(
            kind = ?notification.kind,
            recipient = %notification.recipient,
            "Queuing notification"
        );

        sqlx::query(
            r#"
            INSERT INTO notification_outbox (
                id, kind, recipient, payload, attempts, last_error,
                created_at, attempted_at, sent_at
            ) VALUES (?1, ?2, ?3, ?4, 0, NULL, ?5, NULL, NULL)
            "#,
        )
        .bind(&id)
        .bind(notification.kind)
        .bind(&notification.recipient)
        .bind(&notification.payload)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        Ok(id)
    }

    /// Gets unsent entries that have not exhausted their attempts, oldest
    /// first.
    pub async fn get_pending(
        &self,
        limit: u32,
        max_attempts: i64,
    ) -> DbResult<Vec<NotificationOutboxEntry>> {
        let entries = sqlx::query_as::<_, NotificationOutboxEntry>(
            r#"
            SELECT
                id, kind, recipient, payload, attempts, last_error,
                created_at, attempted_at, sent_at
            FROM notification_outbox
            WHERE sent_at IS NULL AND attempts < ?2
            ORDER BY created_at ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .bind(max_attempts)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Marks an entry as sent.
    pub async fn mark_sent(&self, id: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE notification_outbox SET
                sent_at = ?2,
                attempted_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a delivery failure.
    pub async fn mark_failed(&self, id: &str, error: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE notification_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts unsent entries.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notification_outbox WHERE sent_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Gets an entry by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<NotificationOutboxEntry>> {
        let entry = sqlx::query_as::<_, NotificationOutboxEntry>(
            r#"
            SELECT
                id, kind, recipient, payload, attempts, last_error,
                created_at, attempted_at, sent_at
            FROM notification_outbox
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }
}
