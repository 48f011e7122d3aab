//! # Booking Repository
//!
//! Database operations for bookings and their participant slots.
//!
//! ## Reference Generation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ensure_reference(booking_id, "Boukii #42")                             │
//! │                                                                         │
//! │  UPDATE bookings SET payrexx_reference = ?                              │
//! │  WHERE id = ? AND payrexx_reference IS NULL    ← first writer wins      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SELECT payrexx_reference FROM bookings WHERE id = ?                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  stored value (never the candidate if one was already there)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lookups by reference deliberately include cancelled bookings: a late
//! confirmation must be able to find and resurrect them.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use boukii_core::lifecycle::derive_booking_status;
use boukii_core::{Booking, BookingStatus, BookingUser, Lifecycle, TransactionSnapshot};

const BOOKING_COLUMNS: &str = r#"
    id, school_id, client_main_id, price_total_cents, currency,
    paid, paid_total_cents, payment_method_id, payrexx_reference,
    payrexx_transaction, source, status, lifecycle, cancelled_at,
    created_at, updated_at
"#;

/// Repository for booking database operations.
#[derive(Debug, Clone)]
pub struct BookingRepository {
    pool: SqlitePool,
}

impl BookingRepository {
    /// Creates a new BookingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BookingRepository { pool }
    }

    /// Gets a booking by ID, whatever its lifecycle.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE id = ?1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(booking)
    }

    /// Finds the booking carrying a gateway reference, including cancelled
    /// ones.
    pub async fn find_by_reference(&self, reference: &str) -> DbResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE payrexx_reference = ?1",
            BOOKING_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        Ok(booking)
    }

    /// Inserts a booking.
    pub async fn insert(&self, booking: &Booking) -> DbResult<()> {
        debug!(booking_id = booking.id, school_id = booking.school_id, "Inserting booking");

        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, school_id, client_main_id, price_total_cents, currency,
                paid, paid_total_cents, payment_method_id, payrexx_reference,
                payrexx_transaction, source, status, lifecycle, cancelled_at,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9,
                ?10, ?11, ?12, ?13, ?14,
                ?15, ?16
            )
            "#,
        )
        .bind(booking.id)
        .bind(booking.school_id)
        .bind(booking.client_main_id)
        .bind(booking.price_total_cents)
        .bind(&booking.currency)
        .bind(booking.paid)
        .bind(booking.paid_total_cents)
        .bind(booking.payment_method_id)
        .bind(&booking.payrexx_reference)
        .bind(&booking.payrexx_transaction)
        .bind(booking.source)
        .bind(booking.status)
        .bind(booking.lifecycle)
        .bind(booking.cancelled_at)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Stamps `candidate` as the booking's reference unless one is already
    /// set, then returns whatever is stored.
    pub async fn ensure_reference(&self, booking_id: i64, candidate: &str) -> DbResult<String> {
        let result = sqlx::query(
            r#"
            UPDATE bookings SET payrexx_reference = ?2, updated_at = ?3
            WHERE id = ?1 AND payrexx_reference IS NULL
            "#,
        )
        .bind(booking_id)
        .bind(candidate)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            debug!(booking_id, reference = %candidate, "Generated booking reference");
        }

        let stored: Option<Option<String>> =
            sqlx::query_scalar("SELECT payrexx_reference FROM bookings WHERE id = ?1")
                .bind(booking_id)
                .fetch_optional(&self.pool)
                .await?;

        stored
            .flatten()
            .ok_or_else(|| DbError::not_found("Booking", booking_id))
    }

    /// Adds `amount_cents` to `refundedAmount` of the stored snapshot and
    /// returns the updated snapshot.
    ///
    /// The increment happens inside SQLite, so concurrent refunds of the same
    /// booking all count.
    pub async fn add_refunded_amount(
        &self,
        booking_id: i64,
        amount_cents: i64,
        now: DateTime<Utc>,
    ) -> DbResult<TransactionSnapshot> {
        let stored: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE bookings SET
                payrexx_transaction = json_set(
                    payrexx_transaction,
                    '$.refundedAmount',
                    COALESCE(json_extract(payrexx_transaction, '$.refundedAmount'), 0) + ?2
                ),
                updated_at = ?3
            WHERE id = ?1 AND payrexx_transaction IS NOT NULL
            RETURNING payrexx_transaction
            "#,
        )
        .bind(booking_id)
        .bind(amount_cents)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        let json = stored.ok_or_else(|| DbError::not_found("Booking transaction", booking_id))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Cancels a booking and all of its participant slots.
    ///
    /// This is the optimistic cancel the back-office applies when a
    /// checkout is abandoned; a later confirmed payment undoes it.
    pub async fn cancel(&self, booking_id: i64, now: DateTime<Utc>) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE bookings SET lifecycle = 'cancelled', cancelled_at = ?2, updated_at = ?2
            WHERE id = ?1 AND lifecycle = 'active'
            "#,
        )
        .bind(booking_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DbError::not_found("Booking (active)", booking_id));
        }

        sqlx::query(
            r#"
            UPDATE booking_users SET lifecycle = 'cancelled', cancelled_at = ?2
            WHERE booking_id = ?1 AND lifecycle = 'active'
            "#,
        )
        .bind(booking_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let users: Vec<Lifecycle> =
            sqlx::query_scalar("SELECT lifecycle FROM booking_users WHERE booking_id = ?1")
                .bind(booking_id)
                .fetch_all(&mut *tx)
                .await?;
        let current: BookingStatus =
            sqlx::query_scalar("SELECT status FROM bookings WHERE id = ?1")
                .bind(booking_id)
                .fetch_one(&mut *tx)
                .await?;

        let status = derive_booking_status(current, Lifecycle::Cancelled, &users);
        sqlx::query("UPDATE bookings SET status = ?2 WHERE id = ?1")
            .bind(booking_id)
            .bind(status)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(booking_id, ?status, "Booking cancelled");
        Ok(())
    }

    // =========================================================================
    // Booking users
    // =========================================================================

    /// Gets every participant slot of a booking, whatever its lifecycle.
    pub async fn users(&self, booking_id: i64) -> DbResult<Vec<BookingUser>> {
        let users = sqlx::query_as::<_, BookingUser>(
            r#"
            SELECT id, booking_id, client_id, lifecycle, cancelled_at, created_at
            FROM booking_users
            WHERE booking_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    pub async fn insert_user(&self, user: &BookingUser) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO booking_users (id, booking_id, client_id, lifecycle, cancelled_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(user.id)
        .bind(user.booking_id)
        .bind(user.client_id)
        .bind(user.lifecycle)
        .bind(user.cancelled_at)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::fixtures;
    use boukii_core::{BookingStatus, Lifecycle};
    use chrono::Utc;

    #[tokio::test]
    async fn test_find_by_reference_includes_cancelled() {
        let db = fixtures::database().await;
        fixtures::seed_school_and_client(&db).await;
        let mut booking = fixtures::booking(10, 12000);
        booking.payrexx_reference = Some("REF-100".to_string());
        db.bookings().insert(&booking).await.unwrap();
        db.bookings().insert_user(&fixtures::booking_user(1, 10)).await.unwrap();

        db.bookings().cancel(10, Utc::now()).await.unwrap();

        let found = db.bookings().find_by_reference("REF-100").await.unwrap().unwrap();
        assert_eq!(found.id, 10);
        assert_eq!(found.lifecycle, Lifecycle::Cancelled);
        assert_eq!(found.status, BookingStatus::AllCancelled);
        assert!(db.bookings().find_by_reference("REF-999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ensure_reference_is_generated_once() {
        let db = fixtures::database().await;
        fixtures::seed_school_and_client(&db).await;
        db.bookings().insert(&fixtures::booking(10, 12000)).await.unwrap();

        let first = db.bookings().ensure_reference(10, "Boukii #10").await.unwrap();
        let second = db.bookings().ensure_reference(10, "Boukii #other").await.unwrap();

        assert_eq!(first, "Boukii #10");
        assert_eq!(second, "Boukii #10");
    }

    #[tokio::test]
    async fn test_ensure_reference_unknown_booking() {
        let db = fixtures::database().await;
        let err = db.bookings().ensure_reference(404, "Boukii #404").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_reference_is_unique() {
        let db = fixtures::database().await;
        fixtures::seed_school_and_client(&db).await;
        db.bookings().insert(&fixtures::booking(10, 12000)).await.unwrap();
        db.bookings().insert(&fixtures::booking(11, 5000)).await.unwrap();

        db.bookings().ensure_reference(10, "REF-100").await.unwrap();
        let err = db.bookings().ensure_reference(11, "REF-100").await.unwrap_err();
        assert!(matches!(err, crate::DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_refunds_accumulate_on_snapshot() {
        let db = fixtures::database().await;
        fixtures::seed_school_and_client(&db).await;
        let mut booking = fixtures::booking(10, 12000);
        booking.payrexx_transaction = Some(
            r#"{"id":"777","time":"2025-01-15 10:12:13","totalAmount":12000,"refundedAmount":0,"referenceId":"Boukii #10"}"#
                .to_string(),
        );
        db.bookings().insert(&booking).await.unwrap();

        let repo = db.bookings();
        let (a, b) = tokio::join!(
            repo.add_refunded_amount(10, 4000, Utc::now()),
            repo.add_refunded_amount(10, 4000, Utc::now())
        );
        a.unwrap();
        b.unwrap();

        let stored = db
            .bookings()
            .get_by_id(10)
            .await
            .unwrap()
            .unwrap()
            .transaction_snapshot()
            .unwrap();
        assert_eq!(stored.refunded_amount, 8000);
        assert_eq!(stored.total_amount, 12000);
        assert_eq!(stored.id, "777");
    }

    #[tokio::test]
    async fn test_refund_without_snapshot_is_not_found() {
        let db = fixtures::database().await;
        fixtures::seed_school_and_client(&db).await;
        db.bookings().insert(&fixtures::booking(10, 12000)).await.unwrap();

        let err = db.bookings().add_refunded_amount(10, 4000, Utc::now()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_cancel_cascades_to_users() {
        let db = fixtures::database().await;
        fixtures::seed_school_and_client(&db).await;
        db.bookings().insert(&fixtures::booking(10, 12000)).await.unwrap();
        db.bookings().insert_user(&fixtures::booking_user(1, 10)).await.unwrap();
        db.bookings().insert_user(&fixtures::booking_user(2, 10)).await.unwrap();

        db.bookings().cancel(10, Utc::now()).await.unwrap();

        let users = db.bookings().users(10).await.unwrap();
        assert!(users.iter().all(|u| u.lifecycle == Lifecycle::Cancelled));
        assert!(users.iter().all(|u| u.cancelled_at.is_some()));

        // Cancelling twice is refused
        assert!(db.bookings().cancel(10, Utc::now()).await.is_err());
    }
}
