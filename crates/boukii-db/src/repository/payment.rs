//! # Payment Repository
//!
//! Payments are append-only: rows are written by the settlement transaction
//! and never updated, so this repository only reads.

use sqlx::SqlitePool;

use crate::error::DbResult;
use boukii_core::{Money, Payment};

/// Repository for payment records.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Payments recorded against a booking, oldest first.
    pub async fn list_for_booking(&self, booking_id: i64) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, booking_id, school_id, amount_cents, status,
                   payrexx_reference, payrexx_transaction, created_at
            FROM payments
            WHERE booking_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Sum of recorded payments for a booking.
    pub async fn total_for_booking(&self, booking_id: i64) -> DbResult<Money> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM payments WHERE booking_id = ?1",
        )
        .bind(booking_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(total))
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
