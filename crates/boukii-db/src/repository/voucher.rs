//! # Voucher Repository
//!
//! Vouchers and their debit/credit logs.
//!
//! ## Balance Invariant
//! ```text
//! remaining_balance = quantity - Σ |cleared debits|
//!
//! VoucherLog { amount: -2500, status: pending }   reserved at checkout
//!        │
//!        ▼  booking payment confirmed (settlement transaction)
//! VoucherLog { amount: -2500, status: NULL }      remaining_balance -= 2500
//! ```
//!
//! Balances only move inside the settlement transaction; this repository
//! reads vouchers and records reservations.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use boukii_core::{Voucher, VoucherLog};

const VOUCHER_COLUMNS: &str = r#"
    id, code, quantity_cents, remaining_balance_cents, payed, client_id,
    school_id, payrexx_reference, payrexx_transaction, created_at, updated_at
"#;

/// Repository for voucher database operations.
#[derive(Debug, Clone)]
pub struct VoucherRepository {
    pool: SqlitePool,
}

impl VoucherRepository {
    pub fn new(pool: SqlitePool) -> Self {
        VoucherRepository { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Voucher>> {
        let voucher = sqlx::query_as::<_, Voucher>(&format!(
            "SELECT {} FROM vouchers WHERE id = ?1",
            VOUCHER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(voucher)
    }

    pub async fn find_by_reference(&self, reference: &str) -> DbResult<Option<Voucher>> {
        let voucher = sqlx::query_as::<_, Voucher>(&format!(
            "SELECT {} FROM vouchers WHERE payrexx_reference = ?1",
            VOUCHER_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        Ok(voucher)
    }

    pub async fn insert(&self, voucher: &Voucher) -> DbResult<()> {
        debug!(voucher_id = voucher.id, code = %voucher.code, "Inserting voucher");

        sqlx::query(
            r#"
            INSERT INTO vouchers (
                id, code, quantity_cents, remaining_balance_cents, payed, client_id,
                school_id, payrexx_reference, payrexx_transaction, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(voucher.id)
        .bind(&voucher.code)
        .bind(voucher.quantity_cents)
        .bind(voucher.remaining_balance_cents)
        .bind(voucher.payed)
        .bind(voucher.client_id)
        .bind(voucher.school_id)
        .bind(&voucher.payrexx_reference)
        .bind(&voucher.payrexx_transaction)
        .bind(voucher.created_at)
        .bind(voucher.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Generate-if-absent for the voucher's gateway reference.
    pub async fn ensure_reference(&self, voucher_id: i64, candidate: &str) -> DbResult<String> {
        let result = sqlx::query(
            r#"
            UPDATE vouchers SET payrexx_reference = ?2
            WHERE id = ?1 AND payrexx_reference IS NULL
            "#,
        )
        .bind(voucher_id)
        .bind(candidate)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            debug!(voucher_id, reference = %candidate, "Generated voucher reference");
        }

        let stored: Option<Option<String>> =
            sqlx::query_scalar("SELECT payrexx_reference FROM vouchers WHERE id = ?1")
                .bind(voucher_id)
                .fetch_optional(&self.pool)
                .await?;

        stored
            .flatten()
            .ok_or_else(|| DbError::not_found("Voucher", voucher_id))
    }

    // =========================================================================
    // Voucher logs
    // =========================================================================

    /// Records a voucher log (a reservation when `status` is pending).
    pub async fn insert_log(&self, log: &VoucherLog) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO voucher_logs (id, voucher_id, booking_id, amount_cents, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(log.id)
        .bind(log.voucher_id)
        .bind(log.booking_id)
        .bind(log.amount_cents)
        .bind(log.status)
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Every log tied to a booking, pending or cleared.
    pub async fn logs_for_booking(&self, booking_id: i64) -> DbResult<Vec<VoucherLog>> {
        let logs = sqlx::query_as::<_, VoucherLog>(
            r#"
            SELECT id, voucher_id, booking_id, amount_cents, status, created_at
            FROM voucher_logs
            WHERE booking_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }
}
