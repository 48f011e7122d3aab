//! # Settlement Repository
//!
//! The only writer that flips `paid` / `payed`. Everything a confirmed
//! payment changes is applied in one SQLite transaction.
//!
//! ## Booking Settlement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │                                                                         │
//! │  1. CLAIM   UPDATE bookings SET paid = 1, paid_total += total, ...     │
//! │             WHERE id = ? AND paid = 0                                  │
//! │             0 rows ──► ROLLBACK, AlreadySettled                        │
//! │                                                                         │
//! │  2. RESURRECT  booking lifecycle ≠ active ──► active,                  │
//! │                then every non-active booking user ──► active           │
//! │                                                                         │
//! │  3. STATUS  derive_booking_status(users) ──► bookings.status           │
//! │                                                                         │
//! │  4. VOUCHERS (web checkout with vouchers only)                         │
//! │             for each pending log: voucher.remaining -= |amount|,       │
//! │                                   log.status = NULL                    │
//! │                                                                         │
//! │  5. INSERT payments (...)                                              │
//! │  6. INSERT notification_outbox (...)   (when a mail is due)            │
//! │                                                                         │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The claim is the first statement, so the transaction takes SQLite's write
//! lock before reading anything. Two concurrent deliveries serialise on that
//! lock and the second sees `paid = 1`.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, warn};

use crate::error::DbResult;
use crate::repository::outbox::NotificationOutboxRepository;
use boukii_core::lifecycle::derive_booking_status;
use boukii_core::{
    BookingStatus, Lifecycle, Money, NewNotification, TransactionSnapshot, VoucherLog,
};

// =============================================================================
// Inputs / Outcomes
// =============================================================================

/// A confirmed booking payment to apply.
#[derive(Debug, Clone)]
pub struct BookingSettlement {
    pub booking_id: i64,
    pub school_id: i64,
    pub snapshot: TransactionSnapshot,
    /// Clear pending voucher reservations and debit their vouchers.
    pub settle_vouchers: bool,
    pub notification: Option<NewNotification>,
    pub now: DateTime<Utc>,
}

/// A confirmed voucher purchase to apply.
#[derive(Debug, Clone)]
pub struct VoucherSettlement {
    pub voucher_id: i64,
    pub snapshot: TransactionSnapshot,
    pub notification: Option<NewNotification>,
    pub now: DateTime<Utc>,
}

/// What a settlement changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReport {
    /// Row id of the appended payment (booking settlements only).
    pub payment_id: Option<i64>,
    /// The booking was cancelled and has been brought back.
    pub resurrected: bool,
    pub resurrected_users: u64,
    pub status: Option<BookingStatus>,
    pub cleared_voucher_logs: usize,
    /// Total debited from voucher balances.
    pub voucher_debit: Money,
    pub notification_id: Option<String>,
}

impl SettlementReport {
    fn empty() -> Self {
        SettlementReport {
            payment_id: None,
            resurrected: false,
            resurrected_users: 0,
            status: None,
            cleared_voucher_logs: 0,
            voucher_debit: Money::zero(),
            notification_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    Settled(SettlementReport),
    /// Another delivery got there first; nothing was written.
    AlreadySettled,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository owning the settlement transaction.
#[derive(Debug, Clone)]
pub struct SettlementRepository {
    pool: SqlitePool,
}

impl SettlementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettlementRepository { pool }
    }

    /// Applies a confirmed booking payment exactly once.
    pub async fn settle_booking(&self, settlement: &BookingSettlement) -> DbResult<SettlementOutcome> {
        let booking_id = settlement.booking_id;
        let snapshot_json = settlement.snapshot.to_json()?;
        let now = settlement.now;

        let mut tx = self.pool.begin().await?;

        // 1. Claim
        let claimed = sqlx::query(
            r#"
            UPDATE bookings SET
                paid = 1,
                paid_total_cents = paid_total_cents + ?2,
                payrexx_transaction = ?3,
                updated_at = ?4
            WHERE id = ?1 AND paid = 0
            "#,
        )
        .bind(booking_id)
        .bind(settlement.snapshot.total_amount)
        .bind(&snapshot_json)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            debug!(booking_id, "Booking already settled");
            return Ok(SettlementOutcome::AlreadySettled);
        }

        let mut report = SettlementReport::empty();

        // 2. Resurrect
        let revived = sqlx::query(
            r#"
            UPDATE bookings SET lifecycle = 'active', cancelled_at = NULL
            WHERE id = ?1 AND lifecycle <> 'active'
            "#,
        )
        .bind(booking_id)
        .execute(&mut *tx)
        .await?;
        report.resurrected = revived.rows_affected() > 0;

        if report.resurrected {
            let users = sqlx::query(
                r#"
                UPDATE booking_users SET lifecycle = 'active', cancelled_at = NULL
                WHERE booking_id = ?1 AND lifecycle <> 'active'
                "#,
            )
            .bind(booking_id)
            .execute(&mut *tx)
            .await?;
            report.resurrected_users = users.rows_affected();
        }

        // 3. Derived status
        report.status = Some(Self::refresh_status(&mut tx, booking_id).await?);

        // 4. Voucher reservations
        if settlement.settle_vouchers {
            let (cleared, debit) = Self::clear_pending_vouchers(&mut tx, booking_id, now).await?;
            report.cleared_voucher_logs = cleared;
            report.voucher_debit = debit;
        }

        // 5. Payment
        let inserted = sqlx::query(
            r#"
            INSERT INTO payments (
                booking_id, school_id, amount_cents, status,
                payrexx_reference, payrexx_transaction, created_at
            ) VALUES (?1, ?2, ?3, 'paid', ?4, ?5, ?6)
            "#,
        )
        .bind(booking_id)
        .bind(settlement.school_id)
        .bind(settlement.snapshot.total_amount)
        .bind(&settlement.snapshot.reference_id)
        .bind(&snapshot_json)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        report.payment_id = Some(inserted.last_insert_rowid());

        // 6. Notification
        if let Some(notification) = &settlement.notification {
            let id = NotificationOutboxRepository::enqueue_tx(&mut tx, notification, now).await?;
            report.notification_id = Some(id);
        }

        tx.commit().await?;

        debug!(
            booking_id,
            payment_id = ?report.payment_id,
            resurrected = report.resurrected,
            cleared_voucher_logs = report.cleared_voucher_logs,
            "Booking settled"
        );

        Ok(SettlementOutcome::Settled(report))
    }

    /// Applies a confirmed voucher purchase exactly once.
    pub async fn settle_voucher(&self, settlement: &VoucherSettlement) -> DbResult<SettlementOutcome> {
        let voucher_id = settlement.voucher_id;
        let snapshot_json = settlement.snapshot.to_json()?;

        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            UPDATE vouchers SET
                payed = 1,
                payrexx_transaction = ?2,
                updated_at = ?3
            WHERE id = ?1 AND payed = 0
            "#,
        )
        .bind(voucher_id)
        .bind(&snapshot_json)
        .bind(settlement.now)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            debug!(voucher_id, "Voucher already settled");
            return Ok(SettlementOutcome::AlreadySettled);
        }

        let mut report = SettlementReport::empty();

        if let Some(notification) = &settlement.notification {
            let id =
                NotificationOutboxRepository::enqueue_tx(&mut tx, notification, settlement.now)
                    .await?;
            report.notification_id = Some(id);
        }

        tx.commit().await?;

        debug!(voucher_id, "Voucher settled");
        Ok(SettlementOutcome::Settled(report))
    }

    async fn refresh_status(
        tx: &mut Transaction<'_, Sqlite>,
        booking_id: i64,
    ) -> DbResult<BookingStatus> {
        let (current, lifecycle): (BookingStatus, Lifecycle) =
            sqlx::query_as("SELECT status, lifecycle FROM bookings WHERE id = ?1")
                .bind(booking_id)
                .fetch_one(&mut **tx)
                .await?;

        let users: Vec<Lifecycle> =
            sqlx::query_scalar("SELECT lifecycle FROM booking_users WHERE booking_id = ?1")
                .bind(booking_id)
                .fetch_all(&mut **tx)
                .await?;

        let status = derive_booking_status(current, lifecycle, &users);
        if status != current {
            sqlx::query("UPDATE bookings SET status = ?2 WHERE id = ?1")
                .bind(booking_id)
                .bind(status)
                .execute(&mut **tx)
                .await?;
        }

        Ok(status)
    }

    async fn clear_pending_vouchers(
        tx: &mut Transaction<'_, Sqlite>,
        booking_id: i64,
        now: DateTime<Utc>,
    ) -> DbResult<(usize, Money)> {
        let pending = sqlx::query_as::<_, VoucherLog>(
            r#"
            SELECT id, voucher_id, booking_id, amount_cents, status, created_at
            FROM voucher_logs
            WHERE booking_id = ?1 AND status = 'pending'
            ORDER BY id ASC
            "#,
        )
        .bind(booking_id)
        .fetch_all(&mut **tx)
        .await?;

        let mut debit = Money::zero();

        for log in &pending {
            let amount = log.amount().abs();

            let remaining: Option<i64> =
                sqlx::query_scalar("SELECT remaining_balance_cents FROM vouchers WHERE id = ?1")
                    .bind(log.voucher_id)
                    .fetch_optional(&mut **tx)
                    .await?;

            match remaining {
                Some(balance) if balance < amount.cents() => warn!(
                    voucher_id = log.voucher_id,
                    balance,
                    debit = amount.cents(),
                    "Voucher debit exceeds remaining balance"
                ),
                None => warn!(voucher_id = log.voucher_id, "Voucher log references missing voucher"),
                _ => {}
            }

            sqlx::query(
                r#"
                UPDATE vouchers SET
                    remaining_balance_cents = remaining_balance_cents - ?2,
                    updated_at = ?3
                WHERE id = ?1
                "#,
            )
            .bind(log.voucher_id)
            .bind(amount.cents())
            .bind(now)
            .execute(&mut **tx)
            .await?;

            sqlx::query("UPDATE voucher_logs SET status = NULL WHERE id = ?1 AND status = 'pending'")
                .bind(log.id)
                .execute(&mut **tx)
                .await?;

            debit += amount;
        }

        Ok((pending.len(), debit))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
