//! # Webhook Reconciler
//!
//! Applies gateway confirmations to bookings and vouchers, exactly once per
//! real payment, no matter how often or in which order the gateway calls.
//!
//! ## Decision Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  webhook payload                                                        │
//! │       │                                                                 │
//! │       ├── no transaction / not "confirmed" ───────────────► Ignored     │
//! │       ├── referenceId trimmed, ≤ 2 chars ─────────────────► error log   │
//! │       │                                                                 │
//! │       ├── booking by reference (cancelled ones included)                │
//! │       │     ├── paid already ─────────────────────────────► AlreadyPaid │
//! │       │     ├── method not gateway-routed ─────────────► NotGatewayRouted│
//! │       │     ├── retrieve_transaction(id) ≠ confirmed ────► error log     │
//! │       │     └── settle_booking (one transaction) ───────► BookingSettled│
//! │       │                                                                 │
//! │       ├── voucher by reference                                          │
//! │       │     ├── payed already ────────────────────────────► AlreadyPaid │
//! │       │     ├── retrieve_transaction(id) ≠ confirmed ────► error log     │
//! │       │     └── settle_voucher ─────────────────────────► VoucherSettled│
//! │       │                                                                 │
//! │       └── neither ────────────────────────────────────────► error log   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The webhook body is never trusted for the decision; it only names the
//! reference and transaction id. The `paid = 0` claim inside the settlement
//! transaction is the concurrency gate: a delivery that loses the race
//! reports `AlreadyPaid` and writes nothing.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, Instrument, Span};

use crate::clock::Clock;
use crate::error::{PaymentError, PaymentResult};
use crate::gateway::GatewayClient;
use boukii_core::reference::normalize_reference;
use boukii_core::transaction::{WebhookPayload, WebhookTransaction};
use boukii_core::validation::validate_transaction_id;
use boukii_core::{
    Booking, GatewayCredentials, NewNotification, NotificationKind, TransactionSnapshot, Voucher,
};
use boukii_db::{BookingSettlement, Database, SettlementOutcome, SettlementReport, VoucherSettlement};

/// What a webhook delivery resulted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Not a confirmation; nothing to do.
    Ignored,
    /// Settled before (or concurrently by another delivery).
    AlreadyPaid,
    /// The booking is paid outside the gateway.
    NotGatewayRouted,
    BookingSettled {
        booking_id: i64,
        report: SettlementReport,
    },
    VoucherSettled { voucher_id: i64 },
    /// An error was logged and nothing changed.
    Failed,
}

pub struct WebhookReconciler {
    db: Database,
    gateway: Arc<dyn GatewayClient>,
    clock: Arc<dyn Clock>,
    fetch_timeout: Duration,
    span: Span,
}

impl WebhookReconciler {
    pub fn new(
        db: Database,
        gateway: Arc<dyn GatewayClient>,
        clock: Arc<dyn Clock>,
        fetch_timeout: Duration,
    ) -> Self {
        WebhookReconciler {
            db,
            gateway,
            clock,
            fetch_timeout,
            span: info_span!("payments", component = "reconciler"),
        }
    }

    /// Entry point for the webhook handler. Never fails: errors are logged
    /// once here and reported as [`ReconcileOutcome::Failed`].
    pub async fn handle(&self, payload: &WebhookPayload) -> ReconcileOutcome {
        match self.reconcile(payload).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let tx = payload.transaction.as_ref();
                let _guard = self.span.enter();
                error!(
                    error = %e,
                    transaction_id = ?tx.and_then(|t| t.id.as_deref()),
                    reference = ?tx.and_then(|t| t.reference_id.as_deref()),
                    "Webhook reconciliation failed"
                );
                ReconcileOutcome::Failed
            }
        }
    }

    /// Typed reconciliation.
    pub async fn reconcile(&self, payload: &WebhookPayload) -> PaymentResult<ReconcileOutcome> {
        async {
            let Some(tx) = payload.transaction.as_ref().filter(|t| t.claims_confirmed()) else {
                debug!(
                    status = ?payload.transaction.as_ref().and_then(|t| t.status.as_ref()),
                    "Ignoring non-confirmation webhook"
                );
                return Ok(ReconcileOutcome::Ignored);
            };

            let raw_reference = tx.reference_id.as_deref().unwrap_or_default();
            let reference = normalize_reference(raw_reference).ok_or_else(|| {
                PaymentError::ReconciliationTargetNotFound {
                    reference: raw_reference.to_string(),
                }
            })?;

            if let Some(booking) = self.db.bookings().find_by_reference(reference).await? {
                return self.reconcile_booking(booking, tx, reference).await;
            }

            if let Some(voucher) = self.db.vouchers().find_by_reference(reference).await? {
                return self.reconcile_voucher(voucher, tx, reference).await;
            }

            Err(PaymentError::ReconciliationTargetNotFound {
                reference: reference.to_string(),
            })
        }
        .instrument(self.span.clone())
        .await
    }

    async fn reconcile_booking(
        &self,
        booking: Booking,
        tx: &WebhookTransaction,
        reference: &str,
    ) -> PaymentResult<ReconcileOutcome> {
        if booking.paid {
            debug!(booking_id = booking.id, "Booking already paid");
            return Ok(ReconcileOutcome::AlreadyPaid);
        }
        if !booking.payment_method_id.is_gateway_routed() {
            debug!(
                booking_id = booking.id,
                payment_method = ?booking.payment_method_id,
                "Booking is not paid through the gateway"
            );
            return Ok(ReconcileOutcome::NotGatewayRouted);
        }

        let credentials = self.credentials(booking.school_id).await?;
        let snapshot = self.verify(&credentials, tx, reference).await?;

        let settle_vouchers = booking
            .payment_method_id
            .settles_pending_vouchers(booking.source);
        let notification = if settle_vouchers {
            self.booking_notification(&booking, &snapshot).await?
        } else {
            None
        };

        let outcome = self
            .db
            .settlements()
            .settle_booking(&BookingSettlement {
                booking_id: booking.id,
                school_id: booking.school_id,
                snapshot,
                settle_vouchers,
                notification,
                now: self.clock.now(),
            })
            .await?;

        match outcome {
            SettlementOutcome::Settled(report) => {
                info!(
                    booking_id = booking.id,
                    reference,
                    resurrected = report.resurrected,
                    cleared_voucher_logs = report.cleared_voucher_logs,
                    "Booking payment confirmed"
                );
                Ok(ReconcileOutcome::BookingSettled {
                    booking_id: booking.id,
                    report,
                })
            }
            SettlementOutcome::AlreadySettled => Ok(ReconcileOutcome::AlreadyPaid),
        }
    }

    async fn reconcile_voucher(
        &self,
        voucher: Voucher,
        tx: &WebhookTransaction,
        reference: &str,
    ) -> PaymentResult<ReconcileOutcome> {
        if voucher.payed {
            debug!(voucher_id = voucher.id, "Voucher already paid");
            return Ok(ReconcileOutcome::AlreadyPaid);
        }

        let credentials = self.credentials(voucher.school_id).await?;
        let snapshot = self.verify(&credentials, tx, reference).await?;
        let notification = self.voucher_notification(&voucher, &snapshot).await?;

        let outcome = self
            .db
            .settlements()
            .settle_voucher(&VoucherSettlement {
                voucher_id: voucher.id,
                snapshot,
                notification,
                now: self.clock.now(),
            })
            .await?;

        match outcome {
            SettlementOutcome::Settled(_) => {
                info!(voucher_id = voucher.id, reference, "Voucher payment confirmed");
                Ok(ReconcileOutcome::VoucherSettled {
                    voucher_id: voucher.id,
                })
            }
            SettlementOutcome::AlreadySettled => Ok(ReconcileOutcome::AlreadyPaid),
        }
    }

    /// Re-fetches the transaction and returns its snapshot if, and only if,
    /// the gateway itself reports it confirmed.
    async fn verify(
        &self,
        credentials: &GatewayCredentials,
        tx: &WebhookTransaction,
        reference: &str,
    ) -> PaymentResult<TransactionSnapshot> {
        let transaction_id = tx.id.as_deref().ok_or_else(|| PaymentError::TransactionFetch {
            transaction_id: String::new(),
            reason: "webhook carries no transaction id".to_string(),
        })?;
        let fetch_error = |reason: String| PaymentError::TransactionFetch {
            transaction_id: transaction_id.to_string(),
            reason,
        };
        validate_transaction_id(transaction_id).map_err(|e| fetch_error(e.to_string()))?;

        let fetched = tokio::time::timeout(
            self.fetch_timeout,
            self.gateway.retrieve_transaction(credentials, transaction_id),
        )
        .await
        .map_err(|_| fetch_error(format!("no answer within {}ms", self.fetch_timeout.as_millis())))?
        .map_err(|e| fetch_error(e.to_string()))?;

        if !fetched.status.is_confirmed() {
            return Err(fetch_error(format!("gateway reports status '{}'", fetched.status)));
        }

        Ok(TransactionSnapshot::normalize(
            &fetched,
            transaction_id,
            reference,
            tx.amount,
            self.clock.now(),
        ))
    }

    async fn credentials(&self, school_id: i64) -> PaymentResult<GatewayCredentials> {
        self.db
            .schools()
            .get_by_id(school_id)
            .await?
            .and_then(|s| s.gateway_credentials())
            .ok_or(PaymentError::MissingCredentials { school_id })
    }

    async fn booking_notification(
        &self,
        booking: &Booking,
        snapshot: &TransactionSnapshot,
    ) -> PaymentResult<Option<NewNotification>> {
        let recipient = self
            .db
            .clients()
            .get_by_id(booking.client_main_id)
            .await?
            .and_then(|c| c.email)
            .filter(|e| !e.trim().is_empty());

        let Some(recipient) = recipient else {
            debug!(booking_id = booking.id, "Main client has no email; no confirmation queued");
            return Ok(None);
        };

        let payload = json!({
            "booking_id": booking.id,
            "reference": snapshot.reference_id,
            "amount": snapshot.total_amount,
            "currency": snapshot.currency.as_deref().unwrap_or(&booking.currency),
        });

        Ok(Some(NewNotification {
            kind: NotificationKind::BookingConfirmation,
            recipient,
            payload: payload.to_string(),
        }))
    }

    async fn voucher_notification(
        &self,
        voucher: &Voucher,
        snapshot: &TransactionSnapshot,
    ) -> PaymentResult<Option<NewNotification>> {
        let Some(client_id) = voucher.client_id else {
            return Ok(None);
        };
        let recipient = self
            .db
            .clients()
            .get_by_id(client_id)
            .await?
            .and_then(|c| c.email)
            .filter(|e| !e.trim().is_empty());

        Ok(recipient.map(|recipient| NewNotification {
            kind: NotificationKind::VoucherConfirmation,
            recipient,
            payload: json!({
                "voucher_id": voucher.id,
                "code": voucher.code,
                "reference": snapshot.reference_id,
                "amount": snapshot.total_amount,
            })
            .to_string(),
        }))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::GatewayError;
    use crate::gateway::MockGatewayClient;
    use crate::test_support;
    use boukii_core::{BookingSource, BookingStatus, Lifecycle, PaymentMethod, TransactionStatus};
    use chrono::{TimeZone, Utc};

    const REF: &str = "REF-100";

    fn payload(status: &str, reference: &str, amount: i64) -> WebhookPayload {
        serde_json::from_value(json!({
            "transaction": {
                "id": 555,
                "status": status,
                "referenceId": reference,
                "amount": amount
            }
        }))
        .unwrap()
    }

    fn confirming_gateway(total: Option<i64>) -> MockGatewayClient {
        let mut gateway = MockGatewayClient::new();
        gateway
            .expect_retrieve_transaction()
            .withf(|credentials, id| credentials.instance == "skischool" && id == "555")
            .returning(move |_, id| {
                Ok(test_support::gateway_transaction(id, TransactionStatus::Confirmed, total))
            });
        gateway
    }

    fn reconciler(db: &Database, gateway: MockGatewayClient) -> WebhookReconciler {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap());
        WebhookReconciler::new(
            db.clone(),
            Arc::new(gateway),
            Arc::new(clock),
            Duration::from_millis(200),
        )
    }

    async fn seed_referenced_booking(db: &Database) {
        let mut booking = test_support::booking(1, 12000);
        booking.payrexx_reference = Some(REF.to_string());
        test_support::insert_booking(db, booking).await;
    }

    #[tokio::test]
    async fn test_confirmed_webhook_settles_booking() {
        let db = test_support::database().await;
        seed_referenced_booking(&db).await;

        let reconciler = reconciler(&db, confirming_gateway(Some(12000)));
        let outcome = reconciler.handle(&payload("confirmed", REF, 12000)).await;
        assert!(matches!(outcome, ReconcileOutcome::BookingSettled { booking_id: 1, .. }));

        let booking = db.bookings().get_by_id(1).await.unwrap().unwrap();
        assert!(booking.paid);
        assert_eq!(booking.paid_total_cents, 12000);
        let snapshot = booking.transaction_snapshot().unwrap();
        assert_eq!(snapshot.id, "555");
        assert_eq!(snapshot.reference_id, REF);
        assert_eq!(snapshot.brand.as_deref(), Some("visa"));

        let payments = db.payments().list_for_booking(1).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].amount().cents(), 12000);
        // Online bookings get no confirmation mail from here
        assert_eq!(db.notifications().count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_settles_once() {
        let db = test_support::database().await;
        seed_referenced_booking(&db).await;

        let reconciler = reconciler(&db, confirming_gateway(Some(12000)));
        let first = reconciler.handle(&payload("confirmed", REF, 12000)).await;
        let second = reconciler.handle(&payload("confirmed", REF, 12000)).await;

        assert!(matches!(first, ReconcileOutcome::BookingSettled { .. }));
        assert_eq!(second, ReconcileOutcome::AlreadyPaid);
        assert_eq!(db.payments().count().await.unwrap(), 1);
        let booking = db.bookings().get_by_id(1).await.unwrap().unwrap();
        assert_eq!(booking.paid_total_cents, 12000);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_delivery_settles_once() {
        let db = test_support::database().await;
        seed_referenced_booking(&db).await;

        let reconciler = reconciler(&db, confirming_gateway(Some(12000)));
        let body = payload("confirmed", REF, 12000);
        let (a, b) = tokio::join!(reconciler.handle(&body), reconciler.handle(&body));

        let settled = [&a, &b]
            .iter()
            .filter(|o| matches!(o, ReconcileOutcome::BookingSettled { .. }))
            .count();
        assert_eq!(settled, 1);
        assert!(a == ReconcileOutcome::AlreadyPaid || b == ReconcileOutcome::AlreadyPaid);

        assert_eq!(db.payments().count().await.unwrap(), 1);
        let booking = db.bookings().get_by_id(1).await.unwrap().unwrap();
        assert!(booking.paid);
        assert_eq!(booking.paid_total_cents, 12000);
    }

    #[tokio::test]
    async fn test_non_confirmed_webhook_is_ignored() {
        let db = test_support::database().await;
        seed_referenced_booking(&db).await;

        let mut gateway = MockGatewayClient::new();
        gateway.expect_retrieve_transaction().never();

        let reconciler = reconciler(&db, gateway);
        assert_eq!(
            reconciler.handle(&payload("refunded", REF, 12000)).await,
            ReconcileOutcome::Ignored
        );
        assert_eq!(
            reconciler.handle(&WebhookPayload::default()).await,
            ReconcileOutcome::Ignored
        );
        assert!(!db.bookings().get_by_id(1).await.unwrap().unwrap().paid);
    }

    #[tokio::test]
    async fn test_authoritative_fetch_gates_settlement() {
        let db = test_support::database().await;
        seed_referenced_booking(&db).await;

        let mut gateway = MockGatewayClient::new();
        gateway.expect_retrieve_transaction().returning(|_, id| {
            Ok(test_support::gateway_transaction(id, TransactionStatus::Waiting, Some(12000)))
        });

        let reconciler = reconciler(&db, gateway);
        let err = reconciler
            .reconcile(&payload("confirmed", REF, 12000))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::TransactionFetch { .. }));

        let booking = db.bookings().get_by_id(1).await.unwrap().unwrap();
        assert!(!booking.paid);
        assert!(booking.payrexx_transaction.is_none());
        assert_eq!(booking.paid_total_cents, 0);
        assert_eq!(db.payments().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts() {
        let db = test_support::database().await;
        seed_referenced_booking(&db).await;

        let mut gateway = MockGatewayClient::new();
        gateway
            .expect_retrieve_transaction()
            .returning(|_, _| Err(GatewayError::Transport("connection reset".to_string())));

        let reconciler = reconciler(&db, gateway);
        assert_eq!(
            reconciler.handle(&payload("confirmed", REF, 12000)).await,
            ReconcileOutcome::Failed
        );
        assert_eq!(db.payments().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_malformed_reference_writes_nothing() {
        let db = test_support::database().await;
        seed_referenced_booking(&db).await;

        let mut gateway = MockGatewayClient::new();
        gateway.expect_retrieve_transaction().never();

        let reconciler = reconciler(&db, gateway);
        let err = reconciler.reconcile(&payload("confirmed", "", 12000)).await.unwrap_err();
        assert!(matches!(err, PaymentError::ReconciliationTargetNotFound { .. }));
        assert_eq!(
            reconciler.handle(&payload("confirmed", " #1 ", 12000)).await,
            ReconcileOutcome::Failed
        );
        assert_eq!(db.payments().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_non_numeric_transaction_id_is_never_fetched() {
        let db = test_support::database().await;
        seed_referenced_booking(&db).await;

        let mut gateway = MockGatewayClient::new();
        gateway.expect_retrieve_transaction().never();

        let reconciler = reconciler(&db, gateway);
        for id in ["../Gateway/9", "555?instance=other", "555#x", ""] {
            let body: WebhookPayload = serde_json::from_value(json!({
                "transaction": { "id": id, "status": "confirmed", "referenceId": REF }
            }))
            .unwrap();
            let err = reconciler.reconcile(&body).await.unwrap_err();
            assert!(matches!(err, PaymentError::TransactionFetch { .. }), "id {id:?}");
        }
        assert!(!db.bookings().get_by_id(1).await.unwrap().unwrap().paid);
    }

    #[tokio::test]
    async fn test_unknown_reference() {
        let db = test_support::database().await;
        seed_referenced_booking(&db).await;

        let mut gateway = MockGatewayClient::new();
        gateway.expect_retrieve_transaction().never();

        let reconciler = reconciler(&db, gateway);
        let err = reconciler
            .reconcile(&payload("confirmed", "REF-404", 12000))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PaymentError::ReconciliationTargetNotFound { ref reference } if reference == "REF-404"
        ));
    }

    #[tokio::test]
    async fn test_cash_booking_is_not_settled() {
        let db = test_support::database().await;
        let mut booking = test_support::booking(1, 12000);
        booking.payrexx_reference = Some(REF.to_string());
        booking.payment_method_id = PaymentMethod::Cash;
        test_support::insert_booking(&db, booking).await;

        let mut gateway = MockGatewayClient::new();
        gateway.expect_retrieve_transaction().never();

        let outcome = reconciler(&db, gateway)
            .handle(&payload("confirmed", REF, 12000))
            .await;
        assert_eq!(outcome, ReconcileOutcome::NotGatewayRouted);
        assert!(!db.bookings().get_by_id(1).await.unwrap().unwrap().paid);
    }

    #[tokio::test]
    async fn test_late_payment_resurrects_cancelled_booking() {
        let db = test_support::database().await;
        seed_referenced_booking(&db).await;
        test_support::seed_booking_users(&db, 1, &[1, 2]).await;
        db.bookings().cancel(1, Utc::now()).await.unwrap();

        let before = db.bookings().get_by_id(1).await.unwrap().unwrap();
        assert_eq!(before.status, BookingStatus::AllCancelled);

        let outcome = reconciler(&db, confirming_gateway(Some(12000)))
            .handle(&payload("confirmed", REF, 12000))
            .await;
        assert!(matches!(outcome, ReconcileOutcome::BookingSettled { .. }));

        let booking = db.bookings().get_by_id(1).await.unwrap().unwrap();
        assert!(booking.paid);
        assert_eq!(booking.lifecycle, Lifecycle::Active);
        assert!(booking.cancelled_at.is_none());
        assert_eq!(booking.status, BookingStatus::Confirmed);
        let users = db.bookings().users(1).await.unwrap();
        assert!(users.iter().all(|u| u.lifecycle == Lifecycle::Active && u.cancelled_at.is_none()));
    }

    #[tokio::test]
    async fn test_web_voucher_checkout_debits_vouchers_and_queues_mail() {
        let db = test_support::database().await;
        let mut booking = test_support::booking(1, 12000);
        booking.payrexx_reference = Some(REF.to_string());
        booking.payment_method_id = PaymentMethod::BoukiiPay;
        booking.source = BookingSource::Web;
        test_support::insert_booking(&db, booking).await;
        test_support::seed_voucher(&db, 3, 5000).await;
        test_support::seed_voucher(&db, 4, 3000).await;
        test_support::seed_pending_log(&db, 1, 3, 1, -2000).await;
        test_support::seed_pending_log(&db, 2, 4, 1, -1000).await;

        // Remainder charged through the gateway
        let outcome = reconciler(&db, confirming_gateway(Some(9000)))
            .handle(&payload("confirmed", REF, 9000))
            .await;
        let ReconcileOutcome::BookingSettled { report, .. } = outcome else {
            panic!("expected settlement, got {outcome:?}");
        };
        assert_eq!(report.cleared_voucher_logs, 2);
        assert!(report.notification_id.is_some());

        let v3 = db.vouchers().get_by_id(3).await.unwrap().unwrap();
        let v4 = db.vouchers().get_by_id(4).await.unwrap().unwrap();
        assert_eq!(5000 - v3.remaining_balance_cents, 2000);
        assert_eq!(3000 - v4.remaining_balance_cents, 1000);
        assert!(db
            .vouchers()
            .logs_for_booking(1)
            .await
            .unwrap()
            .iter()
            .all(|l| l.status.is_none()));

        let pending = db.notifications().get_pending(10, 5).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, NotificationKind::BookingConfirmation);
        assert_eq!(pending[0].recipient, "anna@example.ch");
    }

    #[tokio::test]
    async fn test_snapshot_falls_back_to_webhook_amount_and_clock() {
        let db = test_support::database().await;
        seed_referenced_booking(&db).await;

        let mut gateway = MockGatewayClient::new();
        gateway.expect_retrieve_transaction().returning(|_, _| {
            Ok(serde_json::from_value(json!({ "status": "confirmed" })).unwrap())
        });

        reconciler(&db, gateway)
            .handle(&payload("confirmed", REF, 12000))
            .await;

        let snapshot = db
            .bookings()
            .get_by_id(1)
            .await
            .unwrap()
            .unwrap()
            .transaction_snapshot()
            .unwrap();
        assert_eq!(snapshot.total_amount, 12000);
        assert_eq!(snapshot.id, "555");
        assert_eq!(snapshot.time, "2025-01-15 10:00:00");
    }

    #[tokio::test]
    async fn test_slow_gateway_times_out_without_mutation() {
        let db = test_support::database().await;
        seed_referenced_booking(&db).await;

        struct SlowGateway;

        #[async_trait::async_trait]
        impl GatewayClient for SlowGateway {
            async fn create_session(
                &self,
                _: &GatewayCredentials,
                _: &crate::gateway::SessionRequest,
            ) -> Result<crate::gateway::GatewaySession, GatewayError> {
                Err(GatewayError::EmptyResponse)
            }

            async fn retrieve_transaction(
                &self,
                _: &GatewayCredentials,
                id: &str,
            ) -> Result<boukii_core::GatewayTransaction, GatewayError> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(test_support::gateway_transaction(id, TransactionStatus::Confirmed, Some(12000)))
            }

            async fn refund(
                &self,
                _: &GatewayCredentials,
                _: &str,
                _: boukii_core::Money,
            ) -> Result<TransactionStatus, GatewayError> {
                Err(GatewayError::EmptyResponse)
            }
        }

        let reconciler = WebhookReconciler::new(
            db.clone(),
            Arc::new(SlowGateway),
            Arc::new(crate::clock::SystemClock),
            Duration::from_millis(20),
        );
        let err = reconciler
            .reconcile(&payload("confirmed", REF, 12000))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::TransactionFetch { .. }));
        assert!(!db.bookings().get_by_id(1).await.unwrap().unwrap().paid);
    }

    #[tokio::test]
    async fn test_voucher_purchase_is_settled_once() {
        let db = test_support::database().await;
        test_support::seed_voucher(&db, 3, 5000).await;
        db.vouchers().ensure_reference(3, "Boukii Voucher #3").await.unwrap();

        let reconciler = reconciler(&db, confirming_gateway(Some(5000)));
        let first = reconciler
            .handle(&payload("confirmed", "Boukii Voucher #3", 5000))
            .await;
        let second = reconciler
            .handle(&payload("confirmed", "Boukii Voucher #3", 5000))
            .await;

        assert_eq!(first, ReconcileOutcome::VoucherSettled { voucher_id: 3 });
        assert_eq!(second, ReconcileOutcome::AlreadyPaid);

        let voucher = db.vouchers().get_by_id(3).await.unwrap().unwrap();
        assert!(voucher.payed);
        assert_eq!(voucher.transaction_snapshot().unwrap().total_amount, 5000);

        let pending = db.notifications().get_pending(10, 5).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, NotificationKind::VoucherConfirmation);
    }
}
