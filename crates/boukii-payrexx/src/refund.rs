//! # Refund Service
//!
//! Refunds a booking's gateway transaction. The gateway call itself does not
//! touch the local ledger; callers that want the refunded amount on the
//! stored snapshot follow up with [`RefundService::record_refund`].

use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument, Span};

use crate::clock::Clock;
use crate::error::{PaymentError, PaymentResult};
use crate::gateway::GatewayClient;
use boukii_core::validation::validate_refund_amount;
use boukii_core::{Booking, Money, TransactionSnapshot, TransactionStatus};
use boukii_db::Database;

pub struct RefundService {
    db: Database,
    gateway: Arc<dyn GatewayClient>,
    clock: Arc<dyn Clock>,
    span: Span,
}

impl RefundService {
    pub fn new(db: Database, gateway: Arc<dyn GatewayClient>, clock: Arc<dyn Clock>) -> Self {
        RefundService {
            db,
            gateway,
            clock,
            span: info_span!("payments", component = "refund"),
        }
    }

    /// Asks the gateway to refund `amount` of the booking's transaction.
    ///
    /// Succeeds only when the gateway reports `refunded` or
    /// `partially-refunded`.
    pub async fn try_refund(&self, booking: &Booking, amount: Money) -> PaymentResult<TransactionStatus> {
        async {
            let snapshot = booking
                .transaction_snapshot()
                .ok_or(PaymentError::NoTransaction {
                    booking_id: booking.id,
                })?;
            // Earlier refunds of the same transaction count against the paid total
            validate_refund_amount(amount, booking.paid_total() - snapshot.refunded())?;

            let credentials = self
                .db
                .schools()
                .get_by_id(booking.school_id)
                .await?
                .and_then(|s| s.gateway_credentials())
                .ok_or(PaymentError::MissingCredentials {
                    school_id: booking.school_id,
                })?;

            let status = self
                .gateway
                .refund(&credentials, &snapshot.id, amount)
                .await?;

            if !status.is_refund_success() {
                return Err(PaymentError::RefundRejected { status });
            }

            info!(
                booking_id = booking.id,
                transaction_id = %snapshot.id,
                amount = %amount,
                %status,
                "Refund accepted"
            );
            Ok(status)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Degrading form of [`Self::try_refund`]: `false` on any failure.
    pub async fn refund(&self, booking: &Booking, amount: Money) -> bool {
        match self.try_refund(booking, amount).await {
            Ok(_) => true,
            Err(e) => {
                let _guard = self.span.enter();
                warn!(booking_id = booking.id, amount = %amount, error = %e, "Refund failed");
                false
            }
        }
    }

    /// Adds `amount` to the refunded total of the stored snapshot.
    ///
    /// Reads nothing from `booking` but its id: the increment is applied to
    /// the row as stored, so a stale copy cannot overwrite another refund.
    pub async fn record_refund(&self, booking: &Booking, amount: Money) -> PaymentResult<TransactionSnapshot> {
        self.db
            .bookings()
            .add_refunded_amount(booking.id, amount.cents(), self.clock.now())
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    PaymentError::NoTransaction {
                        booking_id: booking.id,
                    }
                } else {
                    e.into()
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::error::GatewayError;
    use crate::gateway::MockGatewayClient;
    use crate::test_support;
    use boukii_core::GatewayTransaction;
    use chrono::Utc;

    fn paid_booking() -> Booking {
        let tx: GatewayTransaction = test_support::gateway_transaction(
            "777",
            TransactionStatus::Confirmed,
            Some(12000),
        );
        let snapshot = TransactionSnapshot::normalize(&tx, "777", "Boukii #1", None, Utc::now());

        let mut booking = test_support::booking(1, 12000);
        booking.paid = true;
        booking.paid_total_cents = 12000;
        booking.payrexx_reference = Some("Boukii #1".to_string());
        booking.payrexx_transaction = Some(snapshot.to_json().unwrap());
        booking
    }

    fn service(db: &Database, gateway: MockGatewayClient) -> RefundService {
        RefundService::new(db.clone(), Arc::new(gateway), Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn test_partial_refund_succeeds() {
        let db = test_support::database().await;
        let booking = paid_booking();
        test_support::insert_booking(&db, booking.clone()).await;

        let mut gateway = MockGatewayClient::new();
        gateway
            .expect_refund()
            .withf(|_, id, amount| id == "777" && amount.cents() == 4000)
            .times(1)
            .returning(|_, _, _| Ok(TransactionStatus::PartiallyRefunded));

        assert!(service(&db, gateway).refund(&booking, Money::from_cents(4000)).await);
    }

    #[tokio::test]
    async fn test_declined_refund_is_false() {
        let db = test_support::database().await;
        let booking = paid_booking();
        test_support::insert_booking(&db, booking.clone()).await;

        let mut gateway = MockGatewayClient::new();
        gateway
            .expect_refund()
            .returning(|_, _, _| Ok(TransactionStatus::Declined));
        let service = service(&db, gateway);

        let err = service
            .try_refund(&booking, Money::from_cents(4000))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PaymentError::RefundRejected { status: TransactionStatus::Declined }
        ));
        assert!(!service.refund(&booking, Money::from_cents(4000)).await);
    }

    #[tokio::test]
    async fn test_gateway_error_is_false() {
        let db = test_support::database().await;
        let booking = paid_booking();
        test_support::insert_booking(&db, booking.clone()).await;

        let mut gateway = MockGatewayClient::new();
        gateway
            .expect_refund()
            .returning(|_, _, _| Err(GatewayError::Timeout(std::time::Duration::from_secs(5))));

        assert!(!service(&db, gateway).refund(&booking, Money::from_cents(4000)).await);
    }

    #[tokio::test]
    async fn test_refund_without_transaction() {
        let db = test_support::database().await;
        let booking = test_support::booking(1, 12000);
        test_support::insert_booking(&db, booking.clone()).await;

        let mut gateway = MockGatewayClient::new();
        gateway.expect_refund().never();

        let err = service(&db, gateway)
            .try_refund(&booking, Money::from_cents(4000))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::NoTransaction { booking_id: 1 }));
    }

    #[tokio::test]
    async fn test_refund_over_paid_total_is_rejected_locally() {
        let db = test_support::database().await;
        let booking = paid_booking();
        test_support::insert_booking(&db, booking.clone()).await;

        let mut gateway = MockGatewayClient::new();
        gateway.expect_refund().never();

        let err = service(&db, gateway)
            .try_refund(&booking, Money::from_cents(12001))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }

    #[tokio::test]
    async fn test_earlier_refunds_reduce_refundable_amount() {
        let db = test_support::database().await;
        let mut booking = paid_booking();
        let mut snapshot = booking.transaction_snapshot().unwrap();
        snapshot.refunded_amount = 10000;
        booking.payrexx_transaction = Some(snapshot.to_json().unwrap());
        test_support::insert_booking(&db, booking.clone()).await;

        let mut gateway = MockGatewayClient::new();
        gateway
            .expect_refund()
            .withf(|_, _, amount| amount.cents() == 2000)
            .times(1)
            .returning(|_, _, _| Ok(TransactionStatus::Refunded));
        let service = service(&db, gateway);

        let err = service
            .try_refund(&booking, Money::from_cents(4000))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
        assert!(service.refund(&booking, Money::from_cents(2000)).await);
    }

    #[tokio::test]
    async fn test_refund_without_credentials() {
        let db = test_support::database().await;
        test_support::seed_school(&db, test_support::unconfigured_school(1)).await;
        let booking = paid_booking();
        test_support::insert_booking(&db, booking.clone()).await;

        let mut gateway = MockGatewayClient::new();
        gateway.expect_refund().never();

        let err = service(&db, gateway)
            .try_refund(&booking, Money::from_cents(4000))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::MissingCredentials { school_id: 1 }));
    }

    #[tokio::test]
    async fn test_record_refund_updates_snapshot() {
        let db = test_support::database().await;
        let booking = paid_booking();
        test_support::insert_booking(&db, booking.clone()).await;

        let service = service(&db, MockGatewayClient::new());
        let snapshot = service
            .record_refund(&booking, Money::from_cents(4000))
            .await
            .unwrap();
        assert_eq!(snapshot.refunded_amount, 4000);

        let stored = db
            .bookings()
            .get_by_id(1)
            .await
            .unwrap()
            .unwrap()
            .transaction_snapshot()
            .unwrap();
        assert_eq!(stored.refunded_amount, 4000);
        assert_eq!(stored.total_amount, 12000);
        assert_eq!(stored.id, "777");
    }

    #[tokio::test]
    async fn test_refunds_recorded_from_same_read_both_count() {
        let db = test_support::database().await;
        let booking = paid_booking();
        test_support::insert_booking(&db, booking.clone()).await;

        let service = service(&db, MockGatewayClient::new());
        let (a, b) = tokio::join!(
            service.record_refund(&booking, Money::from_cents(4000)),
            service.record_refund(&booking, Money::from_cents(4000))
        );
        a.unwrap();
        b.unwrap();

        let stored = db
            .bookings()
            .get_by_id(1)
            .await
            .unwrap()
            .unwrap()
            .transaction_snapshot()
            .unwrap();
        assert_eq!(stored.refunded_amount, 8000);
    }

    #[tokio::test]
    async fn test_record_refund_without_transaction() {
        let db = test_support::database().await;
        let booking = test_support::booking(1, 12000);
        test_support::insert_booking(&db, booking.clone()).await;

        let err = service(&db, MockGatewayClient::new())
            .record_refund(&booking, Money::from_cents(4000))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::NoTransaction { booking_id: 1 }));
    }
}
