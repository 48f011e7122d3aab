use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::util::ServiceExt;

use boukii_core::{
    Booking, BookingSource, BookingStatus, Client, GatewayCredentials, GatewayTransaction,
    Lifecycle, Money, PaymentMethod, School, TransactionSnapshot, TransactionStatus,
};
use boukii_db::{Database, DbConfig};
use boukii_payments_api::{build_router, ApiConfig, AppState};
use boukii_payrexx::{GatewayClient, GatewayError, GatewaySession, SessionRequest, SystemClock};

// =============================================================================
// Fixtures
// =============================================================================

/// Gateway double: every transaction is confirmed for 120.00, every refund
/// is partial.
#[derive(Default)]
struct FakeGateway {
    fetches: AtomicUsize,
}

#[async_trait]
impl GatewayClient for FakeGateway {
    async fn create_session(
        &self,
        _credentials: &GatewayCredentials,
        request: &SessionRequest,
    ) -> Result<GatewaySession, GatewayError> {
        Ok(GatewaySession {
            id: Some("42".to_string()),
            link: format!("https://skischool.payrexx.com/?payment={}", request.amount.cents()),
        })
    }

    async fn retrieve_transaction(
        &self,
        _credentials: &GatewayCredentials,
        transaction_id: &str,
    ) -> Result<GatewayTransaction, GatewayError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::from_value(json!({
            "id": transaction_id,
            "status": "confirmed",
            "time": "2025-01-15 10:12:13",
            "invoice": { "totalAmount": 12000, "refundedAmount": 0, "currencyAlpha3": "CHF" },
            "payment": { "brand": "mastercard" }
        }))
        .unwrap())
    }

    async fn refund(
        &self,
        _credentials: &GatewayCredentials,
        _transaction_id: &str,
        _amount: Money,
    ) -> Result<TransactionStatus, GatewayError> {
        Ok(TransactionStatus::PartiallyRefunded)
    }
}

struct TestApp {
    db: Database,
    gateway: Arc<FakeGateway>,
    router: Router,
}

impl TestApp {
    async fn spawn() -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let config = ApiConfig::from_lookup(|key| match key {
            "PANEL_URL" => Some("https://admin.boukii.com".to_string()),
            _ => None,
        })
        .unwrap();

        let gateway = Arc::new(FakeGateway::default());
        let state = AppState::new(db.clone(), gateway.clone(), Arc::new(SystemClock), &config);

        seed(&db).await;

        TestApp {
            db,
            gateway,
            router: build_router(state),
        }
    }

    async fn post(&self, uri: &str, content_type: &str, body: impl Into<Body>) -> (StatusCode, Vec<u8>) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(CONTENT_TYPE, content_type)
                    .body(body.into())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let (status, bytes) = self.post(uri, "application/json", body.to_string()).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

async fn seed(db: &Database) {
    db.schools()
        .insert(&School {
            id: 1,
            name: "Skischule Zermatt".to_string(),
            currency: "CHF".to_string(),
            payrexx_instance: Some("skischool".to_string()),
            payrexx_key: Some("secret".to_string()),
            vat_rate_bps: 810,
            terms_url: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    db.clients()
        .insert(&Client {
            id: 1,
            first_name: "Anna".to_string(),
            last_name: "Meier".to_string(),
            email: Some("anna@example.ch".to_string()),
            phone: None,
            address: None,
            zip: None,
            city: None,
            country: Some("CH".to_string()),
        })
        .await
        .unwrap();

    let now = Utc::now();
    db.bookings()
        .insert(&Booking {
            id: 1,
            school_id: 1,
            client_main_id: 1,
            price_total_cents: 12000,
            currency: "CHF".to_string(),
            paid: false,
            paid_total_cents: 0,
            payment_method_id: PaymentMethod::Online,
            payrexx_reference: Some("Boukii #1".to_string()),
            payrexx_transaction: None,
            source: BookingSource::Web,
            status: BookingStatus::Confirmed,
            lifecycle: Lifecycle::Active,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
}

fn confirmed_webhook() -> Value {
    json!({
        "transaction": {
            "id": 555,
            "status": "confirmed",
            "referenceId": "Boukii #1",
            "amount": 12000
        }
    })
}

// =============================================================================
// Webhook
// =============================================================================

#[tokio::test]
async fn webhook_settles_booking_once() {
    let app = TestApp::spawn().await;

    for _ in 0..2 {
        let (status, body) = app
            .post("/payrexx/webhook", "application/json", confirmed_webhook().to_string())
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
    }

    let booking = app.db.bookings().get_by_id(1).await.unwrap().unwrap();
    assert!(booking.paid);
    assert_eq!(booking.paid_total_cents, 12000);
    assert_eq!(app.db.payments().count().await.unwrap(), 1);
    // The second delivery stops at the paid guard
    assert_eq!(app.gateway.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn webhook_accepts_form_bodies() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .post(
            "/payrexx/webhook",
            "application/x-www-form-urlencoded",
            "transaction%5Bid%5D=555&transaction%5Bstatus%5D=confirmed\
&transaction%5BreferenceId%5D=Boukii+%231&transaction%5Bamount%5D=12000",
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
    assert!(app.db.bookings().get_by_id(1).await.unwrap().unwrap().paid);
}

#[tokio::test]
async fn webhook_always_answers_ok() {
    let app = TestApp::spawn().await;

    let cases = [
        ("application/json", "not json".to_string()),
        ("application/json", json!({}).to_string()),
        (
            "application/json",
            json!({ "transaction": { "id": 9, "status": "confirmed", "referenceId": "Boukii #404" } })
                .to_string(),
        ),
        (
            "application/json",
            json!({ "transaction": { "id": 9, "status": "confirmed", "referenceId": " #1" } })
                .to_string(),
        ),
    ];

    for (content_type, body) in cases {
        let (status, response) = app.post("/payrexx/webhook", content_type, body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response, b"OK");
    }

    assert!(!app.db.bookings().get_by_id(1).await.unwrap().unwrap().paid);
    assert_eq!(app.gateway.fetches.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Payment links
// =============================================================================

#[tokio::test]
async fn booking_payment_link_returns_url() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .post_json(
            "/bookings/1/payment-link",
            json!({
                "breakdown": {
                    "price_base": { "name": "Private lesson", "quantity": 1, "price": "120.00" },
                    "price_total": "120.00"
                },
                "redirect": "panel"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "https://skischool.payrexx.com/?payment=12000");
}

#[tokio::test]
async fn breakdown_below_booking_price_gets_empty_link() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .post_json(
            "/bookings/1/payment-link",
            json!({
                "breakdown": {
                    "price_base": { "name": "Private lesson", "quantity": 1, "price": "1.00" },
                    "price_total": "1.00"
                }
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "");
    let booking = app.db.bookings().get_by_id(1).await.unwrap().unwrap();
    assert_eq!(booking.payrexx_reference.as_deref(), Some("Boukii #1"));
}

#[tokio::test]
async fn unknown_booking_gets_empty_link() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .post_json(
            "/bookings/99/payment-link",
            json!({ "breakdown": { "price_total": "120.00" } }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "");
}

// =============================================================================
// Refunds
// =============================================================================

#[tokio::test]
async fn refund_is_recorded_on_snapshot() {
    let app = TestApp::spawn().await;
    app.post("/payrexx/webhook", "application/json", confirmed_webhook().to_string())
        .await;

    let (status, body) = app
        .post_json("/bookings/1/refund", json!({ "amount": "40.00" }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refunded"], true);

    let snapshot: TransactionSnapshot = app
        .db
        .bookings()
        .get_by_id(1)
        .await
        .unwrap()
        .unwrap()
        .transaction_snapshot()
        .unwrap();
    assert_eq!(snapshot.refunded_amount, 4000);
    assert_eq!(snapshot.id, "555");
}

#[tokio::test]
async fn refund_of_unpaid_booking_is_false() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .post_json("/bookings/1/refund", json!({ "amount": "40.00" }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refunded"], false);
}

#[tokio::test]
async fn refund_of_unknown_booking_is_not_found() {
    let app = TestApp::spawn().await;

    let (status, _) = app
        .post_json("/bookings/99/refund", json!({ "amount": "40.00" }))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["migrations"]["applied"], body["migrations"]["total"]);
}

#[tokio::test]
async fn health_reports_pending_migrations() {
    let db = Database::new(DbConfig::in_memory().without_migrations())
        .await
        .unwrap();
    let config = ApiConfig::from_lookup(|_| None).unwrap();
    let state = AppState::new(db, Arc::new(FakeGateway::default()), Arc::new(SystemClock), &config);

    let response = build_router(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "migrations_pending");
    assert_eq!(body["migrations"]["applied"], 0);
}
