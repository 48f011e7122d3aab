//! Shared setup for the service tests.

use chrono::Utc;

use boukii_core::{
    Booking, BookingSource, BookingStatus, BookingUser, Client, GatewayTransaction, Lifecycle,
    PaymentMethod, School, TransactionStatus, Voucher, VoucherLog, VoucherLogStatus,
};
use boukii_db::{Database, DbConfig};

pub async fn database() -> Database {
    Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database")
}

pub fn school(id: i64) -> School {
    School {
        id,
        name: "Skischule Zermatt".to_string(),
        currency: "CHF".to_string(),
        payrexx_instance: Some("skischool".to_string()),
        payrexx_key: Some("secret".to_string()),
        vat_rate_bps: 810,
        terms_url: None,
        created_at: Utc::now(),
    }
}

pub fn unconfigured_school(id: i64) -> School {
    School {
        payrexx_key: None,
        ..school(id)
    }
}

/// Inserts `school` and client 1.
pub async fn seed_school(db: &Database, school: School) {
    db.schools().insert(&school).await.expect("insert school");
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
        .expect("insert client");
}

async fn ensure_school(db: &Database) {
    if db.schools().get_by_id(1).await.expect("school lookup").is_none() {
        seed_school(db, school(1)).await;
    }
}

pub fn booking(id: i64, price_cents: i64) -> Booking {
    let now = Utc::now();
    Booking {
        id,
        school_id: 1,
        client_main_id: 1,
        price_total_cents: price_cents,
        currency: "CHF".to_string(),
        paid: false,
        paid_total_cents: 0,
        payment_method_id: PaymentMethod::Online,
        payrexx_reference: None,
        payrexx_transaction: None,
        source: BookingSource::Web,
        status: BookingStatus::Confirmed,
        lifecycle: Lifecycle::Active,
        cancelled_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// Seeds school 1 (if absent) and an unpaid online booking.
pub async fn seed_booking(db: &Database, id: i64, price_cents: i64) {
    insert_booking(db, booking(id, price_cents)).await;
}

pub async fn insert_booking(db: &Database, booking: Booking) {
    ensure_school(db).await;
    db.bookings().insert(&booking).await.expect("insert booking");
}

pub async fn seed_booking_users(db: &Database, booking_id: i64, ids: &[i64]) {
    for id in ids {
        db.bookings()
            .insert_user(&BookingUser {
                id: *id,
                booking_id,
                client_id: 1,
                lifecycle: Lifecycle::Active,
                cancelled_at: None,
                created_at: Utc::now(),
            })
            .await
            .expect("insert booking user");
    }
}

/// Seeds school 1 (if absent) and an unpaid voucher owned by client 1.
pub async fn seed_voucher(db: &Database, id: i64, quantity_cents: i64) {
    ensure_school(db).await;
    let now = Utc::now();
    db.vouchers()
        .insert(&Voucher {
            id,
            code: format!("SKI-{:04}", id),
            quantity_cents,
            remaining_balance_cents: quantity_cents,
            payed: false,
            client_id: Some(1),
            school_id: 1,
            payrexx_reference: None,
            payrexx_transaction: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .expect("insert voucher");
}

pub async fn seed_pending_log(db: &Database, id: i64, voucher_id: i64, booking_id: i64, amount_cents: i64) {
    db.vouchers()
        .insert_log(&VoucherLog {
            id,
            voucher_id,
            booking_id,
            amount_cents,
            status: Some(VoucherLogStatus::Pending),
            created_at: Utc::now(),
        })
        .await
        .expect("insert voucher log");
}

/// An authoritative transaction as the gateway would return it.
pub fn gateway_transaction(id: &str, status: TransactionStatus, total: Option<i64>) -> GatewayTransaction {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "status": status.as_str(),
        "time": "2025-01-15 10:12:13",
        "invoice": { "totalAmount": total, "refundedAmount": 0, "currencyAlpha3": "CHF" },
        "payment": { "brand": "visa" }
    }))
    .expect("gateway transaction")
}
