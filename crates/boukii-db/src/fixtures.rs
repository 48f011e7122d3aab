//! Test fixtures shared by the repository tests.

use chrono::Utc;
use std::path::PathBuf;

use crate::{Database, DbConfig};
use boukii_core::{
    Booking, BookingSource, BookingStatus, BookingUser, Client, Lifecycle, PaymentMethod, School,
    Voucher, VoucherLog, VoucherLogStatus,
};

pub async fn database() -> Database {
    Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database")
}

/// A throwaway database file, removed (with its WAL files) on drop.
pub struct TempDbFile {
    pub path: PathBuf,
}

impl TempDbFile {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("boukii-test-{}.db", uuid::Uuid::new_v4()));
        TempDbFile { path }
    }
}

impl Drop for TempDbFile {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

/// File-backed database with a real multi-connection pool.
pub async fn file_database(file: &TempDbFile, pool_size: u32) -> Database {
    Database::new(DbConfig::new(&file.path).with_pool_size(pool_size))
        .await
        .expect("file database")
}

pub fn school(id: i64) -> School {
    School {
        id,
        name: format!("Ski School {}", id),
        currency: "CHF".to_string(),
        payrexx_instance: Some("skischool".to_string()),
        payrexx_key: Some("secret".to_string()),
        vat_rate_bps: 810,
        terms_url: Some("https://skischool.example.ch/terms".to_string()),
        created_at: Utc::now(),
    }
}

pub fn client(id: i64) -> Client {
    Client {
        id,
        first_name: "Anna".to_string(),
        last_name: "Meier".to_string(),
        email: Some(format!("client{}@example.ch", id)),
        phone: Some("+41 79 000 00 00".to_string()),
        address: Some("Bahnhofstrasse 1".to_string()),
        zip: Some("3920".to_string()),
        city: Some("Zermatt".to_string()),
        country: Some("CH".to_string()),
    }
}

/// School 1 with client 1.
pub async fn seed_school_and_client(db: &Database) {
    db.schools().insert(&school(1)).await.expect("insert school");
    db.clients().insert(&client(1)).await.expect("insert client");
}

/// An unpaid, active online booking of school 1 for client 1.
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

pub fn booking_user(id: i64, booking_id: i64) -> BookingUser {
    BookingUser {
        id,
        booking_id,
        client_id: 1,
        lifecycle: Lifecycle::Active,
        cancelled_at: None,
        created_at: Utc::now(),
    }
}

/// An unpaid voucher of school 1 with its full face value remaining.
pub fn voucher(id: i64, quantity_cents: i64) -> Voucher {
    let now = Utc::now();
    Voucher {
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
    }
}

pub fn voucher_log(id: i64, voucher_id: i64, booking_id: i64, amount_cents: i64, pending: bool) -> VoucherLog {
    VoucherLog {
        id,
        voucher_id,
        booking_id,
        amount_cents,
        status: pending.then_some(VoucherLogStatus::Pending),
        created_at: Utc::now(),
    }
}
