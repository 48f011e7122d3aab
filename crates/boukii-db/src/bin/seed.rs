//! # Demo Data Seeder
//!
//! Populates a database with a school, clients, bookings and vouchers so the
//! payments API can be exercised locally.
//!
//! ## Usage
//! ```bash
//! cargo run -p boukii-db --bin seed
//! cargo run -p boukii-db --bin seed -- --bookings 50 --db ./data/boukii.db
//! ```
//!
//! ## Generated Data
//! - School 1 with gateway instance `demo` (key from `PAYREXX_DEMO_KEY`)
//! - One client per booking
//! - Bookings cycling through payment methods and sources, each with
//!   one or two participant slots
//! - Unpaid vouchers of 50, 100 and 200 CHF
//! - A pending voucher reservation on every web BoukiiPay booking

use chrono::Utc;
use std::env;

use boukii_core::{
    Booking, BookingSource, BookingStatus, BookingUser, Client, Lifecycle, PaymentMethod, School,
    Voucher, VoucherLog, VoucherLogStatus,
};
use boukii_db::{Database, DbConfig};

const FIRST_NAMES: &[&str] = &[
    "Anna", "Luca", "Sophie", "Noah", "Mia", "Elias", "Lea", "Jonas", "Laura", "Nico",
];

const LAST_NAMES: &[&str] = &[
    "Meier", "Müller", "Schmid", "Keller", "Weber", "Huber", "Brunner", "Steiner",
];

const PAYMENT_METHODS: &[PaymentMethod] = &[
    PaymentMethod::BoukiiPay,
    PaymentMethod::Online,
    PaymentMethod::Cash,
    PaymentMethod::Online,
    PaymentMethod::NoPayment,
];

const SOURCES: &[BookingSource] = &[BookingSource::Web, BookingSource::Panel, BookingSource::App];

/// Lesson prices in cents.
const PRICES: &[i64] = &[8500, 12000, 24500, 39000, 61500];

const VOUCHER_VALUES: &[i64] = &[5000, 10000, 20000];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut bookings: i64 = 20;
    let mut db_path = String::from("./boukii-payments.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bookings" | "-b" => {
                if i + 1 < args.len() {
                    bookings = args[i + 1].parse().unwrap_or(20);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Boukii Payments Demo Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -b, --bookings <N>  Number of bookings to generate (default: 20)");
                println!("  -d, --db <PATH>     Database file path (default: ./boukii-payments.db)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Boukii Payments Demo Seeder");
    println!("===========================");
    println!("Database: {}", db_path);
    println!("Bookings: {}", bookings);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database, migrations applied");

    if db.schools().get_by_id(1).await?.is_some() {
        println!("⚠ School 1 already exists; skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let now = Utc::now();

    db.schools()
        .insert(&School {
            id: 1,
            name: "Skischule Demo".to_string(),
            currency: "CHF".to_string(),
            payrexx_instance: Some("demo".to_string()),
            payrexx_key: env::var("PAYREXX_DEMO_KEY").ok(),
            vat_rate_bps: 810,
            terms_url: Some("https://demo.boukii.ch/terms".to_string()),
            created_at: now,
        })
        .await?;
    println!("✓ School created");

    for (idx, value) in VOUCHER_VALUES.iter().enumerate() {
        let id = idx as i64 + 1;
        db.vouchers()
            .insert(&Voucher {
                id,
                code: format!("DEMO-{:04}", id),
                quantity_cents: *value,
                remaining_balance_cents: *value,
                payed: false,
                client_id: None,
                school_id: 1,
                payrexx_reference: None,
                payrexx_transaction: None,
                created_at: now,
                updated_at: now,
            })
            .await?;
    }
    println!("✓ {} vouchers created", VOUCHER_VALUES.len());

    let mut user_id = 1;
    let mut log_id = 1;

    for id in 1..=bookings {
        let n = id as usize;
        db.clients()
            .insert(&Client {
                id,
                first_name: FIRST_NAMES[n % FIRST_NAMES.len()].to_string(),
                last_name: LAST_NAMES[n % LAST_NAMES.len()].to_string(),
                email: Some(format!("client{}@demo.boukii.ch", id)),
                phone: None,
                address: Some(format!("Dorfstrasse {}", id)),
                zip: Some("3920".to_string()),
                city: Some("Zermatt".to_string()),
                country: Some("CH".to_string()),
            })
            .await?;

        let method = PAYMENT_METHODS[n % PAYMENT_METHODS.len()];
        let source = SOURCES[n % SOURCES.len()];

        db.bookings()
            .insert(&Booking {
                id,
                school_id: 1,
                client_main_id: id,
                price_total_cents: PRICES[n % PRICES.len()],
                currency: "CHF".to_string(),
                paid: false,
                paid_total_cents: 0,
                payment_method_id: method,
                payrexx_reference: None,
                payrexx_transaction: None,
                source,
                status: BookingStatus::Confirmed,
                lifecycle: Lifecycle::Active,
                cancelled_at: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        for _ in 0..(1 + n % 2) {
            db.bookings()
                .insert_user(&BookingUser {
                    id: user_id,
                    booking_id: id,
                    client_id: id,
                    lifecycle: Lifecycle::Active,
                    cancelled_at: None,
                    created_at: now,
                })
                .await?;
            user_id += 1;
        }

        if method.settles_pending_vouchers(source) {
            db.vouchers()
                .insert_log(&VoucherLog {
                    id: log_id,
                    voucher_id: 1,
                    booking_id: id,
                    amount_cents: -1000,
                    status: Some(VoucherLogStatus::Pending),
                    created_at: now,
                })
                .await?;
            log_id += 1;
        }
    }

    println!("✓ {} bookings created ({} participant slots)", bookings, user_id - 1);
    println!("✓ {} pending voucher reservations", log_id - 1);
    println!();
    println!("Done.");

    Ok(())
}
