//! # boukii-db: Persistence for Boukii Payments
//!
//! SQLite storage for schools, bookings, vouchers, payments and the
//! notification outbox, accessed through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  payments-api ──► boukii-payrexx (session / reconciler / refund)        │
//! │                          │                                              │
//! │                          ▼                                              │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     boukii-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │◄───│ booking       │    │  (embedded)  │  │   │
//! │  │   │               │    │ voucher       │    │              │  │   │
//! │  │   │ SqlitePool    │    │ settlement    │    │ 001_initial  │  │   │
//! │  │   │               │    │ outbox ...    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use boukii_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./boukii-payments.db")).await?;
//! let booking = db.bookings().find_by_reference("Boukii #42").await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
mod fixtures;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::booking::BookingRepository;
pub use repository::client::ClientRepository;
pub use repository::outbox::NotificationOutboxRepository;
pub use repository::payment::PaymentRepository;
pub use repository::school::SchoolRepository;
pub use repository::settlement::{
    BookingSettlement, SettlementOutcome, SettlementReport, SettlementRepository,
    VoucherSettlement,
};
pub use repository::voucher::VoucherRepository;
