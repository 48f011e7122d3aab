//! # Repository Module
//!
//! One repository per table group, each a thin wrapper around a cloned
//! `SqlitePool`.
//!
//! ```text
//! payments-api / boukii-payrexx
//!       │
//!       │  db.bookings().find_by_reference("Boukii #42")
//!       ▼
//! BookingRepository ──► SQLite
//! ```
//!
//! - [`booking::BookingRepository`] - bookings, participant slots, references
//! - [`client::ClientRepository`] - clients (buyer contact data)
//! - [`outbox::NotificationOutboxRepository`] - queued confirmation mails
//! - [`payment::PaymentRepository`] - append-only payment records (read side)
//! - [`school::SchoolRepository`] - schools and their gateway accounts
//! - [`settlement::SettlementRepository`] - the atomic paid-flip
//! - [`voucher::VoucherRepository`] - vouchers and voucher logs

pub mod booking;
pub mod client;
pub mod outbox;
pub mod payment;
pub mod school;
pub mod settlement;
pub mod voucher;
