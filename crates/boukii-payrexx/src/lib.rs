//! # boukii-payrexx: Gateway Adapter and Payment Services
//!
//! Builds payment links, reconciles gateway webhooks against bookings and
//! vouchers, issues refunds and delivers the confirmation mails a
//! settlement queues.
//!
//! ## Webhook Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST /payrexx/webhook                                                  │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  WebhookReconciler ──► GatewayClient.retrieve_transaction (bounded)    │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  SettlementRepository (one SQLite transaction)                         │
//! │        │   paid, payment, vouchers, un-cancel, outbox entry            │
//! │        ▼                                                                │
//! │  NotificationDispatcher (background) ──► Mailer                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`gateway`] - Gateway capability trait and the Payrexx HTTP client
//! - [`session`] - Payment link creation
//! - [`reconciler`] - Webhook reconciliation
//! - [`refund`] - Gateway refunds
//! - [`dispatcher`] - Outbox consumer and mailer
//! - [`clock`] - Injectable time

pub mod clock;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod reconciler;
pub mod refund;
pub mod session;

#[cfg(test)]
mod test_support;

pub use clock::{Clock, FixedClock, SystemClock};
pub use dispatcher::{
    DispatcherConfig, DispatcherHandle, LogMailer, MailError, Mailer, NotificationDispatcher,
    OutgoingMail,
};
pub use error::{GatewayError, PaymentError, PaymentResult};
pub use gateway::{GatewayClient, GatewaySession, PayrexxClient, RedirectUrls, SessionRequest};
pub use reconciler::{ReconcileOutcome, WebhookReconciler};
pub use refund::RefundService;
pub use session::{GatewaySessionService, RedirectConfig, RedirectTarget};
