//! # Notification Dispatcher
//!
//! Delivers the confirmation mails the settlement queued in
//! `notification_outbox`. Runs as a background task, separate from the
//! webhook request, so a slow or failing mailer never delays or fails a
//! reconciliation.
//!
//! ## Dispatch Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  every poll_interval                                                    │
//! │                                                                         │
//! │  1. Poll: SELECT * FROM notification_outbox                            │
//! │           WHERE sent_at IS NULL AND attempts < max_attempts            │
//! │           ORDER BY created_at LIMIT batch_size                         │
//! │                                                                         │
//! │  2. Send: Mailer.send(OutgoingMail) per entry                          │
//! │                                                                         │
//! │  3. Mark: ok  ──► sent_at = now                                        │
//! │           err ──► attempts += 1, last_error = err                      │
//! │                                                                         │
//! │  Entries that reach max_attempts are no longer polled.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::clock::Clock;
use crate::error::PaymentResult;
use boukii_core::{NotificationKind, NotificationOutboxEntry};
use boukii_db::Database;

// =============================================================================
// Mailer
// =============================================================================

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub kind: NotificationKind,
    pub from: String,
    pub recipient: String,
    pub subject: String,
    /// JSON payload as queued by the settlement.
    pub body: String,
}

impl OutgoingMail {
    fn from_entry(entry: &NotificationOutboxEntry, from: &str) -> Self {
        let subject = match entry.kind {
            NotificationKind::BookingConfirmation => "Your booking is confirmed",
            NotificationKind::VoucherConfirmation => "Your voucher is ready",
        };

        OutgoingMail {
            kind: entry.kind,
            from: from.to_string(),
            recipient: entry.recipient.clone(),
            subject: subject.to_string(),
            body: entry.payload.clone(),
        }
    }
}

#[derive(Debug, Error)]
#[error("Mail delivery failed: {0}")]
pub struct MailError(pub String);

/// Outbound mail transport.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Writes mails to the log instead of sending them.
#[derive(Debug, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        info!(
            kind = ?mail.kind,
            from = %mail.from,
            recipient = %mail.recipient,
            subject = %mail.subject,
            body = %mail.body,
            "Mail"
        );
        Ok(())
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub poll_interval: Duration,
    pub batch_size: u32,
    /// Entries with this many failed attempts are left alone.
    pub max_attempts: i64,
    /// Sender address.
    pub from: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            poll_interval: Duration::from_secs(5),
            batch_size: 50,
            max_attempts: 10,
            from: "no-reply@boukii.com".to_string(),
        }
    }
}

/// Handle for stopping a running dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl DispatcherHandle {
    /// Triggers graceful shutdown. A dispatcher that already stopped is
    /// not an error.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

pub struct NotificationDispatcher {
    db: Database,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    config: DispatcherConfig,
    shutdown_rx: mpsc::Receiver<()>,
    span: Span,
}

impl NotificationDispatcher {
    /// Creates a dispatcher and the handle that stops it.
    pub fn new(
        db: Database,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        config: DispatcherConfig,
    ) -> (Self, DispatcherHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let dispatcher = NotificationDispatcher {
            db,
            mailer,
            clock,
            config,
            shutdown_rx,
            span: info_span!("payments", component = "dispatcher"),
        };

        (dispatcher, DispatcherHandle { shutdown_tx })
    }

    /// Runs the dispatch loop until shut down.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        let span = self.span.clone();
        async move {
            info!(
                poll_interval_ms = self.config.poll_interval.as_millis() as u64,
                batch_size = self.config.batch_size,
                "Notification dispatcher starting"
            );

            let mut interval = tokio::time::interval(self.config.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.process_batch().await {
                            error!(error = %e, "Failed to process notification batch");
                        }
                    }

                    _ = self.shutdown_rx.recv() => {
                        info!("Notification dispatcher shutting down");
                        break;
                    }
                }
            }

            info!("Notification dispatcher stopped");
        }
        .instrument(span)
        .await
    }

    /// Sends one batch of pending notifications. Returns how many were sent.
    pub async fn process_batch(&self) -> PaymentResult<usize> {
        let entries = self
            .db
            .notifications()
            .get_pending(self.config.batch_size, self.config.max_attempts)
            .await?;

        if entries.is_empty() {
            debug!("No pending notifications");
            return Ok(0);
        }

        let mut sent = 0;
        for entry in &entries {
            let mail = OutgoingMail::from_entry(entry, &self.config.from);

            match self.mailer.send(&mail).await {
                Ok(()) => {
                    self.db
                        .notifications()
                        .mark_sent(&entry.id, self.clock.now())
                        .await?;
                    sent += 1;
                }
                Err(e) => {
                    warn!(
                        id = %entry.id,
                        kind = ?entry.kind,
                        attempts = entry.attempts + 1,
                        error = %e,
                        "Notification delivery failed"
                    );
                    self.db
                        .notifications()
                        .mark_failed(&entry.id, &e.to_string(), self.clock.now())
                        .await?;
                }
            }
        }

        info!(sent, failed = entries.len() - sent, "Processed notification batch");
        Ok(sent)
    }
}
