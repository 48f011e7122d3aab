//! # Gateway Capability
//!
//! The three calls the payment services make against the gateway. The
//! services only see this trait; [`payrexx::PayrexxClient`] is the HTTP
//! implementation.
//!
//! ```text
//! create_session(credentials, request)        ──► hosted payment page URL
//! retrieve_transaction(credentials, id)       ──► GatewayTransaction
//! refund(credentials, id, amount)             ──► TransactionStatus
//! ```

pub mod payrexx;

use async_trait::async_trait;

use crate::error::GatewayError;
use boukii_core::basket::BasketLine;
use boukii_core::{Buyer, GatewayCredentials, GatewayTransaction, Money, TransactionStatus};

pub use payrexx::PayrexxClient;

/// Where the hosted page sends the buyer afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectUrls {
    pub success: Option<String>,
    pub failed: Option<String>,
    pub cancel: Option<String>,
}

impl RedirectUrls {
    pub fn is_empty(&self) -> bool {
        self.success.is_none() && self.failed.is_none() && self.cancel.is_none()
    }
}

/// Everything needed to open a hosted payment page.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    /// Round-tripped as `referenceId` in the webhook.
    pub reference_id: String,
    pub amount: Money,
    pub currency: String,
    pub basket: Vec<BasketLine>,
    pub buyer: Option<Buyer>,
    pub redirects: RedirectUrls,
    /// Percent, e.g. 8.1.
    pub vat_rate: Option<f64>,
    pub terms_url: Option<String>,
    pub purpose: Option<String>,
}

/// A created hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySession {
    pub id: Option<String>,
    pub link: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn create_session(
        &self,
        credentials: &GatewayCredentials,
        request: &SessionRequest,
    ) -> Result<GatewaySession, GatewayError>;

    async fn retrieve_transaction(
        &self,
        credentials: &GatewayCredentials,
        transaction_id: &str,
    ) -> Result<GatewayTransaction, GatewayError>;

    async fn refund(
        &self,
        credentials: &GatewayCredentials,
        transaction_id: &str,
        amount: Money,
    ) -> Result<TransactionStatus, GatewayError>;
}
