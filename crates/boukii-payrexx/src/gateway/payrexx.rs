//! # Payrexx HTTP Adapter
//!
//! ## Request Signing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  params  = amount=12000&currency=CHF&referenceId=Boukii+%2342&...       │
//! │  sig     = base64( HMAC-SHA256(params, school.payrexx_key) )           │
//! │                                                                         │
//! │  POST https://api.payrexx.com/v1.0/Gateway/?instance=<instance>        │
//! │       body: params&ApiSignature=<sig>                                  │
//! │                                                                         │
//! │  GET  https://api.payrexx.com/v1.0/Transaction/555/?instance=<i>       │
//! │           &ApiSignature=<sig of "">                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every response is an envelope `{"status": "success", "data": [...]}`.
//! Anything else, including a non-2xx status, is a [`GatewayError::Api`].

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::debug;
use url::form_urlencoded;
use url::Url;

use super::{GatewayClient, GatewaySession, SessionRequest};
use crate::error::GatewayError;
use boukii_core::validation::validate_transaction_id;
use boukii_core::{GatewayCredentials, GatewayTransaction, Money, TransactionStatus};

type HmacSha256 = Hmac<Sha256>;

/// Default process-wide API domain.
pub const DEFAULT_API_DOMAIN: &str = "payrexx.com";

const API_VERSION_PATH: &str = "v1.0/";

/// Computes the `ApiSignature` for an url-encoded parameter string.
pub fn api_signature(encoded_params: &str, api_key: &str) -> Result<String, GatewayError> {
    let mut mac = HmacSha256::new_from_slice(api_key.as_bytes())
        .map_err(|e| GatewayError::Signing(e.to_string()))?;
    mac.update(encoded_params.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

// =============================================================================
// Response Envelope
// =============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayData {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundData {
    status: TransactionStatus,
}

// =============================================================================
// Client
// =============================================================================

/// Payrexx REST client. One instance serves every school; credentials are
/// passed per call.
#[derive(Debug, Clone)]
pub struct PayrexxClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl PayrexxClient {
    /// Client for `https://api.{api_domain}/v1.0/`.
    pub fn new(api_domain: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let domain = api_domain.trim().trim_matches('/');
        if domain.is_empty() {
            return Err(GatewayError::InvalidUrl("API domain is empty".to_string()));
        }
        Self::with_base_url(&format!("https://api.{}/", domain), timeout)
    }

    /// Client for an explicit host (used against mock servers).
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let base_url = base.join(API_VERSION_PATH)?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(PayrexxClient {
            http,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str, instance: &str) -> Result<Url, GatewayError> {
        let mut url = self.base_url.join(path)?;
        url.query_pairs_mut().append_pair("instance", instance);
        Ok(url)
    }

    /// `Transaction/{id}/{action}`. The id comes from webhook bodies, so it is
    /// checked and pushed as a single encoded segment, never joined as text.
    fn transaction_endpoint(
        &self,
        transaction_id: &str,
        action: &str,
        instance: &str,
    ) -> Result<Url, GatewayError> {
        validate_transaction_id(transaction_id)
            .map_err(|e| GatewayError::InvalidUrl(e.to_string()))?;

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidUrl("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push("Transaction")
            .push(transaction_id)
            .push(action);
        url.query_pairs_mut().append_pair("instance", instance);
        Ok(url)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        params: &[(String, String)],
        api_key: &str,
    ) -> Result<T, GatewayError> {
        // Serializers are not Send; both are dropped before the request is awaited
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        let signature = api_signature(&encoded, api_key)?;
        let body = form_urlencoded::Serializer::new(encoded)
            .append_pair("ApiSignature", &signature)
            .finish();

        debug!(path = url.path(), "Payrexx POST");

        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| GatewayError::from_reqwest(e, self.timeout))?;

        self.read_envelope(response).await
    }

    async fn get<T: DeserializeOwned>(&self, mut url: Url, api_key: &str) -> Result<T, GatewayError> {
        let signature = api_signature("", api_key)?;
        url.query_pairs_mut().append_pair("ApiSignature", &signature);

        debug!(path = url.path(), "Payrexx GET");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| GatewayError::from_reqwest(e, self.timeout))?;

        self.read_envelope(response).await
    }

    async fn read_envelope<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status_code = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::from_reqwest(e, self.timeout))?;

        let envelope: Envelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if (200..300).contains(&status_code) => {
                return Err(GatewayError::Decode(e.to_string()))
            }
            Err(_) => {
                return Err(GatewayError::Api {
                    status_code,
                    message: body.chars().take(200).collect(),
                })
            }
        };

        if !(200..300).contains(&status_code) || envelope.status != "success" {
            return Err(GatewayError::Api {
                status_code,
                message: envelope
                    .message
                    .unwrap_or_else(|| format!("status '{}'", envelope.status)),
            });
        }

        envelope
            .data
            .into_iter()
            .next()
            .ok_or(GatewayError::EmptyResponse)
    }
}

/// Form parameters for `POST Gateway/`.
fn session_params(request: &SessionRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("amount".to_string(), request.amount.cents().to_string()),
        ("currency".to_string(), request.currency.clone()),
        ("referenceId".to_string(), request.reference_id.clone()),
    ];

    if let Some(purpose) = &request.purpose {
        params.push(("purpose".to_string(), purpose.clone()));
    }
    if let Some(vat_rate) = request.vat_rate {
        params.push(("vatRate".to_string(), vat_rate.to_string()));
    }

    let redirects = [
        ("successRedirectUrl", &request.redirects.success),
        ("failedRedirectUrl", &request.redirects.failed),
        ("cancelRedirectUrl", &request.redirects.cancel),
    ];
    for (name, url) in redirects {
        if let Some(url) = url {
            params.push((name.to_string(), url.clone()));
        }
    }

    for (i, line) in request.basket.iter().enumerate() {
        params.push((format!("basket[{}][name]", i), line.name.clone()));
        params.push((format!("basket[{}][quantity]", i), line.quantity.to_string()));
        params.push((format!("basket[{}][amount]", i), line.unit_amount.cents().to_string()));
    }

    let mut field = |name: &str, value: Option<&String>| {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            params.push((format!("fields[{}][value]", name), value.clone()));
        }
    };

    if let Some(buyer) = &request.buyer {
        field("forename", Some(&buyer.forename));
        field("surname", Some(&buyer.surname));
        field("email", buyer.email.as_ref());
        field("phone", buyer.phone.as_ref());
        field("street", buyer.street.as_ref());
        field("postcode", buyer.postcode.as_ref());
        field("place", buyer.place.as_ref());
        field("country", buyer.country.as_ref());
    }
    field("terms", request.terms_url.as_ref());

    params
}

#[async_trait]
impl GatewayClient for PayrexxClient {
    async fn create_session(
        &self,
        credentials: &GatewayCredentials,
        request: &SessionRequest,
    ) -> Result<GatewaySession, GatewayError> {
        let url = self.endpoint("Gateway/", &credentials.instance)?;
        let data: GatewayData = self
            .post(url, &session_params(request), &credentials.api_key)
            .await?;

        let link = data
            .link
            .filter(|l| !l.trim().is_empty())
            .ok_or(GatewayError::EmptyResponse)?;
        let id = data.id.map(|v| match v {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });

        Ok(GatewaySession { id, link })
    }

    async fn retrieve_transaction(
        &self,
        credentials: &GatewayCredentials,
        transaction_id: &str,
    ) -> Result<GatewayTransaction, GatewayError> {
        let url = self.transaction_endpoint(transaction_id, "", &credentials.instance)?;
        self.get(url, &credentials.api_key).await
    }

    async fn refund(
        &self,
        credentials: &GatewayCredentials,
        transaction_id: &str,
        amount: Money,
    ) -> Result<TransactionStatus, GatewayError> {
        let url = self.transaction_endpoint(transaction_id, "refund", &credentials.instance)?;
        let params = [("amount".to_string(), amount.cents().to_string())];
        let data: RefundData = self.post(url, &params, &credentials.api_key).await?;
        Ok(data.status)
    }
}

// =============================================================================
// Tests
// =============================================================================
