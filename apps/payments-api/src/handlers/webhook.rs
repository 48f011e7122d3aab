//! Payrexx webhook endpoint.
//!
//! Payrexx posts either JSON or a PHP-style nested form
//! (`transaction[id]=1&transaction[status]=confirmed`). Both are turned into
//! a [`WebhookPayload`] and handed to the reconciler. The response is always
//! `200 OK` so the gateway never sees an internal failure.

use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap},
    response::IntoResponse,
};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, warn};

use boukii_core::transaction::WebhookPayload;

use crate::AppState;

pub async fn payrexx_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    match parse_payload(&headers, &body) {
        Ok(payload) => {
            let outcome = state.reconciler.handle(&payload).await;
            debug!(?outcome, "Webhook processed");
        }
        Err(e @ PayloadError::Unreadable(_)) => {
            warn!(bytes = body.len(), error = %e, "Unreadable webhook body")
        }
        Err(e @ PayloadError::Malformed(_)) => {
            error!(bytes = body.len(), error = %e, "Malformed webhook payload")
        }
    }

    "OK"
}

#[derive(Debug, Error)]
enum PayloadError {
    /// Not JSON at all.
    #[error("body is not JSON: {0}")]
    Unreadable(serde_json::Error),

    /// Readable, but a field has the wrong shape (e.g. a numeric `referenceId`).
    #[error("payload does not match the webhook schema: {0}")]
    Malformed(serde_json::Error),
}

fn parse_payload(headers: &HeaderMap, body: &[u8]) -> Result<WebhookPayload, PayloadError> {
    let is_form = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    let value = if is_form {
        form_to_json(body)
    } else {
        serde_json::from_slice(body).map_err(PayloadError::Unreadable)?
    };

    serde_json::from_value(value).map_err(PayloadError::Malformed)
}

/// Rebuilds the nested object a bracketed form encodes. Leaf values stay
/// strings; the payload types parse numbers leniently.
pub fn form_to_json(body: &[u8]) -> Value {
    let mut root = Map::new();

    'pairs: for (key, value) in url::form_urlencoded::parse(body) {
        let path = key_path(&key);
        let Some((last, parents)) = path.split_last() else {
            continue;
        };

        let mut node = &mut root;
        for segment in parents {
            let entry = node
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            match entry {
                Value::Object(map) => node = map,
                // `a=1&a[b]=2`: the scalar wins
                _ => continue 'pairs,
            }
        }

        node.insert(last.to_string(), Value::String(value.into_owned()));
    }

    Value::Object(root)
}

/// `transaction[invoice][totalAmount]` → `["transaction", "invoice", "totalAmount"]`
fn key_path(key: &str) -> Vec<&str> {
    let (head, rest) = match key.find('[') {
        Some(i) => key.split_at(i),
        None => (key, ""),
    };

    let mut path = vec![head];
    path.extend(
        rest.split('[')
            .filter_map(|s| s.strip_suffix(']'))
            .filter(|s| !s.is_empty()),
    );
    path.retain(|s| !s.is_empty());
    path
}
