//! HTTP handlers, one module per resource.

pub mod health;
pub mod payment_link;
pub mod refund;
pub mod webhook;
