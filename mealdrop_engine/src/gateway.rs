//! Payment gateway adapter.
//!
//! The adapter owns two things: creation of a gateway-side payment intent for an order, and
//! verification of the signature the gateway hands back once the customer completes payment. The
//! signature is an HMAC-SHA256 over `"{intent_id}|{payment_id}"` keyed by the shared secret, sent
//! to us hex-encoded.
//!
//! Running without gateway credentials is a supported mode, not an error: the marketplace then
//! operates cash-on-delivery only and every online-payment attempt is rejected with
//! [`GatewayError::Unavailable`].

use hmac::{Hmac, Mac};
use log::*;
use md_common::{Money, Secret};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The payment gateway is not configured")]
    Unavailable,
    #[error("The payment signature was rejected")]
    InvalidSignature,
    #[error("Malformed payment signature. {0}")]
    MalformedSignature(String),
    #[error("Invalid payment amount. {0}")]
    InvalidAmount(String),
}

/// A gateway-side payment authorization record, created before the customer completes payment.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PaymentIntent {
    pub intent_id: String,
    pub amount: Money,
    pub currency: String,
}

/// The gateway handle is constructed once from configuration and injected into the order flow.
/// `Disabled` stands in for missing credentials; callers never see a nullable singleton.
#[derive(Clone, Default)]
pub enum PaymentGateway {
    Live { key_id: String, key_secret: Secret<String> },
    #[default]
    Disabled,
}

impl std::fmt::Debug for PaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentGateway::Live { key_id, .. } => write!(f, "PaymentGateway::Live({key_id})"),
            PaymentGateway::Disabled => write!(f, "PaymentGateway::Disabled"),
        }
    }
}

impl PaymentGateway {
    /// Builds the gateway from optional credentials. Either credential missing means the gateway
    /// is disabled and the marketplace runs cash-on-delivery only.
    pub fn from_credentials(key_id: Option<String>, key_secret: Option<String>) -> Self {
        match (key_id, key_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                info!("💳️ Payment gateway configured with key id {id}");
                PaymentGateway::Live { key_id: id, key_secret: Secret::new(secret) }
            },
            _ => {
                warn!("💳️ No payment gateway credentials configured. Online payments are disabled (COD only).");
                PaymentGateway::Disabled
            },
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, PaymentGateway::Live { .. })
    }

    /// Creates a payment intent for the given amount. The intent id is derived from the
    /// idempotency key, so retrying order creation with the same key cannot mint a second intent.
    pub fn create_intent(
        &self,
        amount: Money,
        currency: &str,
        idempotency_key: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        let key_id = match self {
            PaymentGateway::Live { key_id, .. } => key_id,
            PaymentGateway::Disabled => return Err(GatewayError::Unavailable),
        };
        if amount.is_negative() {
            return Err(GatewayError::InvalidAmount(format!("amount {amount} is negative")));
        }
        let intent_id = format!("intent_{idempotency_key}");
        debug!("💳️ Created payment intent {intent_id} for {amount} via key {key_id}");
        Ok(PaymentIntent { intent_id, amount, currency: to_owned_upper(currency) })
    }

    /// Verifies the gateway signature for a completed payment.
    ///
    /// The expected MAC is recomputed over `"{intent_id}|{payment_id}"` with the shared secret and
    /// compared in constant time via [`Mac::verify_slice`]. A failed comparison is a
    /// security-relevant rejection: it is logged with the order context only, never with the
    /// secret or the recomputed value.
    pub fn verify_signature(
        &self,
        intent_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), GatewayError> {
        let key_secret = match self {
            PaymentGateway::Live { key_secret, .. } => key_secret,
            PaymentGateway::Disabled => return Err(GatewayError::Unavailable),
        };
        let supplied = hex::decode(signature)
            .map_err(|e| GatewayError::MalformedSignature(format!("signature is not valid hex. {e}")))?;
        let mut mac = HmacSha256::new_from_slice(key_secret.reveal().as_bytes())
            .map_err(|e| GatewayError::MalformedSignature(e.to_string()))?;
        mac.update(intent_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        mac.verify_slice(&supplied).map_err(|_| {
            warn!("💳️🚨️ Payment signature rejected for intent {intent_id}, payment {payment_id}");
            GatewayError::InvalidSignature
        })
    }
}

/// Computes the hex-encoded signature the gateway would produce for the given ids. Used by tests
/// and tooling that plays the gateway side of the handshake.
pub fn sign_payment(intent_id: &str, payment_id: &str, key_secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(intent_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn to_owned_upper(s: &str) -> String {
    s.to_ascii_uppercase()
}
