use serde::{Deserialize, Serialize};

use md_common::Money;

use crate::{
    db_types::{DeliveryAddress, LineItem, Order, PaymentMethod, UserId},
    gateway::PaymentIntent,
};

/// The customer-supplied order payload. The total is what the client believes the order costs;
/// the engine recomputes it from the line items and rejects a mismatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub line_items: Vec<LineItem>,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub delivery_address: DeliveryAddress,
}

/// The result of a successful order creation: the stored order plus, for online payments, the
/// gateway intent the client completes payment against.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub intent: Option<PaymentIntent>,
}

/// An owner may name the courier by id or by email.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CourierRef {
    Id(UserId),
    Email(String),
}

impl std::fmt::Display for CourierRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CourierRef::Id(id) => write!(f, "{id}"),
            CourierRef::Email(email) => write!(f, "{email}"),
        }
    }
}
