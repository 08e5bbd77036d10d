use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use md_common::{Money, INR_CURRENCY_CODE};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------        OrderId        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// Generates a fresh order id. Ids are opaque; the prefix only helps humans grepping logs.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        Self(format!("md-{:012x}", rng.gen::<u64>() & 0xffff_ffff_ffff))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------     Entity ids        -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct ShopId(pub i64);

impl Display for ShopId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "shop:{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct MenuItemId(pub i64);

impl Display for MenuItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "item:{}", self.0)
    }
}

//--------------------------------------        Role           -------------------------------------------------------
/// A user's role is fixed at account creation and determines which lifecycle operations they may
/// perform. There is no role-elevation flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Owner,
    Courier,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::Owner => write!(f, "owner"),
            Role::Courier => write!(f, "courier"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid role: {0}")]
pub struct RoleConversionError(String);

impl FromStr for Role {
    type Err = RoleConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "owner" => Ok(Self::Owner),
            "courier" => Ok(Self::Courier),
            s => Err(RoleConversionError(s.to_string())),
        }
    }
}

/// The acting identity attached to an authenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub role: Role,
}

impl Identity {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }
}

//--------------------------------------     OrderStatus       -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created for an online payment; the gateway intent exists but payment is unverified.
    Pending,
    /// Created as cash-on-delivery; no gateway intent will ever exist.
    CodPending,
    /// Payment verified against the gateway signature.
    Paid,
    /// The shop has acknowledged the order.
    Confirmed,
    /// The kitchen is working on it.
    Preparing,
    /// The assigned courier has picked the order up.
    OutForDelivery,
    /// Proof-of-delivery OTP consumed. Terminal.
    Delivered,
    /// Cancelled by the shop. Terminal.
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// The statuses a shop owner may move an order into via `update_status`.
    pub fn is_owner_assignable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Confirmed | OrderStatus::Preparing | OrderStatus::OutForDelivery | OrderStatus::Cancelled
        )
    }

    /// The statuses from which a delivery OTP may be issued.
    pub fn allows_otp_issue(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Preparing | OrderStatus::OutForDelivery)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::CodPending => "cod_pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct StatusConversionError(String);

impl FromStr for OrderStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "cod_pending" => Ok(Self::CodPending),
            "paid" => Ok(Self::Paid),
            "confirmed" => Ok(Self::Confirmed),
            "preparing" => Ok(Self::Preparing),
            "out_for_delivery" => Ok(Self::OutForDelivery),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(StatusConversionError(s.to_string())),
        }
    }
}

//--------------------------------------    PaymentMethod      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Online,
    CashOnDelivery,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Online => write!(f, "online"),
            PaymentMethod::CashOnDelivery => write!(f, "cash_on_delivery"),
        }
    }
}

//--------------------------------------      LineItem         -------------------------------------------------------
/// One ordered quantity of a single menu item. `unit_price` is a snapshot taken at order time and
/// is never re-read from the menu item, so historical bills stay accurate when menus change.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LineItem {
    pub menu_item_id: MenuItemId,
    pub quantity: u32,
    pub unit_price: Money,
}

//--------------------------------------   DeliveryAddress     -------------------------------------------------------
/// Free-text address with an optional geocoordinate. Geocoding fallback lives with an external
/// collaborator; the engine just carries whatever coordinate was supplied.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postcode: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

//--------------------------------------  PaymentReference     -------------------------------------------------------
/// Gateway-side identifiers attached to an order once its online payment has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReference {
    pub intent_id: String,
    pub payment_id: String,
    pub signature: String,
}

//--------------------------------------        Order          -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_id: UserId,
    /// Loaded from the order_items table, not from the orders row itself.
    #[sqlx(skip)]
    pub line_items: Vec<LineItem>,
    pub total: Money,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub intent_id: Option<String>,
    pub payment_id: Option<String>,
    pub payment_signature: Option<String>,
    #[sqlx(flatten)]
    pub delivery_address: DeliveryAddress,
    pub assigned_courier_id: Option<UserId>,
    /// Never serialized: the code reaches the customer out-of-band only. A courier reading it off
    /// an API response would defeat the proof-of-delivery.
    #[serde(skip_serializing)]
    pub delivery_otp: Option<String>,
    pub otp_expiry: Option<DateTime<Utc>>,
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn payment_reference(&self) -> Option<PaymentReference> {
        match (&self.intent_id, &self.payment_id, &self.payment_signature) {
            (Some(i), Some(p), Some(s)) => {
                Some(PaymentReference { intent_id: i.clone(), payment_id: p.clone(), signature: s.clone() })
            },
            _ => None,
        }
    }
}

//--------------------------------------       NewOrder        -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub customer_id: UserId,
    pub line_items: Vec<LineItem>,
    /// The server-recomputed total. The client-supplied figure is validated against this before an
    /// order ever reaches the store.
    pub total: Money,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub delivery_address: DeliveryAddress,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(
        customer_id: UserId,
        line_items: Vec<LineItem>,
        total: Money,
        payment_method: PaymentMethod,
        delivery_address: DeliveryAddress,
    ) -> Self {
        Self {
            order_id: OrderId::random(),
            customer_id,
            line_items,
            total,
            currency: INR_CURRENCY_CODE.to_string(),
            payment_method,
            delivery_address,
            created_at: Utc::now(),
        }
    }
}

//--------------------------------------         User          -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------         Shop          -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Shop {
    pub id: ShopId,
    pub owner_id: UserId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------       MenuItem        -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub shop_id: ShopId,
    pub name: String,
    pub price: Money,
    pub rating_average: f64,
    pub rating_count: i64,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   RatingAggregate     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, FromRow, Serialize, Deserialize)]
pub struct RatingAggregate {
    pub average: f64,
    pub count: i64,
}
