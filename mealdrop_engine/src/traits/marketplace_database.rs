use chrono::{DateTime, Utc};
use md_common::Money;
use thiserror::Error;

use crate::db_types::{
    MenuItem,
    MenuItemId,
    NewOrder,
    Order,
    OrderId,
    OrderStatus,
    PaymentReference,
    RatingAggregate,
    Role,
    Shop,
    ShopId,
    User,
    UserId,
};

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("{0} was not found")]
    NotFound(String),
    #[error("Conditional update matched no row for order {0}. The order state has moved on.")]
    StaleTransition(OrderId),
    #[error("Database error. {0}")]
    Database(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

/// The storage contract for the order lifecycle engine.
///
/// Every order mutation is a *conditional* read-modify-write: the update is keyed on the expected
/// prior status (and, when consuming an OTP, the expected OTP value), and a guard that matches no
/// row surfaces as [`StorageError::StaleTransition`]. That is the engine's whole concurrency
/// story: two racing transitions against the same order cannot both land.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase: Clone {
    /// The URL of the backing database.
    fn url(&self) -> &str;

    //------------------------------------------ users ------------------------------------------

    /// Mirrors an identity-provider record into the local store. Role is fixed at creation.
    async fn create_user(&self, name: &str, email: &str, role: Role) -> Result<User, StorageError>;

    async fn fetch_user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;

    //------------------------------------------ orders -----------------------------------------

    /// Stores the order and its line items in a single transaction. The initial status is
    /// `Pending` for online orders (with the gateway intent id attached) or `CodPending` for
    /// cash-on-delivery.
    async fn insert_order(
        &self,
        order: NewOrder,
        status: OrderStatus,
        intent_id: Option<&str>,
    ) -> Result<Order, StorageError>;

    /// Fetches an order with its line items attached, or `None` if it does not exist.
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError>;

    async fn fetch_orders_for_customer(&self, customer: UserId) -> Result<Vec<Order>, StorageError>;

    async fn fetch_orders_for_shop(&self, shop: ShopId) -> Result<Vec<Order>, StorageError>;

    async fn fetch_orders_for_courier(&self, courier: UserId) -> Result<Vec<Order>, StorageError>;

    /// `Pending -> Paid`, recording the verified payment reference and `paid_at` in the same
    /// statement. Guarded on the order still being `Pending`.
    async fn mark_paid(&self, order_id: &OrderId, reference: &PaymentReference) -> Result<Order, StorageError>;

    /// Moves an order from `expected` to `new_status`, optionally recording an estimated delivery
    /// time. Guarded on the current status still being `expected`.
    async fn update_status(
        &self,
        order_id: &OrderId,
        expected: OrderStatus,
        new_status: OrderStatus,
        eta: Option<DateTime<Utc>>,
    ) -> Result<Order, StorageError>;

    /// Assigns (or reassigns) a courier. If the order is still `Paid` the status auto-advances to
    /// `Confirmed` in the same statement. Guarded on the order being non-terminal.
    async fn assign_courier(&self, order_id: &OrderId, courier: UserId) -> Result<Order, StorageError>;

    /// Stores a freshly issued delivery OTP and its expiry as a pair. Guarded on the status still
    /// permitting OTP issue. Reissuing overwrites the previous pair, which makes resends safe.
    async fn set_delivery_otp(
        &self,
        order_id: &OrderId,
        otp: &str,
        expiry: DateTime<Utc>,
    ) -> Result<Order, StorageError>;

    /// Consumes the delivery OTP: clears both OTP fields, sets `Delivered` and `delivered_at`, all
    /// in one statement guarded on the stored OTP still equalling `otp`. The loser of a
    /// double-verify race gets [`StorageError::StaleTransition`].
    async fn complete_delivery(
        &self,
        order_id: &OrderId,
        otp: &str,
        delivered_at: DateTime<Utc>,
    ) -> Result<Order, StorageError>;

    //------------------------------------- ownership & ratings ---------------------------------

    /// The owner-membership test: does any line item of the order belong to a shop owned by
    /// `owner`?
    async fn owner_supplies_order(&self, owner: UserId, order_id: &OrderId) -> Result<bool, StorageError>;

    /// Whether `customer` has at least one delivered order containing `item`. Gates rating.
    async fn has_delivered_order_with_item(
        &self,
        customer: UserId,
        item: MenuItemId,
    ) -> Result<bool, StorageError>;

    /// Upserts one customer's rating of an item and recomputes the aggregate in the same
    /// transaction. The count only grows on a customer's first rating of the item.
    async fn upsert_rating(
        &self,
        item: MenuItemId,
        customer: UserId,
        rating: u8,
    ) -> Result<RatingAggregate, StorageError>;
}

/// Shop and menu management. Thin CRUD; the lifecycle engine only consumes the lookups.
#[allow(async_fn_in_trait)]
pub trait ShopManagement: Clone {
    async fn create_shop(&self, owner: UserId, name: &str) -> Result<Shop, StorageError>;

    async fn fetch_shop(&self, id: ShopId) -> Result<Option<Shop>, StorageError>;

    /// A shop is looked up by its owner to scope all owner-side order queries.
    async fn fetch_shop_for_owner(&self, owner: UserId) -> Result<Option<Shop>, StorageError>;

    async fn add_menu_item(&self, shop: ShopId, name: &str, price: Money) -> Result<MenuItem, StorageError>;

    async fn fetch_menu(&self, shop: ShopId) -> Result<Vec<MenuItem>, StorageError>;

    async fn fetch_menu_item(&self, id: MenuItemId) -> Result<Option<MenuItem>, StorageError>;
}
