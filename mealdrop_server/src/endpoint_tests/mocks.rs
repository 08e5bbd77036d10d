use chrono::{DateTime, Utc};
use md_common::Money;
use mealdrop_engine::{
    db_types::{
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
    },
    traits::{MarketplaceDatabase, ShopManagement, StorageError},
};
use mockall::mock;

mock! {
    pub Db {}

    impl Clone for Db {
        fn clone(&self) -> Self;
    }

    impl MarketplaceDatabase for Db {
        fn url(&self) -> &str;
        async fn create_user(&self, name: &str, email: &str, role: Role) -> Result<User, StorageError>;
        async fn fetch_user(&self, id: UserId) -> Result<Option<User>, StorageError>;
        async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;
        async fn insert_order<'a>(&self, order: NewOrder, status: OrderStatus, intent_id: Option<&'a str>) -> Result<Order, StorageError>;
        async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError>;
        async fn fetch_orders_for_customer(&self, customer: UserId) -> Result<Vec<Order>, StorageError>;
        async fn fetch_orders_for_shop(&self, shop: ShopId) -> Result<Vec<Order>, StorageError>;
        async fn fetch_orders_for_courier(&self, courier: UserId) -> Result<Vec<Order>, StorageError>;
        async fn mark_paid(&self, order_id: &OrderId, reference: &PaymentReference) -> Result<Order, StorageError>;
        async fn update_status(&self, order_id: &OrderId, expected: OrderStatus, new_status: OrderStatus, eta: Option<DateTime<Utc>>) -> Result<Order, StorageError>;
        async fn assign_courier(&self, order_id: &OrderId, courier: UserId) -> Result<Order, StorageError>;
        async fn set_delivery_otp(&self, order_id: &OrderId, otp: &str, expiry: DateTime<Utc>) -> Result<Order, StorageError>;
        async fn complete_delivery(&self, order_id: &OrderId, otp: &str, delivered_at: DateTime<Utc>) -> Result<Order, StorageError>;
        async fn owner_supplies_order(&self, owner: UserId, order_id: &OrderId) -> Result<bool, StorageError>;
        async fn has_delivered_order_with_item(&self, customer: UserId, item: MenuItemId) -> Result<bool, StorageError>;
        async fn upsert_rating(&self, item: MenuItemId, customer: UserId, rating: u8) -> Result<RatingAggregate, StorageError>;
    }

    impl ShopManagement for Db {
        async fn create_shop(&self, owner: UserId, name: &str) -> Result<Shop, StorageError>;
        async fn fetch_shop(&self, id: ShopId) -> Result<Option<Shop>, StorageError>;
        async fn fetch_shop_for_owner(&self, owner: UserId) -> Result<Option<Shop>, StorageError>;
        async fn add_menu_item(&self, shop: ShopId, name: &str, price: Money) -> Result<MenuItem, StorageError>;
        async fn fetch_menu(&self, shop: ShopId) -> Result<Vec<MenuItem>, StorageError>;
        async fn fetch_menu_item(&self, id: MenuItemId) -> Result<Option<MenuItem>, StorageError>;
    }
}
