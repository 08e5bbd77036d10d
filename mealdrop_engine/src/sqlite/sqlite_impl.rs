use chrono::{DateTime, Utc};
use log::*;
use md_common::Money;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::{
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
    sqlite::db,
    traits::{MarketplaceDatabase, ShopManagement, StorageError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase").field("url", &self.url).finish()
    }
}

impl SqliteDatabase {
    /// Connects to the database at `url` and runs any pending migrations.
    ///
    /// For in-memory databases use a pool size of 1, since each sqlite memory connection is its
    /// own private database.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
        let db = Self { url: url.to_string(), pool };
        db.migrate().await?;
        info!("💻️ Connected to database at {url}");
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        &self.url
    }

    async fn create_user(&self, name: &str, email: &str, role: Role) -> Result<User, StorageError> {
        let mut conn = self.pool.acquire().await?;
        db::users::create_user(name, email, role, &mut conn).await
    }

    async fn fetch_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        db::users::fetch_user(id, &mut conn).await
    }

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        db::users::fetch_user_by_email(email, &mut conn).await
    }

    async fn insert_order(
        &self,
        order: NewOrder,
        status: OrderStatus,
        intent_id: Option<&str>,
    ) -> Result<Order, StorageError> {
        let mut tx = self.pool.begin().await?;
        let order = db::orders::insert_order(order, status, intent_id, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::fetch_order(order_id, &mut conn).await
    }

    async fn fetch_orders_for_customer(&self, customer: UserId) -> Result<Vec<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::fetch_orders_for_customer(customer, &mut conn).await
    }

    async fn fetch_orders_for_shop(&self, shop: ShopId) -> Result<Vec<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::fetch_orders_for_shop(shop, &mut conn).await
    }

    async fn fetch_orders_for_courier(&self, courier: UserId) -> Result<Vec<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::fetch_orders_for_courier(courier, &mut conn).await
    }

    async fn mark_paid(&self, order_id: &OrderId, reference: &PaymentReference) -> Result<Order, StorageError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::mark_paid(order_id, reference, &mut conn).await
    }

    async fn update_status(
        &self,
        order_id: &OrderId,
        expected: OrderStatus,
        new_status: OrderStatus,
        eta: Option<DateTime<Utc>>,
    ) -> Result<Order, StorageError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::update_status(order_id, expected, new_status, eta, &mut conn).await
    }

    async fn assign_courier(&self, order_id: &OrderId, courier: UserId) -> Result<Order, StorageError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::assign_courier(order_id, courier, &mut conn).await
    }

    async fn set_delivery_otp(
        &self,
        order_id: &OrderId,
        otp: &str,
        expiry: DateTime<Utc>,
    ) -> Result<Order, StorageError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::set_delivery_otp(order_id, otp, expiry, &mut conn).await
    }

    async fn complete_delivery(
        &self,
        order_id: &OrderId,
        otp: &str,
        delivered_at: DateTime<Utc>,
    ) -> Result<Order, StorageError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::complete_delivery(order_id, otp, delivered_at, &mut conn).await
    }

    async fn owner_supplies_order(&self, owner: UserId, order_id: &OrderId) -> Result<bool, StorageError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::owner_supplies_order(owner, order_id, &mut conn).await
    }

    async fn has_delivered_order_with_item(
        &self,
        customer: UserId,
        item: MenuItemId,
    ) -> Result<bool, StorageError> {
        let mut conn = self.pool.acquire().await?;
        db::ratings::has_delivered_order_with_item(customer, item, &mut conn).await
    }

    async fn upsert_rating(
        &self,
        item: MenuItemId,
        customer: UserId,
        rating: u8,
    ) -> Result<RatingAggregate, StorageError> {
        let mut tx = self.pool.begin().await?;
        let aggregate = db::ratings::upsert_rating(item, customer, rating, &mut tx).await?;
        tx.commit().await?;
        Ok(aggregate)
    }
}

impl ShopManagement for SqliteDatabase {
    async fn create_shop(&self, owner: UserId, name: &str) -> Result<Shop, StorageError> {
        let mut conn = self.pool.acquire().await?;
        db::shops::create_shop(owner, name, &mut conn).await
    }

    async fn fetch_shop(&self, id: ShopId) -> Result<Option<Shop>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        db::shops::fetch_shop(id, &mut conn).await
    }

    async fn fetch_shop_for_owner(&self, owner: UserId) -> Result<Option<Shop>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        db::shops::fetch_shop_for_owner(owner, &mut conn).await
    }

    async fn add_menu_item(&self, shop: ShopId, name: &str, price: Money) -> Result<MenuItem, StorageError> {
        let mut conn = self.pool.acquire().await?;
        db::shops::add_menu_item(shop, name, price, &mut conn).await
    }

    async fn fetch_menu(&self, shop: ShopId) -> Result<Vec<MenuItem>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        db::shops::fetch_menu(shop, &mut conn).await
    }

    async fn fetch_menu_item(&self, id: MenuItemId) -> Result<Option<MenuItem>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        db::shops::fetch_menu_item(id, &mut conn).await
    }
}
