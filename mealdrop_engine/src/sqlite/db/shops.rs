use log::*;
use md_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db_types::{MenuItem, MenuItemId, Shop, ShopId, UserId},
    traits::StorageError,
};

pub(crate) async fn create_shop(owner: UserId, name: &str, conn: &mut SqliteConnection) -> Result<Shop, StorageError> {
    let shop: Shop = sqlx::query_as("INSERT INTO shops (owner_id, name) VALUES ($1, $2) RETURNING *")
        .bind(owner)
        .bind(name)
        .fetch_one(conn)
        .await?;
    info!("🏪️ Shop '{}' registered for {}", shop.name, shop.owner_id);
    Ok(shop)
}

pub(crate) async fn fetch_shop(id: ShopId, conn: &mut SqliteConnection) -> Result<Option<Shop>, StorageError> {
    let shop = sqlx::query_as("SELECT * FROM shops WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(shop)
}

pub(crate) async fn fetch_shop_for_owner(
    owner: UserId,
    conn: &mut SqliteConnection,
) -> Result<Option<Shop>, StorageError> {
    let shop = sqlx::query_as("SELECT * FROM shops WHERE owner_id = $1").bind(owner).fetch_optional(conn).await?;
    Ok(shop)
}

pub(crate) async fn add_menu_item(
    shop: ShopId,
    name: &str,
    price: Money,
    conn: &mut SqliteConnection,
) -> Result<MenuItem, StorageError> {
    let item: MenuItem = sqlx::query_as("INSERT INTO menu_items (shop_id, name, price) VALUES ($1, $2, $3) RETURNING *")
        .bind(shop)
        .bind(name)
        .bind(price)
        .fetch_one(conn)
        .await?;
    debug!("🏪️ Menu item '{}' added to {} at {}", item.name, shop, item.price);
    Ok(item)
}

pub(crate) async fn fetch_menu(shop: ShopId, conn: &mut SqliteConnection) -> Result<Vec<MenuItem>, StorageError> {
    let items = sqlx::query_as("SELECT * FROM menu_items WHERE shop_id = $1 ORDER BY id ASC")
        .bind(shop)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

pub(crate) async fn fetch_menu_item(
    id: MenuItemId,
    conn: &mut SqliteConnection,
) -> Result<Option<MenuItem>, StorageError> {
    let item = sqlx::query_as("SELECT * FROM menu_items WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(item)
}
