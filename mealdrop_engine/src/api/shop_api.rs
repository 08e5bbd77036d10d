use log::*;
use md_common::Money;

use crate::{
    api::errors::OrderFlowError,
    db_types::{Identity, MenuItem, MenuItemId, Role, Shop, ShopId},
    traits::ShopManagement,
};

/// Shop and menu management for owners, plus the public menu lookups.
#[derive(Debug, Clone)]
pub struct ShopApi<B> {
    db: B,
}

impl<B> ShopApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> ShopApi<B>
where B: ShopManagement
{
    /// Creates the acting owner's shop. One shop per owner; a second create is rejected.
    pub async fn create_shop(&self, actor: Identity, name: &str) -> Result<Shop, OrderFlowError> {
        if actor.role != Role::Owner {
            return Err(OrderFlowError::Forbidden("only owners can create shops".into()));
        }
        if name.trim().is_empty() {
            return Err(OrderFlowError::Validation("a shop needs a name".into()));
        }
        if self.db.fetch_shop_for_owner(actor.id).await?.is_some() {
            return Err(OrderFlowError::Conflict(format!("{} already owns a shop", actor.id)));
        }
        let shop = self.db.create_shop(actor.id, name.trim()).await?;
        info!("🏪️ Shop {} ({name}) created for {}", shop.id, actor.id);
        Ok(shop)
    }

    pub async fn my_shop(&self, actor: Identity) -> Result<Option<Shop>, OrderFlowError> {
        if actor.role != Role::Owner {
            return Err(OrderFlowError::Forbidden("only owners have shops".into()));
        }
        Ok(self.db.fetch_shop_for_owner(actor.id).await?)
    }

    /// Adds a menu item to the acting owner's shop.
    pub async fn add_menu_item(&self, actor: Identity, name: &str, price: Money) -> Result<MenuItem, OrderFlowError> {
        if actor.role != Role::Owner {
            return Err(OrderFlowError::Forbidden("only owners can edit menus".into()));
        }
        if name.trim().is_empty() {
            return Err(OrderFlowError::Validation("a menu item needs a name".into()));
        }
        if price.is_negative() {
            return Err(OrderFlowError::Validation(format!("price {price} is negative")));
        }
        let shop = self
            .db
            .fetch_shop_for_owner(actor.id)
            .await?
            .ok_or_else(|| OrderFlowError::NotFound(format!("shop for {}", actor.id)))?;
        let item = self.db.add_menu_item(shop.id, name.trim(), price).await?;
        debug!("🏪️ Menu item {} ({name}, {price}) added to shop {}", item.id, shop.id);
        Ok(item)
    }

    pub async fn menu(&self, shop: ShopId) -> Result<Vec<MenuItem>, OrderFlowError> {
        if self.db.fetch_shop(shop).await?.is_none() {
            return Err(OrderFlowError::NotFound(format!("{shop}")));
        }
        Ok(self.db.fetch_menu(shop).await?)
    }

    pub async fn menu_item(&self, id: MenuItemId) -> Result<MenuItem, OrderFlowError> {
        self.db.fetch_menu_item(id).await?.ok_or_else(|| OrderFlowError::NotFound(format!("menu item {id}")))
    }
}
