//! Shared scaffolding for the SQLite integration tests: an in-memory database, a seeded
//! marketplace and an OTP dispatcher that captures what would have been sent.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use md_common::Money;
use mealdrop_engine::{
    db_types::{DeliveryAddress, Identity, LineItem, MenuItem, OrderId, PaymentMethod, Role, Shop, User},
    gateway::PaymentGateway,
    traits::{DispatchError, MarketplaceDatabase, NotificationDispatcher, ShopManagement},
    OrderFlowApi,
    OrderRequest,
    ShopApi,
    SqliteDatabase,
};

pub const GATEWAY_SECRET: &str = "test_gateway_secret";

/// Records every OTP dispatch instead of sending it, so tests can read the code back the way the
/// customer would.
#[derive(Default)]
pub struct CapturingDispatcher {
    sent: Mutex<Vec<(String, String)>>,
}

impl CapturingDispatcher {
    pub fn last_otp(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, otp)| otp.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl NotificationDispatcher for CapturingDispatcher {
    fn send_delivery_otp<'a>(
        &'a self,
        recipient: &'a str,
        _order_id: &'a OrderId,
        otp: &'a str,
        _expiry: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async move {
            self.sent.lock().unwrap().push((recipient.to_string(), otp.to_string()));
            Ok(())
        })
    }
}

pub struct Marketplace {
    pub db: SqliteDatabase,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub shops: ShopApi<SqliteDatabase>,
    pub dispatcher: Arc<CapturingDispatcher>,
    pub customer: User,
    pub owner: User,
    pub courier: User,
    pub shop: Shop,
    pub thali: MenuItem,
    pub lassi: MenuItem,
}

impl Marketplace {
    pub fn customer_id(&self) -> Identity {
        Identity::new(self.customer.id, Role::Customer)
    }

    pub fn owner_id(&self) -> Identity {
        Identity::new(self.owner.id, Role::Owner)
    }

    pub fn courier_id(&self) -> Identity {
        Identity::new(self.courier.id, Role::Courier)
    }
}

/// An in-memory marketplace with one of each role, a shop and a two-item menu. Pool size is 1
/// because each sqlite memory connection is its own database.
pub async fn seeded_marketplace() -> Marketplace {
    let _ = env_logger::try_init();
    let db = SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("in-memory db");
    let customer = db.create_user("Asha", "asha@example.com", Role::Customer).await.unwrap();
    let owner = db.create_user("Meera", "meera@example.com", Role::Owner).await.unwrap();
    let courier = db.create_user("Ravi", "ravi@example.com", Role::Courier).await.unwrap();
    let shop = db.create_shop(owner.id, "Meera's Kitchen").await.unwrap();
    let thali = db.add_menu_item(shop.id, "Thali", Money::from_minor(15_000)).await.unwrap();
    let lassi = db.add_menu_item(shop.id, "Lassi", Money::from_minor(6_000)).await.unwrap();
    let gateway = PaymentGateway::from_credentials(Some("key_test".into()), Some(GATEWAY_SECRET.into()));
    let dispatcher = Arc::new(CapturingDispatcher::default());
    let orders = OrderFlowApi::new(db.clone(), gateway, dispatcher.clone());
    let shops = ShopApi::new(db.clone());
    Marketplace { db, orders, shops, dispatcher, customer, owner, courier, shop, thali, lassi }
}

pub fn delivery_address() -> DeliveryAddress {
    DeliveryAddress {
        line1: "14 MG Road".into(),
        line2: Some("3rd floor".into()),
        city: "Bengaluru".into(),
        postcode: "560001".into(),
        latitude: Some(12.9716),
        longitude: Some(77.5946),
    }
}

/// Two thalis and a lassi: ₹360.00, 36,000 minor units.
pub fn standard_request(market: &Marketplace, method: PaymentMethod) -> OrderRequest {
    OrderRequest {
        line_items: vec![
            LineItem { menu_item_id: market.thali.id, quantity: 2, unit_price: market.thali.price },
            LineItem { menu_item_id: market.lassi.id, quantity: 1, unit_price: market.lassi.price },
        ],
        total: Money::from_minor(36_000),
        payment_method: method,
        delivery_address: delivery_address(),
    }
}
