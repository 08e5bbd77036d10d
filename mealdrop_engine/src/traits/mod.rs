//! Behaviour contracts for backends and collaborators of the order lifecycle engine.

mod marketplace_database;
mod notification_dispatcher;

pub use marketplace_database::{MarketplaceDatabase, ShopManagement, StorageError};
pub use notification_dispatcher::{DispatchError, LogDispatcher, NotificationDispatcher};
