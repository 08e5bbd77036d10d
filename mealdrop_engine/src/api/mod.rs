//! The public API of the MealDrop engine.
//!
//! [`OrderFlowApi`] carries the order lifecycle state machine; [`ShopApi`] covers shop and menu
//! management. Both are generic over the storage backend so the server can run them against
//! SQLite and the tests against mocks.

pub mod errors;
pub mod order_flow_api;
pub mod order_objects;
pub mod shop_api;


pub use errors::OrderFlowError;
pub use order_flow_api::OrderFlowApi;
pub use order_objects::{CourierRef, OrderRequest, PlacedOrder};
pub use shop_api::ShopApi;
