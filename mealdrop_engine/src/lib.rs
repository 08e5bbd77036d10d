//! MealDrop Engine
//!
//! The core of the MealDrop food-delivery marketplace: the order lifecycle state machine, the
//! payment-gateway adapter, OTP-gated proof of delivery, and the real-time location relay. The
//! engine is HTTP-agnostic; `mealdrop_server` puts an actix-web surface over it.
//!
//! The library is split along the same lines as the behaviour:
//! 1. Storage ([`traits`], with the SQLite backend in [`mod@sqlite`]). Backends implement
//!    [`MarketplaceDatabase`] and [`ShopManagement`]; all order mutations are conditional
//!    read-modify-writes so racing transitions cannot both land.
//! 2. The public API ([`OrderFlowApi`] and [`ShopApi`]), which owns role checks, the legal state
//!    transitions and their side effects.
//! 3. Collaborator boundaries: the [`gateway`] adapter (HMAC-verified payments, with a disabled
//!    COD-only mode) and the [`traits::NotificationDispatcher`] for out-of-band OTP delivery.
//! 4. The [`relay`], a best-effort broadcast of courier positions keyed by order.

mod api;

pub mod db_types;
pub mod gateway;
pub mod helpers;
pub mod relay;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use api::{CourierRef, OrderFlowApi, OrderFlowError, OrderRequest, PlacedOrder, ShopApi};
pub use traits::{MarketplaceDatabase, NotificationDispatcher, ShopManagement};
