//! Free query functions, one module per entity. Each function takes a `SqliteConnection` so it
//! can run standalone or inside a caller-owned transaction (`&mut *tx`).

pub mod orders;
pub mod ratings;
pub mod shops;
pub mod users;
