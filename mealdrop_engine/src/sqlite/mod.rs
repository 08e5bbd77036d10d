//! SQLite backend for the marketplace storage traits.

pub(crate) mod db;
mod sqlite_impl;

pub use sqlite_impl::SqliteDatabase;
