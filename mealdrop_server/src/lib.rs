//! # MealDrop server
//!
//! The HTTP surface over the MealDrop engine. It is responsible for:
//! * authenticating callers and attaching their role claims to each request,
//! * translating HTTP payloads into engine operations and engine errors into status codes,
//! * streaming courier positions to order watchers over SSE.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config] for more information.

pub mod auth;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
