// ABOUTME: PostgreSQL source support for the dump engine
// ABOUTME: Exposes connection helpers and the catalog-backed inspector

pub mod connection;
pub mod reader;

pub use connection::{connect, connect_with_retry};
