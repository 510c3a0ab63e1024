//! # Storefront Shared Library
//!
//! Shared types, database models and business rules used by the Storefront
//! API server.
//!
//! ## Module Organization
//!
//! - `db`: connection pool, migrations and constraint helpers
//! - `models`: database models and their queries
//! - `auth`: passwords, JWTs, single-use tokens and request auth context
//! - `catalog`: slugs, pricing, inventory, category tree and list queries

pub mod auth;
pub mod catalog;
pub mod db;
pub mod models;

/// Current version of the Storefront shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
