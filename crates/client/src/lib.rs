//! Bramble Market storefront client library.
//!
//! This crate owns the client side of the storefront: the canonical
//! in-session shopping cart, its persistence (device-local for anonymous
//! shoppers, server-side for authenticated ones), the merge-on-login
//! synchronization routine, and the observable state consumed by
//! presentation layers (nav badge, cart view, checkout summary).
//!
//! # Architecture
//!
//! - [`auth::AuthSession`] - bearer-token session against the REST API
//! - [`store::LocalStore`] - device-scoped key/value storage
//! - [`gateway::CartGateway`] - REST client for the server-side cart
//! - [`cart::CartService`] - the synchronization engine and single writer
//!   of cart state
//! - [`session::StorefrontSession`] - wires the above together from config

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod cart;
pub mod config;
pub mod error;
pub mod gateway;
pub mod session;
pub mod store;

pub use cart::CartService;
pub use error::{ClientError, Result};
pub use session::StorefrontSession;
