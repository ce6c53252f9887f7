//! CLI command implementations.

pub mod auth;
pub mod basket;
pub mod item;
pub mod menu;
pub mod session;
pub mod venue;
