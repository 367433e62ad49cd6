//! Boundlexx data layer
//!
//! Paginated loading of Boundless game data from the Boundlexx REST API,
//! normalized into keyed caches that persist with per-slice expiry.

pub mod config;
pub mod core;

#[cfg(test)]
mod tests;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
