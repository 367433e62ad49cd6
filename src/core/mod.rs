pub mod api;
pub mod context;
pub mod display;
pub mod logging;
pub mod require;
pub mod store;
