//! Cross-module test suites.
//!
//! - `integration`: display controllers, preconditions and the client
//!   provider against a wiremock server
//! - `property`: store invariants with proptest

mod integration;
mod property;
