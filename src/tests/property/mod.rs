//! Property-based tests.

mod store_props;
