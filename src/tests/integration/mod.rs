//! Integration tests against a wiremock Boundlexx server.

mod api_tests;
mod precondition_tests;
