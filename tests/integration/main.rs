//! Integration tests for the Airsense core
//! These tests drive the public API end to end against scripted collaborators


pub mod api_pagination_test;
pub mod session_exchange_test;
