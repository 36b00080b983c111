//! Integration tests for TPB-Poller
//!
//! These use wiremock servers in place of the catalog and the fetch
//! services, and temporary SQLite files in place of the store.

mod fetch_tests;
mod poll_tests;
