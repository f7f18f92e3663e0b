//! leadsync library
//!
//! The cache, refresh and query core of a CRM lead dashboard, plus the
//! clients and CLI plumbing used by the `leadsync` binary and its
//! integration tests.

pub mod api;
pub mod app;
pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod data;
pub mod feed;
pub mod query;
pub mod refresh;
pub mod session;
pub mod ui;
