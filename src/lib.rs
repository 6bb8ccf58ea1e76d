//! # Merchsync Library
//!
//! Core functionality for the merchsync service: the upstream API client,
//! the sync engine (incremental reconciliation and historical backfill),
//! and the HTTP trigger surface.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod notify;
pub mod server;
pub mod sync;
pub use migration;
