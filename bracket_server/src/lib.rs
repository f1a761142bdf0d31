//! HTTP service exposing the single-elimination bracket engine.
//!
//! - [`api`]: axum router, handlers and error mapping
//! - [`config`]: environment-driven server configuration
//! - [`logging`]: tracing subscriber setup
//! - [`seed`]: tournament fixtures for the in-memory backend

pub mod api;
pub mod config;
pub mod logging;
pub mod seed;
