//! Correlation service: the engine behind an HTTP API

pub mod api;
pub mod config;
