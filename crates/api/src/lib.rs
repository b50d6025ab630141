//! HTTP API: credential resolution, authorization endpoints and wiring.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod identity_service;
pub mod middleware;
pub mod refresh_worker;
pub mod resolver;
