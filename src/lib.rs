//! cats-service library: configuration, middleware pipeline, routes and
//! domain services. The binary in `main.rs` only wires telemetry and serves.

pub mod config;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod startup;
pub mod validation;
