//! HTTP service implementations.
//!
//! Each domain keeps its logic on a service struct in `mod.rs` and its thin
//! axum handlers in `handlers.rs`.

pub mod ai;
pub mod auth;
pub mod cats;

pub use ai::AiService;
pub use auth::AuthService;
pub use cats::CatService;
