//! # Auth Module
//!
//! Federated login and cookie sessions:
//! - OAuth login against Google, GitHub and Discord
//! - Account linking by email
//! - Access/refresh JWTs carried in httpOnly cookies
//! - Double-submit CSRF tokens
//! - AuthedUser extractor for protected routes

pub mod cookies;
pub mod csrf;
pub mod extractors;
pub mod federation;
pub mod handlers;
pub mod linker;
pub mod models;
pub mod routes;
pub mod store;
pub mod tokens;

#[cfg(test)]
mod tests;

pub use routes::auth_routes;
