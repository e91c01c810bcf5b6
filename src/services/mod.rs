// src/services/mod.rs
//
// Services that talk to systems outside the process: identity providers
// and outbound mail.

pub mod email;
pub mod oauth;

// Re-export commonly used types for convenience
pub use email::{Notifier, SesNotifier};
pub use oauth::OAuthService;
