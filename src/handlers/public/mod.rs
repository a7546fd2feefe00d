// handlers/public/mod.rs - endpoints that do not require a token

pub mod auth;
pub mod health;

pub use auth::login_post;
pub use health::health_get;
