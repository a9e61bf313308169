pub mod analyze;
pub mod auth;
pub mod health;
pub mod messages;
pub mod sessions;
pub mod stream;
