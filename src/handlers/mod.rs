pub mod admin;
pub mod auth;
pub mod frontend;
pub mod health;
pub mod short_link;
