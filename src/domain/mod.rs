pub mod auth;
pub mod clock;
pub mod password_reset;
pub mod session;
pub mod user;
