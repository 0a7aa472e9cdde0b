pub mod account_service;
pub mod credential_store;
pub mod health_service;
pub mod mailer;
pub mod ports;
pub mod reset_service;
