pub mod log;
pub mod sendgrid;

pub use log::LogMailer;
pub use sendgrid::SendGridMailer;
