//! Transports behind the core notification ports

pub mod email;
pub mod webhook;

pub use email::LogEmailSender;
pub use webhook::HttpWebhookSender;
