//! Service layer: outbound email and flash cookies.

pub mod email;
pub mod flash;

pub use email::EmailService;
