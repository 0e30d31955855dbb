mod handler;
pub mod model;
pub mod notifier;

pub use handler::submit;
pub use notifier::{ContactNotifier, LogNotifier, SmtpNotifier, notifier_from_config};
