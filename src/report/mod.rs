pub mod email;
pub mod json;
pub mod smtp;
pub mod types;

pub use email::{build_report_message, EmailSection};
pub use smtp::{Mailer, SmtpMailer};
pub use types::{FlowResult, FlowStatus};
