//! SMTP delivery.

use std::time::Duration;

use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::EmailConfig;
use crate::error::FlowError;

/// Delivery seam so the runner can be tested without a live relay.
pub trait Mailer: Send + Sync {
    fn send(&self, message: &Message) -> Result<(), FlowError>;
}

/// Relay-backed mailer. The transport is built per send so that missing
/// credentials only surface when a message is actually due.
pub struct SmtpMailer {
    cfg: EmailConfig,
}

impl SmtpMailer {
    pub fn new(cfg: EmailConfig) -> Self {
        Self { cfg }
    }

    fn transport(&self) -> Result<SmtpTransport, FlowError> {
        let sender = self.cfg.sender()?;
        let builder = if self.cfg.use_implicit_tls {
            // Implicit TLS on 465
            SmtpTransport::relay(&self.cfg.relay_host)
        } else {
            // STARTTLS on 587
            SmtpTransport::starttls_relay(&self.cfg.relay_host)
        }
        .map_err(|e| FlowError::Mail(e.to_string()))?;

        Ok(builder
            .credentials(Credentials::new(sender.username, sender.password))
            .timeout(Some(Duration::from_secs(60)))
            .build())
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, message: &Message) -> Result<(), FlowError> {
        let transport = self.transport()?;
        transport
            .send(message)
            .map(|_| ())
            .map_err(|e| FlowError::Mail(e.to_string()))
    }
}
