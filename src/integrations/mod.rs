// src/integrations/mod.rs — Mail and practice-management adapters

pub mod clio;
pub mod gmail;
pub mod types;

use std::sync::Arc;

use crate::infra::config::Config;
pub use types::{MailSender, OutgoingMail, TimeEntry, TimeLogger};

/// Build the mail sender from config, or a stand-in that reports why
/// sending is unavailable.
pub fn resolve_mail_sender(config: &Config) -> Arc<dyn MailSender> {
    match gmail::GmailSender::from_config(&config.mail) {
        Ok(sender) => Arc::new(sender),
        Err(e) => {
            tracing::warn!("Mail sending disabled: {}", e);
            Arc::new(types::Unconfigured {
                what: "mail sender",
                hint: e.to_string(),
            })
        }
    }
}

pub fn resolve_time_logger(config: &Config) -> Arc<dyn TimeLogger> {
    match clio::ClioLogger::from_config(&config.practice) {
        Ok(logger) => Arc::new(logger),
        Err(e) => {
            tracing::warn!("Time logging disabled: {}", e);
            Arc::new(types::Unconfigured {
                what: "time logger",
                hint: e.to_string(),
            })
        }
    }
}
