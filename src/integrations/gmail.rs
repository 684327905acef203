// src/integrations/gmail.rs — Gmail send adapter (REST API, bearer token)
//
// Uses users.messages.send with an RFC 5322 message in the `raw` field.
// The access token is read from the environment; the OAuth flow that
// produces it lives outside this crate.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use std::time::Duration;

use lettre::Message;
use reqwest::Client;
use serde::Deserialize;

use crate::infra::config::MailConfig;
use crate::integrations::types::{MailSender, OutgoingMail};
use crate::util::{base64url_encode, http_client, truncate_str};

pub struct GmailSender {
    client: Client,
    api_base: String,
    access_token: String,
    from: Mailbox,
}

impl GmailSender {
    pub fn new(
        api_base: impl Into<String>,
        access_token: String,
        from: Mailbox,
        timeout: Duration,
    ) -> Self {
        Self {
            client: http_client(timeout),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token,
            from,
        }
    }

    /// Build from config and the environment. Fails when the token or the
    /// sender address is missing.
    pub fn from_config(config: &MailConfig) -> anyhow::Result<Self> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("no access token in ${}", config.token_env))?;
        let from = config
            .from
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("mail.from is not set"))?
            .parse::<Mailbox>()
            .map_err(|e| anyhow::anyhow!("invalid mail.from: {e}"))?;
        Ok(Self::new(config.api_base.clone(), token, from, config.timeout()))
    }

    /// RFC 5322 bytes for a draft.
    pub fn build_message(&self, mail: &OutgoingMail) -> anyhow::Result<Vec<u8>> {
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid recipient '{}': {e}", mail.to))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())?;
        Ok(message.formatted())
    }
}

#[derive(Deserialize)]
struct SendResp {
    id: String,
}

#[async_trait]
impl MailSender for GmailSender {
    async fn send(&self, mail: &OutgoingMail) -> anyhow::Result<String> {
        let raw = base64url_encode(&self.build_message(mail)?);

        let resp = self
            .client
            .post(format!("{}/users/me/messages/send", self.api_base))
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Gmail send failed (HTTP {}): {}", status, truncate_str(&body, 300));
        }

        let sent: SendResp = resp.json().await?;
        tracing::debug!(message_id = %sent.id, "Gmail message sent");
        Ok(sent.id)
    }
}
