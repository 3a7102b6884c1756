//! Outgoing mail - routes to the configured delivery backend

use crate::config::MailConfig;
use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Mail service that routes to configured backend
#[derive(Debug, Clone)]
pub struct Mailer {
    config: MailConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl Mailer {
    /// Create a new mailer
    pub fn new(config: &MailConfig) -> Self {
        Self {
            config: config.clone(),
            client: reqwest::Client::new(),
        }
    }

    /// Send a plain-text message
    pub async fn send(&self, to: &str, subject: &str, text: &str) -> Result<()> {
        match self.config.backend.as_str() {
            "http" => self.send_via_relay(to, subject, text).await,
            "log" => self.send_to_log(to, subject, text),
            other => {
                warn!("Unknown mail backend: {}, falling back to log", other);
                self.send_to_log(to, subject, text)
            }
        }
    }

    /// POST the message to an HTTP mail relay
    async fn send_via_relay(&self, to: &str, subject: &str, text: &str) -> Result<()> {
        let url = self
            .config
            .relay_url
            .as_deref()
            .context("mail.relay_url is required for the http mail backend")?;

        let request = RelayRequest {
            from: &self.config.from,
            to,
            subject,
            text,
        };

        debug!("Sending mail via relay to {}", to);

        let mut builder = self.client.post(url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.context("Failed to send mail request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Mail relay rejected message: {} - {}", status, body);
        }

        info!("Mail '{}' sent to {}", subject, to);
        Ok(())
    }

    /// Development backend: write the message to the log
    fn send_to_log(&self, to: &str, subject: &str, text: &str) -> Result<()> {
        info!(from = %self.config.from, to, subject, "Mail (log backend): {}", text);
        Ok(())
    }
}
