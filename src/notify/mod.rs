//! Outgoing email.
//!
//! The auth flows only need "send this text to that address". Delivery is
//! behind the [`Notifier`] trait so the service can run against a real
//! transactional-email API, a logging stub in development, or an in-memory
//! outbox in tests.

pub mod templates;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("mail transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail provider rejected message: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), DeliveryError>;
}

/// Pick a notifier from config: the HTTP API when one is configured,
/// otherwise log messages instead of sending them.
pub fn from_config(cfg: &MailConfig) -> Arc<dyn Notifier> {
    match &cfg.api_url {
        Some(url) => Arc::new(HttpNotifier::new(
            url.clone(),
            cfg.api_key.clone(),
            cfg.sender.clone(),
        )),
        None => {
            tracing::warn!("MAIL_API_URL not set; outgoing mail will only be logged");
            Arc::new(LogNotifier)
        }
    }
}

/// Development sender that logs instead of delivering.
#[derive(Clone, Debug)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), DeliveryError> {
        // Bodies carry OTPs; keep them out of the logs.
        info!(to = %to, subject = %subject, "mail send stub");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Keeps every message in memory. Clones share the same outbox.
#[derive(Clone, Default)]
pub struct MemoryOutbox {
    messages: Arc<Mutex<Vec<SentMessage>>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self) -> Vec<SentMessage> {
        self.messages.lock().await.clone()
    }

    pub async fn last_to(&self, to: &str) -> Option<SentMessage> {
        self.messages
            .lock()
            .await
            .iter()
            .rev()
            .find(|m| m.to == to)
            .cloned()
    }
}

#[async_trait]
impl Notifier for MemoryOutbox {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), DeliveryError> {
        self.messages.lock().await.push(SentMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiMessage<'a> {
    sender: Address<'a>,
    to: [Address<'a>; 1],
    subject: &'a str,
    text_content: &'a str,
}

/// Sends through a JSON transactional-email API (`POST` with an `api-key`
/// header, Brevo-style payload).
#[derive(Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    sender: String,
}

impl HttpNotifier {
    pub fn new(url: String, api_key: Option<String>, sender: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            api_key,
            sender,
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), DeliveryError> {
        let message = ApiMessage {
            sender: Address {
                email: &self.sender,
            },
            to: [Address { email: to }],
            subject,
            text_content: body,
        };
        let mut req = self.client.post(&self.url).json(&message);
        if let Some(key) = &self.api_key {
            req = req.header("api-key", key);
        }
        let res = req.send().await?;
        let status = res.status();
        if !status.is_success() {
            let detail = res.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected(format!("{status}: {detail}")));
        }
        debug!(to = %to, subject = %subject, "mail delivered to provider");
        Ok(())
    }
}
