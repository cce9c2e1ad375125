//! Outbound email.
//!
//! `HttpMailer` hands messages to an HTTP mail relay; `LogMailer` only logs
//! them and keeps a copy, for development and tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use counsel_core::{Error, Result};

use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Build the configured mailer.
pub fn from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>> {
    match &config.relay_url {
        Some(url) => Ok(Arc::new(HttpMailer::new(
            url.clone(),
            config.relay_key.clone(),
            config.from.clone(),
        )?)),
        None => {
            info!("MAIL_RELAY_URL not set, outgoing mail will be logged only");
            Ok(Arc::new(LogMailer::new()))
        }
    }
}

/// Posts `{from, to, subject, text}` to a relay endpoint with a bearer key.
pub struct HttpMailer {
    client: reqwest::Client,
    url: String,
    key: Option<String>,
    from: String,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(url: String, key: Option<String>, from: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build mail client: {e}")))?;
        Ok(Self {
            client,
            url,
            key,
            from,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        let mut request = self.client.post(&self.url).json(&RelayMessage {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            text: &email.text,
        });
        if let Some(key) = &self.key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Request(format!("failed to send email: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!(
                "failed to send email: relay returned {status}: {body}"
            )));
        }
        debug!(to = %email.to, subject = %email.subject, "Email relayed");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Logs messages instead of sending them.
#[derive(Default)]
pub struct LogMailer {
    sent: Mutex<Vec<Email>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages "sent" so far, oldest first.
    pub fn sent(&self) -> Vec<Email> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        info!(to = %email.to, subject = %email.subject, body = %email.text, "Email (not sent)");
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(email.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn email() -> Email {
        Email {
            to: "user@example.com".to_string(),
            subject: "이메일 인증 코드".to_string(),
            text: "인증 코드: 123456".to_string(),
        }
    }

    #[tokio::test]
    async fn test_http_mailer_posts_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("authorization", "Bearer relay-key"))
            .and(body_json(serde_json::json!({
                "from": "no-reply@counsel.local",
                "to": "user@example.com",
                "subject": "이메일 인증 코드",
                "text": "인증 코드: 123456",
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = HttpMailer::new(
            format!("{}/send", server.uri()),
            Some("relay-key".to_string()),
            "no-reply@counsel.local".to_string(),
        )
        .unwrap();
        mailer.send(&email()).await.unwrap();
    }

    #[tokio::test]
    async fn test_http_mailer_relay_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("relay down"))
            .mount(&server)
            .await;

        let mailer = HttpMailer::new(server.uri(), None, "a@b.co".to_string()).unwrap();
        let err = mailer.send(&email()).await.unwrap_err();
        match err {
            Error::Request(msg) => {
                assert!(msg.starts_with("failed to send email"));
                assert!(msg.contains("relay down"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_log_mailer_keeps_copies() {
        let mailer = LogMailer::new();
        mailer.send(&email()).await.unwrap();
        assert_eq!(mailer.sent(), vec![email()]);
    }

    #[test]
    fn test_from_config_without_relay_logs() {
        let mailer = from_config(&MailConfig::default()).unwrap();
        assert_eq!(mailer.name(), "log");
    }
}
