pub mod templates;

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::json;

use crate::config::{Config, MailjetConfig, SmtpConfig};

pub const SENDER_NAME: &str = "Flapi Support";

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), String>;

    async fn send_activation_code(&self, to: &str, name: &str, code: i32) -> Result<(), String> {
        let html = templates::render_activation_code(name, code);
        self.send(to, "Activate your Flapi account", &html).await
    }

    async fn send_new_code(&self, to: &str, name: &str, code: i32) -> Result<(), String> {
        let html = templates::render_new_code(name, code);
        self.send(to, "Your new Flapi activation code", &html).await
    }

    async fn send_application_ready(
        &self,
        to: &str,
        application_name: &str,
        urls: &[String],
    ) -> Result<(), String> {
        let html = templates::render_application_ready(application_name, urls);
        self.send(
            to,
            &format!("{application_name} is ready - Flapi"),
            &html,
        )
        .await
    }
}

/// SMTP delivery, used for local environments.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, from: &str) -> Result<Self, String> {
        let creds = Credentials::new(config.user.clone(), config.pass.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| format!("SMTP error: {e}"))?
            .port(config.port)
            .credentials(creds)
            .build();

        let from = Mailbox::new(
            Some(SENDER_NAME.to_string()),
            from.parse()
                .map_err(|e| format!("Invalid from address: {e}"))?,
        );

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), String> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse().map_err(|e| format!("Invalid to address: {e}"))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| format!("Failed to build email: {e}"))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| format!("Failed to send email: {e}"))?;

        Ok(())
    }
}

const MAILJET_SEND_URL: &str = "https://api.mailjet.com/v3.1/send";

/// Mailjet Send API v3.1, used for remote environments.
pub struct MailjetMailer {
    client: reqwest::Client,
    api_key: String,
    api_secret: String,
    from: String,
}

impl MailjetMailer {
    pub fn new(config: &MailjetConfig, from: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            from: from.to_string(),
        }
    }

    fn payload(&self, to: &str, subject: &str, html_body: &str) -> serde_json::Value {
        json!({
            "Messages": [{
                "From": { "Email": self.from, "Name": SENDER_NAME },
                "To": [{ "Email": to }],
                "Subject": subject,
                "HTMLPart": html_body,
            }]
        })
    }
}

#[async_trait]
impl Mailer for MailjetMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), String> {
        let resp = self
            .client
            .post(MAILJET_SEND_URL)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&self.payload(to, subject, html_body))
            .send()
            .await
            .map_err(|e| format!("Failed to send email: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("Mailjet returned HTTP {status}: {body}"));
        }

        Ok(())
    }
}

/// SMTP for `development`/`test`, Mailjet everywhere else. Falls back to
/// whichever transport is configured; `None` when neither is.
pub fn mailer_from_config(config: &Config) -> Option<Arc<dyn Mailer>> {
    let smtp = || -> Option<Arc<dyn Mailer>> {
        let smtp = config.smtp.as_ref()?;
        match SmtpMailer::new(smtp, &config.mail_from) {
            Ok(m) => {
                tracing::info!(host = %smtp.host, "SMTP mailer configured");
                Some(Arc::new(m))
            }
            Err(e) => {
                tracing::warn!("SMTP mailer disabled: {e}");
                None
            }
        }
    };
    let mailjet = || -> Option<Arc<dyn Mailer>> {
        let mj = config.mailjet.as_ref()?;
        tracing::info!("Mailjet mailer configured");
        Some(Arc::new(MailjetMailer::new(mj, &config.mail_from)))
    };

    let mailer = if config.environment.is_local() {
        smtp().or_else(mailjet)
    } else {
        mailjet().or_else(smtp)
    };

    if mailer.is_none() {
        tracing::warn!("No mail transport configured; outgoing email is disabled");
    }
    mailer
}
