use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Address,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{SmtpConfig, SmtpTls};

#[derive(Debug, Clone, Serialize)]
pub struct Mail {
    pub channel: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub content_type: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid content type: {0}")]
    InvalidContentType(String),
    #[error("build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_mail(&self, mail: Mail) -> Result<(), MailError>;
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> Result<Self, MailError> {
        let builder = match cfg.tls {
            SmtpTls::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)?,
            SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)?,
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.host),
        };
        let mut builder = builder
            .port(cfg.port)
            .timeout(Some(Duration::from_secs(5)));
        if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(Self {
            transport: builder.build(),
        })
    }
}

fn parse_address(raw: &str) -> Result<Address, MailError> {
    raw.parse::<Address>()
        .map_err(|_| MailError::InvalidAddress(raw.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_mail(&self, mail: Mail) -> Result<(), MailError> {
        let to = parse_address(&mail.to)?;
        let from = parse_address(&mail.from)?;
        let content_type = ContentType::parse(&mail.content_type)
            .map_err(|_| MailError::InvalidContentType(mail.content_type.clone()))?;
        let message = Message::builder()
            .from(from.into())
            .to(to.into())
            .subject(mail.subject)
            .header(content_type)
            .body(mail.body)?;

        debug!(to = %mail.to, "sending email");
        self.transport.send(message).await?;
        info!(to = %mail.to, "email sent");
        Ok(())
    }
}

pub const DEFAULT_RESET_TEMPLATE: &str = "<p>Hello $$USERNAME$$,</p>\
<p>Use the following reset token to choose a new password. It expires in 24 hours.</p>\
<p>ID: <code>$$RESET_TOKEN_ID$$</code></p>\
<p>Token: <code>$$TOKEN$$</code></p>";

/// Replaces every `$$KEY$$` placeholder with its value.
pub fn render_template(template: &str, vars: &BTreeMap<&str, String>) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("$${key}$$"), value)
    })
}
