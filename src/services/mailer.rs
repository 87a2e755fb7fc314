//! Outbound mail. Templates are rendered with handlebars in strict mode and
//! delivered over SMTP; retries wrap any `Mailer` implementation.

use async_trait::async_trait;
use handlebars::Handlebars;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    #[error("template rendering failed: {0}")]
    Template(String),

    #[error("invalid mail configuration: {0}")]
    Config(String),

    #[error("invalid message: {0}")]
    Message(String),

    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub plain_body: String,
    pub html_body: String,
}

pub const USER_WELCOME: &str = "user_welcome";

const USER_WELCOME_SUBJECT: &str = "Welcome to Greenlight!";

const USER_WELCOME_PLAIN: &str = "Hi,

Thanks for signing up for a Greenlight account. We're excited to have you on board!

For future reference, your user ID is {{{id}}}.

Please send a request to the `PUT /v1/users/activated` endpoint with the following JSON
body to activate your account:

{\"token\": \"{{{token}}}\"}

Please note that this is a one-time use token and it will expire in 3 days.

Thanks,

The Greenlight Team";

const USER_WELCOME_HTML: &str = r#"<!doctype html>
<html>
<head>
    <meta name="viewport" content="width=device-width" />
    <meta http-equiv="Content-Type" content="text/html; charset=UTF-8" />
</head>
<body>
    <p>Hi,</p>
    <p>Thanks for signing up for a Greenlight account. We're excited to have you on board!</p>
    <p>For future reference, your user ID is {{id}}.</p>
    <p>Please send a request to the <code>PUT /v1/users/activated</code> endpoint with the
    following JSON body to activate your account:</p>
    <pre><code>{"token": "{{token}}"}</code></pre>
    <p>Please note that this is a one-time use token and it will expire in 3 days.</p>
    <p>Thanks,</p>
    <p>The Greenlight Team</p>
</body>
</html>"#;

/// Registered mail templates. Each template is stored as three parts:
/// `<name>.subject`, `<name>.plain` and `<name>.html`.
#[derive(Clone)]
pub struct Templates {
    handlebars: Handlebars<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, MailerError> {
        let mut handlebars = Handlebars::new();
        // Missing fields are errors, never empty strings.
        handlebars.set_strict_mode(true);

        for (name, subject, plain, html) in [(
            USER_WELCOME,
            USER_WELCOME_SUBJECT,
            USER_WELCOME_PLAIN,
            USER_WELCOME_HTML,
        )] {
            for (part, source) in [("subject", subject), ("plain", plain), ("html", html)] {
                handlebars
                    .register_template_string(&format!("{name}.{part}"), source)
                    .map_err(|e| MailerError::Template(e.to_string()))?;
            }
        }

        Ok(Self { handlebars })
    }

    pub fn render(&self, template: &str, data: &Value) -> Result<RenderedEmail, MailerError> {
        if !self.handlebars.has_template(&format!("{template}.subject")) {
            return Err(MailerError::UnknownTemplate(template.to_string()));
        }

        let part = |part: &str| {
            self.handlebars
                .render(&format!("{template}.{part}"), data)
                .map_err(|e| MailerError::Template(e.to_string()))
        };

        Ok(RenderedEmail {
            subject: part("subject")?,
            plain_body: part("plain")?,
            html_body: part("html")?,
        })
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipient: &str, template: &str, data: &Value)
    -> Result<(), MailerError>;
}

const SMTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Delivers mail through the relay named in `[smtp]`. STARTTLS is used when
/// the relay offers it.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    templates: Templates,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, templates: Templates) -> Result<Self, MailerError> {
        let sender: Mailbox = config
            .sender
            .parse()
            .map_err(|e| MailerError::Config(format!("sender {:?}: {e}", config.sender)))?;

        let tls = TlsParameters::new(config.host.clone())
            .map_err(|e| MailerError::Config(format!("tls for {}: {e}", config.host)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .tls(Tls::Opportunistic(tls))
            .timeout(Some(SMTP_TIMEOUT));
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            sender,
            templates,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        recipient: &str,
        template: &str,
        data: &Value,
    ) -> Result<(), MailerError> {
        let email = self.templates.render(template, data)?;
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| MailerError::Message(format!("recipient: {e}")))?;

        let message = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(email.subject)
            .multipart(MultiPart::alternative_plain_html(
                email.plain_body,
                email.html_body,
            ))
            .map_err(|e| MailerError::Message(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailerError::Delivery(e.to_string()))?;

        info!(to = %recipient, template, "Email sent");
        Ok(())
    }
}

/// Used when no SMTP host is configured. Renders the template so template
/// errors still surface, then records only that a mail would have gone out.
/// Message content is never logged: it carries one-time tokens.
pub struct LogMailer {
    templates: Templates,
}

impl LogMailer {
    #[must_use]
    pub fn new(templates: Templates) -> Self {
        Self { templates }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(
        &self,
        recipient: &str,
        template: &str,
        data: &Value,
    ) -> Result<(), MailerError> {
        self.templates.render(template, data)?;
        warn!(
            to = %recipient,
            template,
            "SMTP host not configured, email not delivered"
        );
        Ok(())
    }
}

/// Picks the SMTP mailer when a relay is configured, the log mailer
/// otherwise.
pub fn from_config(config: &SmtpConfig) -> Result<Arc<dyn Mailer>, MailerError> {
    let templates = Templates::new()?;
    if config.host.is_empty() {
        Ok(Arc::new(LogMailer::new(templates)))
    } else {
        Ok(Arc::new(SmtpMailer::new(config, templates)?))
    }
}

/// Retries delivery failures a bounded number of times with a fixed delay.
/// Render errors are permanent and returned immediately.
pub struct RetryingMailer {
    inner: Arc<dyn Mailer>,
    attempts: u32,
    delay: Duration,
}

impl RetryingMailer {
    #[must_use]
    pub fn new(inner: Arc<dyn Mailer>, attempts: u32, delay: Duration) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            delay,
        }
    }
}

#[async_trait]
impl Mailer for RetryingMailer {
    async fn send(
        &self,
        recipient: &str,
        template: &str,
        data: &Value,
    ) -> Result<(), MailerError> {
        let mut attempt = 1;
        loop {
            match self.inner.send(recipient, template, data).await {
                Err(MailerError::Delivery(reason)) if attempt < self.attempts => {
                    warn!(attempt, %reason, "Email delivery failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.delay).await;
                }
                result => return result,
            }
        }
    }
}
