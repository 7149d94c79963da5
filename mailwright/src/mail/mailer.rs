//! Mailer trait, transport settings and the lettre implementation.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MessageBuilder, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{
    Address, AsyncSendmailTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::{Email, MailError};
use crate::headers;

/// Async email sending trait.
///
/// Implement this trait to provide alternative email backends or test doubles.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    /// Send `email` using the transport settings resolved for this send.
    async fn send(&self, email: &Email, transport: &TransportConfig) -> Result<(), MailError>;
}

/// Connection security.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Security {
    /// Upgrade with STARTTLS when the server offers it.
    #[default]
    Default,
    /// Implicit TLS from the first byte.
    Ssl,
    /// Mandatory STARTTLS.
    StartTls,
    /// Plaintext only.
    Off,
}

impl Security {
    /// Parses the stored `sec` option: `ssl`, `tls` or `off`.
    pub fn from_option(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "ssl" => Security::Ssl,
            "tls" => Security::StartTls,
            "off" => Security::Off,
            _ => Security::Default,
        }
    }

    fn default_port(self) -> u16 {
        match self {
            Security::Ssl => 465,
            Security::StartTls => 587,
            Security::Default | Security::Off => 25,
        }
    }
}

/// Per-send transport settings.
///
/// The default value is the platform transport: no host, so the mailer hands
/// the message to the local sendmail binary.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TransportConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
    /// Authenticate with `username`/`password`.
    pub auth: bool,
    pub security: Security,
    /// When false, invalid certificates and host names are accepted.
    pub verify_peer: bool,
    pub from_address: Option<String>,
    pub from_name: Option<String>,
    /// Refuse every send.
    pub disabled: bool,
}

impl TransportConfig {
    pub fn is_smtp(&self) -> bool {
        !self.host.is_empty()
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("auth", &self.auth)
            .field("security", &self.security)
            .field("verify_peer", &self.verify_peer)
            .field("from_address", &self.from_address)
            .field("from_name", &self.from_name)
            .field("disabled", &self.disabled)
            .finish()
    }
}

/// lettre-based mailer. Speaks SMTP when a host is configured and falls back
/// to sendmail otherwise.
#[derive(Clone)]
pub struct SmtpMailer {
    from: Mailbox,
    timeout: Duration,
}

impl SmtpMailer {
    /// `from` is used when neither the transport settings nor the message
    /// name a sender.
    pub fn new(from: &str) -> Result<Self, MailError> {
        let from: Mailbox = from
            .parse()
            .map_err(|_| MailError::InvalidAddress(from.to_string()))?;

        Ok(Self {
            from,
            timeout: Duration::from_secs(10),
        })
    }

    /// Connection timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn smtp_transport(
        &self,
        config: &TransportConfig,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
        let tls = match config.security {
            Security::Off => Tls::None,
            security => {
                let parameters = TlsParameters::builder(config.host.clone())
                    .dangerous_accept_invalid_certs(!config.verify_peer)
                    .dangerous_accept_invalid_hostnames(!config.verify_peer)
                    .build_rustls()
                    .map_err(|e| MailError::Smtp(e.to_string()))?;

                match security {
                    Security::Ssl => Tls::Wrapper(parameters),
                    Security::StartTls => Tls::Required(parameters),
                    _ => Tls::Opportunistic(parameters),
                }
            }
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port.unwrap_or_else(|| config.security.default_port()))
            .tls(tls)
            .timeout(Some(self.timeout));

        if config.auth {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(builder.build())
    }

    fn sender(&self, email: &Email, config: &TransportConfig) -> Result<Mailbox, MailError> {
        if let Some(address) = config.from_address.as_deref().filter(|a| !a.is_empty()) {
            let address: Address = address
                .parse()
                .map_err(|_| MailError::InvalidAddress(address.to_string()))?;
            return Ok(Mailbox::new(config.from_name.clone(), address));
        }

        let mut from = match headers::values(&email.headers, "From").first() {
            Some(value) => parse_mailbox(value)?,
            None => self.from.clone(),
        };
        if let Some(name) = config.from_name.as_deref().filter(|n| !n.is_empty()) {
            from.name = Some(name.to_string());
        }
        Ok(from)
    }

    /// Build a lettre Message from our Email type.
    pub(crate) async fn build_message(
        &self,
        email: &Email,
        config: &TransportConfig,
    ) -> Result<Message, MailError> {
        let mut builder = Message::builder()
            .from(self.sender(email, config)?)
            .subject(email.subject.clone());

        for to in &email.to {
            builder = builder.to(parse_mailbox(to)?);
        }

        builder = apply_headers(builder, &email.headers)?;

        let body = if email.is_html() {
            SinglePart::html(email.body.clone())
        } else {
            SinglePart::plain(email.body.clone())
        };

        if email.attachments.is_empty() {
            return builder
                .singlepart(body)
                .map_err(|e| MailError::Build(e.to_string()));
        }

        let mut parts = MultiPart::mixed().singlepart(body);
        for path in &email.attachments {
            let content = tokio::fs::read(path).await?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            let content_type = ContentType::parse(mime.as_ref())
                .map_err(|e| MailError::Build(e.to_string()))?;

            parts = parts.singlepart(Attachment::new(name).body(content, content_type));
        }

        builder
            .multipart(parts)
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

fn parse_mailbox(value: &str) -> Result<Mailbox, MailError> {
    value
        .trim()
        .parse()
        .map_err(|_| MailError::InvalidAddress(value.to_string()))
}

fn apply_headers(mut builder: MessageBuilder, lines: &[String]) -> Result<MessageBuilder, MailError> {
    for line in lines {
        let (name, value) = headers::split(line);
        let Some(value) = value else { continue };

        match name.to_ascii_lowercase().as_str() {
            "cc" => {
                for address in value.split(',').filter(|a| !a.trim().is_empty()) {
                    builder = builder.cc(parse_mailbox(address)?);
                }
            }
            "bcc" => {
                for address in value.split(',').filter(|a| !a.trim().is_empty()) {
                    builder = builder.bcc(parse_mailbox(address)?);
                }
            }
            "reply-to" => builder = builder.reply_to(parse_mailbox(value)?),
            // Sender and body type are handled separately.
            "from" | "content-type" => {}
            other => tracing::debug!(header = other, "Header not forwarded to transport"),
        }
    }
    Ok(builder)
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email, transport: &TransportConfig) -> Result<(), MailError> {
        if transport.disabled {
            return Err(MailError::Disabled);
        }

        let message = self.build_message(email, transport).await?;

        if transport.is_smtp() {
            self.smtp_transport(transport)?
                .send(message)
                .await
                .map_err(|e| MailError::Smtp(e.to_string()))?;
        } else {
            AsyncSendmailTransport::<Tokio1Executor>::new()
                .send(message)
                .await
                .map_err(|e| MailError::Smtp(e.to_string()))?;
        }

        tracing::debug!(host = %transport.host, recipients = email.to.len(), "Email sent");
        Ok(())
    }
}
