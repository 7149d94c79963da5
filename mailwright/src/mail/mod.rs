//! Email sending through a hookable pipeline.
//!
//! This module provides a thin abstraction over [lettre](https://lettre.rs).
//! Every message goes through a [`MailPipeline`], which lets one registered
//! [`MailHooks`] implementation adjust the transport, observe the message
//! before it is sent, and hear about failures afterwards.
//!
//! # Quick Start
//!
//! ```ignore
//! let mailer = Arc::new(SmtpMailer::new("noreply@example.com")?);
//! let hooks = Arc::new(LogInterceptor::new(options, store.clone()));
//! let pipeline = MailPipeline::new(mailer).with_hooks(hooks);
//!
//! let email = Email::builder()
//!     .to("user@example.com")
//!     .subject("Welcome!")
//!     .text("Thanks for signing up.")
//!     .build()?;
//! pipeline.send(&email).await;
//!
//! // Later, send a logged message again.
//! Resender::new(store, pipeline).resend(id).await?;
//! ```
//!
//! # Transport options
//!
//! [`LogInterceptor`] reads these through [`crate::options::Options`]:
//!
//! | Option | Description |
//! |--------|-------------|
//! | `host` | SMTP server hostname; empty means the platform transport |
//! | `port` | Port (default depends on `sec`) |
//! | `user` / `pass` | Credentials |
//! | `auth` | Authenticate with the credentials |
//! | `sec` | `ssl`, `tls` or `off`; anything else upgrades opportunistically |
//! | `noverifyssl` | Accept invalid certificates |
//! | `from` / `fromname` | Sender override |
//! | `disable` | Refuse every send |
//! | `log` | Record every send in the email log |

mod interceptor;
mod mailer;
mod message;
mod pipeline;
mod resend;

pub use interceptor::LogInterceptor;
pub use mailer::{Mailer, Security, SmtpMailer, TransportConfig};
pub use message::{Email, EmailBuilder};
pub use pipeline::{MailHooks, MailPipeline, SendContext};
pub use resend::Resender;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("Email was disabled at this time.")]
    Disabled,

    #[error("could not read attachment: {0}")]
    Io(#[from] std::io::Error),
}
