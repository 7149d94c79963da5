//! Outgoing mail transport configuration with a structured, resendable
//! email log.
//!
//! Every email goes through a [`mail::MailPipeline`]. The registered
//! [`mail::LogInterceptor`] applies the SMTP settings resolved by
//! [`options::Options`], writes a [`log::LogRecord`] before sending and
//! attaches the transport's error to it afterwards. Logged emails can be
//! resent once and are pruned by a scheduled [`jobs::PruneJob`].

pub mod config;
pub mod context;
pub mod crypto;
pub mod db;
pub mod error;
pub mod headers;
pub mod jobs;
pub mod log;
pub mod mail;
pub mod options;
pub mod privacy;

pub use crate::config::EnvConfig;
pub use context::Context;
pub use error::{Error, Result};
