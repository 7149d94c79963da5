//! Crate-level error type.
//!
//! Each module has its own error enum; [`Error`] wraps them so `?` works
//! across module boundaries, e.g. while wiring up a [`crate::Context`].

use thiserror::Error;

use crate::config::ConfigError;
use crate::crypto::CryptoError;
use crate::jobs::JobError;
use crate::log::LogError;
use crate::mail::MailError;
use crate::options::OptionsError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Jobs(#[from] JobError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error(transparent)]
    Options(#[from] OptionsError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
