//! The send pipeline and its hook points.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Email, MailError, Mailer, TransportConfig};
use crate::log::LogId;

/// Correlates one send with the log record created for it.
///
/// Returned by [`MailHooks::before_send`] and handed back to
/// [`MailHooks::send_failed`] for the same message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendContext {
    pub log_id: Option<LogId>,
}

impl SendContext {
    pub fn logged(id: LogId) -> Self {
        SendContext { log_id: Some(id) }
    }
}

/// Observers of the send pipeline. Every method has a no-op default.
///
/// Hooks never fail the send; implementations log their own errors.
#[async_trait]
pub trait MailHooks: Send + Sync + 'static {
    /// Adjusts the transport settings before each send.
    async fn configure_transport(&self, transport: TransportConfig) -> TransportConfig {
        transport
    }

    /// Called once per message before it is handed to the mailer.
    async fn before_send(&self, _email: &Email) -> SendContext {
        SendContext::default()
    }

    /// Called when the mailer reports failure for a message.
    async fn send_failed(&self, _context: &SendContext, _error: &MailError) {}
}

/// Runs a message through the registered hooks and the mailer.
#[derive(Clone)]
pub struct MailPipeline {
    mailer: Arc<dyn Mailer>,
    hooks: Option<Arc<dyn MailHooks>>,
    transport: TransportConfig,
}

impl MailPipeline {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        MailPipeline {
            mailer,
            hooks: None,
            transport: TransportConfig {
                verify_peer: true,
                ..Default::default()
            },
        }
    }

    /// Registers the hooks. A pipeline carries one set; registering again
    /// replaces it.
    pub fn with_hooks(mut self, hooks: Arc<dyn MailHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Base transport settings handed to `configure_transport`.
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Sends `email`. Returns whether the mailer accepted it.
    pub async fn send(&self, email: &Email) -> bool {
        let (transport, context) = match &self.hooks {
            Some(hooks) => {
                let transport = hooks.configure_transport(self.transport.clone()).await;
                (transport, hooks.before_send(email).await)
            }
            None => (self.transport.clone(), SendContext::default()),
        };

        match self.mailer.send(email, &transport).await {
            Ok(()) => {
                tracing::info!(subject = %email.subject, log_id = ?context.log_id, "Email sent");
                true
            }
            Err(err) => {
                tracing::warn!(subject = %email.subject, log_id = ?context.log_id, "Email failed: {err}");
                if let Some(hooks) = &self.hooks {
                    hooks.send_failed(&context, &err).await;
                }
                false
            }
        }
    }
}
