use std::sync::Arc;

use async_trait::async_trait;

use super::{Email, MailError, MailHooks, Security, SendContext, TransportConfig};
use crate::log::{AttachmentRef, LogRecord, LogStore};
use crate::options::{Options, OptionsError};

/// Applies the stored transport settings and logs every outgoing email.
///
/// Logging is controlled by the `log` option; transport settings only apply
/// once `host` resolves non-empty.
#[derive(Clone)]
pub struct LogInterceptor {
    options: Options,
    store: Arc<dyn LogStore>,
}

impl LogInterceptor {
    pub fn new(options: Options, store: Arc<dyn LogStore>) -> Self {
        LogInterceptor { options, store }
    }

    async fn apply_options(&self, mut transport: TransportConfig) -> Result<TransportConfig, OptionsError> {
        let options = &self.options;

        let from = options.value("from").await?;
        if !from.is_empty() {
            transport.from_address = Some(from);
        }
        let from_name = options.value("fromname").await?;
        if !from_name.is_empty() {
            transport.from_name = Some(from_name);
        }
        transport.disabled = options.flag("disable").await?;

        let host = options.value("host").await?;
        if host.is_empty() {
            return Ok(transport);
        }

        transport.host = host;
        transport.port = options.get("port", true, false).await?.and_then(|v| v.as_u16());
        transport.username = options.value("user").await?;
        transport.password = options.value("pass").await?;
        transport.auth = options.flag("auth").await?;
        transport.security = Security::from_option(&options.value("sec").await?);
        transport.verify_peer = !options.flag("noverifyssl").await?;

        Ok(transport)
    }

    fn record_for(email: &Email) -> LogRecord {
        LogRecord::builder()
            .recipients(email.to.iter().cloned())
            .subject(email.subject.clone())
            .body(email.body.clone())
            .headers(email.headers.iter().cloned())
            .attachments(email.attachments.iter().map(AttachmentRef::new))
            .build()
    }
}

#[async_trait]
impl MailHooks for LogInterceptor {
    async fn configure_transport(&self, transport: TransportConfig) -> TransportConfig {
        match self.apply_options(transport.clone()).await {
            Ok(configured) => configured,
            Err(err) => {
                tracing::error!("Could not read transport settings: {err}");
                transport
            }
        }
    }

    async fn before_send(&self, email: &Email) -> SendContext {
        match self.options.flag("log").await {
            Ok(true) => {}
            Ok(false) => return SendContext::default(),
            Err(err) => {
                tracing::error!("Could not read logging setting: {err}");
                return SendContext::default();
            }
        }

        match self.store.create(&Self::record_for(email)).await {
            Ok(id) => {
                tracing::debug!(%id, "Email logged");
                SendContext::logged(id)
            }
            Err(err) => {
                tracing::error!("Failed to log email: {err}");
                SendContext::default()
            }
        }
    }

    async fn send_failed(&self, context: &SendContext, error: &MailError) {
        let Some(id) = context.log_id else { return };

        if let Err(err) = self.store.set_error(id, &error.to_string()).await {
            tracing::error!(%id, "Failed to record send error: {err}");
        }
    }
}
