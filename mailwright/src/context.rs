//! Wires settings, stores and the send pipeline together.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Constants, Settings};
use crate::error::Result;
use crate::jobs::{PruneJob, Scheduler};
use crate::log::{LogStore, SqliteLogStore};
use crate::mail::{Email, LogInterceptor, MailPipeline, Mailer, Resender, SmtpMailer};
use crate::options::{Options, SqliteOptionStore};

/// Everything needed to send, log and resend email.
#[derive(Clone)]
pub struct Context {
    pub settings: Settings,
    pub options: Options,
    pub store: Arc<dyn LogStore>,
    pub pipeline: MailPipeline,
}

impl Context {
    /// Opens the database named in `settings` and builds the SMTP pipeline.
    pub async fn connect(settings: Settings) -> Result<Self> {
        let pool = crate::db::connect(&settings.database_url).await?;
        let store = SqliteLogStore::from_pool(pool.clone())
            .await?
            .with_page_size(settings.page_size);
        let option_store = SqliteOptionStore::new(pool).await?;

        let constants = match settings.constants_file.as_deref() {
            Some(path) => Constants::load(path)?,
            None => Constants::default(),
        };
        let options = Options::new(Arc::new(option_store))
            .constants(constants)
            .encryption_key(settings.encryption_key()?)
            .multisite(settings.multisite);

        let mailer = SmtpMailer::new(&settings.mail_from)?
            .timeout(Duration::from_secs(settings.smtp_timeout_secs));
        Ok(Self::with_parts(settings, options, Arc::new(store), Arc::new(mailer)))
    }

    /// Builds a context from ready-made parts, registering the log interceptor
    /// on a fresh pipeline.
    pub fn with_parts(
        settings: Settings,
        options: Options,
        store: Arc<dyn LogStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let hooks = Arc::new(LogInterceptor::new(options.clone(), store.clone()));
        let pipeline = MailPipeline::new(mailer).with_hooks(hooks);

        Context {
            settings,
            options,
            store,
            pipeline,
        }
    }

    pub async fn send(&self, email: &Email) -> bool {
        self.pipeline.send(email).await
    }

    pub fn resender(&self) -> Resender {
        Resender::new(self.store.clone(), self.pipeline.clone())
    }

    /// Starts the prune job. `None` when no retention age is configured.
    pub async fn start_pruning(&self) -> Result<Option<Scheduler>> {
        let Some(max_age) = self.settings.retention() else {
            tracing::info!("Log retention not configured, pruning disabled");
            return Ok(None);
        };

        let job = PruneJob::new(self.store.clone(), max_age);
        let mut scheduler = Scheduler::new().await?;
        match &self.settings.prune_schedule {
            Some(schedule) => scheduler.cron(cron::Schedule::from(schedule.clone()), job).await?,
            None => {
                scheduler
                    .repeat(
                        std::time::Duration::from_secs(self.settings.prune_interval_secs),
                        job,
                    )
                    .await?
            }
        }

        scheduler.start().await?;
        Ok(Some(scheduler))
    }
}
