use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use askama::Template;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use mailwright::config::{Settings, SECS_PER_DAY};
use mailwright::log::{count_pages, LogId, LogStore};
use mailwright::mail::Email;
use mailwright::{privacy, Context};

pub mod filters;
mod views;

use views::{EntryTemplate, ListTemplate, Row};

#[derive(Parser)]
#[command(name = "mailwright", about = "Inspect, resend and prune the outgoing email log")]
struct Cli {
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbosity: u8,

    /// Database URL, overriding MAILWRIGHT_DATABASE_URL.
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse and manage logged emails.
    Log {
        #[command(subcommand)]
        action: LogAction,
    },
    /// Send a logged email again. Each entry can be resent once.
    Resend { id: LogId },
    /// Send a test email with the current settings.
    Test {
        #[arg(value_name = "email")]
        to: String,

        #[arg(long, default_value_t = false)]
        html: bool,
    },
    /// Remove every logged email addressed to a person.
    Erase {
        #[arg(value_name = "email")]
        email: String,
    },
    /// Read or change stored settings.
    #[command(name = "option", alias = "opt")]
    Setting {
        #[command(subcommand)]
        action: OptionAction,
    },
    /// Run the prune schedule until interrupted.
    Serve,
}

#[derive(Subcommand)]
enum LogAction {
    List {
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        /// Entries per page; 0 uses the configured page size.
        #[arg(short, long, default_value_t = 0)]
        limit: u32,

        /// Print every page.
        #[arg(long, default_value_t = false)]
        all: bool,
    },
    View { id: LogId },
    Delete { id: LogId },
    /// Delete every entry.
    Clear {
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Delete entries past the retention age.
    Prune {
        /// Age in days, overriding MAILWRIGHT_LOG_RETENTION_DAYS.
        #[arg(long)]
        days: Option<u64>,
    },
}

#[derive(Subcommand)]
enum OptionAction {
    Get { name: String },
    Set {
        name: String,
        value: String,

        /// Encrypt the value when a key is configured.
        #[arg(long, default_value_t = false)]
        secret: bool,
    },
    /// Report whether the encryption key still matches stored secrets.
    CheckKey,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("initialising logger")?;

    let mut settings = Settings::load().context("loading settings")?;
    if let Some(url) = cli.database_url {
        settings.database_url = url;
    }
    let ctx = Context::connect(settings)
        .await
        .context("opening email log")?;

    match cli.command {
        Commands::Log { action } => log_command(&ctx, action).await?,
        Commands::Resend { id } => {
            if ctx.resender().resend(id).await? {
                log::info!("Email {} resent", id);
            } else {
                bail!("email {id} does not exist or was already resent");
            }
        }
        Commands::Test { to, html } => {
            let email = Email::test_message(&to, &ctx.settings.site_name, &ctx.settings.site_url, html)
                .context("email address provided is invalid")?;
            if ctx.send(&email).await {
                log::info!("Test email sent successfully.");
            } else {
                bail!("test email failed, check your configuration and try again");
            }
        }
        Commands::Erase { email } => {
            let report = privacy::erase(ctx.store.as_ref(), &email).await?;
            log::info!("Removed {} log entries", report.items_removed);
        }
        Commands::Setting { action } => option_command(&ctx, action).await?,
        Commands::Serve => serve(&ctx).await?,
    }
    Ok(())
}

async fn log_command(ctx: &Context, action: LogAction) -> Result<()> {
    let store = ctx.store.as_ref();

    match action {
        LogAction::List { page, limit, all } => {
            let size = if limit == 0 { ctx.settings.page_size } else { limit };
            let total = store.count().await?;
            let pages = count_pages(total, size);
            let wanted = if all { 1..=pages } else { u64::from(page.max(1))..=u64::from(page.max(1)) };

            for page in wanted {
                let page = u32::try_from(page).context("page out of range")?;
                let records = store.list(page, size).await?;
                let view = ListTemplate {
                    rows: records.iter().map(Row::from).collect(),
                    page,
                    pages,
                    total,
                };
                print!("{}", view.render().context("rendering log list")?);
            }
        }
        LogAction::View { id } => {
            let Some(record) = store.get(id).await? else {
                bail!("email {id} not found");
            };
            let resent = store.is_resent(id).await?;
            print!("{}", EntryTemplate::new(&record, resent).render().context("rendering entry")?);
        }
        LogAction::Delete { id } => {
            if !store.delete(id).await? {
                bail!("email {id} not found");
            }
            log::info!("Deleted email {}", id);
        }
        LogAction::Clear { yes } => {
            if !yes {
                bail!("refusing to delete every entry without --yes");
            }
            store.delete_all().await?;
            log::info!("Email log cleared");
        }
        LogAction::Prune { days } => {
            let max_age = match days {
                Some(days) => Duration::from_secs(days.saturating_mul(SECS_PER_DAY)),
                None => ctx
                    .settings
                    .retention()
                    .context("no retention age configured, pass --days")?,
            };
            let removed = store.prune(max_age).await?;
            log::info!("Pruned {} log entries", removed);
        }
    }
    Ok(())
}

async fn option_command(ctx: &Context, action: OptionAction) -> Result<()> {
    match action {
        OptionAction::Get { name } => match ctx.options.get(&name, false, false).await? {
            Some(value) => println!("{} ({})", value.value, value.source),
            None => bail!("option {name} is not set"),
        },
        OptionAction::Set {
            name,
            value,
            secret,
        } => {
            if let Some(current) = ctx.options.get(&name, false, false).await? {
                if !current.source.is_editable() {
                    log::warn!(
                        "{} is set by {}; the stored value will be ignored",
                        name,
                        current.source
                    );
                }
            }
            ctx.options.set(&name, &value, secret).await?;
            log::info!("Saved {}", name);
        }
        OptionAction::CheckKey => {
            if !ctx.options.can_encrypt() {
                bail!("no encryption key configured");
            }
            if ctx.options.check_encryption_key().await? {
                log::info!("Encryption key matches stored secrets");
            } else {
                bail!("encryption key does not match, stored secrets must be re-entered");
            }
        }
    }
    Ok(())
}

async fn serve(ctx: &Context) -> Result<()> {
    let Some(mut scheduler) = ctx.start_pruning().await? else {
        bail!("no retention age configured, nothing to schedule");
    };

    shutdown_signal().await;
    scheduler.shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {}", e);
        return;
    }
    log::info!("Shutting down");
}
