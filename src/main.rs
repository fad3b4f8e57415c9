use std::{path::Path, process, sync::Arc};

use agencia::{
    application::{
        clock::{Clock, SystemClock},
        content::ContentService,
        error::AppError,
        mutation::MutationContext,
        notify::{Notifier, TracingNotifier},
        wizard::{ChannelLauncher, WizardController, WizardError},
    },
    cache::{CacheConfig, QueryCache},
    config::{self, Command, Settings},
    domain::briefing::BriefingRecord,
    infra::{error::InfraError, rest::RestBackend, telemetry},
};
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;
use url::Url;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        Command::Briefing(args) => run_briefing(&settings, &args.file).await,
        command => run_content(&settings, command).await,
    }
}

async fn run_content(settings: &Settings, command: Command) -> Result<(), AppError> {
    let backend = Arc::new(RestBackend::new(&settings.backend)?);
    let cache = Arc::new(QueryCache::new(CacheConfig::from(&settings.cache)));
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let content = ContentService::new(backend, MutationContext::new(cache, notifier), clock);

    match command {
        Command::Articles => print_json(&content.list_published_articles().await?),
        Command::Article(args) => print_json(&content.get_article_by_slug(&args.slug).await?),
        Command::Authors => print_json(&content.list_authors().await?),
        Command::Stats => print_json(&content.compute_analytics_stats().await?),
        Command::View(args) => {
            content.increment_views(&args.slug).await?;
            info!(slug = %args.slug, "View recorded");
            Ok(())
        }
        Command::Briefing(args) => run_briefing(settings, &args.file).await,
    }
}

async fn run_briefing(settings: &Settings, path: &Path) -> Result<(), AppError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| AppError::from(InfraError::Io(err)))?;
    let record: BriefingRecord = serde_json::from_str(&text).map_err(|err| {
        AppError::invalid_input(format!("`{}` is not a briefing: {err}", path.display()))
    })?;

    let mut wizard = WizardController::new(
        settings.delivery.clone(),
        settings.locale,
        Arc::new(StdoutLauncher),
        Arc::new(TracingNotifier),
    );
    *wizard.record_mut() = record;

    while !wizard.stage().is_terminal() {
        if !wizard.advance() {
            return Err(AppError::Validation(wizard.errors().to_vec()));
        }
    }

    let outcome = wizard.submit().map_err(|err| match err {
        WizardError::Validation(errors) => AppError::Validation(errors),
        other => AppError::unexpected(other.to_string()),
    })?;

    println!("{}", outcome.summary);
    if let Some(url) = wizard.scheduler_url() {
        println!("schedule: {url}");
    }
    Ok(())
}

/// Prints hand-off links instead of opening them.
struct StdoutLauncher;

impl ChannelLauncher for StdoutLauncher {
    fn open_in_new_window(&self, url: &Url) {
        println!("open: {url}");
    }

    fn navigate(&self, url: &Url) {
        println!("navigate: {url}");
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{text}");
    Ok(())
}
