//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::domain::briefing::is_valid_email;
use crate::domain::types::Locale;

pub use cli::{BriefingArgs, CliArgs, Command, GlobalOverrides, SlugArgs};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "agencia";
const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 15;
const DEFAULT_STALE_SECS: u64 = 60;
const DEFAULT_PERMISSION_STALE_SECS: u64 = 5 * 60;
const DEFAULT_CACHE_MAX_ENTRIES: usize = 256;
const DEFAULT_WHATSAPP_NUMBER: &str = "5511999999999";
const DEFAULT_EMAIL_RECIPIENT: &str = "contato@agencia.com.br";
const DEFAULT_EMAIL_SUBJECT: &str = "Novo briefing de projeto";
const DEFAULT_SCHEDULER_URL: &str = "https://calendly.com/agencia/briefing";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: BackendSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub delivery: DeliverySettings,
    pub locale: Locale,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub url: Option<Url>,
    pub anon_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub default_stale: Duration,
    pub permission_stale: Duration,
    pub max_entries: usize,
}

/// Where a finished briefing is sent.
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    /// International number, digits only.
    pub whatsapp_number: String,
    pub email_recipient: String,
    pub email_subject: String,
    pub scheduler_url: Url,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("AGENCIA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);
    if let Command::Briefing(args) = &cli.command
        && let Some(locale) = args.locale.as_ref()
    {
        raw.locale = Some(locale.clone());
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    backend: RawBackendSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    delivery: RawDeliverySettings,
    locale: Option<String>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(url) = overrides.backend_url.as_ref() {
            self.backend.url = Some(url.clone());
        }
        if let Some(key) = overrides.backend_anon_key.as_ref() {
            self.backend.anon_key = Some(key.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            backend,
            logging,
            cache,
            delivery,
            locale,
        } = raw;

        let backend = build_backend_settings(backend)?;
        let logging = build_logging_settings(logging)?;
        let cache = build_cache_settings(cache)?;
        let delivery = build_delivery_settings(delivery)?;
        let locale = match locale {
            Some(value) => Locale::from_str(&value)
                .map_err(|err| LoadError::invalid("locale", err.to_string()))?,
            None => Locale::default(),
        };

        Ok(Self {
            backend,
            logging,
            cache,
            delivery,
            locale,
        })
    }
}

fn build_backend_settings(backend: RawBackendSettings) -> Result<BackendSettings, LoadError> {
    let url = match non_blank(backend.url) {
        Some(value) => Some(
            Url::parse(&value)
                .map_err(|err| LoadError::invalid("backend.url", format!("invalid URL: {err}")))?,
        ),
        None => None,
    };

    let timeout_seconds = backend
        .timeout_seconds
        .unwrap_or(DEFAULT_BACKEND_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "backend.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(BackendSettings {
        url,
        anon_key: non_blank(backend.anon_key),
        timeout: Duration::from_secs(timeout_seconds),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let default_stale = cache.default_stale_seconds.unwrap_or(DEFAULT_STALE_SECS);
    let permission_stale = cache
        .permission_stale_seconds
        .unwrap_or(DEFAULT_PERMISSION_STALE_SECS);
    if permission_stale == 0 {
        return Err(LoadError::invalid(
            "cache.permission_stale_seconds",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        default_stale: Duration::from_secs(default_stale),
        permission_stale: Duration::from_secs(permission_stale),
        max_entries: cache.max_entries.unwrap_or(DEFAULT_CACHE_MAX_ENTRIES).max(1),
    })
}

fn build_delivery_settings(delivery: RawDeliverySettings) -> Result<DeliverySettings, LoadError> {
    let whatsapp_number = non_blank(delivery.whatsapp_number)
        .unwrap_or_else(|| DEFAULT_WHATSAPP_NUMBER.to_string());
    if !whatsapp_number.chars().all(|c| c.is_ascii_digit()) {
        return Err(LoadError::invalid(
            "delivery.whatsapp_number",
            "must contain digits only",
        ));
    }

    let email_recipient = non_blank(delivery.email_recipient)
        .unwrap_or_else(|| DEFAULT_EMAIL_RECIPIENT.to_string());
    if !is_valid_email(&email_recipient) {
        return Err(LoadError::invalid(
            "delivery.email_recipient",
            format!("`{email_recipient}` is not an email address"),
        ));
    }

    let email_subject = non_blank(delivery.email_subject)
        .unwrap_or_else(|| DEFAULT_EMAIL_SUBJECT.to_string());

    let scheduler_raw = non_blank(delivery.scheduler_url)
        .unwrap_or_else(|| DEFAULT_SCHEDULER_URL.to_string());
    let scheduler_url = Url::parse(&scheduler_raw).map_err(|err| {
        LoadError::invalid("delivery.scheduler_url", format!("invalid URL: {err}"))
    })?;

    Ok(DeliverySettings {
        whatsapp_number,
        email_recipient,
        email_subject,
        scheduler_url,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBackendSettings {
    url: Option<String>,
    anon_key: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    default_stale_seconds: Option<u64>,
    permission_stale_seconds: Option<u64>,
    max_entries: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDeliverySettings {
    whatsapp_number: Option<String>,
    email_recipient: Option<String>,
    email_subject: Option<String>,
    scheduler_url: Option<String>,
}

#[cfg(test)]
mod tests;
