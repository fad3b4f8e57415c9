use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.backend.url = Some("https://file.example.com".to_string());
    raw.logging.level = Some("info".to_string());

    let overrides = GlobalOverrides {
        backend_url: Some("https://cli.example.com".to_string()),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(
        settings.backend.url.as_ref().map(Url::as_str),
        Some("https://cli.example.com/")
    );
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_are_usable() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert!(settings.backend.url.is_none());
    assert_eq!(settings.backend.timeout, Duration::from_secs(15));
    assert_eq!(settings.cache.default_stale, Duration::from_secs(60));
    assert_eq!(settings.cache.permission_stale, Duration::from_secs(300));
    assert_eq!(settings.cache.max_entries, 256);
    assert_eq!(settings.delivery.whatsapp_number, DEFAULT_WHATSAPP_NUMBER);
    assert_eq!(settings.delivery.email_recipient, DEFAULT_EMAIL_RECIPIENT);
    assert_eq!(settings.locale, Locale::Pt);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = GlobalOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn whatsapp_number_must_be_digits() {
    let mut raw = RawSettings::default();
    raw.delivery.whatsapp_number = Some("+55 11 9999".to_string());

    let err = Settings::from_raw(raw).expect_err("invalid number");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "delivery.whatsapp_number",
            ..
        }
    ));
}

#[test]
fn zero_timeout_is_rejected() {
    let mut raw = RawSettings::default();
    raw.backend.timeout_seconds = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero timeout");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "backend.timeout_seconds",
            ..
        }
    ));
}

#[test]
fn cache_entry_limit_is_clamped() {
    let mut raw = RawSettings::default();
    raw.cache.max_entries = Some(0);

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cache.max_entries, 1);
}

#[test]
fn regional_locale_tags_are_accepted() {
    let mut raw = RawSettings::default();
    raw.locale = Some("es-AR".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.locale, Locale::Es);
}

#[test]
fn unknown_locale_is_rejected() {
    let mut raw = RawSettings::default();
    raw.locale = Some("fr".to_string());

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn parse_briefing_arguments() {
    let args = CliArgs::parse_from([
        "agencia",
        "--backend-url",
        "https://project.example.com",
        "briefing",
        "--locale",
        "en",
        "/tmp/briefing.json",
    ]);

    assert_eq!(
        args.overrides.backend_url.as_deref(),
        Some("https://project.example.com")
    );
    match args.command {
        Command::Briefing(briefing) => {
            assert_eq!(briefing.locale.as_deref(), Some("en"));
            assert_eq!(briefing.file, std::path::Path::new("/tmp/briefing.json"));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn global_flags_are_accepted_after_the_subcommand() {
    let args = CliArgs::parse_from(["agencia", "article", "hello-world", "--log-json", "true"]);

    assert_eq!(args.overrides.log_json, Some(true));
    match args.command {
        Command::Article(article) => assert_eq!(article.slug, "hello-world"),
        _ => panic!("wrong command parsed"),
    }
}
