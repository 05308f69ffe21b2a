use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.public_port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        public_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_match_cache_contract() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.cache.memory_ttl, Duration::from_secs(300));
    assert_eq!(settings.cache.browser_ttl, Duration::from_secs(300));
    assert_eq!(settings.cache.edge_ttl, Duration::from_secs(3600));
    assert_eq!(settings.cache.memory_capacity.get(), 10_000);
    assert_eq!(settings.edge.backend, EdgeBackend::Filesystem);
    assert_eq!(settings.edge.namespace, "public/toggles");
    assert!(settings.edge.public_base_url.is_none());
    assert!(settings.cdn.purge_url.is_none());
    assert_eq!(settings.tasks.queue_capacity.get(), 1024);
    assert!(settings.backup.enabled);
    assert_eq!(settings.backup.object_path, "toggles-auto-backup.json");
}

#[test]
fn zero_memory_ttl_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.memory_ttl_seconds = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero ttl must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.memory_ttl_seconds",
            ..
        }
    ));
}

#[test]
fn edge_namespace_is_trimmed_of_slashes() {
    let mut raw = RawSettings::default();
    raw.edge.namespace = Some("/flags/v1/".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.edge.namespace, "flags/v1");
}

#[test]
fn unknown_edge_backend_is_rejected() {
    let mut raw = RawSettings::default();
    raw.edge.backend = Some("s3".to_string());

    let err = Settings::from_raw(raw).expect_err("unknown backend must fail");
    assert!(matches!(err, LoadError::Invalid { key: "edge.backend", .. }));
}

#[test]
fn invalid_cdn_url_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cdn.purge_url = Some("not a url".to_string());

    let err = Settings::from_raw(raw).expect_err("invalid url must fail");
    assert!(matches!(err, LoadError::Invalid { key: "cdn.purge_url", .. }));
}

#[test]
fn blank_cdn_token_is_treated_as_absent() {
    let mut raw = RawSettings::default();
    raw.cdn.purge_url = Some("https://cdn.example.com/purge".to_string());
    raw.cdn.token = Some("   ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.cdn.purge_url.is_some());
    assert!(settings.cdn.token.is_none());
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn cli_edge_backend_override_applies() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        edge_backend: Some("memory".to_string()),
        backup_enabled: Some(false),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.edge.backend, EdgeBackend::Memory);
    assert!(!settings.backup.enabled);
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["toggleboard"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_export_arguments() {
    let args = CliArgs::parse_from([
        "toggleboard",
        "export",
        "--database-url",
        "postgres://example",
        "/tmp/toggles.json",
    ]);

    match args.command.expect("export command") {
        Command::Export(export) => {
            assert_eq!(
                export.database.database_url.as_deref(),
                Some("postgres://example")
            );
            assert_eq!(export.file, std::path::Path::new("/tmp/toggles.json"));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "toggleboard",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--database-url",
        "postgres://override",
        "--cdn-purge-url",
        "https://cdn.example.com/purge",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.database_url.as_deref(),
                Some("postgres://override")
            );
            assert_eq!(
                serve.overrides.cdn_purge_url.as_deref(),
                Some("https://cdn.example.com/purge")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}
