use super::*;

fn valid_settings() -> Settings {
    let mut settings = Settings::default();
    settings.auth.signing_key = "test-signing-key".to_string();
    settings.auth.salt = "test-salt".to_string();
    settings
}

#[test]
fn test_settings_validation() {
    let settings = valid_settings();
    assert!(settings.validate().is_ok());

    // Defaults alone carry no key material
    assert!(Settings::default().validate().is_err());

    let mut invalid_settings = settings.clone();
    invalid_settings.log.level = "invalid".to_string();
    assert!(invalid_settings.validate().is_err());

    let mut invalid_settings = settings.clone();
    invalid_settings.auth.access_ttl_secs = 0;
    assert!(invalid_settings.validate().is_err());

    let mut invalid_settings = settings.clone();
    invalid_settings.auth.rotate_within_days = 365;
    assert!(invalid_settings.validate().is_err());

    let mut invalid_settings = settings.clone();
    invalid_settings.rate_limit.ip_max_requests = 0;
    assert!(invalid_settings.validate().is_err());

    let mut invalid_settings = settings;
    invalid_settings.auth.salt = String::new();
    assert!(invalid_settings.validate().is_err());
}

#[test]
fn test_default_policy_values() {
    let settings = valid_settings();
    assert_eq!(settings.access_ttl(), chrono::Duration::minutes(15));
    assert_eq!(settings.refresh_ttl(), chrono::Duration::days(365));
    assert_eq!(settings.rotate_within(), chrono::Duration::days(90));
    assert_eq!(settings.rate_limit.identity_max_requests, 20);
    assert_eq!(settings.rate_limit.ip_max_requests, 10);
    assert_eq!(settings.rate_limit.window_secs, 60);
    assert!(!settings.server.trust_forwarded_headers);
    assert_eq!(settings.reward.amount, 3);
    assert_eq!(settings.reward_marker_ttl(), Duration::from_secs(25 * 60 * 60));
    assert_eq!(settings.sweep_interval(), Duration::from_secs(600));
}

#[test]
fn test_load_settings() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            [server]
            bind_addr = "127.0.0.1:3000"

            [auth]
            signing_key = "from-file"
            salt = "file-salt"

            [log]
            level = "debug"
            "#,
        )?;
        jail.set_env("ACCOUNT_LOG__LEVEL", "warn");
        jail.set_env("ACCOUNT_RATE_LIMIT__IP_MAX_REQUESTS", "5");

        let settings = Settings::load().map_err(|e| e.to_string())?;
        assert_eq!(settings.server.bind_addr.to_string(), "127.0.0.1:3000");
        assert_eq!(settings.auth.signing_key, "from-file");
        // Environment variable takes precedence
        assert_eq!(settings.log.level, "warn");
        assert_eq!(settings.rate_limit.ip_max_requests, 5);
        // Untouched sections keep their defaults
        assert_eq!(settings.reward.amount, 3);
        Ok(())
    });
}

#[test]
fn test_load_from_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(Settings::load_from(&missing).is_err());
}

#[test]
fn test_load_from_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("account.toml");
    std::fs::write(
        &path,
        r#"
        [auth]
        signing_key = "explicit"
        salt = "explicit-salt"
        hash_cost = 10
        "#,
    )
    .unwrap();

    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(settings.auth.signing_key, "explicit");
    assert_eq!(settings.auth.hash_cost, 10);
}
