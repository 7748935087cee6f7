use super::{
    apply_env, apply_file, load_settings, normalize_server_url, Settings, DEFAULT_SERVER_URL,
};

use std::{
    collections::HashMap,
    env,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        r#"
        server_url = "https://kanji.example.com/"
        incorrect_delay_ms = 1200
        use_mock = true
        "#,
    )
    .expect("apply");

    assert_eq!(settings.server_url, "https://kanji.example.com/");
    assert_eq!(settings.incorrect_delay_ms, 1200);
    assert_eq!(settings.correct_delay_ms, 500);
    assert!(settings.use_mock);
}

#[test]
fn unknown_file_keys_are_rejected() {
    let mut settings = Settings::default();
    assert!(apply_file(&mut settings, "bind_addr = \"0.0.0.0\"").is_err());
}

#[test]
fn app_prefixed_env_wins() {
    let env: HashMap<&str, &str> = HashMap::from([
        ("REVIEW_SERVER_URL", "http://a:1"),
        ("APP__SERVER_URL", "http://b:2"),
        ("REVIEW_TOKEN", "tok"),
        ("APP__CORRECT_DELAY_MS", "0"),
    ]);
    let mut settings = Settings::default();
    apply_env(&mut settings, |key| env.get(key).map(|v| v.to_string())).expect("env");

    assert_eq!(settings.server_url, "http://b:2");
    assert_eq!(settings.token.as_deref(), Some("tok"));
    assert_eq!(settings.correct_delay_ms, 0);
}

#[test]
fn bad_delay_is_an_error() {
    let mut settings = Settings::default();
    let err = apply_env(&mut settings, |key| {
        (key == "APP__INCORRECT_DELAY_MS").then(|| "soon".to_string())
    })
    .unwrap_err();
    assert!(err.to_string().contains("APP__INCORRECT_DELAY_MS"));
}

#[test]
fn normalizes_server_url() {
    assert_eq!(
        normalize_server_url(" http://localhost:8080/ ").expect("url"),
        "http://localhost:8080"
    );
    assert_eq!(normalize_server_url("").expect("url"), DEFAULT_SERVER_URL);
    assert!(normalize_server_url("localhost:8080").is_err());
}

#[test]
fn missing_file_yields_defaults() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("review_cli_missing_{suffix}.toml"));

    let settings = load_settings(&path).expect("load");
    assert_eq!(settings.correct_delay_ms, Settings::default().correct_delay_ms);
}

#[test]
fn session_options_use_millisecond_delays() {
    let settings = Settings {
        correct_delay_ms: 10,
        incorrect_delay_ms: 20,
        shuffle: false,
        ..Settings::default()
    };
    let options = settings.session_options();
    assert_eq!(options.correct_delay, Duration::from_millis(10));
    assert_eq!(options.incorrect_delay, Duration::from_millis(20));
    assert!(!options.shuffle);
}
