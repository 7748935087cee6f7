use std::{fs, io::ErrorKind, path::Path, time::Duration};

use anyhow::{anyhow, Context};
use review_core::SessionOptions;
use serde::Deserialize;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub token: Option<String>,
    pub correct_delay_ms: u64,
    pub incorrect_delay_ms: u64,
    pub shuffle: bool,
    pub use_mock: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            token: None,
            correct_delay_ms: 500,
            incorrect_delay_ms: 800,
            shuffle: true,
            use_mock: false,
        }
    }
}

impl Settings {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            correct_delay: Duration::from_millis(self.correct_delay_ms),
            incorrect_delay: Duration::from_millis(self.incorrect_delay_ms),
            shuffle: self.shuffle,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    server_url: Option<String>,
    token: Option<String>,
    correct_delay_ms: Option<u64>,
    incorrect_delay_ms: Option<u64>,
    shuffle: Option<bool>,
    use_mock: Option<bool>,
}

/// Defaults, then `path` if it exists, then environment variables.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid settings file '{}'", path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    settings.server_url = normalize_server_url(&settings.server_url)?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.token {
        settings.token = Some(v);
    }
    if let Some(v) = file_cfg.correct_delay_ms {
        settings.correct_delay_ms = v;
    }
    if let Some(v) = file_cfg.incorrect_delay_ms {
        settings.incorrect_delay_ms = v;
    }
    if let Some(v) = file_cfg.shuffle {
        settings.shuffle = v;
    }
    if let Some(v) = file_cfg.use_mock {
        settings.use_mock = v;
    }
    Ok(())
}

fn apply_env(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("REVIEW_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = lookup("REVIEW_TOKEN") {
        settings.token = Some(v);
    }
    if let Some(v) = lookup("APP__TOKEN") {
        settings.token = Some(v);
    }

    if let Some(v) = lookup("APP__CORRECT_DELAY_MS") {
        settings.correct_delay_ms = v
            .parse()
            .with_context(|| format!("APP__CORRECT_DELAY_MS must be milliseconds, got '{v}'"))?;
    }
    if let Some(v) = lookup("APP__INCORRECT_DELAY_MS") {
        settings.incorrect_delay_ms = v
            .parse()
            .with_context(|| format!("APP__INCORRECT_DELAY_MS must be milliseconds, got '{v}'"))?;
    }

    if let Some(v) = lookup("APP__USE_MOCK") {
        settings.use_mock = matches!(v.trim(), "1" | "true" | "yes");
    }

    Ok(())
}

pub fn normalize_server_url(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(DEFAULT_SERVER_URL.to_string());
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(anyhow!(
            "server_url must start with http:// or https://, got '{trimmed}'"
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
