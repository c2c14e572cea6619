use std::env;

use anyhow::Context;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub bind_addr: String,
    pub database_url: String,
    pub event_buffer: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/coordinator.db".into(),
            event_buffer: 256,
        }
    }
}

/// Layers, lowest first: built-in defaults, the optional config file, the
/// legacy `SERVER_BIND`/`DATABASE_URL` variables, then `APP__*` variables.
pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(CONFIG_FILE)
}

pub(crate) fn load_settings_from(path: &str) -> anyhow::Result<Settings> {
    let defaults = Settings::default();
    let mut builder = Config::builder()
        .set_default("bind_addr", defaults.bind_addr)?
        .set_default("database_url", defaults.database_url)?
        .set_default("event_buffer", defaults.event_buffer as u64)?
        .add_source(File::new(path, FileFormat::Toml).required(false));

    for (legacy, key, current) in [
        ("SERVER_BIND", "bind_addr", "APP__BIND_ADDR"),
        ("DATABASE_URL", "database_url", "APP__DATABASE_URL"),
    ] {
        if env::var(current).is_ok() {
            continue;
        }
        if let Ok(value) = env::var(legacy) {
            builder = builder.set_override(key, value)?;
        }
    }

    let settings: Settings = builder
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("__")
                .try_parsing(true),
        )
        .build()
        .and_then(Config::try_deserialize)
        .with_context(|| format!("invalid server configuration (file '{path}')"))?;
    Ok(settings)
}

/// Turns a bare path or a Windows-style path into a sqlite URL. Storage
/// creates missing parent directories when it opens the file.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite://") {
        if has_drive_letter(path) {
            return format!("sqlite:{}", path.replace('\\', "/"));
        }
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return format!("sqlite:{}", path.replace('\\', "/"));
    }

    if raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    let path = raw_database_url.replace('\\', "/");
    if has_drive_letter(&path) {
        return format!("sqlite:{path}");
    }
    format!("sqlite://{path}")
}

fn has_drive_letter(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
