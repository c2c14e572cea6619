use super::{load_settings_from, normalize_database_url, Settings};

use std::{
    env, fs,
    sync::{Mutex, MutexGuard},
};

// Environment variables are process-wide; every test that loads settings
// holds this lock.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(normalize_database_url("  "), Settings::default().database_url);
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
}

#[test]
fn keeps_windows_absolute_path_with_single_sqlite_colon() {
    assert_eq!(
        normalize_database_url("sqlite:C:\\Users\\alice\\test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
    assert_eq!(
        normalize_database_url("C:\\Users\\alice\\test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
    assert_eq!(
        normalize_database_url("sqlite://C:/Users/alice/test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let _env = env_lock();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.toml");
    let settings = load_settings_from(path.to_string_lossy().as_ref()).expect("settings");
    assert_eq!(settings.event_buffer, Settings::default().event_buffer);
}

#[test]
fn file_then_legacy_env_then_app_env() {
    let _env = env_lock();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("server.toml");
    fs::write(
        &path,
        "bind_addr = \"0.0.0.0:9000\"\ndatabase_url = \"sqlite://file.db\"\nevent_buffer = 64\n",
    )
    .expect("write config");
    let path = path.to_string_lossy().to_string();

    let from_file = load_settings_from(&path).expect("settings");
    assert_eq!(from_file.bind_addr, "0.0.0.0:9000");
    assert_eq!(from_file.event_buffer, 64);

    env::set_var("SERVER_BIND", "127.0.0.1:7000");
    let legacy = load_settings_from(&path).expect("settings");
    assert_eq!(legacy.bind_addr, "127.0.0.1:7000");
    assert_eq!(legacy.database_url, "sqlite://file.db");

    env::set_var("APP__BIND_ADDR", "127.0.0.1:7100");
    env::set_var("APP__EVENT_BUFFER", "32");
    let current = load_settings_from(&path).expect("settings");
    assert_eq!(current.bind_addr, "127.0.0.1:7100");
    assert_eq!(current.event_buffer, 32);

    env::remove_var("SERVER_BIND");
    env::remove_var("APP__BIND_ADDR");
    env::remove_var("APP__EVENT_BUFFER");
}
