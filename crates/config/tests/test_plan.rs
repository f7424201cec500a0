//! Test plan for the `careline-config` crate.
//!
//! These tests exercise the configuration loader across default handling,
//! file discovery, and environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use serial_test::serial;
use tempfile::TempDir;

use careline_config::{load, AppConfig};

const ENV_VARS_TO_RESET: &[&str] = &[
    "CARELINE_CONFIG",
    "CARELINE__API__BASE_URL",
    "CARELINE__API__TOKEN",
    "CARELINE__API__REQUEST_TIMEOUT_SECONDS",
    "CARELINE__BOT__NICK_NAME",
    "CARELINE__BOT__AVATAR",
    "CARELINE__BOT__TYPING_DELAY_MS",
    "CARELINE__BOT__VISIT_TYPE_ID",
    "CARELINE__BRIDGE__ENDPOINT",
    "CARELINE__BRIDGE__SESSION_ID",
    "CARELINE__BRIDGE__SESSION_KEY",
];

struct TestContext {
    vars: Vec<(String, Option<String>)>,
    original_dir: Option<PathBuf>,
}

impl TestContext {
    fn new() -> Self {
        Self {
            vars: Vec::new(),
            original_dir: None,
        }
    }

    fn reset_environment(&mut self) {
        for key in ENV_VARS_TO_RESET {
            self.remove_var(key);
        }
    }

    fn set_var(&mut self, key: &str, value: impl AsRef<str>) {
        let previous = std::env::var(key).ok();
        std::env::set_var(key, value.as_ref());
        self.vars.push((key.to_string(), previous));
    }

    fn remove_var(&mut self, key: &str) {
        let previous = std::env::var(key).ok();
        std::env::remove_var(key);
        self.vars.push((key.to_string(), previous));
    }

    fn set_current_dir(&mut self, dir: &Path) {
        if self.original_dir.is_none() {
            self.original_dir =
                Some(std::env::current_dir().expect("failed to capture current directory"));
        }
        std::env::set_current_dir(dir).expect("failed to set current directory");
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if let Some(original) = self.original_dir.take() {
            let _ = std::env::set_current_dir(original);
        }

        while let Some((key, value)) = self.vars.pop() {
            match value {
                Some(val) => std::env::set_var(&key, val),
                None => std::env::remove_var(&key),
            }
        }
    }
}

fn write_config_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create config directories");
    }
    fs::write(path, contents).expect("failed to write config file");
}

#[test]
#[serial]
fn load_uses_default_values_when_no_files_found() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    let config = load().expect("configuration load should succeed without files");
    let defaults = AppConfig::default();

    assert_eq!(config.api.base_url, defaults.api.base_url);
    assert_eq!(config.api.token, defaults.api.token);
    assert_eq!(
        config.api.request_timeout_seconds,
        defaults.api.request_timeout_seconds
    );
    assert_eq!(config.bot.nick_name, defaults.bot.nick_name);
    assert_eq!(config.bot.typing_delay_ms, defaults.bot.typing_delay_ms);
    assert_eq!(config.bot.visit_type_id, defaults.bot.visit_type_id);
    assert_eq!(config.bridge.endpoint, defaults.bridge.endpoint);
    assert_eq!(config.bridge.session_id, defaults.bridge.session_id);
}

#[test]
#[serial]
fn load_picks_first_available_file_in_search_order() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "careline.toml",
        r#"
        [bridge]
        session_id = 4242
        "#,
    );
    write_config_file(
        temp_dir.path(),
        "config/careline.toml",
        r#"
        [bridge]
        session_id = 5151
        "#,
    );

    let config = load().expect("configuration load should pick the first file");
    assert_eq!(config.bridge.session_id, 4242);
}

#[test]
#[serial]
fn load_honours_explicit_config_path() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "elsewhere/custom.toml",
        r#"
        [api]
        base_url = "https://staging.careline.example"
        token = "staging-token"

        [bot]
        nick_name = "Intake Bot"
        typing_delay_ms = 750
        "#,
    );
    ctx.set_var(
        "CARELINE_CONFIG",
        temp_dir.path().join("elsewhere/custom.toml").to_string_lossy(),
    );

    let config = load().expect("configuration load should use CARELINE_CONFIG");
    assert_eq!(config.api.base_url, "https://staging.careline.example");
    assert_eq!(config.api.token.as_deref(), Some("staging-token"));
    assert_eq!(config.bot.nick_name, "Intake Bot");
    assert_eq!(config.bot.typing_delay_ms, 750);
}

#[test]
#[serial]
fn environment_overrides_take_precedence_over_files() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "careline.toml",
        r#"
        [bridge]
        endpoint = "wss://file.careline.example/session"
        session_key = "from-file"
        "#,
    );
    ctx.set_var("CARELINE__BRIDGE__SESSION_KEY", "from-env");

    let config = load().expect("configuration load should apply env overrides");
    assert_eq!(config.bridge.endpoint, "wss://file.careline.example/session");
    assert_eq!(config.bridge.session_key, "from-env");
}

#[test]
#[serial]
fn partial_files_keep_remaining_defaults() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "careline.toml",
        r#"
        [bot]
        nick_name = "Nurse Bot"
        "#,
    );

    let config = load().expect("partial configuration should load");
    let defaults = AppConfig::default();
    assert_eq!(config.bot.nick_name, "Nurse Bot");
    assert_eq!(config.bot.visit_type_id, defaults.bot.visit_type_id);
    assert_eq!(config.api.base_url, defaults.api.base_url);
}
