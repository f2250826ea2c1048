//! Session configuration
//!
//! Config precedence: env vars > cookie file > config file > defaults.
//! Cookie values are never stored in the TOML itself; they come from the
//! `cookie_file` JSON or from `LUOGU_CLIENT_ID` / `LUOGU_UID`.

use std::path::{Path, PathBuf};

use common::Secret;
use serde::Deserialize;

use crate::cookies::Cookies;

pub const DEFAULT_BASE_URL: &str = "https://www.luogu.com.cn";

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0";

/// Tunables for one [`Session`](crate::Session).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub base_url: String,
    /// Per-request transport timeout
    pub timeout_secs: u64,
    /// Total attempts per call
    pub max_retries: u32,
    /// Rate-limit wait is `attempt index * backoff_unit_ms`
    pub backoff_unit_ms: u64,
    /// Fixed wait after a transport timeout
    pub timeout_wait_ms: u64,
    pub lockout_wait_secs: u64,
    /// Wait between anti-forgery token fetch attempts
    pub token_retry_wait_ms: u64,
    /// Endpoint serving the CAPTCHA image
    pub captcha_path: String,
    pub user_agent: String,
    pub cookie_file: Option<PathBuf>,
    #[serde(skip)]
    pub cookies: Cookies,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout_secs: 10,
            max_retries: 5,
            backoff_unit_ms: 5_000,
            timeout_wait_ms: 1_000,
            lockout_wait_secs: 180,
            token_retry_wait_ms: 1_000,
            captcha_path: "lg4/captcha".to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            cookie_file: None,
            cookies: Cookies::default(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file, then overlay cookie values.
    ///
    /// Cookie resolution order:
    /// 1. `LUOGU_CLIENT_ID` / `LUOGU_UID` env vars (per value)
    /// 2. `cookie_file` path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: SessionConfig = toml::from_str(&contents)?;
        config.validate()?;

        if let Some(ref cookie_file) = config.cookie_file {
            let cookie_file = resolve_relative(path, cookie_file);
            let json = std::fs::read_to_string(&cookie_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read cookie_file {}: {e}",
                    cookie_file.display()
                ))
            })?;
            config.cookies = Cookies::from_json(&json)?;
            config.cookie_file = Some(cookie_file);
        }

        config.apply_env();
        Ok(config)
    }

    /// Overlay cookie values from the environment.
    pub fn apply_env(&mut self) {
        if let Ok(client_id) = std::env::var("LUOGU_CLIENT_ID") {
            self.cookies.client_id = Some(Secret::new(client_id));
        }
        if let Ok(uid) = std::env::var("LUOGU_UID") {
            self.cookies.uid = Some(Secret::new(uid));
        }
    }

    pub fn validate(&self) -> common::Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.base_url
            )));
        }

        if self.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.max_retries == 0 {
            return Err(common::Error::Config(
                "max_retries must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or LUOGU_CONFIG env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("LUOGU_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("luogu.toml")
    }

    /// Base address without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Absolute URL for an endpoint path relative to the base address.
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base(), endpoint.trim_start_matches('/'))
    }
}

/// Cookie file paths are relative to the config file's directory.
fn resolve_relative(config_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match config_path.parent() {
        Some(dir) => dir.join(path),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn clear_cookie_env() {
        unsafe {
            remove_env("LUOGU_CLIENT_ID");
            remove_env("LUOGU_UID");
        }
    }

    #[test]
    fn test_defaults_when_file_is_empty() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_cookie_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("luogu.toml");
        std::fs::write(&path, "").unwrap();

        let config = SessionConfig::load(&path).unwrap();
        assert_eq!(config.base_url, "https://www.luogu.com.cn");
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.backoff_unit_ms, 5_000);
        assert_eq!(config.lockout_wait_secs, 180);
        assert_eq!(config.captcha_path, "lg4/captcha");
        assert!(config.cookies.client_id.is_none());
    }

    #[test]
    fn test_load_overrides_and_cookie_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_cookie_env();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("cookies.json"),
            r#"{"__client_id": "abc123", "_uid": "108_xyz"}"#,
        )
        .unwrap();
        let path = dir.path().join("luogu.toml");
        std::fs::write(
            &path,
            r#"
base_url = "http://127.0.0.1:9000/"
max_retries = 3
cookie_file = "cookies.json"
"#,
        )
        .unwrap();

        let config = SessionConfig::load(&path).unwrap();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base(), "http://127.0.0.1:9000");
        assert_eq!(config.url("/problem/list"), "http://127.0.0.1:9000/problem/list");
        assert_eq!(config.cookies.client_id.as_ref().unwrap().expose(), "abc123");
        assert_eq!(config.cookies.user_id(), Some(108));
        assert_eq!(config.cookie_file.as_deref(), Some(dir.path().join("cookies.json").as_path()));
    }

    #[test]
    fn test_env_overrides_cookie_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("cookies.json"),
            r#"{"__client_id": "from-file", "_uid": "1_a"}"#,
        )
        .unwrap();
        let path = dir.path().join("luogu.toml");
        std::fs::write(&path, "cookie_file = \"cookies.json\"\n").unwrap();

        unsafe { set_env("LUOGU_UID", "42_b") };
        let config = SessionConfig::load(&path).unwrap();
        clear_cookie_env();

        assert_eq!(config.cookies.client_id.as_ref().unwrap().expose(), "from-file");
        assert_eq!(config.cookies.user_id(), Some(42));
    }

    #[test]
    fn test_rejects_bad_values() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("luogu.toml");

        std::fs::write(&path, "base_url = \"ftp://luogu\"\n").unwrap();
        assert!(SessionConfig::load(&path).is_err());

        std::fs::write(&path, "timeout_secs = 0\n").unwrap();
        assert!(SessionConfig::load(&path).is_err());

        std::fs::write(&path, "max_retries = 0\n").unwrap();
        assert!(SessionConfig::load(&path).is_err());
    }

    #[test]
    fn test_missing_cookie_file_is_config_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("luogu.toml");
        std::fs::write(&path, "cookie_file = \"nope.json\"\n").unwrap();

        let err = SessionConfig::load(&path).unwrap_err();
        assert!(matches!(err, common::Error::Config(_)));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(SessionConfig::load(Path::new("/nonexistent/luogu.toml")).is_err());
    }

    #[test]
    fn test_resolve_path_precedence() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("LUOGU_CONFIG", "/etc/luogu/env.toml") };
        assert_eq!(
            SessionConfig::resolve_path(Some("cli.toml")),
            PathBuf::from("cli.toml")
        );
        assert_eq!(
            SessionConfig::resolve_path(None),
            PathBuf::from("/etc/luogu/env.toml")
        );
        unsafe { remove_env("LUOGU_CONFIG") };
        assert_eq!(SessionConfig::resolve_path(None), PathBuf::from("luogu.toml"));
    }
}
