//! Cookie jar and cookie file storage
//!
//! The service authenticates with exactly two cookies: `__client_id` and
//! `_uid`. The jar renders them into a `Cookie` header and absorbs updated
//! values from `Set-Cookie` responses. [`CookieStore`] persists the jar as a
//! JSON object; all writes use atomic temp-file + rename and 0600 permissions.

use std::path::{Path, PathBuf};

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const CLIENT_ID_COOKIE: &str = "__client_id";
pub const UID_COOKIE: &str = "_uid";

/// The two session cookies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cookies {
    #[serde(rename = "__client_id", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Secret<String>>,
    /// `<uid>_<suffix>`
    #[serde(rename = "_uid", default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Secret<String>>,
}

impl Cookies {
    pub fn new(client_id: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            client_id: Some(Secret::new(client_id.into())),
            uid: Some(Secret::new(uid.into())),
        }
    }

    pub fn from_json(json: &str) -> common::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Numeric user id: the part of `_uid` before the first `_`.
    pub fn user_id(&self) -> Option<u64> {
        let uid = self.uid.as_ref()?.expose();
        uid.split('_').next()?.parse().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.client_id.is_none() && self.uid.is_none()
    }

    /// `Cookie` header value, or `None` when the jar is empty.
    pub fn header_value(&self) -> Option<String> {
        let pairs: Vec<String> = [
            (CLIENT_ID_COOKIE, self.client_id.as_ref()),
            (UID_COOKIE, self.uid.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| format!("{name}={}", v.expose())))
        .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Absorb one `Set-Cookie` header. Returns true when a tracked cookie changed.
    pub fn absorb(&mut self, set_cookie: &str) -> bool {
        let pair = set_cookie.split(';').next().unwrap_or_default();
        let Some((name, value)) = pair.split_once('=') else {
            return false;
        };
        let value = value.trim();
        if value.is_empty() {
            return false;
        }

        let slot = match name.trim() {
            CLIENT_ID_COOKIE => &mut self.client_id,
            UID_COOKIE => &mut self.uid,
            _ => return false,
        };
        if slot.as_ref().is_some_and(|current| current.expose() == value) {
            return false;
        }
        *slot = Some(Secret::new(value.to_owned()));
        true
    }
}

/// Thread-safe cookie file manager.
pub struct CookieStore {
    path: PathBuf,
    state: Mutex<Cookies>,
}

impl CookieStore {
    /// Load cookies from the given file path.
    ///
    /// A missing file is an empty jar; it is created on the first save.
    pub async fn load(path: PathBuf) -> common::Result<Self> {
        let cookies = if tokio::fs::try_exists(&path).await? {
            let contents = tokio::fs::read_to_string(&path).await?;
            let cookies = Cookies::from_json(&contents)?;
            info!(path = %path.display(), user_id = ?cookies.user_id(), "loaded cookies");
            cookies
        } else {
            info!(path = %path.display(), "cookie file not found, starting with empty jar");
            Cookies::default()
        };

        Ok(Self {
            path,
            state: Mutex::new(cookies),
        })
    }

    pub async fn get(&self) -> Cookies {
        self.state.lock().await.clone()
    }

    /// Replace the stored cookies and persist to disk.
    pub async fn update(&self, cookies: Cookies) -> common::Result<()> {
        let mut state = self.state.lock().await;
        *state = cookies;
        write_atomic(&self.path, &state).await
    }

    /// Persist the current in-memory state to disk.
    pub async fn save(&self) -> common::Result<()> {
        let state = self.state.lock().await;
        write_atomic(&self.path, &state).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write cookies to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets file permissions to 0600 since the file holds session
/// credentials.
async fn write_atomic(path: &Path, cookies: &Cookies) -> common::Result<()> {
    let json = serde_json::to_string_pretty(cookies)?;

    let dir = path
        .parent()
        .ok_or_else(|| common::Error::Config("cookie path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".cookies.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes()).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms).await?;
    }

    tokio::fs::rename(&tmp_path, path).await?;

    debug!(path = %path.display(), "persisted cookies");
    Ok(())
}
