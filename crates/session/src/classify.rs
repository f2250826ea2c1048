//! Error classification for Luogu responses
//!
//! Maps an HTTP status plus the parsed body onto a [`Classification`]. The
//! effective code is the HTTP status when it is not 2xx, otherwise the body's
//! embedded `code` field. A 403 is further split by the message text: the
//! service reuses 403 for rate limiting, CAPTCHA prompts, a timed lockout,
//! cross-user access and stale anti-forgery tokens.

use serde_json::Value as JsonValue;

/// Template name the service renders when the session is not logged in.
const AUTH_LOGIN_TEMPLATE: &str = "AuthLogin";

/// Message code returned when acting on another user's resource.
const NOT_SELF_PATTERNS: &[&str] = &["user.not_self"];

const TOO_FREQUENT_PATTERNS: &[&str] = &["请求频繁", "too frequent", "too many requests"];

const CAPTCHA_PATTERNS: &[&str] = &["验证码", "captcha"];

/// The service locks an account out for three minutes after repeated abuse.
const LOCKOUT_PATTERNS: &[&str] = &["3 分钟", "3分钟", "三分钟", "3 minutes"];

/// Result of inspecting one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Success,
    /// Login redirect, 401, or 403 "not yourself".
    Authentication(String),
    /// 403 carrying the "too frequent" message.
    TooFrequent,
    /// HTTP 429.
    RateLimited,
    /// 403 asking for a CAPTCHA answer.
    ChallengeRequired,
    /// 403 carrying the three-minute lockout message.
    Lockout,
    /// Any other 403; usually an expired anti-forgery token.
    StaleToken(String),
    /// 404, or embedded code 404/418.
    NotFound(String),
    /// HTTP 5xx.
    Server(u16),
    /// Any other failure, including an unparseable success body.
    Request(String),
}

impl Classification {
    /// Label for retry metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Success => "success",
            Classification::Authentication(_) => "authentication",
            Classification::TooFrequent => "too_frequent",
            Classification::RateLimited => "rate_limited",
            Classification::ChallengeRequired => "challenge",
            Classification::Lockout => "lockout",
            Classification::StaleToken(_) => "stale_token",
            Classification::NotFound(_) => "not_found",
            Classification::Server(_) => "server",
            Classification::Request(_) => "request",
        }
    }
}

/// Classify a response by HTTP status, raw body text and parsed JSON body.
///
/// `json` is `None` when the body is not valid JSON. Pattern checks run
/// case-insensitively over the raw text so messages are found whichever
/// envelope key carries them.
pub fn classify(status: u16, text: &str, json: Option<&JsonValue>) -> Classification {
    if let Some(body) = json
        && body.get("currentTemplate").and_then(JsonValue::as_str) == Some(AUTH_LOGIN_TEMPLATE)
    {
        return Classification::Authentication("login required".into());
    }

    let success = (200..300).contains(&status);
    let code = if success {
        json.and_then(embedded_code).filter(|c| *c != 200)
    } else {
        Some(u64::from(status))
    };

    let message = json.and_then(error_message);

    match code {
        None if success && json.is_none() => {
            Classification::Request("response body is not valid JSON".into())
        }
        None => Classification::Success,
        Some(401) => Classification::Authentication(or_default(message, "HTTP 401")),
        Some(403) => classify_403(text, message),
        Some(404 | 418) => Classification::NotFound(or_default(message, "resource not found")),
        Some(429) => Classification::RateLimited,
        Some(c @ 500..=599) => Classification::Server(c as u16),
        Some(c) if c < 400 => Classification::Success,
        Some(c) => Classification::Request(format!("HTTP {c}: {}", message.unwrap_or_default())),
    }
}

/// Split a 403 by message. Order matters: "not yourself" is an auth failure
/// even when the text also mentions frequency.
///
/// Patterns are matched against the extracted error message; the raw body is
/// only scanned when the response carries no message field.
pub fn classify_403(text: &str, message: Option<String>) -> Classification {
    let lower = message.as_deref().unwrap_or(text).to_lowercase();
    let matches = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

    if matches(NOT_SELF_PATTERNS) {
        Classification::Authentication("not yourself".into())
    } else if matches(TOO_FREQUENT_PATTERNS) {
        Classification::TooFrequent
    } else if matches(CAPTCHA_PATTERNS) {
        Classification::ChallengeRequired
    } else if matches(LOCKOUT_PATTERNS) {
        Classification::Lockout
    } else {
        Classification::StaleToken(or_default(message, "HTTP 403"))
    }
}

fn embedded_code(body: &JsonValue) -> Option<u64> {
    body.get("code").and_then(JsonValue::as_u64)
}

/// First error message found at the top level or inside an envelope.
fn error_message(body: &JsonValue) -> Option<String> {
    let candidates = [
        body.get("errorMessage"),
        body.pointer("/currentData/errorMessage"),
        body.pointer("/data/errorMessage"),
        body.get("message"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(JsonValue::as_str)
        .map(str::to_owned)
}

fn or_default(message: Option<String>, fallback: &str) -> String {
    message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| fallback.to_owned())
}
