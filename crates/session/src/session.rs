//! Async session: transport, cookie jar, token lifecycle and retries

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue, REFERER, SET_COOKIE};
use schema::{Record, Registry};
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::challenge::{self, ChallengeSolver};
use crate::classify::{Classification, classify};
use crate::config::SessionConfig;
use crate::cookies::Cookies;
use crate::error::{Error, Result};
use crate::machine::{CallAction, CallContext, CallEvent, CallState, handle_event};
use crate::metrics;
use crate::request::{Request, preview, unwrap_envelope};
use crate::token::{self, CachedToken, TokenCache};

const TOKEN_HEADER: &str = "x-csrf-token";

/// Markers asking the server for the JSON payload instead of the HTML shell.
const CONTENT_ONLY_HEADERS: &[(&str, &str)] = &[
    ("x-luogu-type", "content-only"),
    ("x-lentille-request", "content-only"),
];

fn new_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().as_simple())
}

/// Long-lived client for one credential set.
///
/// Cloning is cheap and clones share the cookie jar, the token cache and the
/// connection pool, so one session can serve many concurrent calls.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    client: reqwest::Client,
    config: SessionConfig,
    registry: Arc<Registry>,
    cookies: RwLock<Cookies>,
    tokens: TokenCache,
    solver: Option<Arc<dyn ChallengeSolver>>,
}

/// What one send attempt produced.
enum Attempt {
    Responded {
        classification: Classification,
        json: Option<JsonValue>,
    },
    TimedOut(String),
    Failed(String),
}

impl Session {
    /// Build a session from validated config. Cookies come from `config.cookies`.
    pub fn new(config: SessionConfig, registry: Arc<Registry>) -> Result<Self> {
        Self::build(config, registry, None)
    }

    /// Build a session that answers CAPTCHA challenges with `solver`.
    pub fn with_solver(
        config: SessionConfig,
        registry: Arc<Registry>,
        solver: Arc<dyn ChallengeSolver>,
    ) -> Result<Self> {
        Self::build(config, registry, Some(solver))
    }

    fn build(
        config: SessionConfig,
        registry: Arc<Registry>,
        solver: Option<Arc<dyn ChallengeSolver>>,
    ) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Request(format!("building HTTP client: {e}")))?;

        info!(
            base_url = %config.base(),
            max_retries = config.max_retries,
            user_id = ?config.cookies.user_id(),
            "session created"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                cookies: RwLock::new(config.cookies.clone()),
                config,
                registry,
                tokens: TokenCache::new(),
                solver,
            }),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    /// Snapshot of the cookie jar, including values absorbed from responses.
    pub async fn cookies(&self) -> Cookies {
        self.inner.cookies.read().await.clone()
    }

    pub async fn set_cookies(&self, cookies: Cookies) {
        *self.inner.cookies.write().await = cookies;
    }

    /// Numeric id of the logged-in user, from the `_uid` cookie.
    pub async fn user_id(&self) -> Option<u64> {
        self.inner.cookies.read().await.user_id()
    }

    /// Send a call and decode the unwrapped payload with `schema`.
    pub async fn call(&self, request: Request, schema: &str) -> Result<Record> {
        let payload = self.send(request).await?;
        Ok(self.inner.registry.decode(schema, &payload)?)
    }

    /// Send a call through the retry state machine and return the payload
    /// with its envelope removed.
    #[instrument(skip_all, fields(request_id = %new_request_id(), method = %request.method(), endpoint = %request.endpoint()))]
    pub async fn send(&self, mut request: Request) -> Result<JsonValue> {
        let inner = &self.inner;
        let mutating = request.is_mutating();
        let ctx = CallContext::new(&inner.config, mutating, inner.solver.is_some());
        let method = request.method().as_str().to_owned();

        if mutating {
            info!(payload = %preview(request.body()), "sending mutating request");
        } else {
            info!(query = ?request.query_params(), "sending request");
        }

        let mut body = request.body().cloned();
        let mut token = if mutating {
            inner.tokens.current().await
        } else {
            None
        };
        let mut payload: Option<JsonValue> = None;
        let mut last_reason = "";

        let mut state = CallState::Anonymous;
        let mut event = CallEvent::Start {
            token_cached: token.is_some(),
        };

        loop {
            let (next, action) = handle_event(state, event, &ctx);
            state = next;

            event = match action {
                CallAction::FetchToken => match self.ensure_token().await {
                    Ok(t) => {
                        token = Some(t);
                        CallEvent::TokenReady
                    }
                    Err(e) => CallEvent::TokenFailed(e),
                },

                CallAction::Send { attempt } => {
                    if attempt > 0 {
                        metrics::record_retry(last_reason);
                        warn!(attempt = attempt + 1, reason = last_reason, "retrying request");
                    }
                    match self
                        .attempt(&request, body.as_ref(), token.as_ref())
                        .await
                    {
                        Attempt::Responded {
                            classification,
                            json,
                        } => {
                            last_reason = classification.label();
                            if classification == Classification::Success {
                                payload = json;
                            }
                            CallEvent::Responded(classification)
                        }
                        Attempt::TimedOut(e) => {
                            last_reason = "timeout";
                            warn!(attempt = attempt + 1, error = %e, "request timed out");
                            CallEvent::TimedOut
                        }
                        Attempt::Failed(e) => CallEvent::TransportFailed(e),
                    }
                }

                CallAction::Wait(delay) => {
                    if let Some(cause) = state.cause() {
                        debug!(delay_ms = delay.as_millis() as u64, cause = %cause, "backing off");
                    }
                    tokio::time::sleep(delay).await;
                    CallEvent::Recovered
                }

                CallAction::RefreshToken => {
                    if let Some(cause) = state.cause() {
                        warn!(cause = %cause, "anti-forgery token rejected, refreshing");
                    }
                    let stale = token.as_ref().map_or(0, |t| t.generation);
                    match self.refresh_token(stale).await {
                        Ok(t) => {
                            token = Some(t);
                            CallEvent::Recovered
                        }
                        Err(e) => CallEvent::RecoveryFailed(e),
                    }
                }

                CallAction::SolveChallenge => match self.solve_challenge().await {
                    Ok(answer) => {
                        // GET and HEAD never carry a body
                        if mutating {
                            body = Some(challenge::attach_answer(body.take(), answer));
                        } else {
                            request.set_query(challenge::CAPTCHA_FIELD, answer);
                        }
                        CallEvent::Recovered
                    }
                    Err(e) => CallEvent::RecoveryFailed(e),
                },

                CallAction::Complete => {
                    metrics::record_request(&method, "success");
                    let payload = payload.take().unwrap_or(JsonValue::Null);
                    return Ok(unwrap_envelope(payload));
                }

                CallAction::Fail(e) => {
                    metrics::record_request(&method, e.kind());
                    error!(error = %e, "request failed");
                    return Err(e);
                }

                CallAction::None => {
                    metrics::record_request(&method, "request");
                    return Err(Error::Request(format!(
                        "no transition from call state {state:?}"
                    )));
                }
            };
        }
    }

    /// Transmit one attempt and classify the response.
    async fn attempt(
        &self,
        request: &Request,
        body: Option<&JsonValue>,
        token: Option<&CachedToken>,
    ) -> Attempt {
        let inner = &self.inner;
        let url = inner.config.url(request.endpoint());

        let mut builder = inner
            .client
            .request(request.method().clone(), &url)
            .headers(self.headers(request.is_mutating(), token).await);
        if !request.query_params().is_empty() {
            builder = builder.query(request.query_params());
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Attempt::TimedOut(e.to_string()),
            Err(e) => return Attempt::Failed(format!("HTTP request to {url} failed: {e}")),
        };

        let status = response.status().as_u16();
        self.absorb_cookies(response.headers()).await;

        let text = match response.text().await {
            Ok(t) => t,
            Err(e) if e.is_timeout() => return Attempt::TimedOut(e.to_string()),
            Err(e) => return Attempt::Failed(format!("reading response body: {e}")),
        };

        let json = serde_json::from_str::<JsonValue>(&text).ok();
        let classification = classify(status, &text, json.as_ref());
        debug!(status, outcome = classification.label(), "response received");

        Attempt::Responded {
            classification,
            json,
        }
    }

    async fn headers(&self, mutating: bool, token: Option<&CachedToken>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in CONTENT_ONLY_HEADERS {
            headers.insert(*name, HeaderValue::from_static(*value));
        }

        if let Some(cookie) = self.inner.cookies.read().await.header_value() {
            match HeaderValue::from_str(&cookie) {
                Ok(v) => {
                    headers.insert(COOKIE, v);
                }
                Err(e) => warn!(error = %e, "skipping invalid cookie header"),
            }
        }

        if mutating {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            let referer = format!("{}/", self.inner.config.base());
            if let Ok(v) = HeaderValue::from_str(&referer) {
                headers.insert(REFERER, v);
            }
            if let Some(token) = token {
                match HeaderValue::from_str(token.value.expose()) {
                    Ok(v) => {
                        headers.insert(HeaderName::from_static(TOKEN_HEADER), v);
                    }
                    Err(e) => warn!(error = %e, "skipping invalid anti-forgery token"),
                }
            }
        }
        headers
    }

    async fn absorb_cookies(&self, headers: &HeaderMap) {
        let values: Vec<&str> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        self.absorb_set_cookies(values).await;
    }

    async fn absorb_set_cookies<'a>(&self, values: impl IntoIterator<Item = &'a str>) {
        let mut values = values.into_iter().peekable();
        if values.peek().is_none() {
            return;
        }
        let mut jar = self.inner.cookies.write().await;
        for value in values {
            if jar.absorb(value) {
                debug!("session cookie updated from response");
            }
        }
    }

    /// Cached token, fetching it once across concurrent callers.
    async fn ensure_token(&self) -> Result<CachedToken> {
        self.inner
            .tokens
            .get_or_fetch(|| self.fetch_token_value())
            .await
    }

    async fn refresh_token(&self, stale: u64) -> Result<CachedToken> {
        self.inner
            .tokens
            .refresh(stale, || self.fetch_token_value())
            .await
    }

    async fn fetch_token_value(&self) -> Result<String> {
        let cookie = self.inner.cookies.read().await.header_value();
        let fetched = token::fetch_token(&self.inner.client, &self.inner.config, cookie.as_deref()).await?;
        self.absorb_set_cookies(fetched.set_cookies.iter().map(String::as_str))
            .await;
        Ok(fetched.value)
    }

    /// Download the CAPTCHA image and ask the solver for its text.
    async fn solve_challenge(&self) -> Result<String> {
        let inner = &self.inner;
        let solver = inner.solver.as_ref().ok_or(Error::ChallengeRequired)?;
        let url = inner.config.url(&inner.config.captcha_path);

        let mut builder = inner.client.get(&url);
        if let Some(cookie) = inner.cookies.read().await.header_value() {
            builder = builder.header(COOKIE, cookie);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| Error::Request(format!("fetching challenge image: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Request(format!(
                "challenge image returned {}",
                response.status()
            )));
        }
        self.absorb_cookies(response.headers()).await;
        let image = response
            .bytes()
            .await
            .map_err(|e| Error::Request(format!("reading challenge image: {e}")))?;

        info!(bytes = image.len(), "solving challenge");
        solver.solve(image.to_vec()).await
    }
}
