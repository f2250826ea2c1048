//! Anti-forgery token fetch and cache
//!
//! Mutating calls need the `x-csrf-token` value that the site embeds as
//! `<meta name="csrf-token" content="...">` in its HTML shell. The token is
//! fetched lazily on the first mutating call and replaced when the server
//! rejects it.
//!
//! Fetches are single-flight: [`TokenCache`] serializes them behind a tokio
//! Mutex and tags every token with a generation number. A caller that saw a
//! stale token asks for a refresh of that generation; if another caller has
//! already replaced it, the newer token is reused instead of fetching again.

use std::future::Future;
use std::time::Duration;

use common::Secret;
use reqwest::header::{REFERER, SET_COOKIE};
use scraper::{Html, Selector};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::metrics;

const TOKEN_SELECTOR: &str = r#"meta[name="csrf-token"]"#;

/// A cached token and the generation it was stored under.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub value: Secret<String>,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct TokenState {
    token: Option<Secret<String>>,
    generation: u64,
}

/// Shared token slot with single-flight refresh.
#[derive(Debug, Default)]
pub struct TokenCache {
    state: RwLock<TokenState>,
    refresh: Mutex<()>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<CachedToken> {
        let state = self.state.read().await;
        state.token.as_ref().map(|value| CachedToken {
            value: value.clone(),
            generation: state.generation,
        })
    }

    /// Return the cached token, running `fetch` only if none is cached.
    ///
    /// Concurrent callers wait for the one in-flight fetch and share its result.
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<CachedToken>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        if let Some(token) = self.current().await {
            return Ok(token);
        }

        let _guard = self.refresh.lock().await;
        // Another caller may have fetched while we waited for the lock
        if let Some(token) = self.current().await {
            return Ok(token);
        }
        let value = fetch().await?;
        Ok(self.store(value).await)
    }

    /// Replace the token of generation `stale`.
    ///
    /// If the cached generation already moved past `stale`, the newer token
    /// is returned without fetching.
    pub async fn refresh<F, Fut>(&self, stale: u64, fetch: F) -> Result<CachedToken>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let _guard = self.refresh.lock().await;
        if let Some(token) = self.current().await
            && token.generation != stale
        {
            debug!(generation = token.generation, "token already refreshed by another call");
            return Ok(token);
        }
        let value = fetch().await?;
        Ok(self.store(value).await)
    }

    async fn store(&self, value: String) -> CachedToken {
        let mut state = self.state.write().await;
        state.generation += 1;
        let value = Secret::new(value);
        state.token = Some(value.clone());
        CachedToken {
            value,
            generation: state.generation,
        }
    }
}

/// Raw result of one token fetch: the token plus any cookies the page set.
#[derive(Debug)]
pub struct FetchedToken {
    pub value: String,
    pub set_cookies: Vec<String>,
}

/// GET the base address and extract the anti-forgery token.
///
/// Timeouts and pages without the meta tag are retried up to
/// `max_retries` times; any other HTTP failure fails immediately.
pub async fn fetch_token(
    client: &reqwest::Client,
    config: &SessionConfig,
    cookie_header: Option<&str>,
) -> Result<FetchedToken> {
    let wait = Duration::from_millis(config.token_retry_wait_ms);
    let url = format!("{}/", config.base());

    for attempt in 0..config.max_retries {
        if attempt > 0 {
            tokio::time::sleep(wait).await;
        }

        let mut request = client
            .get(&url)
            .header(REFERER, config.base())
            .header(reqwest::header::CONTENT_TYPE, "text/html");
        if let Some(cookie) = cookie_header {
            request = request.header(reqwest::header::COOKIE, cookie);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!(attempt = attempt + 1, error = %e, "token fetch timed out");
                continue;
            }
            Err(e) => {
                metrics::record_token_fetch("error");
                return Err(Error::Request(format!("token fetch failed: {e}")));
            }
        };

        let status = response.status();
        if !status.is_success() {
            metrics::record_token_fetch("error");
            return Err(Error::Request(format!("token page returned {status}")));
        }

        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_owned)
            .collect();

        let html = match response.text().await {
            Ok(html) => html,
            Err(e) if e.is_timeout() => {
                warn!(attempt = attempt + 1, error = %e, "token page read timed out");
                continue;
            }
            Err(e) => {
                metrics::record_token_fetch("error");
                return Err(Error::Request(format!("reading token page: {e}")));
            }
        };

        match parse_token(&html) {
            Some(value) => {
                info!(attempt = attempt + 1, "anti-forgery token fetched");
                metrics::record_token_fetch("success");
                return Ok(FetchedToken { value, set_cookies });
            }
            None => warn!(attempt = attempt + 1, "anti-forgery token not found in page, retrying"),
        }
    }

    metrics::record_token_fetch("exhausted");
    Err(Error::Request(format!(
        "failed to fetch anti-forgery token after {} attempts",
        config.max_retries
    )))
}

/// Extract the `content` of `<meta name="csrf-token">` from an HTML page.
pub fn parse_token(html: &str) -> Option<String> {
    let selector = Selector::parse(TOKEN_SELECTOR).ok()?;
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .filter(|content| !content.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn parse_token_finds_meta_content() {
        let html = r#"<!DOCTYPE html><html><head>
            <meta charset="utf-8">
            <meta name="csrf-token" content="1700000000:abcDEF==">
            </head><body></body></html>"#;
        assert_eq!(parse_token(html).as_deref(), Some("1700000000:abcDEF=="));
    }

    #[test]
    fn parse_token_missing_or_empty() {
        assert_eq!(parse_token("<html><head></head></html>"), None);
        assert_eq!(
            parse_token(r#"<html><head><meta name="csrf-token" content=""></head></html>"#),
            None
        );
        assert_eq!(
            parse_token(r#"<html><head><meta name="csrf-token"></head></html>"#),
            None
        );
    }

    #[tokio::test]
    async fn get_or_fetch_caches() {
        let cache = TokenCache::new();
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let token = cache
                .get_or_fetch(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("tok".to_string())
                })
                .await
                .unwrap();
            assert_eq!(token.value.expose(), "tok");
            assert_eq!(token.generation, 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_get_or_fetch_is_single_flight() {
        let cache = Arc::new(TokenCache::new());
        let calls = Arc::new(AtomicU32::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_fetch(|| async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok("shared".to_string())
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().value.expose(), "shared");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_skips_when_generation_moved() {
        let cache = TokenCache::new();
        let first = cache
            .get_or_fetch(|| async { Ok("one".to_string()) })
            .await
            .unwrap();

        let second = cache
            .refresh(first.generation, || async { Ok("two".to_string()) })
            .await
            .unwrap();
        assert_eq!(second.value.expose(), "two");
        assert_eq!(second.generation, 2);

        // A caller still holding generation 1 reuses "two"
        let third = cache
            .refresh(first.generation, || async { Ok("three".to_string()) })
            .await
            .unwrap();
        assert_eq!(third.value.expose(), "two");
        assert_eq!(third.generation, 2);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_cache_empty() {
        let cache = TokenCache::new();
        let err = cache
            .get_or_fetch(|| async { Err(Error::Request("down".into())) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Request(_)));
        assert!(cache.current().await.is_none());
    }
}
