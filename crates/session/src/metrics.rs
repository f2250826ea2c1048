//! Session metrics
//!
//! Counters emitted through the `metrics` facade. The library installs no
//! recorder; without one every call is a no-op.
//!
//! - `luogu_requests_total` (counter): labels `method`, `outcome`
//! - `luogu_retries_total` (counter): label `reason`
//! - `luogu_token_fetches_total` (counter): label `result`

/// Record a finished call. `outcome` is `success` or an error kind.
pub fn record_request(method: &str, outcome: &str) {
    metrics::counter!("luogu_requests_total", "method" => method.to_string(), "outcome" => outcome.to_string())
        .increment(1);
}

/// Record one retry with the classification that caused it.
pub fn record_retry(reason: &str) {
    metrics::counter!("luogu_retries_total", "reason" => reason.to_string()).increment(1);
}

/// Record an anti-forgery token fetch result.
pub fn record_token_fetch(result: &str) {
    metrics::counter!("luogu_token_fetches_total", "result" => result.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_request("GET", "success");
        record_retry("rate_limited");
        record_token_fetch("success");
    }
}
