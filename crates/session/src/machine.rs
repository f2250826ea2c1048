//! Per-call retry state machine
//!
//! Pure state machine: receives events, returns (new_state, action).
//! The session executes the I/O implied by each action and reports the
//! result as the next event. No I/O happens here, so every retry path is
//! unit-testable without a server.
//!
//! ```text
//! Anonymous ──(mutating, no token)──▶ TokenFetching ──▶ Ready(0)
//! Anonymous ──────────────────────────────────────────▶ Ready(0)
//! Ready(n) ──transient──▶ Degraded(n) ──recovered──▶ Ready(n+1)
//! Ready(n) ──success | terminal | budget spent──▶ Done
//! ```

use std::time::Duration;

use crate::classify::Classification;
use crate::config::SessionConfig;
use crate::error::Error;

/// Per-call parameters the transitions depend on.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Mutating calls carry the anti-forgery token.
    pub mutating: bool,
    /// Total attempts allowed for one call.
    pub max_attempts: u32,
    pub has_solver: bool,
    pub backoff_unit: Duration,
    pub timeout_wait: Duration,
    pub lockout_wait: Duration,
}

impl CallContext {
    pub fn new(config: &SessionConfig, mutating: bool, has_solver: bool) -> Self {
        Self {
            mutating,
            max_attempts: config.max_retries,
            has_solver,
            backoff_unit: Duration::from_millis(config.backoff_unit_ms),
            timeout_wait: Duration::from_millis(config.timeout_wait_ms),
            lockout_wait: Duration::from_secs(config.lockout_wait_secs),
        }
    }
}

#[derive(Debug)]
pub enum CallState {
    /// Call not started yet
    Anonymous,
    /// Waiting for the shared anti-forgery token
    TokenFetching,
    /// Request for `attempt` is in flight
    Ready { attempt: u32, token_refreshed: bool },
    /// Recovering from a transient failure before the next attempt
    Degraded {
        attempt: u32,
        token_refreshed: bool,
        cause: Error,
    },
    /// Terminal
    Done,
}

#[derive(Debug)]
pub enum CallEvent {
    Start { token_cached: bool },
    TokenReady,
    TokenFailed(Error),
    Responded(Classification),
    /// Transport timeout while sending or reading the body
    TimedOut,
    /// Any other transport failure
    TransportFailed(String),
    /// Wait elapsed, token refreshed or challenge answered
    Recovered,
    RecoveryFailed(Error),
}

#[derive(Debug)]
pub enum CallAction {
    FetchToken,
    Send { attempt: u32 },
    Wait(Duration),
    RefreshToken,
    SolveChallenge,
    Complete,
    Fail(Error),
    /// No-op
    None,
}

impl CallState {
    /// Failure being recovered from, while `Degraded`.
    pub fn cause(&self) -> Option<&Error> {
        match self {
            CallState::Degraded { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

/// Handle a state transition. Pure function: no I/O.
pub fn handle_event(state: CallState, event: CallEvent, ctx: &CallContext) -> (CallState, CallAction) {
    match (state, event) {
        // --- Anonymous ---
        (CallState::Anonymous, CallEvent::Start { token_cached }) => {
            if ctx.mutating && !token_cached {
                (CallState::TokenFetching, CallAction::FetchToken)
            } else {
                send(0, false)
            }
        }

        // --- TokenFetching ---
        (CallState::TokenFetching, CallEvent::TokenReady) => send(0, false),
        (CallState::TokenFetching, CallEvent::TokenFailed(e)) => (CallState::Done, CallAction::Fail(e)),

        // --- Ready ---
        (CallState::Ready { .. }, CallEvent::Responded(Classification::Success)) => {
            (CallState::Done, CallAction::Complete)
        }

        (
            CallState::Ready {
                attempt,
                token_refreshed,
            },
            CallEvent::Responded(classification),
        ) => on_failure(attempt, token_refreshed, classification, ctx),

        (
            CallState::Ready {
                attempt,
                token_refreshed,
            },
            CallEvent::TimedOut,
        ) => degrade(
            attempt,
            token_refreshed,
            Error::Request("transport timeout".into()),
            CallAction::Wait(ctx.timeout_wait),
            ctx,
        ),

        (CallState::Ready { .. }, CallEvent::TransportFailed(e)) => {
            (CallState::Done, CallAction::Fail(Error::Request(e)))
        }

        // --- Degraded ---
        (
            CallState::Degraded {
                attempt,
                token_refreshed,
                ..
            },
            CallEvent::Recovered,
        ) => send(attempt + 1, token_refreshed),

        (CallState::Degraded { .. }, CallEvent::RecoveryFailed(e)) => {
            (CallState::Done, CallAction::Fail(e))
        }

        // --- Invalid/unhandled transition: stay in current state ---
        (state, _event) => (state, CallAction::None),
    }
}

fn send(attempt: u32, token_refreshed: bool) -> (CallState, CallAction) {
    (
        CallState::Ready {
            attempt,
            token_refreshed,
        },
        CallAction::Send { attempt },
    )
}

fn on_failure(
    attempt: u32,
    token_refreshed: bool,
    classification: Classification,
    ctx: &CallContext,
) -> (CallState, CallAction) {
    // Backoff grows with the attempt index; the first retry goes out at once
    let backoff = ctx.backoff_unit.checked_mul(attempt).unwrap_or(Duration::MAX);

    match classification {
        Classification::RateLimited => degrade(
            attempt,
            token_refreshed,
            Error::RateLimitExceeded("HTTP 429".into()),
            CallAction::Wait(backoff),
            ctx,
        ),
        Classification::TooFrequent => degrade(
            attempt,
            token_refreshed,
            Error::RateLimitExceeded("request too frequent".into()),
            CallAction::Wait(backoff),
            ctx,
        ),
        Classification::Lockout => degrade(
            attempt,
            token_refreshed,
            Error::RateLimitExceeded("temporarily locked out".into()),
            CallAction::Wait(ctx.lockout_wait),
            ctx,
        ),
        Classification::StaleToken(message) if ctx.mutating && !token_refreshed => degrade(
            attempt,
            true,
            Error::Forbidden(message),
            CallAction::RefreshToken,
            ctx,
        ),
        Classification::StaleToken(message) => (CallState::Done, CallAction::Fail(Error::Forbidden(message))),
        Classification::ChallengeRequired if ctx.has_solver => degrade(
            attempt,
            token_refreshed,
            Error::ChallengeRequired,
            CallAction::SolveChallenge,
            ctx,
        ),
        Classification::ChallengeRequired => (CallState::Done, CallAction::Fail(Error::ChallengeRequired)),
        Classification::Authentication(message) => {
            (CallState::Done, CallAction::Fail(Error::Authentication(message)))
        }
        Classification::NotFound(message) => (CallState::Done, CallAction::Fail(Error::NotFound(message))),
        Classification::Server(status) => (CallState::Done, CallAction::Fail(Error::Server { status })),
        Classification::Request(message) => (CallState::Done, CallAction::Fail(Error::Request(message))),
        Classification::Success => (CallState::Done, CallAction::Complete),
    }
}

/// Enter `Degraded`, or fail with `RetriesExhausted` when no attempt is left.
fn degrade(
    attempt: u32,
    token_refreshed: bool,
    cause: Error,
    action: CallAction,
    ctx: &CallContext,
) -> (CallState, CallAction) {
    if attempt + 1 >= ctx.max_attempts {
        return (
            CallState::Done,
            CallAction::Fail(Error::RetriesExhausted {
                attempts: attempt + 1,
                last: Box::new(cause),
            }),
        );
    }
    (
        CallState::Degraded {
            attempt,
            token_refreshed,
            cause,
        },
        action,
    )
}
