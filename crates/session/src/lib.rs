//! Resilient session for the Luogu browser API
//!
//! A [`Session`] owns the cookie jar, the anti-forgery token and the per-call
//! retry state machine. Calls are driven through [`machine::handle_event`]:
//! the session performs the I/O implied by each action and feeds the result
//! back as the next event until the call completes or fails.
//!
//! Two modes share one implementation: [`Session`] for concurrent async use
//! and [`BlockingSession`] for single-call-at-a-time callers.
//!
//! Mutating calls are not idempotent under retry. A request that timed out
//! may already have been applied by the server and is resent verbatim.

pub mod blocking;
pub mod challenge;
pub mod classify;
pub mod config;
pub mod cookies;
pub mod error;
pub mod machine;
pub mod metrics;
pub mod request;
pub mod session;
pub mod token;

pub use blocking::BlockingSession;
pub use challenge::ChallengeSolver;
pub use classify::{Classification, classify};
pub use config::SessionConfig;
pub use cookies::{CookieStore, Cookies};
pub use error::{Error, Result};
pub use request::{Method, Request, unwrap_envelope};
pub use session::Session;
