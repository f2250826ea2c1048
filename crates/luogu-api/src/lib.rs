//! Luogu record schemas and endpoint wrappers
//!
//! [`registry`] declares every record type the wrappers decode. Wrappers on
//! [`LuoguClient`] are thin: build a request, send it through the session,
//! decode the payload with one schema.

pub mod client;
pub mod error;
pub mod schemas;

pub use client::{LuoguClient, TransferTarget};
pub use error::{Error, Result};
pub use schemas::{list_params, problem_list_params, registry};
