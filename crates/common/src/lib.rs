//! Common types shared by the Luogu client crates

mod secret;
mod error;

pub use secret::Secret;
pub use error::{Error, Result};
