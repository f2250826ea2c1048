//! CAPTCHA challenge seam
//!
//! When the server demands a CAPTCHA, the session downloads the challenge
//! image and hands the bytes to a caller-supplied [`ChallengeSolver`]. The
//! answer is attached under [`CAPTCHA_FIELD`]: in the JSON body of a retried
//! mutating request, in the query string of a retried GET.
//! Solving itself (OCR, a human prompt) lives outside this crate.

use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value as JsonValue};

use crate::error::Result;

/// Body field carrying the solved CAPTCHA text.
pub const CAPTCHA_FIELD: &str = "captcha";

/// Turns a CAPTCHA image into its answer.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn ChallengeSolver>`).
pub trait ChallengeSolver: Send + Sync {
    fn solve<'a>(&'a self, image: Vec<u8>) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

/// Attach a CAPTCHA answer to a request body, creating an object if needed.
///
/// A non-object body is replaced, since the answer cannot be merged into it.
pub fn attach_answer(body: Option<JsonValue>, answer: String) -> JsonValue {
    let mut map = match body {
        Some(JsonValue::Object(map)) => map,
        _ => Map::new(),
    };
    map.insert(CAPTCHA_FIELD.to_owned(), JsonValue::String(answer));
    JsonValue::Object(map)
}
