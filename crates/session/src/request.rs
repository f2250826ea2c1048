//! Request description and response envelope handling

use serde_json::Value as JsonValue;

pub use reqwest::Method;

/// Envelope keys unwrapped in order before decoding.
const ENVELOPE_KEYS: &[&str] = &["currentData", "data"];

/// One logical call: method, endpoint relative to the base address, query
/// parameters and an optional JSON body.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    endpoint: String,
    query: Vec<(String, String)>,
    body: Option<JsonValue>,
}

impl Request {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Append pre-rendered pairs, e.g. from `Registry::encode_query`.
    pub fn query_pairs(mut self, pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    /// Set `key` to `value`, replacing an earlier pair with the same key.
    pub fn set_query(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        match self.query.iter_mut().find(|(k, _)| k == key) {
            Some(pair) => pair.1 = value,
            None => self.query.push((key.to_owned(), value)),
        }
    }

    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn query_params(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&JsonValue> {
        self.body.as_ref()
    }

    /// Anything but GET and HEAD needs the anti-forgery token.
    pub fn is_mutating(&self) -> bool {
        !matches!(self.method, Method::GET | Method::HEAD)
    }
}

/// Strip the `currentData` and then the `data` wrapper when present and
/// non-null.
pub fn unwrap_envelope(mut value: JsonValue) -> JsonValue {
    for key in ENVELOPE_KEYS {
        if let Some(inner) = value.get_mut(*key)
            && !inner.is_null()
        {
            value = inner.take();
        }
    }
    value
}

/// Payload preview for logs: at most 50 characters.
pub(crate) fn preview(body: Option<&JsonValue>) -> String {
    const LIMIT: usize = 50;
    let text = body.map_or_else(|| "null".to_owned(), JsonValue::to_string);
    if text.chars().count() <= LIMIT {
        text
    } else {
        let mut cut: String = text.chars().take(LIMIT).collect();
        cut.push_str("...");
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_collects_parts() {
        let request = Request::get("problem/list")
            .query("page", 1)
            .query("keyword", "A+B")
            .query_pairs([("type".to_string(), "P".to_string())]);
        assert_eq!(request.endpoint(), "problem/list");
        assert_eq!(request.query_params().len(), 3);
        assert_eq!(request.query_params()[0], ("page".into(), "1".into()));
        assert!(!request.is_mutating());
        assert!(request.body().is_none());
    }

    #[test]
    fn set_query_replaces_existing_key() {
        let mut request = Request::get("user/1").query("captcha", "old").query("page", 2);
        request.set_query("captcha", "new");
        request.set_query("keyword", "x");
        assert_eq!(
            request.query_params(),
            &[
                ("captcha".to_string(), "new".to_string()),
                ("page".to_string(), "2".to_string()),
                ("keyword".to_string(), "x".to_string()),
            ]
        );
    }

    #[test]
    fn post_is_mutating() {
        let request = Request::post("fe/api/problem/delete/P1").json(json!({}));
        assert!(request.is_mutating());
        assert!(Request::new(Method::DELETE, "x").is_mutating());
        assert!(!Request::new(Method::HEAD, "x").is_mutating());
    }

    #[test]
    fn unwraps_current_data_then_data() {
        assert_eq!(
            unwrap_envelope(json!({"currentData": {"data": {"x": 1}}})),
            json!({"x": 1})
        );
        assert_eq!(
            unwrap_envelope(json!({"currentData": {"problems": []}, "code": 200})),
            json!({"problems": []})
        );
        assert_eq!(unwrap_envelope(json!({"data": [1, 2]})), json!([1, 2]));
    }

    #[test]
    fn null_wrappers_are_kept() {
        assert_eq!(
            unwrap_envelope(json!({"currentData": null, "pid": "P1"})),
            json!({"currentData": null, "pid": "P1"})
        );
        assert_eq!(unwrap_envelope(json!([1])), json!([1]));
    }

    #[test]
    fn preview_truncates_long_payloads() {
        let short = json!({"a": 1});
        assert_eq!(preview(Some(&short)), r#"{"a":1}"#);
        assert_eq!(preview(None), "null");

        let long = json!({"settings": {"title": "题目".repeat(40)}});
        let rendered = preview(Some(&long));
        assert!(rendered.ends_with("..."));
        assert_eq!(rendered.chars().count(), 53);
    }
}
