//! Keyword-based SQL injection detection.
//!
//! Case-insensitive substring match of configured keywords against the request path
//! and body. This is a heuristic, not a SQL grammar.

use crate::filter::{BodyFilter, FilterOutcome, HeaderFilter, Rejection, RequestHeaders};

/// Pseudo-header carrying the request path and query.
pub const PATH_HEADER: &str = ":path";

/// Rejects requests whose path or body contains a configured keyword.
#[derive(Debug, Clone)]
pub struct SqlDetector {
    /// Lower-cased, in configured order.
    keywords: Vec<String>,
}

impl SqlDetector {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().to_lowercase())
            .collect();
        tracing::info!(keywords = keywords.len(), "Creating SQL injection detector");
        Self { keywords }
    }

    /// First configured keyword contained in `text`, ignoring case.
    pub fn find_keyword(&self, text: &str) -> Option<&str> {
        let haystack = text.to_lowercase();
        self.keywords
            .iter()
            .find(|kw| haystack.contains(kw.as_str()))
            .map(String::as_str)
    }

    fn scan(&self, text: &str) -> FilterOutcome {
        match self.find_keyword(text) {
            Some(keyword) => Err(Rejection::bad_request(format!(
                "possible SQL injection detected: SQL keyword '{}' found",
                keyword
            ))),
            None => Ok(()),
        }
    }
}

impl HeaderFilter for SqlDetector {
    fn name(&self) -> &'static str {
        "sql"
    }

    fn filter_headers(&self, headers: &RequestHeaders) -> FilterOutcome {
        let values = headers
            .get(PATH_HEADER)
            .ok_or_else(|| Rejection::bad_request("path header missing from request"))?;
        values.iter().try_for_each(|value| self.scan(value))
    }
}

impl BodyFilter for SqlDetector {
    fn name(&self) -> &'static str {
        "sql"
    }

    fn filter_body(&self, body: &[u8]) -> FilterOutcome {
        self.scan(&String::from_utf8_lossy(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn detector() -> SqlDetector {
        SqlDetector::new(["union select", "DROP TABLE", "or 1=1"])
    }

    fn path(p: &str) -> RequestHeaders {
        RequestHeaders::from_pairs([(PATH_HEADER, p)])
    }

    #[test]
    fn clean_path_is_allowed() {
        assert!(detector().filter_headers(&path("/items?q=shoes")).is_ok());
    }

    #[test]
    fn path_match_ignores_case() {
        let rejection = detector()
            .filter_headers(&path("/items?q=UNION SELECT * FROM users"))
            .unwrap_err();
        assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
        assert!(rejection.message.contains("union select"));
    }

    #[test]
    fn missing_path_is_rejected() {
        let headers = RequestHeaders::from_pairs([("host", "example.com")]);
        let rejection = detector().filter_headers(&headers).unwrap_err();
        assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
        assert_eq!(rejection.message, "path header missing from request");
    }

    #[test]
    fn configured_keyword_case_does_not_matter() {
        let rejection = detector()
            .filter_headers(&path("/admin?cmd=drop table users"))
            .unwrap_err();
        assert!(rejection.message.contains("'drop table'"));
    }

    #[test]
    fn first_configured_keyword_is_reported() {
        let text = "x or 1=1 union select y";
        assert_eq!(detector().find_keyword(text), Some("union select"));
    }

    #[test]
    fn body_match_is_rejected() {
        let rejection = detector()
            .filter_body(br#"{"name": "x' OR 1=1 --"}"#)
            .unwrap_err();
        assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
        assert!(rejection.message.contains("or 1=1"));
    }

    #[test]
    fn clean_and_binary_bodies_pass() {
        assert!(detector().filter_body(b"").is_ok());
        assert!(detector().filter_body(&[0xff, 0xfe, 0x00, 0x41]).is_ok());
    }

    #[test]
    fn no_keywords_allows_everything() {
        let detector = SqlDetector::new(Vec::<String>::new());
        assert!(detector.filter_headers(&path("/union select")).is_ok());
    }
}
