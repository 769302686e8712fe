//! `HttpHost` implementation over an axum request.
//!
//! Pseudo-headers are synthesized from the request line so filters see the same view
//! an HTTP/2-style data path would give them.

use std::net::IpAddr;

use axum::body::{Body, Bytes};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;

use crate::filter::rate_limit::FORWARDED_FOR_HEADER;
use crate::pipeline::{HostError, HttpHost};

/// Raw header pairs for a request, pseudo-headers first.
pub fn header_pairs(parts: &Parts) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(parts.headers.len() + 4);

    let authority = parts
        .uri
        .authority()
        .map(|a| a.as_str())
        .or_else(|| parts.headers.get(header::HOST).and_then(|v| v.to_str().ok()))
        .unwrap_or_default();
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    pairs.push((":method".to_string(), parts.method.as_str().to_string()));
    pairs.push((":scheme".to_string(), parts.uri.scheme_str().unwrap_or("http").to_string()));
    pairs.push((":authority".to_string(), authority.to_string()));
    pairs.push((":path".to_string(), path.to_string()));

    for (name, value) in parts.headers.iter() {
        match value.to_str() {
            Ok(value) => pairs.push((name.as_str().to_string(), value.to_string())),
            Err(_) => tracing::debug!(header = %name, "Skipping non-text header value"),
        }
    }
    pairs
}

/// Append `peer` to the request's `x-forwarded-for` chain, folding repeated headers
/// into one comma-separated value. Empty elements are dropped.
pub fn append_forwarded_for(headers: &mut HeaderMap, peer: IpAddr) {
    let name = HeaderName::from_static(FORWARDED_FOR_HEADER);
    let mut chain: Vec<String> = headers
        .get_all(&name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .collect();
    chain.push(peer.to_string());

    match HeaderValue::from_str(&chain.join(", ")) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(e) => tracing::warn!(peer = %peer, error = %e, "Failed to extend x-forwarded-for"),
    }
}

/// One request as seen by the pipeline: its headers, the body buffered so far, and
/// the immediate response if one was sent.
pub struct BufferedRequest {
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    response: Option<Response>,
}

impl BufferedRequest {
    pub fn new(headers: Vec<(String, String)>) -> Self {
        Self {
            headers,
            body: Vec::new(),
            response: None,
        }
    }

    pub fn from_parts(parts: &Parts) -> Self {
        Self::new(header_pairs(parts))
    }

    /// Append a received body chunk.
    pub fn append(&mut self, chunk: &[u8]) {
        self.body.extend_from_slice(chunk);
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// The buffered body, for forwarding.
    pub fn into_body(self) -> Bytes {
        Bytes::from(self.body)
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    /// The immediate response, if the pipeline sent one.
    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }
}

impl HttpHost for BufferedRequest {
    fn request_headers(&self) -> Result<Vec<(String, String)>, HostError> {
        Ok(self.headers.clone())
    }

    fn request_body(&self, offset: usize, len: usize) -> Result<Bytes, HostError> {
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= self.body.len())
            .ok_or_else(|| {
                HostError::Body(format!(
                    "requested {} bytes at offset {}, {} buffered",
                    len,
                    offset,
                    self.body.len()
                ))
            })?;
        Ok(Bytes::copy_from_slice(&self.body[offset..end]))
    }

    fn send_response(
        &mut self,
        status: StatusCode,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<(), HostError> {
        if self.response.is_some() {
            return Err(HostError::Respond("response already sent".to_string()));
        }

        let mut response = Response::new(Body::from(body.to_vec()));
        *response.status_mut() = status;
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| HostError::Respond(e.to_string()))?;
            let value = HeaderValue::from_str(value).map_err(|e| HostError::Respond(e.to_string()))?;
            response.headers_mut().append(name, value);
        }
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.response = Some(response);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(uri: &str) -> Parts {
        let (parts, _) = Request::builder()
            .method("POST")
            .uri(uri)
            .header("host", "shop.example")
            .header("x-forwarded-for", "10.0.0.1")
            .header("x-forwarded-for", "10.0.0.2")
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn pseudo_headers_come_first() {
        let pairs = header_pairs(&parts("/items?q=1"));
        assert_eq!(pairs[0], (":method".into(), "POST".into()));
        assert_eq!(pairs[2], (":authority".into(), "shop.example".into()));
        assert_eq!(pairs[3], (":path".into(), "/items?q=1".into()));
        let forwarded: Vec<_> = pairs.iter().filter(|(n, _)| n == "x-forwarded-for").collect();
        assert_eq!(forwarded.len(), 2);
    }

    #[test]
    fn peer_is_appended_to_forwarded_for() {
        let mut parts = parts("/");
        append_forwarded_for(&mut parts.headers, "192.0.2.7".parse().unwrap());
        let values: Vec<&str> = parts
            .headers
            .get_all("x-forwarded-for")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(values, vec!["10.0.0.1, 10.0.0.2, 192.0.2.7"]);

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" "));
        append_forwarded_for(&mut headers, "2001:db8::1".parse().unwrap());
        assert_eq!(headers["x-forwarded-for"], "2001:db8::1");
    }

    #[test]
    fn body_reads_are_bounds_checked() {
        let mut request = BufferedRequest::from_parts(&parts("/"));
        request.append(b"hello ");
        request.append(b"world");
        assert_eq!(request.body_len(), 11);
        assert_eq!(request.request_body(0, 11).unwrap(), Bytes::from_static(b"hello world"));
        assert_eq!(request.request_body(6, 5).unwrap(), Bytes::from_static(b"world"));
        assert!(matches!(request.request_body(0, 12), Err(HostError::Body(_))));
    }

    #[test]
    fn only_one_response_is_recorded() {
        let mut request = BufferedRequest::new(Vec::new());
        request
            .send_response(StatusCode::BAD_REQUEST, &[("x-guard", "sql")], b"nope")
            .unwrap();
        assert!(request.send_response(StatusCode::OK, &[], b"").is_err());

        let response = request.take_response().unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["x-guard"], "sql");
    }
}
