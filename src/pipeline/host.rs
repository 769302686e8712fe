//! The host side of the pipeline: what the proxy data path provides per request.

use axum::body::Bytes;
use axum::http::StatusCode;

/// What the host should do with the request after a pipeline callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Forward the request (or continue delivering it) unmodified.
    Continue,
    /// Hold the request: more body data is needed, or a response was already sent.
    Pause,
}

/// Failures reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("failed to get request headers: {0}")]
    Headers(String),
    #[error("failed to get request body: {0}")]
    Body(String),
    #[error("failed to send HTTP response: {0}")]
    Respond(String),
}

/// Per-request access to the proxy data path.
pub trait HttpHost {
    /// Raw request headers in encounter order, pseudo-headers included.
    fn request_headers(&self) -> Result<Vec<(String, String)>, HostError>;

    /// `len` bytes of the buffered request body starting at `offset`.
    fn request_body(&self, offset: usize, len: usize) -> Result<Bytes, HostError>;

    /// Answer the request directly instead of forwarding it.
    fn send_response(
        &mut self,
        status: StatusCode,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<(), HostError>;
}
