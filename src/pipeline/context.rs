//! Per-request inspection state machine.
//!
//! # State Transitions
//! ```text
//! AwaitingHeaders → HeadersChecked: header filters allow (or headers unavailable)
//! HeadersChecked  → BufferingBody:  body chunk without end of stream
//! BufferingBody   → BodyChecked:    end of stream, body filters allow
//! any             → Rejected:       first filter rejection, or body unreadable
//! ```
//!
//! A rejection sends exactly one immediate response. Dropping the pipeline mid-body
//! simply discards its buffer.

use std::sync::Arc;

use uuid::Uuid;

use crate::filter::{FilterChain, Rejection, RequestHeaders};
use crate::observability::metrics;
use crate::pipeline::body::BodyBuffer;
use crate::pipeline::host::{Action, HttpHost};

/// Position of a request in its inspection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    AwaitingHeaders,
    HeadersChecked,
    BufferingBody,
    BodyChecked,
    Rejected,
}

/// Inspection state for one request. Owned by that request alone.
pub struct RequestPipeline {
    id: Uuid,
    chain: Arc<FilterChain>,
    state: RequestState,
    body: Option<BodyBuffer>,
}

impl RequestPipeline {
    pub fn new(chain: Arc<FilterChain>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chain,
            state: RequestState::AwaitingHeaders,
            body: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Bytes buffered so far, while the body phase is incomplete.
    pub fn buffered(&self) -> Option<usize> {
        self.body.as_ref().map(BodyBuffer::received)
    }

    /// Header phase: fold headers and run the header filters in order.
    pub fn on_request_headers(&mut self, host: &mut dyn HttpHost) -> Action {
        match self.state {
            RequestState::AwaitingHeaders => {}
            RequestState::Rejected => return Action::Pause,
            state => {
                tracing::debug!(request_id = %self.id, ?state, "Headers already inspected");
                return Action::Continue;
            }
        }
        metrics::record_request();

        let pairs = match host.request_headers() {
            Ok(pairs) => pairs,
            Err(e) => {
                // No policy decision is possible without headers.
                tracing::error!(request_id = %self.id, error = %e, "Failed to get request headers");
                self.state = RequestState::HeadersChecked;
                return Action::Continue;
            }
        };
        let headers = RequestHeaders::from_pairs(pairs);

        match self.chain.run_header_filters(&headers) {
            Ok(()) => {
                self.state = RequestState::HeadersChecked;
                Action::Continue
            }
            Err((filter, rejection)) => self.reject(host, filter, rejection),
        }
    }

    /// Body phase: pause until end of stream, then run the body filters once over the
    /// complete body.
    pub fn on_request_body(
        &mut self,
        host: &mut dyn HttpHost,
        body_size: usize,
        end_of_stream: bool,
    ) -> Action {
        tracing::debug!(request_id = %self.id, body_size, end_of_stream, "Request body event");
        match self.state {
            RequestState::Rejected => return Action::Pause,
            RequestState::BodyChecked => return Action::Continue,
            RequestState::AwaitingHeaders => {
                tracing::warn!(request_id = %self.id, "Body event before headers");
            }
            RequestState::HeadersChecked | RequestState::BufferingBody => {}
        }

        let mut buffer = self.body.take().unwrap_or_default();
        buffer.record(body_size);

        if !end_of_stream {
            // Nothing reaches the upstream until the whole body has been inspected.
            self.body = Some(buffer);
            self.state = RequestState::BufferingBody;
            return Action::Pause;
        }

        let data = match host.request_body(0, body_size) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(request_id = %self.id, error = %e, "Failed to get request body");
                return self.reject(host, "body", Rejection::internal(e.to_string()));
            }
        };
        let buffer = buffer.complete(data);
        let body = buffer.ready().unwrap_or_default();

        match self.chain.run_body_filters(body) {
            Ok(()) => {
                self.state = RequestState::BodyChecked;
                Action::Continue
            }
            Err((filter, rejection)) => self.reject(host, filter, rejection),
        }
    }

    fn reject(&mut self, host: &mut dyn HttpHost, filter: &'static str, rejection: Rejection) -> Action {
        tracing::info!(
            request_id = %self.id,
            filter,
            status = rejection.status.as_u16(),
            reason = %rejection.message,
            "Request rejected"
        );
        metrics::record_rejection(filter, rejection.status.as_u16());

        if let Err(e) = host.send_response(rejection.status, &[], rejection.message.as_bytes()) {
            tracing::error!(request_id = %self.id, error = %e, "Failed to send rejection response");
        }
        self.state = RequestState::Rejected;
        self.body = None;
        Action::Pause
    }
}
