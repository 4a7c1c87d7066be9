//! Scripted transport for unit tests of code built on `RestClient`.
//!
//! # Design
//! A `MockTransport` holds an ordered queue of `MockResponse` entries and
//! consumes one per call. Each entry names the method and path it expects;
//! a call that does not match, or arrives after the queue is empty, panics
//! so that a test fails at the offending call. Scripted responses are
//! rendered to JSON and go through the same normalizer and classifier as
//! real traffic.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::client::RestClient;
use crate::error::{TransportError, TransportFailure};
use crate::http::{HttpMethod, HttpRequest, RawResponse, Transport};
use crate::profile::ConnectionProfile;
use crate::response::RestResponse;

/// One expected request and the reply to give it.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub expected_method: HttpMethod,
    pub expected_url: String,
    pub status_code: i32,
    pub response: RestResponse,
    /// Sent verbatim instead of `response` when set.
    pub raw_body: Option<Vec<u8>>,
    /// Fail at the transport level with this message instead of replying.
    pub transport_error: Option<String>,
}

impl MockResponse {
    pub fn new(
        expected_method: HttpMethod,
        expected_url: impl Into<String>,
        status_code: i32,
        response: RestResponse,
    ) -> Self {
        Self {
            expected_method,
            expected_url: expected_url.into(),
            status_code,
            response,
            raw_body: None,
            transport_error: None,
        }
    }

    /// Reply with an arbitrary body, JSON or not.
    pub fn raw(
        expected_method: HttpMethod,
        expected_url: impl Into<String>,
        status_code: i32,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            raw_body: Some(body.into()),
            ..Self::new(expected_method, expected_url, status_code, RestResponse::default())
        }
    }

    pub fn transport_error(
        expected_method: HttpMethod,
        expected_url: impl Into<String>,
        status_code: i32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            transport_error: Some(message.into()),
            ..Self::new(expected_method, expected_url, status_code, RestResponse::default())
        }
    }
}

/// FIFO replay of scripted responses.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<MockResponse>>,
}

impl MockTransport {
    pub fn new(responses: impl IntoIterator<Item = MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }

    /// Number of scripted responses not consumed yet.
    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

impl Transport for MockTransport {
    fn send(&self, path: &str, request: &HttpRequest) -> Result<RawResponse, TransportFailure> {
        let expected = self
            .responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| panic!("Unexpected request: {} {path}", request.method));
        if expected.expected_method != request.method || expected.expected_url != path {
            panic!(
                "Unexpected request: {} {path}, expecting {} {}",
                request.method, expected.expected_method, expected.expected_url
            );
        }

        if let Some(message) = expected.transport_error {
            return Err(TransportFailure::new(
                expected.status_code,
                TransportError::Scripted(message),
            ));
        }
        let body = match expected.raw_body {
            Some(body) => body,
            None => serde_json::to_vec(&expected.response.envelope()).map_err(|e| {
                TransportFailure::new(expected.status_code, TransportError::EncodeBody(e))
            })?,
        };
        Ok(RawResponse {
            status_code: expected.status_code,
            body,
        })
    }
}

impl RestClient {
    /// A client replaying `responses` in order. Jobs are polled without
    /// delay.
    pub fn mocked(responses: impl IntoIterator<Item = MockResponse>) -> Self {
        RestClient::with_transport(&ConnectionProfile::default(), MockTransport::new(responses))
            .with_job_poll_interval(std::time::Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn responses_are_consumed_in_order() {
        let transport = MockTransport::new([
            MockResponse::new(HttpMethod::Get, "cluster", 200, RestResponse::default()),
            MockResponse::raw(HttpMethod::Delete, "storage/volumes/1", 200, "{}"),
        ]);
        let first = transport
            .send("cluster", &HttpRequest::new(HttpMethod::Get))
            .unwrap();
        let envelope: serde_json::Value = serde_json::from_slice(&first.body).unwrap();
        assert_eq!(envelope, json!({"num_records": 0, "records": []}));
        assert_eq!(transport.remaining(), 1);

        let second = transport
            .send("storage/volumes/1", &HttpRequest::new(HttpMethod::Delete))
            .unwrap();
        assert_eq!(second.body, b"{}");
        assert_eq!(transport.remaining(), 0);
    }

    #[test]
    fn scripted_transport_error() {
        let transport = MockTransport::new([MockResponse::transport_error(
            HttpMethod::Get,
            "cluster",
            -1,
            "connection refused",
        )]);
        let failure = transport
            .send("cluster", &HttpRequest::new(HttpMethod::Get))
            .unwrap_err();
        assert_eq!(failure.status_code, -1);
        assert_eq!(failure.error.to_string(), "connection refused");
    }

    #[test]
    #[should_panic(expected = "Unexpected request: GET cluster")]
    fn exhausted_queue_panics() {
        let transport = MockTransport::default();
        let _ = transport.send("cluster", &HttpRequest::new(HttpMethod::Get));
    }

    #[test]
    #[should_panic(expected = "expecting POST storage/volumes")]
    fn mismatched_request_panics() {
        let transport = MockTransport::new([MockResponse::new(
            HttpMethod::Post,
            "storage/volumes",
            201,
            RestResponse::default(),
        )]);
        let _ = transport.send("storage/volumes", &HttpRequest::new(HttpMethod::Get));
    }
}
