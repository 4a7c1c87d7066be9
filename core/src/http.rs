//! HTTP request/response types and the transport seam.
//!
//! # Design
//! `HttpRequest` and `RawResponse` describe one REST exchange as plain data.
//! A `Transport` turns the former into the latter; `HttpTransport` does it
//! over the network and `MockTransport` replays a script. Everything above
//! this seam (gate, normalizer, verb helpers) is shared by both.

use std::fmt;
use std::sync::Arc;

use crate::error::TransportFailure;
use crate::query::RestQuery;
use crate::response::Record;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A REST request relative to the API root.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub query: RestQuery,
    /// Sent as JSON only when present and non-empty.
    pub body: Option<Record>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            query: RestQuery::new(),
            body: None,
        }
    }

    /// The body to serialize, `None` when there is nothing to send.
    pub fn json_body(&self) -> Option<&Record> {
        self.body.as_ref().filter(|body| !body.is_empty())
    }
}

/// Status code and undecoded body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status_code: i32,
    pub body: Vec<u8>,
}

/// Executes REST requests against `path` (relative to the API root).
pub trait Transport: Send + Sync {
    fn send(&self, path: &str, request: &HttpRequest) -> Result<RawResponse, TransportFailure>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, path: &str, request: &HttpRequest) -> Result<RawResponse, TransportFailure> {
        (**self).send(path, request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, path: &str, request: &HttpRequest) -> Result<RawResponse, TransportFailure> {
        (**self).send(path, request)
    }
}
