//! Error types for the ONTAP REST client.
//!
//! # Design
//! Failures fall into two layers. `TransportFailure` describes what went
//! wrong before a complete HTTP exchange was available (bad inputs, network
//! errors, unreadable bodies) and always carries the best status code known
//! at that point, `-1` when none was observed. `RestClientError` is what the
//! verb helpers return: the five classifier outcomes, each tagged with an
//! `ErrorType`, plus the contract and job errors raised above the
//! normalizer.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::response::{RestError, RestResponse};

/// Status code reported when no HTTP response was received.
pub const NO_STATUS: i32 = -1;

/// Diagnostic tag recorded on a `RestResponse` when a call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorType {
    /// Transport or network failure, no body available.
    #[serde(rename = "http")]
    Http,
    /// The body is not a JSON object.
    #[serde(rename = "bad_response_decode_json")]
    DecodeJson,
    /// The body is JSON but does not fit the records envelope.
    #[serde(rename = "bad_response_decode_interface")]
    DecodeInterface,
    /// ONTAP reported a structured error.
    #[serde(rename = "rest_error")]
    RestError,
    /// The HTTP status indicates failure and nothing more is known.
    #[serde(rename = "statuscode_error")]
    StatusCode,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Http => "http",
            ErrorType::DecodeJson => "bad_response_decode_json",
            ErrorType::DecodeInterface => "bad_response_decode_interface",
            ErrorType::RestError => "rest_error",
            ErrorType::StatusCode => "statuscode_error",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a transport could not produce a raw response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("hostname and API root are required to build a request URL")]
    MissingEndpoint,

    #[error("invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to encode request body: {0}")]
    EncodeBody(#[source] serde_json::Error),

    #[error("failed to build HTTP request: {0}")]
    BuildRequest(#[source] ureq::http::Error),

    #[error("HTTP request failed: {0}")]
    Send(#[source] ureq::Error),

    #[error("HTTP response read failed: {0}")]
    ReadBody(#[source] ureq::Error),

    /// Failure injected by a scripted transport.
    #[error("{0}")]
    Scripted(String),
}

/// A transport error together with the status code observed before it
/// happened.
#[derive(Debug, Error)]
#[error("{error}, statusCode: {status_code}")]
pub struct TransportFailure {
    pub status_code: i32,
    #[source]
    pub error: TransportError,
}

impl TransportFailure {
    pub fn new(status_code: i32, error: TransportError) -> Self {
        Self { status_code, error }
    }

    /// A failure that happened before any HTTP status was available.
    pub fn without_status(error: TransportError) -> Self {
        Self::new(NO_STATUS, error)
    }
}

/// Errors returned by `RestClient` verb helpers.
#[derive(Debug, Error)]
pub enum RestClientError {
    #[error(transparent)]
    Http(#[from] TransportFailure),

    #[error("unable to decode response, this may be expected when statusCode {status_code} >= 300: {source}")]
    DecodeJson {
        status_code: i32,
        #[source]
        source: serde_json::Error,
    },

    #[error("unable to decode response envelope, statusCode {status_code}: {source}")]
    DecodeInterface {
        status_code: i32,
        #[source]
        source: serde_json::Error,
    },

    #[error("REST reported error {rest_error}, statusCode: {status_code}")]
    Rest {
        status_code: i32,
        rest_error: RestError,
        response: Box<RestResponse>,
    },

    #[error("statusCode indicates error, without details: {status_code}")]
    StatusCode {
        status_code: i32,
        response: Box<RestResponse>,
    },

    /// A caller expecting at most one record received more.
    #[error("received 2 or more records when only one is expected - statusCode {status_code}, num_records {num_records}")]
    TooManyRecords { status_code: i32, num_records: usize },

    #[error("malformed job data, statusCode {status_code}: {detail}")]
    MalformedJob { status_code: i32, detail: String },

    #[error("job {uuid} failed. Error code: {code}. Message: {message}")]
    JobFailed {
        uuid: String,
        status_code: i32,
        code: String,
        message: String,
    },

    #[error("job {uuid} did not finish within {timeout:?}")]
    JobTimeout { uuid: String, timeout: Duration },
}

impl RestClientError {
    /// HTTP status associated with the failure, `-1` when none was received
    /// and `0` for job timeouts.
    pub fn status_code(&self) -> i32 {
        match self {
            RestClientError::Http(failure) => failure.status_code,
            RestClientError::DecodeJson { status_code, .. }
            | RestClientError::DecodeInterface { status_code, .. }
            | RestClientError::Rest { status_code, .. }
            | RestClientError::StatusCode { status_code, .. }
            | RestClientError::TooManyRecords { status_code, .. }
            | RestClientError::MalformedJob { status_code, .. }
            | RestClientError::JobFailed { status_code, .. } => *status_code,
            RestClientError::JobTimeout { .. } => 0,
        }
    }

    /// Classifier tag, `None` for errors raised above the normalizer.
    pub fn error_type(&self) -> Option<ErrorType> {
        match self {
            RestClientError::Http(_) => Some(ErrorType::Http),
            RestClientError::DecodeJson { .. } => Some(ErrorType::DecodeJson),
            RestClientError::DecodeInterface { .. } => Some(ErrorType::DecodeInterface),
            RestClientError::Rest { .. } => Some(ErrorType::RestError),
            RestClientError::StatusCode { .. } => Some(ErrorType::StatusCode),
            RestClientError::TooManyRecords { .. }
            | RestClientError::MalformedJob { .. }
            | RestClientError::JobFailed { .. }
            | RestClientError::JobTimeout { .. } => None,
        }
    }

    /// The normalized response, when the failure was classified after a
    /// successful decode.
    pub fn response(&self) -> Option<&RestResponse> {
        match self {
            RestClientError::Rest { response, .. } | RestClientError::StatusCode { response, .. } => {
                Some(response)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_type_tags_match_serde_names() {
        for tag in [
            ErrorType::Http,
            ErrorType::DecodeJson,
            ErrorType::DecodeInterface,
            ErrorType::RestError,
            ErrorType::StatusCode,
        ] {
            let json = serde_json::to_value(tag).unwrap();
            assert_eq!(json, tag.as_str());
        }
    }

    #[test]
    fn transport_failure_keeps_status() {
        let err: RestClientError =
            TransportFailure::new(502, TransportError::Scripted("bad gateway".to_string())).into();
        assert_eq!(err.status_code(), 502);
        assert_eq!(err.error_type(), Some(ErrorType::Http));
        assert_eq!(err.to_string(), "bad gateway, statusCode: 502");
    }

    #[test]
    fn missing_endpoint_has_no_status() {
        let failure = TransportFailure::without_status(TransportError::MissingEndpoint);
        assert_eq!(failure.status_code, NO_STATUS);
    }

    #[test]
    fn contract_errors_are_untagged() {
        let err = RestClientError::TooManyRecords {
            status_code: 200,
            num_records: 2,
        };
        assert_eq!(err.error_type(), None);
        assert_eq!(err.status_code(), 200);
        assert!(err.to_string().contains("2 or more records"));
    }
}
