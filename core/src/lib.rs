//! REST client core for the NetApp ONTAP management API.
//!
//! # Overview
//! Resource modules describe a call as a path under `/api`, optional query
//! parameters and an optional JSON body, and receive untyped records back.
//! The core sends the request over a bounded number of concurrent
//! connections, folds ONTAP's response shapes into one `RestResponse`, and
//! classifies failures.
//!
//! # Design
//! - `Transport` is the I/O seam: `HttpTransport` for real clusters,
//!   `MockTransport` for scripted tests.
//! - `RequestGate` caps in-flight calls per `RestClient`.
//! - `unmarshal_response` and `check_rest_errors` are pure functions over a
//!   raw status code and body.
//! - Records stay `serde_json` objects; each resource module extracts the
//!   fields it needs.

pub mod client;
pub mod error;
pub mod gate;
pub mod http;
pub mod job;
pub mod mock;
pub mod profile;
pub mod query;
pub mod response;
pub mod transport;

pub use client::RestClient;
pub use error::{ErrorType, RestClientError, TransportError, TransportFailure};
pub use gate::{RequestGate, RequestSlot};
pub use http::{HttpMethod, HttpRequest, RawResponse, Transport};
pub use job::{Job, JobState};
pub use mock::{MockResponse, MockTransport};
pub use profile::{ConnectionProfile, HttpProfile};
pub use query::RestQuery;
pub use response::{check_rest_errors, unmarshal_response, Record, RestError, RestResponse};
pub use transport::HttpTransport;
