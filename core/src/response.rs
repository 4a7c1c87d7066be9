//! Normalization of ONTAP REST responses.
//!
//! # Design
//! ONTAP usually wraps results in an envelope
//! (`{"num_records": n, "records": [...], "error": {...}}`) but singleton
//! endpoints answer with a bare object. `unmarshal_response` folds both
//! shapes into a `RestResponse` whose records are always a list, then runs
//! the error classifier. Records stay untyped (`Record` is a JSON object) so
//! each resource module decodes the fields it cares about.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, error};

use crate::error::{ErrorType, RestClientError, TransportFailure};
use crate::http::RawResponse;

/// One ONTAP resource instance as returned by the API.
pub type Record = Map<String, Value>;

/// Key ONTAP adds to every payload; on its own it does not make a record.
const LINKS_KEY: &str = "_links";

/// Structured error reported by ONTAP in the `error` member of a response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestError {
    #[serde(default, deserialize_with = "string_or_number")]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub target: String,
}

impl RestError {
    /// ONTAP uses an empty or `"0"` code for "no error".
    pub fn is_error(&self) -> bool {
        !self.code.is_empty() && self.code != "0"
    }
}

impl std::fmt::Display for RestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{code: {:?}, message: {:?}, target: {:?}}}",
            self.code, self.message, self.target
        )
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Text(String),
        Number(i64),
    }
    Ok(match Option::<Code>::deserialize(deserializer)? {
        Some(Code::Text(code)) => code,
        Some(Code::Number(code)) => code.to_string(),
        None => String::new(),
    })
}

/// Uniform view of a REST response.
///
/// After normalization `num_records == records.len()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestResponse {
    pub num_records: usize,
    pub records: Vec<Record>,
    pub rest_error: Option<RestError>,
    pub status_code: i32,
    pub error_type: Option<ErrorType>,
    /// Reference to an asynchronous job started by a mutation.
    pub job: Option<Record>,
    pub jobs: Vec<Record>,
}

impl RestResponse {
    /// Render this response as the JSON envelope ONTAP would have sent.
    pub fn envelope(&self) -> Value {
        let mut envelope = Map::new();
        envelope.insert("num_records".to_string(), json!(self.num_records));
        envelope.insert(
            "records".to_string(),
            Value::Array(self.records.iter().cloned().map(Value::Object).collect()),
        );
        if let Some(rest_error) = &self.rest_error {
            envelope.insert(
                "error".to_string(),
                json!({
                    "code": rest_error.code,
                    "message": rest_error.message,
                    "target": rest_error.target,
                }),
            );
        }
        if let Some(job) = &self.job {
            envelope.insert("job".to_string(), Value::Object(job.clone()));
        }
        if !self.jobs.is_empty() {
            envelope.insert(
                "jobs".to_string(),
                Value::Array(self.jobs.iter().cloned().map(Value::Object).collect()),
            );
        }
        Value::Object(envelope)
    }

    /// Uuids of every job referenced by this response, in order.
    pub fn job_uuids(&self) -> Result<Vec<String>, RestClientError> {
        self.job
            .iter()
            .chain(self.jobs.iter())
            .map(|job| {
                job.get("uuid")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| RestClientError::MalformedJob {
                        status_code: self.status_code,
                        detail: format!("job reference without uuid: {}", Value::Object(job.clone())),
                    })
            })
            .collect()
    }
}

/// Intermediate decode target: the envelope members plus everything else.
#[derive(Debug, Deserialize)]
struct StagedResponse {
    num_records: Option<usize>,
    records: Option<Vec<Record>>,
    error: Option<RestError>,
    job: Option<Record>,
    jobs: Option<Vec<Record>>,
    #[serde(flatten)]
    other: Record,
}

impl StagedResponse {
    fn into_response(self, status_code: i32) -> RestResponse {
        let StagedResponse {
            num_records,
            records,
            error,
            job,
            jobs,
            other,
        } = self;

        let records = match records {
            Some(records) => records,
            None if num_records.is_none() && other.keys().any(|key| key != LINKS_KEY) => {
                debug!("no records envelope, treating payload as a single record");
                vec![other]
            }
            None => Vec::new(),
        };
        if let Some(reported) = num_records {
            if reported != records.len() {
                debug!(reported, actual = records.len(), "num_records disagrees with records");
            }
        }

        RestResponse {
            num_records: records.len(),
            records,
            rest_error: error,
            status_code,
            error_type: None,
            job,
            jobs: jobs.unwrap_or_default(),
        }
    }
}

/// Convert the outcome of a transport call into a `RestResponse`.
///
/// A transport failure short-circuits as an `http` error. Otherwise the body
/// must be a JSON object (or `null`); if it carries neither `num_records` nor
/// `records`, the whole object becomes one record. The result then goes
/// through `check_rest_errors`.
pub fn unmarshal_response(
    outcome: Result<RawResponse, TransportFailure>,
) -> Result<RestResponse, RestClientError> {
    let raw = outcome?;
    let status_code = raw.status_code;

    let data: Option<Record> = serde_json::from_slice(&raw.body).map_err(|source| {
        error!(
            status_code,
            %source,
            body = %String::from_utf8_lossy(&raw.body),
            "unable to unmarshal response, this may be expected when statusCode >= 300"
        );
        RestClientError::DecodeJson {
            status_code,
            source,
        }
    })?;
    let data = data.unwrap_or_default();
    debug!(?data, "decoded response");

    let staged: StagedResponse = serde_json::from_value(Value::Object(data)).map_err(|source| {
        error!(status_code, %source, "unable to decode response envelope");
        RestClientError::DecodeInterface {
            status_code,
            source,
        }
    })?;

    check_rest_errors(staged.into_response(status_code))
}

/// Classify a decoded response.
///
/// A structured REST error wins over the status code, because ONTAP
/// occasionally reports errors with a 2xx status. Failing statuses without
/// a REST error are reported as `statuscode_error`.
pub fn check_rest_errors(mut response: RestResponse) -> Result<RestResponse, RestClientError> {
    let status_code = response.status_code;
    if let Some(rest_error) = response.rest_error.clone().filter(RestError::is_error) {
        response.error_type = Some(ErrorType::RestError);
        error!(status_code, %rest_error, "REST reported error");
        return Err(RestClientError::Rest {
            status_code,
            rest_error,
            response: Box::new(response),
        });
    }
    if !(200..300).contains(&status_code) {
        response.error_type = Some(ErrorType::StatusCode);
        error!(status_code, "statusCode indicates error, without details");
        return Err(RestClientError::StatusCode {
            status_code,
            response: Box::new(response),
        });
    }
    Ok(response)
}
