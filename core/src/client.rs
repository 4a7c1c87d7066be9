//! Verb helpers for the ONTAP REST API.
//!
//! # Design
//! `RestClient` composes a `Transport`, the concurrency gate, and the
//! response normalizer. Resource modules call one of four shapes:
//! `get_nil_or_one_record`, `get_zero_or_more_records`, and the mutating
//! `call_create_method` / `call_update_method` / `call_delete_method`.
//! Every call takes exactly one gate slot for its transport round-trip.
//! Nothing is retried; a failing call is reported once.
//!
//! Mutations may start asynchronous jobs. When a response references jobs,
//! the mutating helpers poll each one until it finishes, so callers see the
//! final outcome.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::error::RestClientError;
use crate::gate::RequestGate;
use crate::http::{HttpMethod, HttpRequest, Transport};
use crate::job::{Job, JobState};
use crate::profile::ConnectionProfile;
use crate::query::RestQuery;
use crate::response::{unmarshal_response, Record, RestResponse};
use crate::transport::HttpTransport;

/// Seconds ONTAP may spend on a mutation before answering with a job.
pub const RETURN_TIMEOUT_SECS: u64 = 60;
/// Delay between two polls of an unfinished job.
pub const DEFAULT_JOB_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Client for one ONTAP connection profile. Share it between threads
/// behind an `Arc`; the gate bounds calls across all of them.
pub struct RestClient {
    transport: Box<dyn Transport>,
    gate: RequestGate,
    job_completion_timeout: Duration,
    job_poll_interval: Duration,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("gate", &self.gate)
            .field("job_completion_timeout", &self.job_completion_timeout)
            .field("job_poll_interval", &self.job_poll_interval)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// A client talking HTTPS to the host in `profile`.
    pub fn new(profile: &ConnectionProfile) -> Self {
        Self::with_transport(profile, HttpTransport::new(profile.http_profile()))
    }

    pub fn with_transport(profile: &ConnectionProfile, transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            gate: RequestGate::new(profile.request_slots()),
            job_completion_timeout: profile.job_completion_timeout(),
            job_poll_interval: DEFAULT_JOB_POLL_INTERVAL,
        }
    }

    pub fn with_job_poll_interval(mut self, interval: Duration) -> Self {
        self.job_poll_interval = interval;
        self
    }

    pub fn max_concurrent_requests(&self) -> usize {
        self.gate.capacity()
    }

    /// GET expecting zero or one record.
    ///
    /// Returns `None` when nothing matched. More than one record is a
    /// contract violation and fails even though the call succeeded.
    pub fn get_nil_or_one_record(
        &self,
        path: &str,
        query: Option<&RestQuery>,
        body: Option<&Record>,
    ) -> Result<(i32, Option<Record>), RestClientError> {
        let response = self.call_api_method(HttpMethod::Get, path, query.cloned(), body)?;
        let status_code = response.status_code;
        if response.num_records > 1 {
            error!(
                status_code,
                num_records = response.num_records,
                ?response,
                "received 2 or more records when only one is expected"
            );
            return Err(RestClientError::TooManyRecords {
                status_code,
                num_records: response.num_records,
            });
        }
        Ok((status_code, response.records.into_iter().next()))
    }

    /// GET returning every record, in the order ONTAP sent them.
    pub fn get_zero_or_more_records(
        &self,
        path: &str,
        query: Option<&RestQuery>,
        body: Option<&Record>,
    ) -> Result<(i32, Vec<Record>), RestClientError> {
        let response = self.call_api_method(HttpMethod::Get, path, query.cloned(), body)?;
        Ok((response.status_code, response.records))
    }

    /// POST. The full response is returned because create endpoints differ
    /// in whether they echo the new object (see `return_records=true`).
    pub fn call_create_method(
        &self,
        path: &str,
        query: Option<&RestQuery>,
        body: Option<&Record>,
    ) -> Result<(i32, RestResponse), RestClientError> {
        self.call_mutating_method(HttpMethod::Post, path, query, body)
    }

    /// PATCH.
    pub fn call_update_method(
        &self,
        path: &str,
        query: Option<&RestQuery>,
        body: Option<&Record>,
    ) -> Result<(i32, RestResponse), RestClientError> {
        self.call_mutating_method(HttpMethod::Patch, path, query, body)
    }

    /// DELETE.
    pub fn call_delete_method(
        &self,
        path: &str,
        query: Option<&RestQuery>,
        body: Option<&Record>,
    ) -> Result<(i32, RestResponse), RestClientError> {
        self.call_mutating_method(HttpMethod::Delete, path, query, body)
    }

    /// Poll `cluster/jobs/{uuid}` until the job leaves the queued, running
    /// and paused states, or the job completion timeout runs out.
    pub fn wait_for_job(&self, uuid: &str) -> Result<i32, RestClientError> {
        let started = Instant::now();
        loop {
            let (status_code, job) = self.poll_job(uuid)?;
            debug!(uuid, state = ?job.state, "job status");
            if !job.state.is_pending() {
                return match job.state {
                    JobState::Success => Ok(status_code),
                    _ => Err(job.failure(uuid, status_code)),
                };
            }
            if started.elapsed() >= self.job_completion_timeout {
                error!(uuid, timeout = ?self.job_completion_timeout, "job did not finish in time");
                return Err(RestClientError::JobTimeout {
                    uuid: uuid.to_string(),
                    timeout: self.job_completion_timeout,
                });
            }
            thread::sleep(self.job_poll_interval);
        }
    }

    /// One `GET cluster/jobs/{uuid}`.
    ///
    /// A failed job carries its own `error` member, which the classifier
    /// reports as a REST error. With a 2xx status that error belongs to the
    /// job record and is folded back into it.
    fn poll_job(&self, uuid: &str) -> Result<(i32, Job), RestClientError> {
        let path = format!("cluster/jobs/{uuid}");
        match self.get_nil_or_one_record(&path, None, None) {
            Ok((status_code, Some(record))) => Ok((status_code, Job::from_record(record, status_code)?)),
            Ok((status_code, None)) => Err(RestClientError::MalformedJob {
                status_code,
                detail: format!("job {uuid} returned no record"),
            }),
            Err(RestClientError::Rest {
                status_code,
                rest_error,
                response,
            }) if (200..300).contains(&status_code) && response.num_records == 1 => {
                let RestResponse { records, .. } = *response;
                let record = records.into_iter().next().unwrap_or_default();
                let mut job = Job::from_record(record, status_code)?;
                job.error = Some(rest_error);
                Ok((status_code, job))
            }
            Err(e) => Err(e),
        }
    }

    fn call_mutating_method(
        &self,
        method: HttpMethod,
        path: &str,
        query: Option<&RestQuery>,
        body: Option<&Record>,
    ) -> Result<(i32, RestResponse), RestClientError> {
        let mut query = query.cloned().unwrap_or_default();
        query.set("return_timeout", RETURN_TIMEOUT_SECS.to_string());
        let response = self
            .call_api_method(method, path, Some(query), body)
            .inspect_err(|e| debug!(%method, path, status_code = e.status_code(), "request failed"))?;
        for uuid in response.job_uuids()? {
            self.wait_for_job(&uuid)?;
        }
        Ok((response.status_code, response))
    }

    fn call_api_method(
        &self,
        method: HttpMethod,
        path: &str,
        query: Option<RestQuery>,
        body: Option<&Record>,
    ) -> Result<RestResponse, RestClientError> {
        let request = HttpRequest {
            method,
            query: query.unwrap_or_default(),
            body: body.cloned(),
        };
        let outcome = {
            let _slot = self.gate.acquire();
            self.transport.send(path, &request)
        };
        unmarshal_response(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportFailure;
    use crate::http::RawResponse;
    use parking_lot::Mutex;

    /// Records every request and answers with a fixed body.
    struct Recorder {
        seen: Mutex<Vec<(String, HttpRequest)>>,
        body: &'static str,
    }

    impl Transport for Recorder {
        fn send(&self, path: &str, request: &HttpRequest) -> Result<RawResponse, TransportFailure> {
            self.seen.lock().push((path.to_string(), request.clone()));
            Ok(RawResponse {
                status_code: 200,
                body: self.body.as_bytes().to_vec(),
            })
        }
    }

    fn recorder(body: &'static str) -> std::sync::Arc<Recorder> {
        std::sync::Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            body,
        })
    }

    #[test]
    fn mutations_set_return_timeout() {
        let transport = recorder(r#"{"num_records":0,"records":[]}"#);
        let client = RestClient::with_transport(&ConnectionProfile::default(), transport.clone());
        let mut query = RestQuery::new();
        query.set("return_records", "true");
        client.call_create_method("storage/volumes", Some(&query), None).unwrap();
        client.call_update_method("storage/volumes/1", None, None).unwrap();
        client.call_delete_method("storage/volumes/1", None, None).unwrap();

        let seen = transport.seen.lock();
        let methods: Vec<_> = seen.iter().map(|(_, request)| request.method).collect();
        assert_eq!(methods, vec![HttpMethod::Post, HttpMethod::Patch, HttpMethod::Delete]);
        for (_, request) in seen.iter() {
            assert_eq!(request.query.get("return_timeout"), Some("60"));
        }
        assert_eq!(seen[0].1.query.get("return_records"), Some("true"));
        // The caller's query is left untouched.
        assert_eq!(query.get("return_timeout"), None);
    }

    #[test]
    fn gets_do_not_add_parameters() {
        let transport = recorder(r#"{"num_records":0,"records":[]}"#);
        let client = RestClient::with_transport(&ConnectionProfile::default(), transport.clone());
        client.get_zero_or_more_records("storage/volumes", None, None).unwrap();
        let seen = transport.seen.lock();
        assert_eq!(seen[0].0, "storage/volumes");
        assert!(seen[0].1.query.is_empty());
        assert!(seen[0].1.body.is_none());
    }

    #[test]
    fn concurrency_comes_from_profile() {
        let profile = ConnectionProfile {
            max_concurrent_requests: 2,
            ..Default::default()
        };
        let client = RestClient::with_transport(&profile, recorder("{}"));
        assert_eq!(client.max_concurrent_requests(), 2);
    }

    #[test]
    fn gate_is_free_after_a_call() {
        let client = RestClient::with_transport(&ConnectionProfile::default(), recorder("not json"));
        assert!(client.get_zero_or_more_records("cluster", None, None).is_err());
        assert_eq!(client.gate.in_flight(), 0);
    }
}
