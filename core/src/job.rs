//! ONTAP asynchronous job records, as returned by `cluster/jobs/{uuid}`.

use serde::Deserialize;
use serde_json::Value;

use crate::error::RestClientError;
use crate::response::{Record, RestError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Paused,
    Success,
    Failure,
    #[serde(other)]
    Unknown,
}

impl JobState {
    /// The job has not reached a terminal state yet.
    pub fn is_pending(&self) -> bool {
        matches!(self, JobState::Queued | JobState::Running | JobState::Paused)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub uuid: String,
    pub state: JobState,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error: Option<RestError>,
}

impl Job {
    pub fn from_record(record: Record, status_code: i32) -> Result<Self, RestClientError> {
        serde_json::from_value(Value::Object(record)).map_err(|e| RestClientError::MalformedJob {
            status_code,
            detail: e.to_string(),
        })
    }

    /// Error for a job that ended in a non-success state. The nested
    /// `error` object wins over the top-level code and message.
    pub fn failure(&self, uuid: &str, status_code: i32) -> RestClientError {
        let (code, message) = match self.error.as_ref().filter(|error| !error.code.is_empty()) {
            Some(error) => (error.code.clone(), error.message.clone()),
            None if self.code != 0 => (self.code.to_string(), self.message.clone()),
            None => (
                String::new(),
                format!("job ended in state {:?} without error details", self.state),
            ),
        };
        RestClientError::JobFailed {
            uuid: uuid.to_string(),
            status_code,
            code,
            message,
        }
    }
}
