//! Connection settings for an ONTAP cluster or SVM.
//!
//! `ConnectionProfile` is what the provider configuration deserializes into.
//! `HttpProfile` is the subset the HTTP transport needs, with the URL parts
//! that are fixed for ONTAP filled in.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 6;
pub const DEFAULT_JOB_COMPLETION_TIMEOUT_SECS: u64 = 600;
pub const API_ROOT: &str = "api";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// How to reach and authenticate against a cluster. Immutable once a client
/// has been built from it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionProfile {
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub validate_certs: bool,
    /// Ceiling on in-flight requests per client; 0 selects the default.
    pub max_concurrent_requests: usize,
    /// Seconds to wait for an asynchronous job to finish.
    pub job_completion_timeout: u64,
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            username: String::new(),
            password: String::new(),
            validate_certs: true,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            job_completion_timeout: DEFAULT_JOB_COMPLETION_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("validate_certs", &self.validate_certs)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("job_completion_timeout", &self.job_completion_timeout)
            .finish()
    }
}

impl ConnectionProfile {
    /// Number of request slots, applying the default for 0.
    pub fn request_slots(&self) -> usize {
        match self.max_concurrent_requests {
            0 => DEFAULT_MAX_CONCURRENT_REQUESTS,
            n => n,
        }
    }

    pub fn job_completion_timeout(&self) -> Duration {
        Duration::from_secs(self.job_completion_timeout)
    }

    pub fn http_profile(&self) -> HttpProfile {
        HttpProfile {
            scheme: "https".to_string(),
            hostname: self.hostname.clone(),
            api_root: API_ROOT.to_string(),
            username: self.username.clone(),
            password: self.password.clone(),
            validate_certs: self.validate_certs,
            timeout: REQUEST_TIMEOUT,
        }
    }
}

/// Attributes used to build request URLs and the authentication header.
#[derive(Clone, PartialEq, Eq)]
pub struct HttpProfile {
    pub scheme: String,
    pub hostname: String,
    pub api_root: String,
    pub username: String,
    pub password: String,
    pub validate_certs: bool,
    pub timeout: Duration,
}

impl fmt::Debug for HttpProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpProfile")
            .field("scheme", &self.scheme)
            .field("hostname", &self.hostname)
            .field("api_root", &self.api_root)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("validate_certs", &self.validate_certs)
            .field("timeout", &self.timeout)
            .finish()
    }
}
