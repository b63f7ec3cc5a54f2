use std::{fmt, pin::Pin};

use color_eyre::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::request::GenerationRequest;

pub mod bfl;
pub use bfl::BflClient;

pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// The remote image-generation service.
///
/// `poll` errors that are not a [`crate::FluxError`] are treated as transient
/// by the poll loop and retried.
pub trait FluxService {
    fn submit<'a>(
        &'a self,
        api_key: &'a str,
        request: &'a GenerationRequest,
    ) -> ServiceFuture<'a, StartResponse>;

    fn poll<'a>(&'a self, api_key: &'a str, job: &'a StartResponse)
    -> ServiceFuture<'a, PollResponse>;

    fn fetch_image<'a>(&'a self, url: &'a str) -> ServiceFuture<'a, Vec<u8>>;
}

/// Answer to the submission, anything besides `id` and `polling_url` ends up
/// in `extra`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Ready,
    Pending,
    RequestModerated,
    ContentModerated,
    Error,
    TaskNotFound,
    Other(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Ready => "Ready",
            JobStatus::Pending => "Pending",
            JobStatus::RequestModerated => "Request Moderated",
            JobStatus::ContentModerated => "Content Moderated",
            JobStatus::Error => "Error",
            JobStatus::TaskNotFound => "Task not found",
            JobStatus::Other(s) => s,
        }
    }

    /// True for the states in which the job will never produce an image
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            JobStatus::RequestModerated
                | JobStatus::ContentModerated
                | JobStatus::Error
                | JobStatus::TaskNotFound
        )
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Ready" => JobStatus::Ready,
            "Pending" => JobStatus::Pending,
            "Request Moderated" => JobStatus::RequestModerated,
            "Content Moderated" => JobStatus::ContentModerated,
            "Error" => JobStatus::Error,
            "Task not found" => JobStatus::TaskNotFound,
            _ => JobStatus::Other(s),
        }
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One answer of the status endpoint.
///
/// Fields the client doesn't interpret are kept in `extra` so the persisted
/// result carries everything the service sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PollResponse {
    /// URL of the generated image, only present once the job is ready
    pub fn sample_url(&self) -> Option<&str> {
        self.result.as_ref()?.get("sample")?.as_str()
    }

    /// What the service said about a failure, for error messages
    pub fn failure_details(&self) -> String {
        match self.extra.get("details") {
            Some(Value::Null) | None => format!("job ended with status '{}'", self.status),
            Some(details) => format!("job ended with status '{}': {details}", self.status),
        }
    }
}
