//! Job record and its opaque payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::JobStatus;

/// Caller-assigned job identifier, unique within one pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Creates a job id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a time-ordered unique id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Data handed to the processor.
///
/// The pipeline never looks inside a payload; only the injected
/// [`Processor`](crate::processor::Processor) interprets it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// No payload.
    #[default]
    Empty,
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Schema-less JSON document.
    Json(serde_json::Value),
}

impl Payload {
    /// Builds a JSON object payload from key/value pairs.
    pub fn from_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        let map: serde_json::Map<String, serde_json::Value> =
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self::Json(serde_json::Value::Object(map))
    }

    /// Returns true if there is no payload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns the raw bytes, if this is a byte payload.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Returns the JSON document, if this is a JSON payload.
    #[must_use]
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Looks up a top-level field of a JSON object payload.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.as_json().and_then(|v| v.get(key))
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// One unit of work.
///
/// Identity, name, payload and tags are fixed at construction. Status and
/// retry count are owned by the pipeline once the job has been added and
/// only change through its job table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    id: JobId,
    name: String,
    status: JobStatus,
    #[serde(rename = "retries")]
    retry_count: u32,
    #[serde(default, skip_serializing_if = "Payload::is_empty")]
    payload: Payload,
    created_at: DateTime<Utc>,
    #[serde(skip)]
    tags: Vec<String>,
}

impl Job {
    /// Creates a pending job.
    pub fn new(id: impl Into<JobId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: JobStatus::Pending,
            retry_count: 0,
            payload: Payload::Empty,
            created_at: Utc::now(),
            tags: Vec::new(),
        }
    }

    /// Creates a pending job with a generated id.
    pub fn generated(name: impl Into<String>) -> Self {
        Self::new(JobId::generate(), name)
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Replaces the tags.
    #[must_use]
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a single tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Returns the job id.
    #[must_use]
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Returns the descriptive name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Returns the number of retries consumed.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns the payload.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns true if the job carries the given tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub(crate) fn set_status(&mut self, status: JobStatus) {
        self.status = status;
    }

    pub(crate) fn set_retry_count(&mut self, retry_count: u32) {
        self.retry_count = retry_count;
    }

    /// Resets lifecycle state when a pipeline takes ownership.
    pub(crate) fn stamp_pending(&mut self) {
        self.status = JobStatus::Pending;
        self.retry_count = 0;
        self.created_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_job_is_pending() {
        let job = Job::new("job-001", "data-export");
        assert_eq!(job.id().as_str(), "job-001");
        assert_eq!(job.name(), "data-export");
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.retry_count(), 0);
        assert!(job.payload().is_empty());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = Job::generated("a");
        let b = Job::generated("b");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_tags() {
        let job = Job::new("job-1", "tagged")
            .with_tags(["urgent", "batch"])
            .with_tag("nightly");

        assert!(job.has_tag("urgent"));
        assert!(job.has_tag("nightly"));
        assert!(!job.has_tag("missing"));
        assert_eq!(job.tags().len(), 3);
    }

    #[test]
    fn test_payload_from_fields() {
        let payload = Payload::from_fields([
            ("format", json!("csv")),
            ("limit", json!(1000)),
            ("enabled", json!(true)),
        ]);

        assert_eq!(payload.field("format"), Some(&json!("csv")));
        assert_eq!(payload.field("limit"), Some(&json!(1000)));
        assert!(payload.as_bytes().is_none());
    }

    #[test]
    fn test_job_serialization_shape() {
        let job = Job::new("job-1", "export")
            .with_payload(json!({"format": "csv"}))
            .with_tag("internal");

        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["id"], json!("job-1"));
        assert_eq!(value["status"], json!("pending"));
        assert_eq!(value["retries"], json!(0));
        assert_eq!(value["payload"]["kind"], json!("json"));
        assert!(value.get("tags").is_none());
        assert!(value.get("created_at").is_some());
    }

    #[test]
    fn test_empty_payload_is_omitted() {
        let job = Job::new("job-1", "export");
        let value = serde_json::to_value(&job).unwrap();
        assert!(value.get("payload").is_none());

        let back: Job = serde_json::from_value(value).unwrap();
        assert!(back.payload().is_empty());
    }
}
