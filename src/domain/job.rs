//! Remote job types exchanged with the job service.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Payload for scheduling one remote job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub body: String,
    pub sender: String,
    pub to: String,
    pub schedule_type: String,
    pub send_at: DateTime<Utc>,
}

/// Builds a [`JobRequest`] for each record index.
///
/// `{index}` in the body is replaced with the record index. Jobs are spread
/// out in time: `send_at = now + lead_time + spacing * index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateTemplate {
    pub body: String,
    pub sender: String,
    pub to: String,
    pub lead_time_secs: i64,
    pub spacing_ms: i64,
}

impl Default for CreateTemplate {
    fn default() -> Self {
        Self {
            body: "Bulk Message # {index}".to_string(),
            sender: String::new(),
            to: String::new(),
            lead_time_secs: 60 * 60 * 24 * 2,
            spacing_ms: 500,
        }
    }
}

impl CreateTemplate {
    pub fn request_for(&self, index: u64, now: DateTime<Utc>) -> JobRequest {
        let offset_ms = self.spacing_ms.saturating_mul(index.min(i64::MAX as u64) as i64);
        let offset = TimeDelta::try_seconds(self.lead_time_secs).unwrap_or_default()
            + TimeDelta::try_milliseconds(offset_ms).unwrap_or_default();

        JobRequest {
            body: self.body.replace("{index}", &index.to_string()),
            sender: self.sender.clone(),
            to: self.to.clone(),
            schedule_type: "fixed".to_string(),
            send_at: now + offset,
        }
    }
}

/// Status of a remote job as reported by the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Scheduled,
    Canceled,
    Other(String),
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "scheduled" => JobStatus::Scheduled,
            "canceled" => JobStatus::Canceled,
            _ => JobStatus::Other(s),
        }
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Scheduled => "scheduled".to_string(),
            JobStatus::Canceled => "canceled".to_string(),
            JobStatus::Other(s) => s,
        }
    }
}

/// Target state for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Canceled,
}

/// One entry of the remote listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteJob {
    #[serde(alias = "sid")]
    pub id: String,
    pub status: JobStatus,
}

impl RemoteJob {
    pub fn new(id: impl Into<String>, status: JobStatus) -> Self {
        Self { id: id.into(), status }
    }

    /// Scheduled jobs need a state transition before removal.
    pub fn needs_transition(&self) -> bool {
        self.status == JobStatus::Scheduled
    }
}

/// Filter for enumerating remote jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListFilter {
    pub to: Option<String>,
    pub page_size: u32,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self { to: None, page_size: 1000 }
    }
}
