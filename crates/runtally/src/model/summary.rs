use crate::model::ids::RunId;
use crate::model::timestamp::{iso8601, iso8601_option, Timestamp};
use crate::progress::ProgressTable;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Build the run is exercising.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub release: String,
    pub branch: String,
    pub build: String,
    pub flavor: String,
    pub url: String,
}

/// Pipeline the run belongs to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub id: String,
    pub name: String,
    pub instance: String,
}

/// Job as seen by the runner that launched the run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub job_type: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub initiator: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

/// Overall state of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunOutcome {
    Running,
    Passed,
    Failed,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Running => "RUNNING",
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
        })
    }
}

/// Final counters, filled in when the run is finalized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryDetail {
    pub errors: u64,
    pub failed: u64,
    pub skipped: u64,
    pub passed: u64,
    pub total: u64,
}

/// Aggregate state of one run. Owned by the recorder; everyone else
/// receives clones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub title: String,
    pub runid: RunId,
    pub build: BuildInfo,
    pub pipeline: PipelineInfo,
    pub job: JobInfo,
    #[serde(with = "iso8601")]
    pub start: Timestamp,
    #[serde(with = "iso8601_option")]
    pub stop: Option<Timestamp>,
    pub result: RunOutcome,
    pub apod: Option<String>,
    pub detail: Option<SummaryDetail>,
    pub running: ProgressTable,
}
