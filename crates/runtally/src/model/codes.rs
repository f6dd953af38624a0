use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a result tree node.
///
/// Container kinds bracket the leaf kinds they hold. The numeric order only
/// drives default sorting.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultType {
    Job = 0,
    Package = 1,
    Scope = 2,
    TaskContainer = 3,
    Task = 4,
    TestContainer = 5,
    Test = 6,
    StepContainer = 7,
    Step = 8,
    TaskingGroup = 9,
    Tasking = 10,
}

impl ResultType {
    /// Whether nodes of this kind only link children and carry no result data.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            Self::Job
                | Self::Package
                | Self::Scope
                | Self::TaskContainer
                | Self::TestContainer
                | Self::StepContainer
                | Self::TaskingGroup
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Job => "JOB",
            Self::Package => "PACKAGE",
            Self::Scope => "SCOPE",
            Self::TaskContainer => "TASK_CONTAINER",
            Self::Task => "TASK",
            Self::TestContainer => "TEST_CONTAINER",
            Self::Test => "TEST",
            Self::StepContainer => "STEP_CONTAINER",
            Self::Step => "STEP",
            Self::TaskingGroup => "TASKING_GROUP",
            Self::Tasking => "TASKING",
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a leaf, ordered by badness for rollups.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCode {
    #[default]
    Unset = 0,
    Passed = 1,
    Skipped = 2,
    Errored = 3,
    Failed = 4,
    Cancelled = 5,
    Unknown = 6,
}

impl ResultCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unset => "UNSET",
            Self::Passed => "PASSED",
            Self::Skipped => "SKIPPED",
            Self::Errored => "ERRORED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status carried by a progress postback.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum ProgressStatus {
    NotStarted,
    Running,
    Paused,
    Completed,
    Failed,
    Errored,
}

impl ProgressStatus {
    /// Terminal statuses remove the task from the running table.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Errored)
    }
}

/// How a progress position should be interpreted.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum ProgressType {
    NumericRange,
    Sequential,
    TimeSpan,
}
