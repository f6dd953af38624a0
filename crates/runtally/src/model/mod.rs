pub mod codes;
pub mod ids;
pub mod progress;
pub mod summary;
pub mod timestamp;
pub mod tree;

pub use codes::{ProgressStatus, ProgressType, ResultCode, ResultType};
pub use ids::{InstanceId, RunId};
pub use progress::ProgressInfo;
pub use summary::{BuildInfo, JobInfo, PipelineInfo, RunOutcome, RunSummary, SummaryDetail};
pub use timestamp::Timestamp;
pub use tree::{
    ContainerRecord, LeafShape, NodeDetail, NodeRecord, Recordable, ResultContainer, ResultNode,
    ResultTree, TaskingGroup, TaskingGroupRecord, TracebackDetail,
};
