//! Result tree entities: containers that only link, and leaves that carry results.
//!
//! Containers never hold result data. Aggregates for a container are computed
//! on demand from the leaves below it (see [`ResultTree::rollup`]).
//!
//! A leaf is opened with `start = now` and `result_code = Unset`, mutated by
//! its single owning context, then finalized exactly once before it is handed
//! to the recorder.

use crate::error::{RecorderError, RecorderResult};
use crate::model::codes::{ResultCode, ResultType};
use crate::model::ids::InstanceId;
use crate::model::timestamp::{format_iso8601, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Captured error or failure detail attached to a leaf.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracebackDetail {
    pub extype: String,
    pub message: String,
    #[serde(default)]
    pub traceback: Vec<String>,
}

impl TracebackDetail {
    pub fn new(extype: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            extype: extype.into(),
            message: message.into(),
            traceback: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_traceback(mut self, lines: Vec<String>) -> Self {
        self.traceback = lines;
        self
    }
}

/// A non-leaf node. Establishes parent/child linkage only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultContainer {
    id: InstanceId,
    name: String,
    parent_id: Option<InstanceId>,
    result_type: ResultType,
}

/// Serialized form of a [`ResultContainer`].
#[derive(Debug, Serialize)]
pub struct ContainerRecord<'a> {
    pub name: &'a str,
    pub instance: &'a InstanceId,
    pub parent: Option<&'a InstanceId>,
    pub rtype: ResultType,
}

impl ResultContainer {
    pub fn new(
        id: InstanceId,
        name: impl Into<String>,
        result_type: ResultType,
        parent_id: Option<InstanceId>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id,
            result_type,
        }
    }

    /// Root of a result tree.
    pub fn job(id: InstanceId, name: impl Into<String>) -> Self {
        Self::new(id, name, ResultType::Job, None)
    }

    pub fn test_container(id: InstanceId, name: impl Into<String>, parent_id: InstanceId) -> Self {
        Self::new(id, name, ResultType::TestContainer, Some(parent_id))
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_id(&self) -> Option<&InstanceId> {
        self.parent_id.as_ref()
    }

    pub fn result_type(&self) -> ResultType {
        self.result_type
    }

    pub fn as_record(&self) -> ContainerRecord<'_> {
        ContainerRecord {
            name: &self.name,
            instance: &self.id,
            parent: self.parent_id.as_ref(),
            rtype: self.result_type,
        }
    }
}

/// A container for a group of taskings that also tracks its own time span.
#[derive(Clone, Debug)]
pub struct TaskingGroup {
    container: ResultContainer,
    start: Timestamp,
    stop: Option<Timestamp>,
}

#[derive(Debug, Serialize)]
pub struct TaskingGroupRecord<'a> {
    pub name: &'a str,
    pub instance: &'a InstanceId,
    pub parent: Option<&'a InstanceId>,
    pub rtype: ResultType,
    pub start: String,
    pub stop: Option<String>,
}

impl TaskingGroup {
    pub fn new(id: InstanceId, name: impl Into<String>, parent_id: InstanceId) -> Self {
        Self {
            container: ResultContainer::new(id, name, ResultType::TaskingGroup, Some(parent_id)),
            start: Utc::now(),
            stop: None,
        }
    }

    pub fn container(&self) -> &ResultContainer {
        &self.container
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn stop(&self) -> Option<Timestamp> {
        self.stop
    }

    pub fn finalize(&mut self) {
        self.stop = Some(Utc::now());
    }

    pub fn as_record(&self) -> TaskingGroupRecord<'_> {
        TaskingGroupRecord {
            name: &self.container.name,
            instance: &self.container.id,
            parent: self.container.parent_id.as_ref(),
            rtype: self.container.result_type,
            start: format_iso8601(&self.start),
            stop: self.stop.as_ref().map(format_iso8601),
        }
    }
}

/// Kind-specific data carried by a leaf in addition to the common fields.
#[derive(Clone, Debug, PartialEq)]
pub enum LeafShape {
    /// Task and step leaves.
    Plain,
    Test {
        /// Parameter names used to extend the test name.
        monikers: Vec<String>,
        /// Parameterization labels used for result comparisons.
        pivots: Map<String, Value>,
    },
    Tasking {
        /// Host or identity that executed the tasking.
        worker: String,
        return_value: Option<Value>,
    },
}

/// A result-bearing leaf of the tree (task, test, step, or tasking).
#[derive(Clone, Debug, PartialEq)]
pub struct ResultNode {
    id: InstanceId,
    name: String,
    parent_id: Option<InstanceId>,
    result_type: ResultType,
    result_code: ResultCode,
    start: Timestamp,
    stop: Option<Timestamp>,
    errors: Vec<TracebackDetail>,
    failures: Vec<TracebackDetail>,
    warnings: Vec<Vec<String>>,
    documentation: Option<String>,
    skip_reason: Option<String>,
    skip_bug: Option<String>,
    shape: LeafShape,
}

/// Serialized form of a [`ResultNode`]. Field order is the record layout.
#[derive(Debug, Serialize)]
pub struct NodeRecord<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monikers: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pivots: Option<&'a Map<String, Value>>,
    pub instance: &'a InstanceId,
    pub parent: Option<&'a InstanceId>,
    pub rtype: ResultType,
    pub result: ResultCode,
    pub start: String,
    pub stop: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_value: Option<&'a Option<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<NodeDetail<'a>>,
}

/// The expensive part of a record, omitted from previews.
#[derive(Debug, Serialize)]
pub struct NodeDetail<'a> {
    pub errors: &'a [TracebackDetail],
    pub failures: &'a [TracebackDetail],
    pub warnings: &'a [Vec<String>],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bug: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<&'a str>,
}

impl ResultNode {
    fn open(
        id: InstanceId,
        name: impl Into<String>,
        parent_id: Option<InstanceId>,
        result_type: ResultType,
        shape: LeafShape,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id,
            result_type,
            result_code: ResultCode::Unset,
            start: Utc::now(),
            stop: None,
            errors: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
            documentation: None,
            skip_reason: None,
            skip_bug: None,
            shape,
        }
    }

    pub fn task(id: InstanceId, name: impl Into<String>, parent_id: InstanceId) -> Self {
        Self::open(id, name, Some(parent_id), ResultType::Task, LeafShape::Plain)
    }

    pub fn step(id: InstanceId, name: impl Into<String>, parent_id: InstanceId) -> Self {
        Self::open(id, name, Some(parent_id), ResultType::Step, LeafShape::Plain)
    }

    pub fn test(
        id: InstanceId,
        name: impl Into<String>,
        parent_id: InstanceId,
        monikers: Vec<String>,
        pivots: Map<String, Value>,
    ) -> Self {
        Self::open(
            id,
            name,
            Some(parent_id),
            ResultType::Test,
            LeafShape::Test { monikers, pivots },
        )
    }

    /// Taskings may run detached from any tree, so their parent is optional.
    pub fn tasking(
        id: InstanceId,
        name: impl Into<String>,
        parent_id: Option<InstanceId>,
        worker: impl Into<String>,
    ) -> Self {
        Self::open(
            id,
            name,
            parent_id,
            ResultType::Tasking,
            LeafShape::Tasking {
                worker: worker.into(),
                return_value: None,
            },
        )
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_id(&self) -> Option<&InstanceId> {
        self.parent_id.as_ref()
    }

    pub fn result_type(&self) -> ResultType {
        self.result_type
    }

    pub fn result_code(&self) -> ResultCode {
        self.result_code
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn stop(&self) -> Option<Timestamp> {
        self.stop
    }

    pub fn errors(&self) -> &[TracebackDetail] {
        &self.errors
    }

    pub fn failures(&self) -> &[TracebackDetail] {
        &self.failures
    }

    pub fn warnings(&self) -> &[Vec<String>] {
        &self.warnings
    }

    pub fn documentation(&self) -> Option<&str> {
        self.documentation.as_deref()
    }

    pub fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }

    pub fn skip_bug(&self) -> Option<&str> {
        self.skip_bug.as_deref()
    }

    pub fn shape(&self) -> &LeafShape {
        &self.shape
    }

    pub fn is_finalized(&self) -> bool {
        self.stop.is_some()
    }

    pub fn add_error(&mut self, detail: TracebackDetail) {
        self.errors.push(detail);
    }

    pub fn add_failure(&mut self, detail: TracebackDetail) {
        self.failures.push(detail);
    }

    /// Add one warning. Input lines are split on embedded newlines and each
    /// resulting line is right-trimmed, so the stored warning is one entry
    /// per line.
    pub fn add_warning<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut trimmed = Vec::new();
        for line in lines {
            let line = line.as_ref().replace("\r\n", "\n");
            trimmed.extend(line.trim_end().split('\n').map(|part| part.trim_end().to_string()));
        }
        self.warnings.push(trimmed);
    }

    pub fn set_documentation(&mut self, text: impl Into<String>) {
        self.documentation = Some(text.into());
    }

    pub fn mark_passed(&mut self) {
        self.result_code = ResultCode::Passed;
    }

    pub fn mark_cancelled(&mut self) {
        self.result_code = ResultCode::Cancelled;
    }

    pub fn mark_skip(&mut self, reason: impl Into<String>, bug: impl Into<String>) {
        self.skip_reason = Some(reason.into());
        self.skip_bug = Some(bug.into());
        self.result_code = ResultCode::Skipped;
    }

    /// Record the value produced by a tasking. No-op on other leaf kinds.
    pub fn set_return_value(&mut self, value: Value) {
        if let LeafShape::Tasking { return_value, .. } = &mut self.shape {
            *return_value = Some(value);
        }
    }

    /// Stamp `stop` and derive the result code.
    ///
    /// Failures win over errors; a leaf with neither passes. Only a leaf
    /// marked skipped or cancelled keeps its code; `mark_passed` does not
    /// hide recorded failures or errors.
    ///
    /// # Preconditions
    /// Call at most once per leaf. A second call restamps `stop` and derives
    /// the same code again.
    pub fn finalize(&mut self) {
        self.stop = Some(Utc::now());
        if !matches!(self.result_code, ResultCode::Skipped | ResultCode::Cancelled) {
            self.result_code = rollup_code(self.failures.len(), self.errors.len());
        }
    }

    /// Serialize the leaf. Previews omit the `detail` block.
    pub fn as_record(&self, preview: bool) -> NodeRecord<'_> {
        let (monikers, pivots, worker, return_value) = match &self.shape {
            LeafShape::Plain => (None, None, None, None),
            LeafShape::Test { monikers, pivots } => {
                (Some(monikers.as_slice()), Some(pivots), None, None)
            }
            LeafShape::Tasking {
                worker,
                return_value,
            } => (None, None, Some(worker.as_str()), Some(return_value)),
        };
        let detail = (!preview).then(|| NodeDetail {
            errors: &self.errors,
            failures: &self.failures,
            warnings: &self.warnings,
            reason: self.skip_reason.as_deref(),
            bug: self.skip_bug.as_deref(),
            documentation: self.documentation.as_deref(),
        });
        NodeRecord {
            name: &self.name,
            monikers,
            pivots,
            instance: &self.id,
            parent: self.parent_id.as_ref(),
            rtype: self.result_type,
            result: self.result_code,
            start: format_iso8601(&self.start),
            stop: self.stop.as_ref().map(format_iso8601),
            worker,
            return_value,
            detail,
        }
    }
}

fn rollup_code(failures: usize, errors: usize) -> ResultCode {
    if failures > 0 {
        ResultCode::Failed
    } else if errors > 0 {
        ResultCode::Errored
    } else {
        ResultCode::Passed
    }
}

/// Registry of containers enforcing parent linkage.
///
/// There is exactly one root (parent `None`); every other container must
/// name an already registered container as its parent.
#[derive(Clone, Debug, Default)]
pub struct ResultTree {
    containers: BTreeMap<InstanceId, ResultContainer>,
    root: Option<InstanceId>,
}

impl ResultTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<&ResultContainer> {
        self.root.as_ref().and_then(|id| self.containers.get(id))
    }

    pub fn get(&self, id: &InstanceId) -> Option<&ResultContainer> {
        self.containers.get(id)
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    pub fn add_container(&mut self, container: ResultContainer) -> RecorderResult<()> {
        if !container.result_type().is_container() {
            return Err(RecorderError::tree(format!(
                "{} is a leaf kind and cannot be registered as a container",
                container.result_type()
            )));
        }
        if self.containers.contains_key(container.id()) {
            return Err(RecorderError::tree(format!(
                "container {} is already registered",
                container.id()
            )));
        }
        match container.parent_id() {
            None if self.root.is_some() => {
                return Err(RecorderError::tree(format!(
                    "container {} has no parent but the tree already has a root",
                    container.id()
                )));
            }
            None => self.root = Some(container.id().clone()),
            Some(parent) if !self.containers.contains_key(parent) => {
                return Err(RecorderError::tree(format!(
                    "container {} references unknown parent {parent}",
                    container.id()
                )));
            }
            Some(_) => {}
        }
        self.containers.insert(container.id().clone(), container);
        Ok(())
    }

    /// Check that a leaf hangs off a registered container.
    pub fn validate_leaf(&self, leaf: &ResultNode) -> RecorderResult<()> {
        match leaf.parent_id() {
            Some(parent) if self.containers.contains_key(parent) => Ok(()),
            Some(parent) => Err(RecorderError::tree(format!(
                "leaf {} references unknown parent {parent}",
                leaf.id()
            ))),
            None if leaf.result_type() == ResultType::Tasking => Ok(()),
            None => Err(RecorderError::tree(format!(
                "leaf {} of kind {} needs a parent",
                leaf.id(),
                leaf.result_type()
            ))),
        }
    }

    /// Whether `id` is `ancestor` or sits anywhere below it.
    pub fn is_within(&self, id: &InstanceId, ancestor: &InstanceId) -> bool {
        let mut current = Some(id);
        while let Some(next) = current {
            if next == ancestor {
                return true;
            }
            current = self.containers.get(next).and_then(ResultContainer::parent_id);
        }
        false
    }

    /// Worst result code among the leaves below `container`, by badness order.
    ///
    /// Returns `None` when no leaf sits below the container.
    pub fn rollup<'a, I>(&self, container: &InstanceId, leaves: I) -> Option<ResultCode>
    where
        I: IntoIterator<Item = &'a ResultNode>,
    {
        leaves
            .into_iter()
            .filter(|leaf| {
                leaf.parent_id()
                    .is_some_and(|parent| self.is_within(parent, container))
            })
            .map(ResultNode::result_code)
            .max()
    }
}

/// Anything the recorder can append to the record stream.
pub trait Recordable {
    type Record<'a>: Serialize
    where
        Self: 'a;

    fn result_type(&self) -> ResultType;

    /// Result code of a leaf; `None` for containers.
    fn result_code(&self) -> Option<ResultCode>;

    /// Serialized form. `preview` drops the detail block where there is one.
    fn to_record(&self, preview: bool) -> Self::Record<'_>;
}

impl Recordable for ResultNode {
    type Record<'a> = NodeRecord<'a>;

    fn result_type(&self) -> ResultType {
        self.result_type
    }

    fn result_code(&self) -> Option<ResultCode> {
        Some(self.result_code)
    }

    fn to_record(&self, preview: bool) -> NodeRecord<'_> {
        self.as_record(preview)
    }
}

impl Recordable for ResultContainer {
    type Record<'a> = ContainerRecord<'a>;

    fn result_type(&self) -> ResultType {
        self.result_type
    }

    fn result_code(&self) -> Option<ResultCode> {
        None
    }

    fn to_record(&self, _preview: bool) -> ContainerRecord<'_> {
        self.as_record()
    }
}

impl Recordable for TaskingGroup {
    type Record<'a> = TaskingGroupRecord<'a>;

    fn result_type(&self) -> ResultType {
        self.container.result_type
    }

    fn result_code(&self) -> Option<ResultCode> {
        None
    }

    fn to_record(&self, _preview: bool) -> TaskingGroupRecord<'_> {
        self.as_record()
    }
}
