// Test module - relaxed lint rules
#![allow(clippy::indexing_slicing)]
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

use runtally::model::{
    InstanceId, Recordable, ResultCode, ResultContainer, ResultNode, ResultTree, ResultType,
    TaskingGroup, TracebackDetail,
};
use runtally::RecorderError;
use serde_json::{json, Map, Value};

fn job() -> ResultContainer {
    ResultContainer::job(InstanceId::from("job"), "nightly")
}

fn test_leaf(id: &str) -> ResultNode {
    ResultNode::test(
        InstanceId::from(id),
        id,
        InstanceId::from("suite"),
        Vec::new(),
        Map::new(),
    )
}

fn boom() -> TracebackDetail {
    TracebackDetail::new("AssertionError", "expected 2, got 3")
        .with_traceback(vec!["file test_math.py, line 4".to_string()])
}

fn to_value<R: Recordable>(node: &R, preview: bool) -> Value {
    serde_json::to_value(node.to_record(preview)).unwrap()
}

#[test]
fn failure_wins_over_errors() {
    let mut leaf = test_leaf("a");
    leaf.add_error(boom());
    leaf.add_error(boom());
    leaf.add_failure(boom());
    leaf.finalize();
    assert_eq!(leaf.result_code(), ResultCode::Failed);
    assert!(leaf.is_finalized());
}

#[test]
fn errors_without_failures_finalize_to_errored() {
    let mut leaf = test_leaf("a");
    leaf.add_error(boom());
    leaf.finalize();
    assert_eq!(leaf.result_code(), ResultCode::Errored);
}

#[test]
fn clean_leaf_passes_and_warnings_do_not_count() {
    let mut leaf = test_leaf("b");
    leaf.add_warning(["deprecated call"]);
    leaf.finalize();
    assert_eq!(leaf.result_code(), ResultCode::Passed);
}

#[test]
fn explicit_codes_survive_finalize() {
    let mut skipped = test_leaf("c");
    skipped.add_failure(boom());
    skipped.mark_skip("flaky", "BUG-1");
    skipped.finalize();
    assert_eq!(skipped.result_code(), ResultCode::Skipped);

    let mut cancelled = test_leaf("d");
    cancelled.add_error(boom());
    cancelled.mark_cancelled();
    cancelled.finalize();
    assert_eq!(cancelled.result_code(), ResultCode::Cancelled);

    let mut passed = ResultNode::task(InstanceId::from("t"), "setup", InstanceId::from("job"));
    passed.mark_passed();
    passed.finalize();
    assert_eq!(passed.result_code(), ResultCode::Passed);
}

#[test]
fn marked_passed_leaf_with_failure_finalizes_failed() {
    let mut leaf = test_leaf("e");
    leaf.mark_passed();
    leaf.add_failure(boom());
    leaf.finalize();
    assert_eq!(leaf.result_code(), ResultCode::Failed);

    let mut errored = ResultNode::task(InstanceId::from("t2"), "setup", InstanceId::from("job"));
    errored.add_error(boom());
    errored.mark_passed();
    errored.finalize();
    assert_eq!(errored.result_code(), ResultCode::Errored);
}

#[test]
fn new_leaf_is_open_and_unset() {
    let leaf = test_leaf("a");
    assert_eq!(leaf.result_code(), ResultCode::Unset);
    assert!(leaf.stop().is_none());
    assert!(!leaf.is_finalized());
}

#[test]
fn warnings_are_split_and_trimmed() {
    let mut leaf = test_leaf("a");
    leaf.add_warning(["first line  \r\nsecond line\n", "third\t"]);
    assert_eq!(
        leaf.warnings(),
        &[vec![
            "first line".to_string(),
            "second line".to_string(),
            "third".to_string(),
        ]]
    );
}

#[test]
fn preview_omits_detail_block() {
    let mut leaf = test_leaf("a");
    leaf.add_failure(boom());
    leaf.set_documentation("checks addition");
    leaf.finalize();

    let full = to_value(&leaf, false);
    let preview = to_value(&leaf, true);

    assert!(preview.get("detail").is_none());
    let detail = &full["detail"];
    assert_eq!(detail["failures"][0]["extype"], "AssertionError");
    assert_eq!(detail["documentation"], "checks addition");
    assert!(detail.get("reason").is_none());

    for key in ["name", "instance", "parent", "rtype", "result", "start", "stop"] {
        assert_eq!(full[key], preview[key], "field {key} differs");
    }
}

#[test]
fn test_record_layout() {
    let mut pivots = Map::new();
    pivots.insert("os".to_string(), json!("linux"));
    let mut leaf = ResultNode::test(
        InstanceId::from("t1"),
        "test_add[linux]",
        InstanceId::from("suite"),
        vec!["os".to_string()],
        pivots,
    );
    leaf.mark_skip("flaky", "BUG-1");
    leaf.finalize();

    let text = serde_json::to_string(&leaf.to_record(false)).unwrap();
    let positions: Vec<usize> = [
        "name", "monikers", "pivots", "instance", "parent", "rtype", "result", "start", "stop",
        "detail",
    ]
    .iter()
    .map(|key| text.find(&format!("\"{key}\":")).unwrap())
    .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]), "{text}");

    let record = to_value(&leaf, false);
    assert_eq!(record["rtype"], "TEST");
    assert_eq!(record["result"], "SKIPPED");
    assert_eq!(record["pivots"]["os"], "linux");
    assert_eq!(record["detail"]["reason"], "flaky");
    assert_eq!(record["detail"]["bug"], "BUG-1");
}

#[test]
fn tasking_carries_worker_and_return_value() {
    let mut tasking = ResultNode::tasking(InstanceId::from("k1"), "reboot", None, "host-7");
    tasking.set_return_value(json!({"uptime": 3}));
    tasking.finalize();

    let record = to_value(&tasking, true);
    assert_eq!(record["rtype"], "TASKING");
    assert_eq!(record["worker"], "host-7");
    assert_eq!(record["return_value"]["uptime"], 3);
    assert_eq!(record["parent"], Value::Null);
    assert!(record.get("monikers").is_none());
}

#[test]
fn containers_serialize_linkage_only() {
    let suite = ResultContainer::test_container(
        InstanceId::from("suite"),
        "math",
        InstanceId::from("job"),
    );
    let record = to_value(&suite, false);
    assert_eq!(
        record,
        json!({"name": "math", "instance": "suite", "parent": "job", "rtype": "TEST_CONTAINER"})
    );
    assert_eq!(suite.result_code(), None);
}

#[test]
fn tasking_group_records_its_span() {
    let mut group = TaskingGroup::new(InstanceId::from("g"), "fleet", InstanceId::from("job"));
    let open = to_value(&group, false);
    assert_eq!(open["rtype"], "TASKING_GROUP");
    assert_eq!(open["stop"], Value::Null);

    group.finalize();
    let closed = to_value(&group, false);
    assert!(closed["stop"].is_string());
    assert!(group.stop().unwrap() >= group.start());
}

#[test]
fn tree_rejects_bad_linkage() {
    let mut tree = ResultTree::new();
    tree.add_container(job()).unwrap();

    let orphan = ResultContainer::test_container(
        InstanceId::from("suite"),
        "math",
        InstanceId::from("missing"),
    );
    assert!(matches!(
        tree.add_container(orphan),
        Err(RecorderError::Tree { .. })
    ));

    let second_root = ResultContainer::job(InstanceId::from("job2"), "other");
    assert!(tree.add_container(second_root).is_err());

    assert!(tree.add_container(job()).is_err());

    let leaf_kind = ResultContainer::new(
        InstanceId::from("x"),
        "x",
        ResultType::Test,
        Some(InstanceId::from("job")),
    );
    assert!(tree.add_container(leaf_kind).is_err());
    assert_eq!(tree.len(), 1);
}

#[test]
fn tree_validates_leaves() {
    let mut tree = ResultTree::new();
    tree.add_container(job()).unwrap();
    tree.add_container(ResultContainer::test_container(
        InstanceId::from("suite"),
        "math",
        InstanceId::from("job"),
    ))
    .unwrap();

    tree.validate_leaf(&test_leaf("a")).unwrap();
    let detached = ResultNode::tasking(InstanceId::from("k"), "probe", None, "host");
    tree.validate_leaf(&detached).unwrap();

    let stray = ResultNode::step(InstanceId::from("s"), "s", InstanceId::from("nowhere"));
    assert!(tree.validate_leaf(&stray).is_err());
}

#[test]
fn rollup_reports_worst_code_below_container() {
    let mut tree = ResultTree::new();
    tree.add_container(job()).unwrap();
    tree.add_container(ResultContainer::test_container(
        InstanceId::from("suite"),
        "math",
        InstanceId::from("job"),
    ))
    .unwrap();
    tree.add_container(ResultContainer::test_container(
        InstanceId::from("other"),
        "strings",
        InstanceId::from("job"),
    ))
    .unwrap();

    let mut passed = test_leaf("a");
    passed.finalize();
    let mut failed = test_leaf("b");
    failed.add_failure(boom());
    failed.finalize();
    let mut elsewhere = ResultNode::test(
        InstanceId::from("c"),
        "c",
        InstanceId::from("other"),
        Vec::new(),
        Map::new(),
    );
    elsewhere.mark_skip("n/a", "");
    elsewhere.finalize();

    let leaves = [passed, failed, elsewhere];
    assert_eq!(
        tree.rollup(&InstanceId::from("suite"), &leaves),
        Some(ResultCode::Failed)
    );
    assert_eq!(
        tree.rollup(&InstanceId::from("other"), &leaves),
        Some(ResultCode::Skipped)
    );
    assert_eq!(
        tree.rollup(&InstanceId::from("job"), &leaves),
        Some(ResultCode::Failed)
    );
    assert!(tree.is_within(&InstanceId::from("suite"), &InstanceId::from("job")));
    assert!(!tree.is_within(&InstanceId::from("suite"), &InstanceId::from("other")));
}

#[test]
fn rollup_of_empty_container_is_none() {
    let mut tree = ResultTree::new();
    tree.add_container(job()).unwrap();
    let none: [ResultNode; 0] = [];
    assert_eq!(tree.rollup(&InstanceId::from("job"), &none), None);
}
