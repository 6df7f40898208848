//! End-to-end checks against the built `flux` binary.

use std::collections::HashMap;

use assert_cmd::Command;
use flux_core::{ProgramId, Version, WorkflowId};
use flux_workflow::{Edge, Node, Workflow, WorkflowConfig};

fn write_workflow(dir: &tempfile::TempDir, workflow: &Workflow) -> std::path::PathBuf {
    let path = dir.path().join("workflow.json");
    std::fs::write(&path, serde_json::to_string(workflow).unwrap()).unwrap();
    path
}

fn single_node_workflow() -> Workflow {
    let now = chrono::Utc::now();
    Workflow {
        id: WorkflowId::v4(),
        name: "demo".into(),
        description: None,
        version: Version::new(0, 1, 0),
        nodes: vec![Node::new(flux_core::NodeId::v4(), "only", ProgramId::v4())],
        edges: vec![],
        variables: HashMap::new(),
        config: WorkflowConfig::default(),
        tags: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

fn cyclic_workflow() -> Workflow {
    let mut workflow = single_node_workflow();
    let a = workflow.nodes[0].id;
    let b_id = flux_core::NodeId::v4();
    workflow.nodes.push(Node::new(b_id, "b", ProgramId::v4()));
    workflow.edges = vec![Edge::new(a, b_id), Edge::new(b_id, a)];
    workflow
}

#[test]
fn validate_accepts_a_well_formed_workflow() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_workflow(&dir, &single_node_workflow());

    Command::cargo_bin("flux")
        .unwrap()
        .args(["validate", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicates::str::contains("workflow is valid"));
}

#[test]
fn validate_rejects_a_cyclic_workflow() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_workflow(&dir, &cyclic_workflow());

    Command::cargo_bin("flux")
        .unwrap()
        .args(["validate", path.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicates::str::contains("WORKFLOW_CYCLE_DETECTED"));
}

#[test]
fn run_executes_a_single_node_workflow_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_workflow(&dir, &single_node_workflow());

    Command::cargo_bin("flux")
        .unwrap()
        .args(["run", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicates::str::contains("execution finished: completed"));
}
