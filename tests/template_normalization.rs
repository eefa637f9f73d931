//! End-to-end checks of the template normalizer against backend-shaped
//! records, through the public crate API only.
//!
//! Run with: cargo test --test template_normalization

use agent_console_frontend::models::{
    AgentRole, ApiTemplateRecord, Complexity, Position, StepType, TemplateBody, TemplateType,
};
use agent_console_frontend::templates::{
    convert_api_template, import_template, template_to_api_record, FileFormat,
};
use serde_json::json;

fn record(value: serde_json::Value) -> ApiTemplateRecord {
    serde_json::from_value(value).expect("record decodes")
}

#[test]
fn minimal_agent_entry_gets_defaults() {
    let rec = record(json!({
        "id": 7,
        "name": "Ops crew",
        "template_type": "agent",
        "agents_data": [{ "name": "X", "role": "executor" }],
        "connections_data": []
    }));

    let template = convert_api_template(&rec);
    assert_eq!(template.id, "7");
    assert_eq!(template.template_type(), TemplateType::Agent);
    assert!(!template.is_custom);

    let TemplateBody::Agent { nodes, edges, agent_count, .. } = &template.body else {
        panic!("expected an agent template");
    };
    assert_eq!(*agent_count, 1);
    assert!(edges.is_empty());
    let node = &nodes[0];
    assert_eq!(node.position, Position::new(100.0, 100.0));
    assert_eq!(node.data.name, "X");
    assert_eq!(node.data.role, AgentRole::Executor);
    assert_eq!(node.data.level, 2);
    assert_eq!(node.data.max_concurrent_tasks, 5);
    assert_eq!(template.complexity, Complexity::Simple);
}

#[test]
fn json_blobs_stored_as_strings_are_unpacked() {
    let rec = record(json!({
        "id": "a1",
        "name": "Stringly",
        "template_type": "agent",
        "agents_data": "[{\"id\":\"n1\",\"name\":\"Lead\",\"role\":\"SUPERVISOR\"},{\"id\":\"n2\"}]",
        "connections_data": "[{\"from\":\"n1\",\"to\":\"n2\",\"relationship\":\"delegates\"}]"
    }));

    let template = convert_api_template(&rec);
    let TemplateBody::Agent { nodes, edges, .. } = &template.body else {
        panic!("expected an agent template");
    };
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].data.role, AgentRole::Supervisor);
    assert_eq!(nodes[1].data.name, "Agent 2");
    assert_eq!(nodes[1].position, Position::new(350.0, 100.0));
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].source, "n1");
    assert_eq!(edges[0].label.as_deref(), Some("delegates"));
}

#[test]
fn workflow_steps_without_connections_become_a_chain() {
    let rec = record(json!({
        "id": "wf-1",
        "name": "Onboarding",
        "template_type": "workflow",
        "steps": ["Collect", "Verify", { "label": "Notify", "type": "output" }]
    }));

    let template = convert_api_template(&rec);
    let TemplateBody::Workflow { nodes, edges, steps } = &template.body else {
        panic!("expected a workflow template");
    };
    assert_eq!(steps, &vec!["Collect".to_string(), "Verify".into(), "Notify".into()]);
    assert_eq!(nodes.len(), 3);
    assert_eq!(nodes[2].data.step_type, StepType::Output);
    assert_eq!(edges.len(), 2);
    assert_eq!((edges[0].source.as_str(), edges[0].target.as_str()), ("step-1", "step-2"));
    assert_eq!((edges[1].source.as_str(), edges[1].target.as_str()), ("step-2", "step-3"));
    // Third column of the fallback grid.
    assert_eq!(nodes[2].position, Position::new(600.0, 100.0));
}

#[test]
fn untyped_record_with_agents_is_an_agent_template() {
    let rec = record(json!({ "name": "", "agents_data": [] }));
    let template = convert_api_template(&rec);
    assert_eq!(template.template_type(), TemplateType::Agent);
    assert_eq!(template.name, "Untitled Agent Network");
    assert!(template.id.starts_with("custom-"));
    assert!(template.is_custom);
}

#[test]
fn record_round_trip_keeps_the_graph() {
    let rec = record(json!({
        "id": "a9",
        "name": "Pair",
        "template_type": "agent",
        "agents_data": [
            { "id": "p", "name": "Planner", "role": "coordinator", "position": { "x": 10, "y": 20 } },
            { "id": "w", "name": "Worker", "position": { "x": 300, "y": 20 } }
        ],
        "connections_data": [{ "id": "e", "source": "p", "target": "w" }]
    }));
    let first = convert_api_template(&rec);
    let second = convert_api_template(&template_to_api_record(&first));

    assert_eq!(second.id, first.id);
    assert_eq!(second.name, first.name);
    assert_eq!(second.body, first.body);
}

#[test]
fn import_rejects_files_without_a_name() {
    let err = import_template(r#"{"name": "", "nodes": []}"#, FileFormat::Json).unwrap_err();
    assert!(err.to_string().contains("Invalid template file"), "{}", err);
}
