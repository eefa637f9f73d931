use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{json, Map, Value};

use crate::constants::{
    DEFAULT_AGENT_NODE_TYPE, GRID_COLUMNS, GRID_COLUMN_WIDTH, GRID_ORIGIN_X, GRID_ORIGIN_Y,
    GRID_ROW_HEIGHT, MAX_AGENT_LEVEL, UNTITLED_AGENT_NETWORK, UNTITLED_WORKFLOW,
};
use crate::models::{
    AgentData, AgentNode, AgentRole, AgentStatus, ApiTemplateRecord, Complexity, Edge, EdgeStyle,
    Node, Position, StepNode, StepType, Strategy, Template, TemplateBody, WorkflowStepData,
};

use super::create::{infer_complexity, new_custom_id};

/// Fallback position of the `index`-th node: 3 columns, 200 px rows.
pub fn grid_position(index: usize) -> Position {
    let column = (index % GRID_COLUMNS) as f64;
    let row = (index / GRID_COLUMNS) as f64;
    Position::new(
        GRID_ORIGIN_X + column * GRID_COLUMN_WIDTH,
        GRID_ORIGIN_Y + row * GRID_ROW_HEIGHT,
    )
}

// ---------------------------------------------------------------------------
// Loose field access
// ---------------------------------------------------------------------------

/// JSON blobs are sometimes stored as strings holding JSON.
fn blob(value: &Option<Value>) -> Option<Value> {
    match value {
        Some(Value::String(raw)) => serde_json::from_str(raw).ok(),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.clone()),
    }
}

fn array_in(value: &Value, keys: &[&str]) -> Option<Vec<Value>> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_array).cloned())
}

fn text(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn number(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match value.get(*key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn string_list(value: &Value, keys: &[&str]) -> Vec<String> {
    for key in keys {
        match value.get(*key) {
            Some(Value::Array(items)) => {
                return items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                        Value::Object(_) => text(item, &["name", "label"]),
                        _ => None,
                    })
                    .collect();
            }
            Some(Value::String(s)) => {
                return s
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            _ => {}
        }
    }
    Vec::new()
}

/// Editor payload of an entry: either its nested `data` object (graph
/// library shape) or the entry itself (flat backend shape).
fn payload(entry: &Value) -> &Value {
    match entry.get("data") {
        Some(data @ Value::Object(_)) => data,
        _ => entry,
    }
}

fn position_of(entry: &Value, index: usize) -> Position {
    let pos = entry.get("position").unwrap_or(&Value::Null);
    match (number(pos, &["x"]), number(pos, &["y"])) {
        (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Position::new(x, y),
        _ => grid_position(index),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Python `isoformat()` without an offset
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

// ---------------------------------------------------------------------------
// Entry -> node / edge
// ---------------------------------------------------------------------------

fn agent_node_from_entry(entry: &Value, index: usize) -> AgentNode {
    let data = payload(entry);
    let defaults = AgentData::default();

    let agent = AgentData {
        name: text(data, &["name", "label"]).unwrap_or_else(|| format!("Agent {}", index + 1)),
        role: text(data, &["role"])
            .and_then(|r| AgentRole::parse(&r))
            .unwrap_or_default(),
        skills: string_list(data, &["skills", "capabilities"]),
        tools: string_list(data, &["tools"]),
        description: text(data, &["description"]).unwrap_or_default(),
        status: text(data, &["status"])
            .and_then(|s| AgentStatus::parse(&s))
            .unwrap_or_default(),
        level: number(data, &["level"])
            .filter(|l| *l >= 0.0)
            .map(|l| (l as u8).min(MAX_AGENT_LEVEL))
            .unwrap_or(defaults.level),
        department: text(data, &["department"]).unwrap_or(defaults.department),
        max_concurrent_tasks: number(data, &["maxConcurrentTasks", "max_concurrent_tasks"])
            .filter(|n| *n >= 1.0)
            .map(|n| n as u32)
            .unwrap_or(defaults.max_concurrent_tasks),
        strategy: text(data, &["strategy"])
            .and_then(|s| Strategy::parse(&s))
            .unwrap_or_default(),
    };

    Node {
        id: text(entry, &["id"]).unwrap_or_else(|| format!("agent-{}", index + 1)),
        node_type: text(entry, &["type"]).unwrap_or_else(|| DEFAULT_AGENT_NODE_TYPE.to_string()),
        position: position_of(entry, index),
        data: agent,
    }
}

fn step_node_from_entry(entry: &Value, index: usize) -> StepNode {
    // Bare strings are step labels.
    if let Value::String(label) = entry {
        let data = WorkflowStepData::labelled(label.trim());
        return Node {
            id: format!("step-{}", index + 1),
            node_type: data.step_type.as_str().to_string(),
            position: grid_position(index),
            data,
        };
    }

    let data = payload(entry);
    let step_type = text(data, &["stepType", "step_type", "type"])
        .and_then(|t| StepType::parse(&t))
        .unwrap_or_default();
    let config = match data.get("config") {
        Some(cfg @ Value::Object(_)) => cfg.clone(),
        _ => Value::Object(Map::new()),
    };

    let step = WorkflowStepData {
        label: text(data, &["label", "name", "title"])
            .unwrap_or_else(|| format!("Step {}", index + 1)),
        step_type,
        description: text(data, &["description"]).unwrap_or_default(),
        config,
        agent_id: text(data, &["agentId", "agent_id"]),
    };

    Node {
        id: text(entry, &["id"]).unwrap_or_else(|| format!("step-{}", index + 1)),
        node_type: text(entry, &["type"]).unwrap_or_else(|| step_type.as_str().to_string()),
        position: position_of(entry, index),
        data: step,
    }
}

fn edge_from_entry(entry: &Value) -> Option<Edge> {
    let source = text(entry, &["source", "from", "source_id", "sourceId"])?;
    let target = text(entry, &["target", "to", "target_id", "targetId"])?;

    let mut edge = Edge::between(source, target);
    if let Some(id) = text(entry, &["id"]) {
        edge.id = id;
    }
    if let Some(edge_type) = text(entry, &["edge_type", "edgeType", "type"]) {
        edge.edge_type = edge_type;
    }
    if let Some(style) = entry.get("style") {
        if let Ok(style) = serde_json::from_value::<EdgeStyle>(style.clone()) {
            edge.style = style;
        }
    }
    edge.label = text(entry, &["label", "relationship"]);
    edge.animated = entry.get("animated").and_then(Value::as_bool).unwrap_or(false);
    Some(edge)
}

/// Edges in entry order; entries without both endpoints are skipped and
/// colliding ids get an index suffix.
fn edges_from_entries(entries: &[Value]) -> Vec<Edge> {
    let mut edges: Vec<Edge> = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match edge_from_entry(entry) {
            Some(mut edge) => {
                if edges.iter().any(|e| e.id == edge.id) {
                    let base = edge.id.clone();
                    let mut n = index;
                    while edges.iter().any(|e| e.id == edge.id) {
                        edge.id = format!("{}-{}", base, n);
                        n += 1;
                    }
                }
                edges.push(edge);
            }
            None => log::warn!("Skipping connection #{} without source/target", index),
        }
    }
    edges
}

// ---------------------------------------------------------------------------
// Record -> template
// ---------------------------------------------------------------------------

struct Common {
    id: String,
    name: String,
    description: String,
    category: String,
    complexity: Option<Complexity>,
    usage_count: u64,
    tags: Vec<String>,
    created_at: Option<DateTime<Utc>>,
}

fn common_fields(record: &ApiTemplateRecord, untitled: &str) -> Common {
    let name = record.name.trim();
    Common {
        id: record.id.clone().unwrap_or_else(new_custom_id),
        name: if name.is_empty() { untitled.to_string() } else { name.to_string() },
        description: record.description.clone().unwrap_or_default(),
        category: record.category.clone().unwrap_or_default(),
        complexity: record.complexity.as_deref().and_then(Complexity::parse),
        usage_count: record.usage_count.unwrap_or(0),
        tags: record.tags.clone(),
        created_at: record.created_at.as_deref().and_then(parse_timestamp),
    }
}

fn finish(common: Common, node_count: usize, edge_count: usize, body: TemplateBody) -> Template {
    let is_custom = common.id.starts_with("custom-");
    Template {
        complexity: common
            .complexity
            .unwrap_or_else(|| infer_complexity(node_count, edge_count)),
        id: common.id,
        name: common.name,
        description: common.description,
        category: common.category,
        usage_count: common.usage_count,
        tags: common.tags,
        created_at: common.created_at,
        is_custom,
        body,
    }
}

/// Expand a backend agent-template record into editor nodes and edges.
pub fn convert_api_to_agent_template(record: &ApiTemplateRecord) -> Template {
    let template_data = blob(&record.template_data).unwrap_or(Value::Null);

    let agent_entries = blob(&record.agents_data)
        .and_then(|v| v.as_array().cloned())
        .or_else(|| array_in(&template_data, &["agents", "nodes"]))
        .unwrap_or_default();
    let connection_entries = blob(&record.connections_data)
        .and_then(|v| v.as_array().cloned())
        .or_else(|| array_in(&template_data, &["connections", "edges"]))
        .unwrap_or_default();

    let nodes: Vec<AgentNode> = agent_entries
        .iter()
        .enumerate()
        .map(|(i, entry)| agent_node_from_entry(entry, i))
        .collect();
    let edges = edges_from_entries(&connection_entries);

    let features = record
        .features
        .clone()
        .unwrap_or_else(|| string_list(&template_data, &["features"]));
    let use_case = record
        .use_case
        .clone()
        .or_else(|| text(&template_data, &["use_case", "useCase"]))
        .unwrap_or_default();

    let (node_count, edge_count) = (nodes.len(), edges.len());
    finish(
        common_fields(record, UNTITLED_AGENT_NETWORK),
        node_count,
        edge_count,
        TemplateBody::Agent {
            agent_count: node_count,
            nodes,
            edges,
            features,
            use_case,
        },
    )
}

/// Expand a backend workflow record into editor nodes and edges. A record
/// without any connection data is read as a linear chain of its steps.
pub fn convert_api_to_workflow_template(record: &ApiTemplateRecord) -> Template {
    let template_data = blob(&record.template_data).unwrap_or(Value::Null);
    let record_steps = blob(&record.steps).and_then(|v| v.as_array().cloned());

    let step_entries = array_in(&template_data, &["nodes", "steps"])
        .or_else(|| record_steps.clone())
        .unwrap_or_default();

    let nodes: Vec<StepNode> = step_entries
        .iter()
        .enumerate()
        .map(|(i, entry)| step_node_from_entry(entry, i))
        .collect();

    let connection_entries = blob(&record.connections_data)
        .and_then(|v| v.as_array().cloned())
        .or_else(|| array_in(&template_data, &["edges", "connections"]));
    let edges = match connection_entries {
        Some(entries) => edges_from_entries(&entries),
        None => nodes
            .windows(2)
            .map(|pair| Edge::between(pair[0].id.clone(), pair[1].id.clone()))
            .collect(),
    };

    let steps = record_steps
        .map(|items| {
            items
                .iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::String(s) => s.clone(),
                    other => text(payload(other), &["label", "name", "title"])
                        .unwrap_or_else(|| format!("Step {}", i + 1)),
                })
                .collect()
        })
        .unwrap_or_else(|| nodes.iter().map(|n| n.data.label.clone()).collect());

    let (node_count, edge_count) = (nodes.len(), edges.len());
    finish(
        common_fields(record, UNTITLED_WORKFLOW),
        node_count,
        edge_count,
        TemplateBody::Workflow { nodes, edges, steps },
    )
}

/// Dispatch on `template_type`; records without one are read as agent
/// templates when they carry `agents_data`.
pub fn convert_api_template(record: &ApiTemplateRecord) -> Template {
    match record.template_type.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("agent") => convert_api_to_agent_template(record),
        Some("workflow") => convert_api_to_workflow_template(record),
        _ if record.agents_data.is_some() => convert_api_to_agent_template(record),
        _ => convert_api_to_workflow_template(record),
    }
}

// ---------------------------------------------------------------------------
// Template -> record
// ---------------------------------------------------------------------------

fn edge_entry(edge: &Edge) -> Value {
    let mut entry = json!({
        "id": edge.id,
        "source": edge.source,
        "target": edge.target,
        "edge_type": edge.edge_type,
        "style": edge.style,
        "animated": edge.animated,
    });
    if let Some(label) = &edge.label {
        entry["label"] = Value::String(label.clone());
    }
    entry
}

/// Flatten a template into the record shape the backend persists.
pub fn template_to_api_record(template: &Template) -> ApiTemplateRecord {
    let mut record = ApiTemplateRecord {
        id: Some(template.id.clone()),
        name: template.name.clone(),
        description: Some(template.description.clone()),
        category: Some(template.category.clone()),
        complexity: Some(template.complexity.as_str().to_string()),
        usage_count: Some(template.usage_count),
        tags: template.tags.clone(),
        template_type: Some(template.template_type().as_str().to_string()),
        created_at: template.created_at.map(|dt| dt.to_rfc3339()),
        is_public: Some(!template.is_custom),
        ..ApiTemplateRecord::default()
    };

    match &template.body {
        TemplateBody::Agent { nodes, edges, features, use_case, .. } => {
            let agents = nodes
                .iter()
                .map(|node| {
                    let mut entry = serde_json::to_value(&node.data)
                        .unwrap_or_else(|_| Value::Object(Map::new()));
                    entry["id"] = Value::String(node.id.clone());
                    entry["type"] = Value::String(node.node_type.clone());
                    entry["position"] = json!({ "x": node.position.x, "y": node.position.y });
                    entry
                })
                .collect();
            record.agents_data = Some(Value::Array(agents));
            record.connections_data = Some(Value::Array(edges.iter().map(edge_entry).collect()));
            record.features = Some(features.clone());
            record.use_case = Some(use_case.clone());
            record.template_data = Some(json!({
                "features": features,
                "use_case": use_case,
            }));
        }
        TemplateBody::Workflow { nodes, edges, steps } => {
            record.template_data = Some(json!({
                "nodes": nodes,
                "edges": edges.iter().map(edge_entry).collect::<Vec<_>>(),
            }));
            record.steps = Some(json!(steps));
        }
    }
    record
}
