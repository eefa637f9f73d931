use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::constants::{
    DEFAULT_AGENT_LEVEL, DEFAULT_DEPARTMENT, DEFAULT_EDGE_STROKE, DEFAULT_EDGE_STROKE_WIDTH,
    DEFAULT_EDGE_TYPE, DEFAULT_MAX_CONCURRENT_TASKS, MAX_AGENT_LEVEL,
};

/// Declares a string-backed enum that never fails to decode: unknown or
/// differently-cased values fall back to the listed default variant.
macro_rules! lenient_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident (default = $default:ident) {
            $($variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }

            /// Strict parse, case-insensitive. `None` for unknown values.
            pub fn parse(raw: &str) -> Option<Self> {
                let lowered = raw.trim().to_ascii_lowercase();
                match lowered.as_str() {
                    $($wire => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self::parse(&raw).unwrap_or_default()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.as_str().to_string()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

lenient_enum! {
    /// Position of an agent inside the organization hierarchy.
    pub enum AgentRole (default = Executor) {
        Supervisor => "supervisor",
        Specialist => "specialist",
        Coordinator => "coordinator",
        Executor => "executor",
    }
}

lenient_enum! {
    /// Display-only availability label. No transitions are enforced.
    pub enum AgentStatus (default = Idle) {
        Active => "active",
        Idle => "idle",
        Busy => "busy",
        Offline => "offline",
    }
}

lenient_enum! {
    /// How an agent distributes the work it receives.
    pub enum Strategy (default = Sequential) {
        Sequential => "sequential",
        Parallel => "parallel",
        Hierarchical => "hierarchical",
        Collaborative => "collaborative",
    }
}

lenient_enum! {
    pub enum StepType (default = Action) {
        Trigger => "trigger",
        Action => "action",
        Condition => "condition",
        Agent => "agent",
        Output => "output",
    }
}

lenient_enum! {
    pub enum ExecutionStatus (default = Pending) {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Payload of a node in the agent designer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentData {
    pub name: String,
    pub role: AgentRole,
    pub skills: Vec<String>,
    pub tools: Vec<String>,
    pub description: String,
    pub status: AgentStatus,
    pub level: u8,
    pub department: String,
    pub max_concurrent_tasks: u32,
    pub strategy: Strategy,
}

impl Default for AgentData {
    fn default() -> Self {
        Self {
            name: String::new(),
            role: AgentRole::default(),
            skills: Vec::new(),
            tools: Vec::new(),
            description: String::new(),
            status: AgentStatus::default(),
            level: DEFAULT_AGENT_LEVEL,
            department: DEFAULT_DEPARTMENT.to_string(),
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            strategy: Strategy::default(),
        }
    }
}

impl AgentData {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Clamp fields the editor relies on into their valid ranges.
    pub fn normalized(mut self) -> Self {
        self.level = self.level.min(MAX_AGENT_LEVEL);
        if self.max_concurrent_tasks == 0 {
            self.max_concurrent_tasks = DEFAULT_MAX_CONCURRENT_TASKS;
        }
        self
    }
}

/// Payload of a node in the workflow designer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkflowStepData {
    pub label: String,
    pub step_type: StepType,
    pub description: String,
    pub config: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

impl WorkflowStepData {
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            config: Value::Object(Default::default()),
            ..Self::default()
        }
    }
}

/// A vertex on the editor canvas, shaped like the graph library expects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node<D> {
    pub id: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub position: Position,
    pub data: D,
}

pub type AgentNode = Node<AgentData>;
pub type StepNode = Node<WorkflowStepData>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EdgeStyle {
    pub stroke: String,
    pub stroke_width: f64,
}

impl Default for EdgeStyle {
    fn default() -> Self {
        Self {
            stroke: DEFAULT_EDGE_STROKE.to_string(),
            stroke_width: DEFAULT_EDGE_STROKE_WIDTH,
        }
    }
}

/// Directed connection between two node ids. Cycles and parallel edges are
/// allowed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type", default = "default_edge_type")]
    pub edge_type: String,
    #[serde(default)]
    pub style: EdgeStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub animated: bool,
}

fn default_edge_type() -> String {
    DEFAULT_EDGE_TYPE.to_string()
}

impl Edge {
    pub fn between(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("e-{}-{}", source, target),
            source,
            target,
            edge_type: default_edge_type(),
            style: EdgeStyle::default(),
            label: None,
            animated: false,
        }
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// Derived display label based on graph size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Complexity {
    #[default]
    Simple,
    Medium,
    Advanced,
}

impl Complexity {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "simple" => Some(Complexity::Simple),
            "medium" => Some(Complexity::Medium),
            "advanced" => Some(Complexity::Advanced),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "Simple",
            Complexity::Medium => "Medium",
            Complexity::Advanced => "Advanced",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    Workflow,
    Agent,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::Workflow => "workflow",
            TemplateType::Agent => "agent",
        }
    }
}

/// Type-specific part of a [`Template`], discriminated by `template_type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "template_type", rename_all = "lowercase")]
pub enum TemplateBody {
    #[serde(rename_all = "camelCase")]
    Workflow {
        #[serde(default)]
        nodes: Vec<StepNode>,
        #[serde(default)]
        edges: Vec<Edge>,
        #[serde(default)]
        steps: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Agent {
        #[serde(default)]
        nodes: Vec<AgentNode>,
        #[serde(default)]
        edges: Vec<Edge>,
        #[serde(default)]
        agent_count: usize,
        #[serde(default)]
        features: Vec<String>,
        #[serde(default)]
        use_case: String,
    },
}

/// A persisted, named graph together with its gallery metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_custom: bool,
    #[serde(flatten)]
    pub body: TemplateBody,
}

impl Template {
    pub fn template_type(&self) -> TemplateType {
        match self.body {
            TemplateBody::Workflow { .. } => TemplateType::Workflow,
            TemplateBody::Agent { .. } => TemplateType::Agent,
        }
    }

    pub fn node_count(&self) -> usize {
        match &self.body {
            TemplateBody::Workflow { nodes, .. } => nodes.len(),
            TemplateBody::Agent { nodes, .. } => nodes.len(),
        }
    }

    pub fn edges(&self) -> &[Edge] {
        match &self.body {
            TemplateBody::Workflow { edges, .. } | TemplateBody::Agent { edges, .. } => edges,
        }
    }

    /// Ids of nodes in declaration order.
    pub fn node_ids(&self) -> Vec<&str> {
        match &self.body {
            TemplateBody::Workflow { nodes, .. } => nodes.iter().map(|n| n.id.as_str()).collect(),
            TemplateBody::Agent { nodes, .. } => nodes.iter().map(|n| n.id.as_str()).collect(),
        }
    }

    /// Edges whose source or target does not name a node of this template.
    pub fn dangling_edges(&self) -> Vec<&Edge> {
        let ids = self.node_ids();
        self.edges()
            .iter()
            .filter(|e| !ids.contains(&e.source.as_str()) || !ids.contains(&e.target.as_str()))
            .collect()
    }
}

/// Template record exactly as the backend stores it: flat columns plus
/// loosely-typed JSON blobs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiTemplateRecord {
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_count: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_case: Option<String>,
}

/// Backend ids arrive as numbers or strings depending on the endpoint.
pub(crate) fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Users / auth
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiUser {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

pub(crate) fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_opt_id(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Debug, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user: Option<ApiUser>,
}

// ---------------------------------------------------------------------------
// Chat / intent / execution
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: Option<String>,
    pub intent: Option<String>,
    pub workflow_triggered: Option<bool>,
    #[serde(deserialize_with = "de_opt_id")]
    pub execution_id: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct IntentRequest {
    pub message: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct IntentResponse {
    pub intent: String,
    pub confidence: f64,
    #[serde(deserialize_with = "de_opt_id")]
    pub workflow_id: Option<String>,
    pub parameters: Value,
}

#[derive(Clone, Debug, Serialize)]
pub struct WorkflowTriggerRequest {
    pub workflow_id: String,
    pub input: Value,
}

/// One execution as reported by `/executions` or by live updates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    #[serde(deserialize_with = "de_id", alias = "id")]
    pub execution_id: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub status: ExecutionStatus,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_enums_fall_back_to_defaults() {
        let data: AgentData =
            serde_json::from_str(r#"{"name":"X","role":"Wizard","status":"BUSY"}"#).unwrap();
        assert_eq!(data.role, AgentRole::Executor);
        assert_eq!(data.status, AgentStatus::Busy);
        assert_eq!(data.level, 2);
        assert_eq!(data.max_concurrent_tasks, 5);
    }

    #[test]
    fn template_body_is_tagged_by_template_type() {
        let template = Template {
            id: "custom-1".into(),
            name: "Support desk".into(),
            description: String::new(),
            category: "support".into(),
            complexity: Complexity::Simple,
            usage_count: 0,
            tags: vec![],
            created_at: None,
            is_custom: true,
            body: TemplateBody::Agent {
                nodes: vec![],
                edges: vec![],
                agent_count: 0,
                features: vec!["triage".into()],
                use_case: "helpdesk".into(),
            },
        };
        let json = serde_json::to_value(&template).unwrap();
        assert_eq!(json["template_type"], "agent");
        assert_eq!(json["agentCount"], 0);
        assert_eq!(json["useCase"], "helpdesk");
        assert_eq!(json["usageCount"], 0);

        let back: Template = serde_json::from_value(json).unwrap();
        assert_eq!(back, template);
    }

    #[test]
    fn record_ids_accept_numbers() {
        let record: ApiTemplateRecord = serde_json::from_str(r#"{"id": 42, "name": "n"}"#).unwrap();
        assert_eq!(record.id.as_deref(), Some("42"));
    }

    #[test]
    fn dangling_edges_are_reported() {
        let template = Template {
            id: "t".into(),
            name: "t".into(),
            description: String::new(),
            category: String::new(),
            complexity: Complexity::Simple,
            usage_count: 0,
            tags: vec![],
            created_at: None,
            is_custom: false,
            body: TemplateBody::Workflow {
                nodes: vec![Node {
                    id: "a".into(),
                    node_type: "action".into(),
                    position: Position::default(),
                    data: WorkflowStepData::labelled("A"),
                }],
                edges: vec![Edge::between("a", "ghost")],
                steps: vec![],
            },
        };
        assert_eq!(template.dangling_edges().len(), 1);
    }
}
