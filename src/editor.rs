//! Canonical node/edge state of the two designers.
//!
//! The agent designer and the workflow designer share every operation; only
//! the node payload differs. [`NodePayload`] supplies the per-designer bits
//! (numbered defaults, untitled name, template conversion).

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::constants::{
    DEFAULT_AGENT_NODE_TYPE, DEFAULT_TEMPLATE_CATEGORY, SPAWN_X_RANGE, SPAWN_Y_RANGE,
    UNTITLED_AGENT_NETWORK, UNTITLED_WORKFLOW,
};
use crate::error::{ConsoleError, Result};
use crate::layout::{ForceLayout, GraphLink};
use crate::models::{AgentData, Edge, Node, Position, Template, TemplateBody, WorkflowStepData};
use crate::templates::{
    create_template_from_agent, create_template_from_workflow, validate_template_name,
};
use crate::utils::client_id;

const AUTO_ARRANGE_ITERATIONS: usize = 300;

pub trait NodePayload: Clone + Default + Serialize + DeserializeOwned {
    /// Prefix of generated node ids.
    const ID_PREFIX: &'static str;
    const UNTITLED: &'static str;

    /// Default payload of the `n`-th node (1-based).
    fn numbered(n: usize) -> Self;
    fn node_type(&self) -> String;
    fn label(&self) -> &str;

    /// Bring fields back into their valid ranges after an edit or load.
    fn normalized(self) -> Self {
        self
    }

    /// Nodes of `body` when it belongs to this designer.
    fn nodes_of(body: &TemplateBody) -> Option<Vec<Node<Self>>>;
    fn build_template(meta: &EditorMetadata, nodes: &[Node<Self>], edges: &[Edge]) -> Template;
}

impl NodePayload for AgentData {
    const ID_PREFIX: &'static str = "agent";
    const UNTITLED: &'static str = UNTITLED_AGENT_NETWORK;

    fn numbered(n: usize) -> Self {
        AgentData::named(format!("Agent {}", n))
    }

    fn node_type(&self) -> String {
        DEFAULT_AGENT_NODE_TYPE.to_string()
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn normalized(self) -> Self {
        AgentData::normalized(self)
    }

    fn nodes_of(body: &TemplateBody) -> Option<Vec<Node<Self>>> {
        match body {
            TemplateBody::Agent { nodes, .. } => Some(nodes.clone()),
            TemplateBody::Workflow { .. } => None,
        }
    }

    fn build_template(meta: &EditorMetadata, nodes: &[Node<Self>], edges: &[Edge]) -> Template {
        create_template_from_agent(
            &meta.name,
            &meta.description,
            &meta.category,
            nodes.to_vec(),
            edges.to_vec(),
            meta.features.clone(),
            &meta.use_case,
        )
    }
}

impl NodePayload for WorkflowStepData {
    const ID_PREFIX: &'static str = "step";
    const UNTITLED: &'static str = UNTITLED_WORKFLOW;

    fn numbered(n: usize) -> Self {
        WorkflowStepData::labelled(format!("Step {}", n))
    }

    fn node_type(&self) -> String {
        self.step_type.as_str().to_string()
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn nodes_of(body: &TemplateBody) -> Option<Vec<Node<Self>>> {
        match body {
            TemplateBody::Workflow { nodes, .. } => Some(nodes.clone()),
            TemplateBody::Agent { .. } => None,
        }
    }

    fn build_template(meta: &EditorMetadata, nodes: &[Node<Self>], edges: &[Edge]) -> Template {
        create_template_from_workflow(
            &meta.name,
            &meta.description,
            &meta.category,
            nodes.to_vec(),
            edges.to_vec(),
            Vec::new(),
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EditorMetadata {
    pub name: String,
    pub description: String,
    pub category: String,
    pub features: Vec<String>,
    pub use_case: String,
    /// Backend id once the graph was saved or loaded.
    pub template_id: Option<String>,
}

impl EditorMetadata {
    pub fn untitled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            category: DEFAULT_TEMPLATE_CATEGORY.to_string(),
            features: Vec::new(),
            use_case: String::new(),
            template_id: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GraphEditor<D> {
    pub nodes: Vec<Node<D>>,
    pub edges: Vec<Edge>,
    pub metadata: EditorMetadata,
    pub selected_node_id: Option<String>,
    pub dirty: bool,
}

pub type AgentEditor = GraphEditor<AgentData>;
pub type WorkflowEditor = GraphEditor<WorkflowStepData>;

impl<D: NodePayload> Default for GraphEditor<D> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            metadata: EditorMetadata::untitled(D::UNTITLED),
            selected_node_id: None,
            dirty: false,
        }
    }
}

impl<D: NodePayload> GraphEditor<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &str) -> Option<&Node<D>> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Append a default node at a random spot of the visible canvas.
    pub fn add_node(&mut self) -> String {
        let mut rng = rand::thread_rng();
        let position = Position::new(
            rng.gen_range(SPAWN_X_RANGE.0..SPAWN_X_RANGE.1),
            rng.gen_range(SPAWN_Y_RANGE.0..SPAWN_Y_RANGE.1),
        );
        let data = D::numbered(self.nodes.len() + 1);
        self.add_node_at(position, data)
    }

    pub fn add_node_at(&mut self, position: Position, data: D) -> String {
        let id = client_id(D::ID_PREFIX);
        self.nodes.push(Node {
            id: id.clone(),
            node_type: data.node_type(),
            position,
            data,
        });
        self.dirty = true;
        id
    }

    /// Remove a node together with every edge touching it.
    pub fn remove_node(&mut self, node_id: &str) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.id != node_id);
        if self.nodes.len() == before {
            return false;
        }
        self.edges.retain(|e| !e.touches(node_id));
        if self.selected_node_id.as_deref() == Some(node_id) {
            self.selected_node_id = None;
        }
        self.dirty = true;
        true
    }

    /// Add a directed edge. Self-loops and parallel edges are allowed; both
    /// endpoints must name existing nodes.
    pub fn connect(&mut self, source: &str, target: &str) -> Result<String> {
        for endpoint in [source, target] {
            if endpoint.trim().is_empty() {
                return Err(ConsoleError::Validation(
                    "Connection endpoints must not be empty".into(),
                ));
            }
            if !self.has_node(endpoint) {
                return Err(ConsoleError::Validation(format!(
                    "Unknown node '{}'",
                    endpoint
                )));
            }
        }

        let mut edge = Edge::between(source, target);
        if self.edges.iter().any(|e| e.id == edge.id) {
            let base = edge.id.clone();
            let mut n = 2;
            while self.edges.iter().any(|e| e.id == edge.id) {
                edge.id = format!("{}-{}", base, n);
                n += 1;
            }
        }
        let id = edge.id.clone();
        self.edges.push(edge);
        self.dirty = true;
        Ok(id)
    }

    pub fn disconnect(&mut self, edge_id: &str) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| e.id != edge_id);
        let removed = self.edges.len() != before;
        self.dirty |= removed;
        removed
    }

    /// Shallow-merge `patch` (a JSON object) into the node's data. Unknown
    /// ids are a no-op and return `Ok(false)`.
    pub fn update_node_data(&mut self, node_id: &str, patch: &Value) -> Result<bool> {
        let patch = patch.as_object().ok_or_else(|| {
            ConsoleError::Validation("Node data patch must be a JSON object".into())
        })?;
        let node = match self.nodes.iter_mut().find(|n| n.id == node_id) {
            Some(node) => node,
            None => return Ok(false),
        };

        let mut merged = serde_json::to_value(&node.data)?;
        if let Value::Object(fields) = &mut merged {
            for (key, value) in patch {
                fields.insert(key.clone(), value.clone());
            }
        }
        node.data = serde_json::from_value::<D>(merged)?.normalized();
        node.node_type = node.data.node_type();
        self.dirty = true;
        Ok(true)
    }

    pub fn move_node(&mut self, node_id: &str, position: Position) -> bool {
        match self.nodes.iter_mut().find(|n| n.id == node_id) {
            Some(node) => {
                node.position = position;
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn select(&mut self, node_id: Option<String>) {
        self.selected_node_id = node_id.filter(|id| self.has_node(id));
    }

    pub fn set_metadata(
        &mut self,
        name: Option<String>,
        description: Option<String>,
        category: Option<String>,
    ) {
        if let Some(name) = name {
            self.metadata.name = name;
        }
        if let Some(description) = description {
            self.metadata.description = description;
        }
        if let Some(category) = category {
            self.metadata.category = category;
        }
        self.dirty = true;
    }

    /// Reset to an empty, untitled graph. Confirmation happens before this
    /// is reached.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Replace the contents with a normalized template.
    pub fn load_template(&mut self, template: &Template) -> Result<()> {
        let nodes = D::nodes_of(&template.body).ok_or_else(|| {
            ConsoleError::Validation(format!(
                "Cannot open a {} template in this designer",
                template.template_type().as_str()
            ))
        })?;

        let dangling = template.dangling_edges();
        if !dangling.is_empty() {
            log::warn!(
                "Template '{}' has {} edge(s) pointing at missing nodes",
                template.name,
                dangling.len()
            );
        }

        self.nodes = nodes
            .into_iter()
            .map(|node| Node {
                data: node.data.normalized(),
                ..node
            })
            .collect();
        self.edges = template.edges().to_vec();
        self.metadata = EditorMetadata {
            name: template.name.clone(),
            description: template.description.clone(),
            category: template.category.clone(),
            features: Vec::new(),
            use_case: String::new(),
            template_id: Some(template.id.clone()),
        };
        if let TemplateBody::Agent { features, use_case, .. } = &template.body {
            self.metadata.features = features.clone();
            self.metadata.use_case = use_case.clone();
        }
        self.selected_node_id = None;
        self.dirty = false;
        Ok(())
    }

    /// Spread nodes out with the force layout, keeping the graph centred
    /// where it currently is.
    pub fn auto_arrange(&mut self) {
        if self.nodes.len() < 2 {
            return;
        }
        let seed: Vec<(String, Position)> =
            self.nodes.iter().map(|n| (n.id.clone(), n.position)).collect();
        let count = seed.len() as f64;
        let center = seed.iter().fold((0.0, 0.0), |(x, y), (_, p)| {
            (x + p.x / count, y + p.y / count)
        });
        let links: Vec<GraphLink> = self
            .edges
            .iter()
            .map(|e| GraphLink {
                source: e.source.clone(),
                target: e.target.clone(),
            })
            .collect();

        let mut layout = ForceLayout::from_positions(&seed, &links, center);
        layout.run(AUTO_ARRANGE_ITERATIONS);
        for (node, (_, position)) in self.nodes.iter_mut().zip(layout.positions()) {
            node.position = position;
        }
        self.dirty = true;
    }

    /// Snapshot the canvas as a template ready to save or export.
    pub fn to_template(&self) -> Result<Template> {
        validate_template_name(&self.metadata.name)?;
        let mut template = D::build_template(&self.metadata, &self.nodes, &self.edges);
        if let Some(id) = &self.metadata.template_id {
            template.id = id.clone();
        }
        Ok(template)
    }

    pub fn mark_saved(&mut self, template_id: &str) {
        self.metadata.template_id = Some(template_id.to_string());
        self.dirty = false;
    }

    pub fn labels(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.data.label()).collect()
    }
}
