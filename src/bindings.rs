//! JavaScript surface of the console.
//!
//! The pure template helpers are exported as-is for the view layer; the
//! action functions wrap a [`Message`] and run it through the global
//! dispatcher. Views register one callback with `onStateChange` and pull a
//! JSON snapshot from `stateSnapshot` whenever it fires.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use wasm_bindgen::prelude::*;

use crate::constants::PREVIEW_GRAPHEMES;
use crate::error::ConsoleError;
use crate::layout::{ForceLayout, GraphLink, GraphNode};
use crate::messages::{EditorKind, Message};
use crate::models::{
    AgentNode, ApiTemplateRecord, Edge, Position, RegisterRequest, StepNode, TemplateType,
};
use crate::network::{set_api_config, ApiClient, ApiConfig};
use crate::settings::TemplateSettings;
use crate::state::{dispatch_global_message, AppState, APP_STATE};
use crate::templates::{self, FileFormat};
use crate::utils::preview;

thread_local! {
    static STATE_LISTENER: RefCell<Option<js_sys::Function>> = RefCell::new(None);
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value.serialize(&serializer).map_err(JsValue::from)
}

fn from_js<T: for<'de> Deserialize<'de>>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(JsValue::from)
}

fn parse_editor(kind: &str) -> Result<EditorKind, JsValue> {
    match kind {
        "agent" => Ok(EditorKind::Agent),
        "workflow" => Ok(EditorKind::Workflow),
        other => Err(ConsoleError::Validation(format!("unknown editor '{}'", other)).into()),
    }
}

fn parse_template_type(kind: &str) -> Result<TemplateType, ConsoleError> {
    match kind {
        "agent" => Ok(TemplateType::Agent),
        "workflow" => Ok(TemplateType::Workflow),
        other => Err(ConsoleError::Validation(format!("unknown template type '{}'", other))),
    }
}

/// Call the registered view callback, if any.
pub fn notify_state_change() {
    let listener = STATE_LISTENER.with(|l| l.borrow().clone());
    match listener {
        Some(callback) => {
            if let Err(e) = callback.call0(&JsValue::NULL) {
                log::error!("State listener threw: {}", crate::error::js_message(&e));
            }
        }
        None => log::debug!("State changed with no listener registered"),
    }
}

// ---------------------------------------------------------------------------
// Template normalizer
// ---------------------------------------------------------------------------

#[wasm_bindgen(js_name = createTemplateFromAgent)]
pub fn create_template_from_agent(
    name: &str,
    description: &str,
    category: &str,
    nodes: JsValue,
    edges: JsValue,
    features: JsValue,
    use_case: &str,
) -> Result<JsValue, JsValue> {
    templates::validate_template_name(name)?;
    let nodes: Vec<AgentNode> = from_js(nodes)?;
    let edges: Vec<Edge> = from_js(edges)?;
    let features: Vec<String> = if features.is_undefined() || features.is_null() {
        Vec::new()
    } else {
        from_js(features)?
    };
    let template = templates::create_template_from_agent(
        name, description, category, nodes, edges, features, use_case,
    );
    to_js(&template)
}

#[wasm_bindgen(js_name = createTemplateFromWorkflow)]
pub fn create_template_from_workflow(
    name: &str,
    description: &str,
    category: &str,
    nodes: JsValue,
    edges: JsValue,
    steps: JsValue,
) -> Result<JsValue, JsValue> {
    templates::validate_template_name(name)?;
    let nodes: Vec<StepNode> = from_js(nodes)?;
    let edges: Vec<Edge> = from_js(edges)?;
    let steps: Vec<String> = if steps.is_undefined() || steps.is_null() {
        Vec::new()
    } else {
        from_js(steps)?
    };
    let template =
        templates::create_template_from_workflow(name, description, category, nodes, edges, steps);
    to_js(&template)
}

#[wasm_bindgen(js_name = convertApiTemplate)]
pub fn convert_api_template(record: JsValue) -> Result<JsValue, JsValue> {
    let record: ApiTemplateRecord = from_js(record)?;
    to_js(&templates::convert_api_template(&record))
}

#[wasm_bindgen(js_name = inferComplexity)]
pub fn infer_complexity(node_count: usize, edge_count: usize) -> String {
    templates::infer_complexity(node_count, edge_count).as_str().to_string()
}

#[derive(Deserialize)]
struct JsGraphNode {
    id: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    group: Option<u32>,
}

#[derive(Deserialize)]
struct JsGraphLink {
    source: String,
    target: String,
}

/// Lay out an arbitrary node/link graph and return it as an SVG string.
#[wasm_bindgen(js_name = layoutGraphSvg)]
pub fn layout_graph_svg(
    nodes: JsValue,
    links: JsValue,
    width: f64,
    height: f64,
    iterations: usize,
) -> Result<String, JsValue> {
    let nodes: Vec<GraphNode> = from_js::<Vec<JsGraphNode>>(nodes)?
        .into_iter()
        .map(|n| GraphNode { id: n.id, label: n.label, group: n.group })
        .collect();
    let links: Vec<GraphLink> = from_js::<Vec<JsGraphLink>>(links)?
        .into_iter()
        .map(|l| GraphLink { source: l.source, target: l.target })
        .collect();
    let mut layout = ForceLayout::new(&nodes, &links, (width / 2.0, height / 2.0));
    layout.run(iterations);
    Ok(layout.render_svg(width, height))
}

#[wasm_bindgen(js_name = initApiConfig)]
pub fn init_api_config(base_url: &str) {
    set_api_config(ApiConfig::from_url(base_url));
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

#[wasm_bindgen(js_name = onStateChange)]
pub fn on_state_change(callback: js_sys::Function) {
    STATE_LISTENER.with(|l| *l.borrow_mut() = Some(callback));
}

#[wasm_bindgen(js_name = stateSnapshot)]
pub fn state_snapshot() -> Result<JsValue, JsValue> {
    let snapshot = APP_STATE.with(|state| snapshot(&state.borrow()));
    to_js(&snapshot)
}

#[wasm_bindgen]
pub fn login(username: String, password: String) {
    dispatch_global_message(Message::Login { username, password });
}

#[wasm_bindgen]
pub fn logout() {
    dispatch_global_message(Message::Logout);
}

#[wasm_bindgen(js_name = sendChat)]
pub fn send_chat(text: String, enhanced: bool) {
    dispatch_global_message(Message::SendChat { text, enhanced });
}

#[wasm_bindgen(js_name = addNode)]
pub fn add_node(editor: &str) -> Result<(), JsValue> {
    dispatch_global_message(Message::AddNode(parse_editor(editor)?));
    Ok(())
}

#[wasm_bindgen(js_name = removeNode)]
pub fn remove_node(editor: &str, node_id: String) -> Result<(), JsValue> {
    let editor = parse_editor(editor)?;
    dispatch_global_message(Message::RemoveNode { editor, node_id });
    Ok(())
}

#[wasm_bindgen(js_name = connectNodes)]
pub fn connect_nodes(editor: &str, source: String, target: String) -> Result<(), JsValue> {
    let editor = parse_editor(editor)?;
    dispatch_global_message(Message::Connect { editor, source, target });
    Ok(())
}

#[wasm_bindgen(js_name = disconnectEdge)]
pub fn disconnect_edge(editor: &str, edge_id: String) -> Result<(), JsValue> {
    let editor = parse_editor(editor)?;
    dispatch_global_message(Message::Disconnect { editor, edge_id });
    Ok(())
}

#[wasm_bindgen(js_name = updateNodeData)]
pub fn update_node_data(editor: &str, node_id: String, patch: JsValue) -> Result<(), JsValue> {
    let editor = parse_editor(editor)?;
    let patch: Value = from_js(patch)?;
    dispatch_global_message(Message::UpdateNodeData { editor, node_id, patch });
    Ok(())
}

#[wasm_bindgen(js_name = moveNode)]
pub fn move_node(editor: &str, node_id: String, x: f64, y: f64) -> Result<(), JsValue> {
    let editor = parse_editor(editor)?;
    let position = Position { x, y };
    dispatch_global_message(Message::MoveNode { editor, node_id, position });
    Ok(())
}

#[wasm_bindgen(js_name = selectNode)]
pub fn select_node(editor: &str, node_id: Option<String>) -> Result<(), JsValue> {
    let editor = parse_editor(editor)?;
    dispatch_global_message(Message::SelectNode { editor, node_id });
    Ok(())
}

/// Rename or re-describe the graph; `undefined` leaves a field unchanged.
#[wasm_bindgen(js_name = updateMetadata)]
pub fn update_metadata(
    editor: &str,
    name: Option<String>,
    description: Option<String>,
    category: Option<String>,
) -> Result<(), JsValue> {
    let editor = parse_editor(editor)?;
    dispatch_global_message(Message::UpdateMetadata { editor, name, description, category });
    Ok(())
}

#[wasm_bindgen(js_name = autoArrange)]
pub fn auto_arrange(editor: &str) -> Result<(), JsValue> {
    dispatch_global_message(Message::AutoArrange(parse_editor(editor)?));
    Ok(())
}

#[wasm_bindgen(js_name = clearEditor)]
pub fn clear_editor(editor: &str) -> Result<(), JsValue> {
    dispatch_global_message(Message::RequestClear(parse_editor(editor)?));
    Ok(())
}

#[wasm_bindgen(js_name = saveTemplate)]
pub fn save_template(editor: &str) -> Result<(), JsValue> {
    dispatch_global_message(Message::SaveTemplate(parse_editor(editor)?));
    Ok(())
}

#[wasm_bindgen(js_name = loadTemplate)]
pub fn load_template(id: &str) -> Result<(), JsValue> {
    let template = APP_STATE.with(|state| state.borrow().templates.find(id).cloned());
    let template = template
        .ok_or_else(|| ConsoleError::Validation(format!("unknown template '{}'", id)))?;
    dispatch_global_message(Message::LoadTemplate(template));
    Ok(())
}

/// Fetch the latest copy of a template from the backend and open it.
#[wasm_bindgen(js_name = openRemoteTemplate)]
pub async fn open_remote_template(template_type: String, id: String) -> Result<(), JsValue> {
    let template_type = parse_template_type(&template_type)?;
    let record = ApiClient::get_template(template_type, &id).await?;
    dispatch_global_message(Message::LoadTemplate(templates::convert_api_template(&record)));
    Ok(())
}

/// Create an account. The caller logs in afterwards with the same
/// credentials.
#[wasm_bindgen]
pub async fn register(
    username: String,
    email: String,
    password: String,
    full_name: Option<String>,
) -> Result<JsValue, JsValue> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(ConsoleError::Validation("Username and password are required".into()).into());
    }
    let request = RegisterRequest { username, email, password, full_name };
    let user = ApiClient::register(&request).await?;
    log::info!("Registered user {}", user.id);
    to_js(&user)
}

#[wasm_bindgen(js_name = cloneTemplate)]
pub fn clone_template(template_type: &str, id: String) -> Result<(), JsValue> {
    let template_type = parse_template_type(template_type)?;
    dispatch_global_message(Message::CloneTemplate { template_type, id });
    Ok(())
}

#[wasm_bindgen(js_name = deleteTemplate)]
pub fn delete_template(template_type: &str, id: String) -> Result<(), JsValue> {
    let template_type = parse_template_type(template_type)?;
    dispatch_global_message(Message::DeleteTemplate { template_type, id });
    Ok(())
}

/// Apply the LLM settings form. `api_key` of `undefined` keeps the stored
/// key; an empty string removes it.
#[wasm_bindgen(js_name = updateLlmSettings)]
pub fn update_llm_settings(
    provider: &str,
    model: &str,
    temperature: f64,
    api_key: Option<String>,
) -> Result<(), JsValue> {
    let current = APP_STATE.with(|state| state.borrow().llm_settings.clone());
    let settings = current.edited(provider, model, temperature, api_key.as_deref())?;
    dispatch_global_message(Message::UpdateLlmSettings(settings));
    Ok(())
}

/// Takes the `templateSettings` object of the snapshot, edited by the view.


#[wasm_bindgen(js_name = updateTemplateSettings)]
pub fn update_template_settings(settings: JsValue) -> Result<(), JsValue> {
    let settings: TemplateSettings = from_js(settings)?;
    dispatch_global_message(Message::UpdateTemplateSettings(settings));
    Ok(())
}

#[wasm_bindgen(js_name = importTemplateFile)]
pub fn import_template_file(file_name: String, contents: String) {
    dispatch_global_message(Message::ImportTemplateFile { file_name, contents });
}

/// `format` is a file extension (`json`, `yaml`); empty uses the saved preference.
#[wasm_bindgen(js_name = exportTemplate)]
pub fn export_template(editor: &str, format: &str) -> Result<(), JsValue> {
    let editor = parse_editor(editor)?;
    let format = if format.is_empty() {
        None
    } else {
        Some(
            FileFormat::from_file_name(&format!("template.{}", format))
                .ok_or_else(|| ConsoleError::Validation(format!("unsupported format '{}'", format)))?,
        )
    };
    dispatch_global_message(Message::ExportTemplate { editor, format });
    Ok(())
}

#[wasm_bindgen(js_name = refreshTemplates)]
pub fn refresh_templates() {
    dispatch_global_message(Message::RequestTemplates);
}

#[wasm_bindgen(js_name = refreshExecutions)]
pub fn refresh_executions() {
    dispatch_global_message(Message::RefreshExecutions);
}

#[wasm_bindgen(js_name = cancelExecution)]
pub fn cancel_execution(execution_id: String) {
    dispatch_global_message(Message::CancelExecution(execution_id));
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

fn template_summaries(state: &AppState, template_type: TemplateType) -> Vec<Value> {
    state
        .templates
        .list(template_type)
        .into_iter()
        .map(|t| {
            json!({
                "id": t.id,
                "name": t.name,
                "description": t.description,
                "summary": preview(&t.description, PREVIEW_GRAPHEMES),
                "category": t.category,
                "complexity": t.complexity.as_str(),
                "tags": t.tags,
                "nodeCount": t.node_count(),
                "isCustom": t.is_custom,
            })
        })
        .collect()
}

/// Plain-JSON view of the state the UI renders.
pub fn snapshot(state: &AppState) -> Value {
    let executions: Vec<Value> = state
        .monitoring
        .sorted_executions()
        .into_iter()
        .map(|e| {
            json!({
                "executionId": e.execution_id,
                "workflowId": e.workflow_id,
                "status": e.status.to_string(),
                "progress": e.progress,
                "currentStep": e.current_step,
                "message": e.message,
                "age": crate::reducers::monitoring::update_age(e),
            })
        })
        .collect();

    let chat: Vec<Value> = state
        .chat
        .entries
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "sender": c.sender,
                "content": c.content,
                "preview": preview(&c.content, PREVIEW_GRAPHEMES),
                "timestamp": c.timestamp,
                "hitl": c.hitl,
                "local": c.local,
            })
        })
        .collect();

    json!({
        "loggedIn": state.is_logged_in(),
        "user": state.current_user,
        "liveStatus": state.live_status.as_ref().map(|s| s.to_string()),
        "dbError": state.db_error,
        "agentEditor": {
            "nodes": state.agent_editor.nodes,
            "edges": state.agent_editor.edges,
            "name": state.agent_editor.metadata.name,
            "selected": state.agent_editor.selected_node_id,
            "dirty": state.agent_editor.dirty,
        },
        "workflowEditor": {
            "nodes": state.workflow_editor.nodes,
            "edges": state.workflow_editor.edges,
            "name": state.workflow_editor.metadata.name,
            "selected": state.workflow_editor.selected_node_id,
            "dirty": state.workflow_editor.dirty,
        },
        "templates": {
            "agent": template_summaries(state, TemplateType::Agent),
            "workflow": template_summaries(state, TemplateType::Workflow),
            "loading": state.templates.loading,
            "error": state.templates.last_error,
        },
        "chat": { "entries": chat, "pending": state.chat.pending },
        "executions": executions,
        "thoughts": state.monitoring.thoughts,
        "llmSettings": {
            "provider": state.llm_settings.provider,
            "model": state.llm_settings.model,
            "temperature": state.llm_settings.temperature,
            "keyedProviders": state.llm_settings.api_keys.keys().collect::<Vec<_>>(),
        },
        "templateSettings": state.template_settings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_editor_and_session() {
        let mut state = AppState::new();
        state.agent_editor.add_node();
        let snap = snapshot(&state);
        assert_eq!(snap["loggedIn"], json!(false));
        assert_eq!(snap["agentEditor"]["nodes"].as_array().map(Vec::len), Some(1));
        assert_eq!(snap["agentEditor"]["dirty"], json!(true));
        assert!(snap["executions"].as_array().is_some_and(|e| e.is_empty()));
    }

    #[test]
    fn snapshot_settings_round_trip_into_template_settings() {
        let mut state = AppState::new();
        state.template_settings.export_format = "yaml".into();
        state.llm_settings.set_api_key("openai", "sk");
        let snap = snapshot(&state);
        let back: TemplateSettings =
            serde_json::from_value(snap["templateSettings"].clone()).unwrap();
        assert_eq!(back, state.template_settings);
        assert_eq!(snap["llmSettings"]["keyedProviders"], json!(["openai"]));
        assert!(snap["llmSettings"].get("apiKeys").is_none());
    }

    #[test]
    fn template_types_parse_from_view_names() {
        assert_eq!(parse_template_type("agent").unwrap(), TemplateType::Agent);
        assert_eq!(parse_template_type("workflow").unwrap(), TemplateType::Workflow);
        assert!(parse_template_type("crew").is_err());
    }

    #[test]
    fn snapshot_lists_custom_templates() {
        let mut state = AppState::new();
        state.templates.custom.push(templates::create_template_from_workflow(
            "Nightly",
            "",
            "ops",
            Vec::new(),
            Vec::new(),
            Vec::new(),
        ));
        let snap = snapshot(&state);
        let workflows = snap["templates"]["workflow"].as_array().cloned().unwrap_or_default();
        assert_eq!(workflows.len(), 1);
        assert_eq!(workflows[0]["name"], json!("Nightly"));
        assert_eq!(workflows[0]["isCustom"], json!(true));
    }
}
