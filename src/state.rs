use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use crate::editor::{AgentEditor, WorkflowEditor};
use crate::messages::{Command, EditorKind, Message};
use crate::models::{ApiUser, ExecutionRecord, Template, TemplateType};
use crate::network::{AgentThought, ConnectionState, MessageDeduplicator};
use crate::settings::{LlmSettings, Session, TemplateSettings};
use crate::storage::{self, KeyValueStore};
use crate::update::update;

/// One line of the chat panel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub id: String,
    pub sender: String,
    pub content: String,
    pub timestamp: i64,
    pub hitl: bool,
    /// Typed by the operator in this tab.
    pub local: bool,
}

#[derive(Debug, Default)]
pub struct ChatState {
    pub entries: Vec<ChatEntry>,
    pub conversation_id: Option<String>,
    pub pending: bool,
    pub dedup: MessageDeduplicator,
}

#[derive(Debug, Default)]
pub struct MonitoringState {
    pub executions: HashMap<String, ExecutionRecord>,
    /// Newest last, capped.
    pub thoughts: VecDeque<AgentThought>,
    pub loading: bool,
}

impl MonitoringState {
    /// Running and pending executions first, then by id.
    pub fn sorted_executions(&self) -> Vec<&ExecutionRecord> {
        let mut list: Vec<&ExecutionRecord> = self.executions.values().collect();
        list.sort_by(|a, b| {
            a.status
                .is_terminal()
                .cmp(&b.status.is_terminal())
                .then_with(|| a.execution_id.cmp(&b.execution_id))
        });
        list
    }
}

/// Template gallery: what the backend returned plus the local fallback
/// cache of custom templates.
#[derive(Debug, Default)]
pub struct TemplateGallery {
    pub remote: HashMap<TemplateType, Vec<Template>>,
    pub custom: Vec<Template>,
    pub loading: bool,
    /// Template-type fetches still in flight.
    pub pending_fetches: usize,
    pub last_error: Option<String>,
}

impl TemplateGallery {
    pub fn start_fetches(&mut self, count: usize) {
        self.pending_fetches += count;
        self.loading = self.pending_fetches > 0;
    }

    pub fn finish_fetch(&mut self) {
        self.pending_fetches = self.pending_fetches.saturating_sub(1);
        self.loading = self.pending_fetches > 0;
    }

    /// Remote templates followed by cached custom ones the backend does not
    /// know about.
    pub fn list(&self, template_type: TemplateType) -> Vec<&Template> {
        let remote = self.remote.get(&template_type).map(Vec::as_slice).unwrap_or(&[]);
        let mut out: Vec<&Template> = remote.iter().collect();
        for template in &self.custom {
            if template.template_type() == template_type && !remote.iter().any(|r| r.id == template.id) {
                out.push(template);
            }
        }
        out
    }

    pub fn find(&self, id: &str) -> Option<&Template> {
        self.remote
            .values()
            .flatten()
            .chain(self.custom.iter())
            .find(|t| t.id == id)
    }
}

// Store global application state
#[derive(Debug, Default)]
pub struct AppState {
    pub agent_editor: AgentEditor,
    pub workflow_editor: WorkflowEditor,
    pub templates: TemplateGallery,
    pub chat: ChatState,
    pub monitoring: MonitoringState,

    pub session: Option<Session>,
    pub current_user: Option<ApiUser>,
    pub live_status: Option<ConnectionState>,

    pub llm_settings: LlmSettings,
    pub template_settings: TemplateSettings,

    /// Set while the backend health check fails; drives the banner.
    pub db_error: Option<String>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore settings, session and the custom template cache.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let mut state = Self::new();
        state.llm_settings = storage::load_llm_settings(store);
        state.template_settings = storage::load_template_settings(store);
        state.session = storage::load_session(store);
        state.templates.custom = storage::load_custom_templates(store);
        log::debug!(
            "Restored state: {} custom template(s), session: {}",
            state.templates.custom.len(),
            state.session.is_some()
        );
        state
    }

    pub fn dispatch(&mut self, msg: Message) -> Vec<Command> {
        update(self, msg)
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    pub fn editor_is_dirty(&self, editor: EditorKind) -> bool {
        match editor {
            EditorKind::Agent => self.agent_editor.dirty,
            EditorKind::Workflow => self.workflow_editor.dirty,
        }
    }
}

thread_local! {
    pub static APP_STATE: RefCell<AppState> = RefCell::new(AppState::new());
}

/// Run `msg` through the reducers and execute the resulting commands once
/// the state borrow is released.
pub fn dispatch_global_message(msg: Message) {
    let commands = APP_STATE.with(|state| state.borrow_mut().dispatch(msg));
    for cmd in commands {
        crate::command_executors::execute(cmd);
    }
}
