// src/messages.rs
//
// Everything that can happen in the console, and the side effects the
// reducers ask for in return.
//
use serde_json::Value;

use crate::models::{
    ApiUser, ChatRequest, ChatResponse, ExecutionRecord, IntentResponse, Position, Template,
    TemplateType, WorkflowTriggerRequest,
};
use crate::network::{AgentThought, ChatMessage, ConnectionState};
use crate::settings::{LlmSettings, Session, TemplateSettings};
use crate::templates::FileFormat;
use crate::toast::ToastKind;

/// Which designer a graph message targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorKind {
    Agent,
    Workflow,
}

impl EditorKind {
    pub fn template_type(&self) -> TemplateType {
        match self {
            EditorKind::Agent => TemplateType::Agent,
            EditorKind::Workflow => TemplateType::Workflow,
        }
    }

    pub fn for_template(template_type: TemplateType) -> Self {
        match template_type {
            TemplateType::Agent => EditorKind::Agent,
            TemplateType::Workflow => EditorKind::Workflow,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    // Graph editing
    AddNode(EditorKind),
    RemoveNode { editor: EditorKind, node_id: String },
    Connect { editor: EditorKind, source: String, target: String },
    Disconnect { editor: EditorKind, edge_id: String },
    UpdateNodeData { editor: EditorKind, node_id: String, patch: Value },
    MoveNode { editor: EditorKind, node_id: String, position: Position },
    SelectNode { editor: EditorKind, node_id: Option<String> },
    UpdateMetadata {
        editor: EditorKind,
        name: Option<String>,
        description: Option<String>,
        category: Option<String>,
    },
    RequestClear(EditorKind), // asks for confirmation first
    ClearConfirmed(EditorKind),
    AutoArrange(EditorKind),
    LoadTemplate(Template),

    // Template gallery
    RequestTemplates,
    TemplatesLoaded { template_type: TemplateType, templates: Vec<Template> },
    TemplatesLoadFailed { template_type: TemplateType, error: String },
    SaveTemplate(EditorKind),
    TemplateSaved { editor: EditorKind, template: Template },
    TemplateSaveFailed { editor: EditorKind, template: Template, error: String },
    CloneTemplate { template_type: TemplateType, id: String },
    DeleteTemplate { template_type: TemplateType, id: String },
    TemplateDeleted { id: String },
    ImportTemplateFile { file_name: String, contents: String },
    ExportTemplate { editor: EditorKind, format: Option<FileFormat> },

    // Chat
    SendChat { text: String, enhanced: bool },
    ChatReceived(ChatMessage),
    ChatReplyReceived(ChatResponse),
    ChatFailed(String),
    IntentDetected { message: String, intent: IntentResponse },

    // Monitoring
    RefreshExecutions,
    ExecutionsLoaded(Vec<ExecutionRecord>),
    ExecutionUpdated(ExecutionRecord),
    AgentThoughtReceived(AgentThought),
    CancelExecution(String),

    // Session & live channel
    Login { username: String, password: String },
    LoggedIn { session: Session, user: Option<ApiUser> },
    LoginFailed(String),
    Logout,
    SessionExpired,
    LiveChannelStatus(ConnectionState),

    // Settings
    UpdateLlmSettings(LlmSettings),
    UpdateTemplateSettings(TemplateSettings),

    // Backend health
    CheckHealth,
    HealthChecked { ok: bool, detail: Option<String> },
}

/// Side effects requested by the reducers and run by
/// `command_executors` outside the state borrow.
#[derive(Debug)]
pub enum Command {
    /// Chain another message to be processed
    SendMessage(Message),

    /// Ask the user with `window.confirm()`; dispatch `on_confirm` on yes.
    Confirm { prompt: String, on_confirm: Box<Message> },

    Toast { kind: ToastKind, message: String },

    FetchTemplates(TemplateType),
    SaveTemplate { editor: EditorKind, template: Template },
    CloneTemplate { template_type: TemplateType, id: String },
    DeleteTemplate { template_type: TemplateType, id: String },

    SendChat { request: ChatRequest, enhanced: bool },
    DetectIntent(String),
    TriggerWorkflow(WorkflowTriggerRequest),

    FetchExecutions,
    CancelExecution(String),

    Login { username: String, password: String },
    ConnectLiveChannel { user_id: String },
    DisconnectLiveChannel,

    PersistSession(Option<Session>),
    PersistLlmSettings(LlmSettings),
    PersistTemplateSettings(TemplateSettings),
    CacheCustomTemplate(Template),
    ForgetCustomTemplate(String),

    DownloadFile { file_name: String, mime_type: String, contents: String },

    CheckHealth,
    /// Show or hide the database connection banner.
    ShowDbErrorBanner(Option<String>),

    /// Re-render whatever the host page shows for the given part of state.
    RefreshView,
}

impl Command {
    pub fn error_toast(message: impl Into<String>) -> Self {
        Command::Toast {
            kind: ToastKind::Error,
            message: message.into(),
        }
    }

    pub fn success_toast(message: impl Into<String>) -> Self {
        Command::Toast {
            kind: ToastKind::Success,
            message: message.into(),
        }
    }
}
