//! Drives `AppState` through whole user flows and checks the commands the
//! reducers ask the executor to run. Nothing here touches the network.
//!
//! Run with: cargo test --test console_flow

use agent_console_frontend::messages::{Command, EditorKind, Message};
use agent_console_frontend::models::{ApiTemplateRecord, TemplateType};
use agent_console_frontend::network::ChatMessage;
use agent_console_frontend::settings::{Session, TemplateSettings};
use agent_console_frontend::state::AppState;
use agent_console_frontend::storage::{self, MemoryStore};
use agent_console_frontend::templates::convert_api_template;
use serde_json::json;

fn run(state: &mut AppState, msg: Message) -> Vec<Command> {
    state.dispatch(msg)
}

#[test]
fn design_and_save_a_workflow() {
    let mut state = AppState::new();
    run(&mut state, Message::AddNode(EditorKind::Workflow));
    run(&mut state, Message::AddNode(EditorKind::Workflow));
    let ids: Vec<String> = state.workflow_editor.nodes.iter().map(|n| n.id.clone()).collect();
    run(
        &mut state,
        Message::Connect { editor: EditorKind::Workflow, source: ids[0].clone(), target: ids[1].clone() },
    );
    run(
        &mut state,
        Message::UpdateMetadata {
            editor: EditorKind::Workflow,
            name: Some("Nightly sync".into()),
            description: None,
            category: None,
        },
    );
    assert!(state.editor_is_dirty(EditorKind::Workflow));

    let commands = run(&mut state, Message::SaveTemplate(EditorKind::Workflow));
    let mut template = match commands.into_iter().next() {
        Some(Command::SaveTemplate { editor: EditorKind::Workflow, template }) => template,
        other => panic!("expected a save request, got {:?}", other),
    };
    assert_eq!(template.node_count(), 2);
    assert_eq!(template.name, "Nightly sync");

    template.id = "wf-42".into();
    template.is_custom = false;
    run(&mut state, Message::TemplateSaved { editor: EditorKind::Workflow, template });

    assert!(!state.editor_is_dirty(EditorKind::Workflow));
    assert_eq!(state.workflow_editor.metadata.template_id.as_deref(), Some("wf-42"));
    let gallery = state.templates.list(TemplateType::Workflow);
    assert_eq!(gallery.len(), 1);
    assert_eq!(gallery[0].id, "wf-42");
}

#[test]
fn loading_a_backend_template_then_clearing_it() {
    let record: ApiTemplateRecord = serde_json::from_value(json!({
        "id": 3,
        "name": "Support desk",
        "template_type": "agent",
        "agents_data": [{ "id": "lead", "name": "Lead" }, { "id": "bot", "name": "Bot" }],
        "connections_data": [{ "source": "lead", "target": "bot" }]
    }))
    .expect("record decodes");
    let template = convert_api_template(&record);

    let mut state = AppState::new();
    let commands = run(&mut state, Message::LoadTemplate(template));
    assert_eq!(state.agent_editor.nodes.len(), 2);
    assert_eq!(state.agent_editor.edges.len(), 1);
    assert!(state.workflow_editor.nodes.is_empty());
    assert_eq!(state.template_settings.last_template_id.as_deref(), Some("3"));
    assert!(commands.iter().any(|c| matches!(c, Command::PersistTemplateSettings(_))));

    let confirm = run(&mut state, Message::RequestClear(EditorKind::Agent));
    let follow_up = match confirm.into_iter().next() {
        Some(Command::Confirm { on_confirm, .. }) => *on_confirm,
        other => panic!("expected a confirmation, got {:?}", other),
    };
    assert_eq!(state.agent_editor.nodes.len(), 2);
    run(&mut state, follow_up);
    assert!(state.agent_editor.nodes.is_empty());
    assert_eq!(state.agent_editor.metadata.name, "Untitled Agent Network");
}

#[test]
fn live_chat_echoes_are_shown_once() {
    let mut state = AppState::new();
    let now = chrono::Utc::now().timestamp_millis();
    let reply = ChatMessage::new("assistant", "Report is ready", now);

    run(&mut state, Message::ChatReceived(reply.clone()));
    run(&mut state, Message::ChatReceived(ChatMessage { timestamp: now + 500, ..reply.clone() }));
    assert_eq!(state.chat.entries.len(), 1);

    run(&mut state, Message::ChatReceived(ChatMessage { timestamp: now + 5_000, ..reply }));
    assert_eq!(state.chat.entries.len(), 2);
}

#[test]
fn stored_session_and_custom_templates_are_restored() {
    let store = MemoryStore::default();
    let session = Session { token: "t0k".into(), user_id: "u-5".into(), username: None };
    storage::save_session(&store, &session).expect("save session");
    let record: ApiTemplateRecord =
        serde_json::from_value(json!({ "name": "Draft", "template_type": "workflow" }))
            .expect("record decodes");
    storage::cache_custom_template(&store, &convert_api_template(&record)).expect("cache");

    let state = AppState::load(&store);
    assert!(state.is_logged_in());
    assert_eq!(state.session.as_ref().map(|s| s.user_id.as_str()), Some("u-5"));
    let drafts = state.templates.list(TemplateType::Workflow);
    assert_eq!(drafts.len(), 1);
    assert!(drafts[0].is_custom);
}

#[test]
fn logout_drops_session_and_live_channel() {
    let mut state = AppState::new();
    let session = Session { token: "t".into(), user_id: "u".into(), username: None };
    run(&mut state, Message::LoggedIn { session, user: None });
    let commands = run(&mut state, Message::Logout);
    assert!(!state.is_logged_in());
    assert!(commands.iter().any(|c| matches!(c, Command::DisconnectLiveChannel)));
    assert!(commands.iter().any(|c| matches!(c, Command::PersistSession(None))));
}

#[test]
fn gallery_actions_and_settings_forms() {
    let mut state = AppState::new();
    run(&mut state, Message::AddNode(EditorKind::Agent));
    let id = state.agent_editor.nodes[0].id.clone();
    run(&mut state, Message::SelectNode { editor: EditorKind::Agent, node_id: Some(id.clone()) });
    assert_eq!(state.agent_editor.selected_node_id.as_deref(), Some(id.as_str()));
    run(&mut state, Message::SelectNode { editor: EditorKind::Agent, node_id: Some("ghost".into()) });
    assert!(state.agent_editor.selected_node_id.is_none());

    let clone = run(
        &mut state,
        Message::CloneTemplate { template_type: TemplateType::Agent, id: "12".into() },
    );
    assert!(matches!(clone.as_slice(), [Command::CloneTemplate { id, .. }] if id == "12"));
    let delete = run(
        &mut state,
        Message::DeleteTemplate { template_type: TemplateType::Workflow, id: "wf-9".into() },
    );
    assert!(matches!(delete.as_slice(), [Command::DeleteTemplate { id, .. }] if id == "wf-9"));

    let llm = state
        .llm_settings
        .edited("anthropic", "", 0.3, Some("ak-1"))
        .expect("known provider");
    let saved = run(&mut state, Message::UpdateLlmSettings(llm));
    assert_eq!(state.llm_settings.provider, "anthropic");
    assert!(saved.iter().any(|c| matches!(c, Command::PersistLlmSettings(_))));

    let prefs = TemplateSettings { export_format: "yaml".into(), ..TemplateSettings::default() };
    let saved = run(&mut state, Message::UpdateTemplateSettings(prefs));
    assert!(saved.iter().any(|c| matches!(c, Command::PersistTemplateSettings(_))));
    assert_eq!(state.template_settings.export_format, "yaml");
}
