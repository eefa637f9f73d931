//! Designer messages: node/edge edits, clear, auto-arrange, load.

use crate::editor::{GraphEditor, NodePayload};
use crate::messages::{Command, EditorKind, Message};
use crate::models::Template;
use crate::state::AppState;

/// Apply `f` to the designer selected by `editor`, whatever its payload.
macro_rules! with_editor {
    ($state:expr, $editor:expr, |$ed:ident| $body:expr) => {
        match $editor {
            EditorKind::Agent => {
                let $ed = &mut $state.agent_editor;
                $body
            }
            EditorKind::Workflow => {
                let $ed = &mut $state.workflow_editor;
                $body
            }
        }
    };
}

fn clear_prompt(editor: EditorKind) -> String {
    match editor {
        EditorKind::Agent => "Clear the agent network? Unsaved changes will be lost.".into(),
        EditorKind::Workflow => "Clear the workflow? Unsaved changes will be lost.".into(),
    }
}

fn load<D: NodePayload>(editor: &mut GraphEditor<D>, template: &Template, commands: &mut Vec<Command>) {
    match editor.load_template(template) {
        Ok(()) => commands.push(Command::success_toast(format!(
            "Loaded template \"{}\"",
            template.name
        ))),
        Err(e) => commands.push(Command::error_toast(e.to_string())),
    }
}

/// Returns true if the message was handled by this reducer
pub fn update(state: &mut AppState, msg: &Message, commands: &mut Vec<Command>) -> bool {
    match msg {
        Message::AddNode(editor) => {
            let id = with_editor!(state, *editor, |ed| ed.add_node());
            log::debug!("Added node {}", id);
        }
        Message::RemoveNode { editor, node_id } => {
            with_editor!(state, *editor, |ed| ed.remove_node(node_id));
        }
        Message::Connect { editor, source, target } => {
            if let Err(e) = with_editor!(state, *editor, |ed| ed.connect(source, target)) {
                log::warn!("Rejected connection {} -> {}: {}", source, target, e);
                commands.push(Command::error_toast(e.to_string()));
            }
        }
        Message::Disconnect { editor, edge_id } => {
            with_editor!(state, *editor, |ed| ed.disconnect(edge_id));
        }
        Message::UpdateNodeData { editor, node_id, patch } => {
            if let Err(e) = with_editor!(state, *editor, |ed| ed.update_node_data(node_id, patch)) {
                commands.push(Command::error_toast(e.to_string()));
            }
        }
        Message::MoveNode { editor, node_id, position } => {
            with_editor!(state, *editor, |ed| ed.move_node(node_id, *position));
        }
        Message::SelectNode { editor, node_id } => {
            with_editor!(state, *editor, |ed| ed.select(node_id.clone()));
        }
        Message::UpdateMetadata { editor, name, description, category } => {
            with_editor!(state, *editor, |ed| ed.set_metadata(
                name.clone(),
                description.clone(),
                category.clone()
            ));
        }
        Message::RequestClear(editor) => {
            commands.push(Command::Confirm {
                prompt: clear_prompt(*editor),
                on_confirm: Box::new(Message::ClearConfirmed(*editor)),
            });
            return true;
        }
        Message::ClearConfirmed(editor) => {
            with_editor!(state, *editor, |ed| ed.clear());
        }
        Message::AutoArrange(editor) => {
            with_editor!(state, *editor, |ed| ed.auto_arrange());
        }
        Message::LoadTemplate(template) => {
            let editor = EditorKind::for_template(template.template_type());
            with_editor!(state, editor, |ed| load(ed, template, commands));
            state.template_settings.last_template_id = Some(template.id.clone());
            commands.push(Command::PersistTemplateSettings(state.template_settings.clone()));
        }
        _ => return false,
    }
    commands.push(Command::RefreshView);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Position;
    use serde_json::json;

    #[test]
    fn clear_waits_for_confirmation() {
        let mut state = AppState::new();
        let mut commands = Vec::new();
        update(&mut state, &Message::AddNode(EditorKind::Agent), &mut commands);
        commands.clear();

        update(&mut state, &Message::RequestClear(EditorKind::Agent), &mut commands);
        assert_eq!(state.agent_editor.nodes.len(), 1);
        let follow_up = match commands.pop() {
            Some(Command::Confirm { on_confirm, .. }) => *on_confirm,
            other => panic!("expected confirm, got {:?}", other),
        };

        update(&mut state, &follow_up, &mut commands);
        assert!(state.agent_editor.nodes.is_empty());
    }

    #[test]
    fn messages_target_the_named_designer() {
        let mut state = AppState::new();
        let mut commands = Vec::new();
        update(&mut state, &Message::AddNode(EditorKind::Workflow), &mut commands);
        let id = state.workflow_editor.nodes[0].id.clone();
        update(
            &mut state,
            &Message::MoveNode {
                editor: EditorKind::Workflow,
                node_id: id.clone(),
                position: Position::new(1.0, 2.0),
            },
            &mut commands,
        );
        update(
            &mut state,
            &Message::UpdateNodeData {
                editor: EditorKind::Workflow,
                node_id: id,
                patch: json!({"label": "Fetch"}),
            },
            &mut commands,
        );
        assert!(state.agent_editor.nodes.is_empty());
        assert_eq!(state.workflow_editor.nodes[0].position, Position::new(1.0, 2.0));
        assert_eq!(state.workflow_editor.nodes[0].data.label, "Fetch");
    }

    #[test]
    fn bad_connections_surface_as_toasts() {
        let mut state = AppState::new();
        let mut commands = Vec::new();
        update(
            &mut state,
            &Message::Connect {
                editor: EditorKind::Agent,
                source: "a".into(),
                target: "b".into(),
            },
            &mut commands,
        );
        assert!(matches!(commands[0], Command::Toast { .. }));
        assert!(state.agent_editor.edges.is_empty());
    }
}
