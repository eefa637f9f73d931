//! Template gallery: load, save, clone, delete, import and export.

use crate::messages::{Command, EditorKind, Message};
use crate::models::{Template, TemplateType};
use crate::state::AppState;
use crate::templates::{export_template, import_template, FileFormat};

fn editor_template(state: &AppState, editor: EditorKind) -> crate::error::Result<Template> {
    match editor {
        EditorKind::Agent => state.agent_editor.to_template(),
        EditorKind::Workflow => state.workflow_editor.to_template(),
    }
}

fn file_name_for(template: &Template, format: FileFormat) -> String {
    let stem: String = template
        .name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}.{}", stem.to_lowercase(), format.extension())
}

fn upsert_custom(state: &mut AppState, template: &Template) {
    match state.templates.custom.iter_mut().find(|t| t.id == template.id) {
        Some(existing) => *existing = template.clone(),
        None => state.templates.custom.push(template.clone()),
    }
}

/// Returns true if the message was handled by this reducer
pub fn update(state: &mut AppState, msg: &Message, commands: &mut Vec<Command>) -> bool {
    match msg {
        Message::RequestTemplates => {
            let types = [TemplateType::Workflow, TemplateType::Agent];
            state.templates.last_error = None;
            state.templates.start_fetches(types.len());
            commands.extend(types.into_iter().map(Command::FetchTemplates));
        }
        Message::TemplatesLoaded { template_type, templates } => {
            state.templates.finish_fetch();
            state.templates.remote.insert(*template_type, templates.clone());
        }
        Message::TemplatesLoadFailed { template_type, error } => {
            // The gallery keeps showing the cached custom templates.
            state.templates.finish_fetch();
            state.templates.last_error = Some(error.clone());
            log::warn!("Failed to load {} templates: {}", template_type.as_str(), error);
        }
        Message::SaveTemplate(editor) => match editor_template(state, *editor) {
            Ok(template) => commands.push(Command::SaveTemplate {
                editor: *editor,
                template,
            }),
            Err(e) => {
                commands.push(Command::error_toast(e.to_string()));
                return true;
            }
        },
        Message::TemplateSaved { editor, template } => {
            match editor {
                EditorKind::Agent => state.agent_editor.mark_saved(&template.id),
                EditorKind::Workflow => state.workflow_editor.mark_saved(&template.id),
            }
            let list = state.templates.remote.entry(template.template_type()).or_default();
            match list.iter_mut().find(|t| t.id == template.id) {
                Some(existing) => *existing = template.clone(),
                None => list.push(template.clone()),
            }
            commands.push(Command::success_toast(format!("Saved \"{}\"", template.name)));
        }
        Message::TemplateSaveFailed { editor, template, error } => {
            // Keep the work locally so it survives a backend outage.
            upsert_custom(state, template);
            match editor {
                EditorKind::Agent => state.agent_editor.mark_saved(&template.id),
                EditorKind::Workflow => state.workflow_editor.mark_saved(&template.id),
            }
            commands.push(Command::CacheCustomTemplate(template.clone()));
            commands.push(Command::error_toast(format!(
                "Failed to save template to server ({}). Kept a local copy.",
                error
            )));
        }
        Message::CloneTemplate { template_type, id } => {
            commands.push(Command::CloneTemplate {
                template_type: *template_type,
                id: id.clone(),
            });
            return true;
        }
        Message::DeleteTemplate { template_type, id } => {
            let is_local_only = state.templates.custom.iter().any(|t| &t.id == id)
                && !state
                    .templates
                    .remote
                    .get(template_type)
                    .map_or(false, |list| list.iter().any(|t| &t.id == id));
            if is_local_only {
                commands.push(Command::SendMessage(Message::TemplateDeleted { id: id.clone() }));
            } else {
                commands.push(Command::DeleteTemplate {
                    template_type: *template_type,
                    id: id.clone(),
                });
            }
            return true;
        }
        Message::TemplateDeleted { id } => {
            for list in state.templates.remote.values_mut() {
                list.retain(|t| &t.id != id);
            }
            let before = state.templates.custom.len();
            state.templates.custom.retain(|t| &t.id != id);
            if state.templates.custom.len() != before {
                commands.push(Command::ForgetCustomTemplate(id.clone()));
            }
        }
        Message::ImportTemplateFile { file_name, contents } => {
            let imported = FileFormat::from_file_name(file_name)
                .ok_or_else(|| {
                    crate::error::ConsoleError::Validation(format!(
                        "Unsupported template file '{}': use .json or .yaml",
                        file_name
                    ))
                })
                .and_then(|format| import_template(contents, format));
            match imported {
                Ok(template) => {
                    upsert_custom(state, &template);
                    commands.push(Command::CacheCustomTemplate(template.clone()));
                    commands.push(Command::success_toast(format!(
                        "Imported \"{}\"",
                        template.name
                    )));
                }
                Err(e) => commands.push(Command::error_toast(e.to_string())),
            }
        }
        Message::ExportTemplate { editor, format } => {
            let format = format.unwrap_or_else(|| state.template_settings.export_format());
            let exported = editor_template(state, *editor).and_then(|template| {
                let contents = export_template(&template, format)?;
                Ok((file_name_for(&template, format), contents))
            });
            match exported {
                Ok((file_name, contents)) => commands.push(Command::DownloadFile {
                    file_name,
                    mime_type: format.mime_type().to_string(),
                    contents,
                }),
                Err(e) => commands.push(Command::error_toast(e.to_string())),
            }
            return true;
        }
        _ => return false,
    }
    commands.push(Command::RefreshView);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::create_template_from_agent;

    fn saved_template() -> Template {
        let mut t = create_template_from_agent("Team", "", "ops", vec![], vec![], vec![], "");
        t.id = "17".into();
        t
    }

    #[test]
    fn saving_unnamed_graph_is_refused() {
        let mut state = AppState::new();
        state.agent_editor.metadata.name = String::new();
        let mut commands = Vec::new();
        update(&mut state, &Message::SaveTemplate(EditorKind::Agent), &mut commands);
        assert!(matches!(commands.as_slice(), [Command::Toast { .. }]));
    }

    #[test]
    fn failed_save_keeps_a_local_copy() {
        let mut state = AppState::new();
        let mut commands = Vec::new();
        let template = saved_template();
        update(
            &mut state,
            &Message::TemplateSaveFailed {
                editor: EditorKind::Agent,
                template: template.clone(),
                error: "offline".into(),
            },
            &mut commands,
        );
        assert_eq!(state.templates.custom.len(), 1);
        assert!(commands.iter().any(|c| matches!(c, Command::CacheCustomTemplate(_))));
        assert!(!state.agent_editor.dirty);
    }

    #[test]
    fn saved_template_replaces_gallery_entry() {
        let mut state = AppState::new();
        let mut commands = Vec::new();
        let mut template = saved_template();
        for name in ["v1", "v2"] {
            template.name = name.into();
            update(
                &mut state,
                &Message::TemplateSaved { editor: EditorKind::Agent, template: template.clone() },
                &mut commands,
            );
        }
        let list = state.templates.list(TemplateType::Agent);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "v2");
        assert_eq!(state.agent_editor.metadata.template_id.as_deref(), Some("17"));
    }

    #[test]
    fn import_and_export_go_through_files() {
        let mut state = AppState::new();
        let mut commands = Vec::new();
        update(
            &mut state,
            &Message::ImportTemplateFile {
                file_name: "flow.yaml".into(),
                contents: "name: Flow\ntemplate_type: workflow\n".into(),
            },
            &mut commands,
        );
        assert_eq!(state.templates.custom[0].name, "Flow");

        update(
            &mut state,
            &Message::ImportTemplateFile { file_name: "flow.txt".into(), contents: "{}".into() },
            &mut commands,
        );
        assert_eq!(state.templates.custom.len(), 1);

        commands.clear();
        state.workflow_editor.metadata.name = "My Flow".into();
        update(
            &mut state,
            &Message::ExportTemplate { editor: EditorKind::Workflow, format: None },
            &mut commands,
        );
        match &commands[0] {
            Command::DownloadFile { file_name, mime_type, contents } => {
                assert_eq!(file_name, "my_flow.json");
                assert_eq!(mime_type, "application/json");
                assert!(contents.contains("\"My Flow\""));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn gallery_loads_until_both_lists_answer() {
        let mut state = AppState::new();
        let mut commands = Vec::new();
        update(&mut state, &Message::RequestTemplates, &mut commands);
        assert!(state.templates.loading);

        update(
            &mut state,
            &Message::TemplatesLoaded { template_type: TemplateType::Workflow, templates: vec![] },
            &mut commands,
        );
        assert!(state.templates.loading);

        update(
            &mut state,
            &Message::TemplatesLoadFailed {
                template_type: TemplateType::Agent,
                error: "502".into(),
            },
            &mut commands,
        );
        assert!(!state.templates.loading);
        assert_eq!(state.templates.last_error.as_deref(), Some("502"));
    }

    #[test]
    fn local_only_templates_are_deleted_without_a_request() {
        let mut state = AppState::new();
        state.templates.custom.push(saved_template());
        let mut commands = Vec::new();
        update(
            &mut state,
            &Message::DeleteTemplate { template_type: TemplateType::Agent, id: "17".into() },
            &mut commands,
        );
        assert!(matches!(
            commands.as_slice(),
            [Command::SendMessage(Message::TemplateDeleted { .. })]
        ));
    }
}
