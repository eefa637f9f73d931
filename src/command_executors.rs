//! Runs the side effects the reducers ask for. Network commands are spawned
//! with `spawn_local` and report back through `dispatch_global_message`, so
//! no state borrow is ever held across an `.await`.

use wasm_bindgen_futures::spawn_local;

use crate::dom_utils;
use crate::error::ApiError;
use crate::messages::{Command, Message};
use crate::models::{LoginRequest, Template};
use crate::network::{with_live_channel, ApiClient, ConnectionState};
use crate::settings::Session;
use crate::state::dispatch_global_message;
use crate::storage;
use crate::templates::{convert_api_template, template_to_api_record};
use crate::toast;

/// Log the failure and turn an expired session into a logout.
fn report_api_error(context: &str, error: &ApiError) -> String {
    log::error!("{}: {}", context, error);
    if error.status() == Some(401) {
        dispatch_global_message(Message::SessionExpired);
    }
    error.to_string()
}

/// Write through to `localStorage`; a browser without it keeps the state
/// in memory only.
fn persist(what: &str, write: impl FnOnce(&dyn storage::KeyValueStore) -> crate::error::Result<()>) {
    match storage::with_local_store(write) {
        Some(Err(e)) => log::warn!("Failed to persist {}: {}", what, e),
        Some(Ok(())) => {}
        None => log::debug!("No localStorage; {} not persisted", what),
    }
}

// Templates the user created in this browser have never been POSTed.
fn is_unsaved(template: &Template) -> bool {
    template.id.is_empty() || template.id.starts_with("custom-")
}

pub fn execute(cmd: Command) {
    match cmd {
        Command::SendMessage(msg) => dispatch_global_message(msg),
        Command::Confirm { prompt, on_confirm } => {
            if dom_utils::confirm(&prompt) {
                dispatch_global_message(*on_confirm);
            }
        }
        Command::Toast { kind, message } => toast::show(&message, kind),
        Command::RefreshView => crate::bindings::notify_state_change(),

        Command::FetchTemplates(template_type) => {
            spawn_local(async move {
                match ApiClient::list_templates(template_type).await {
                    Ok(records) => {
                        let templates = records.iter().map(convert_api_template).collect();
                        dispatch_global_message(Message::TemplatesLoaded {
                            template_type,
                            templates,
                        });
                    }
                    Err(e) => {
                        let error = report_api_error("Failed to fetch templates", &e);
                        dispatch_global_message(Message::TemplatesLoadFailed {
                            template_type,
                            error,
                        });
                    }
                }
            });
        }
        Command::SaveTemplate { editor, template } => {
            spawn_local(async move {
                let record = template_to_api_record(&template);
                let result = if is_unsaved(&template) {
                    ApiClient::create_template(&record).await
                } else {
                    ApiClient::update_template(&template.id, &record).await
                };
                match result {
                    Ok(saved) => {
                        let mut saved = convert_api_template(&saved);
                        // Some endpoints echo only the id; keep the graph we sent.
                        if saved.node_count() == 0 && template.node_count() > 0 {
                            let id = saved.id.clone();
                            saved = template.clone();
                            saved.id = id;
                            saved.is_custom = false;
                        }
                        dispatch_global_message(Message::TemplateSaved {
                            editor,
                            template: saved,
                        });
                    }
                    Err(e) => {
                        let error = report_api_error("Failed to save template", &e);
                        dispatch_global_message(Message::TemplateSaveFailed {
                            editor,
                            template,
                            error,
                        });
                    }
                }
            });
        }
        Command::CloneTemplate { template_type, id } => {
            spawn_local(async move {
                match ApiClient::clone_template(template_type, &id).await {
                    Ok(record) => {
                        let clone = convert_api_template(&record);
                        toast::success(&format!("Cloned as \"{}\"", clone.name));
                        dispatch_global_message(Message::RequestTemplates);
                    }
                    Err(e) => toast::error(&report_api_error("Failed to clone template", &e)),
                }
            });
        }
        Command::DeleteTemplate { template_type, id } => {
            spawn_local(async move {
                match ApiClient::delete_template(template_type, &id).await {
                    Ok(()) => dispatch_global_message(Message::TemplateDeleted { id }),
                    Err(e) => toast::error(&report_api_error("Failed to delete template", &e)),
                }
            });
        }

        Command::SendChat { request, enhanced } => {
            spawn_local(async move {
                match ApiClient::send_chat(&request, enhanced).await {
                    Ok(reply) => dispatch_global_message(Message::ChatReplyReceived(reply)),
                    Err(e) => {
                        let error = report_api_error("Chat request failed", &e);
                        dispatch_global_message(Message::ChatFailed(error));
                    }
                }
            });
        }
        Command::DetectIntent(message) => {
            spawn_local(async move {
                match ApiClient::detect_intent(&message).await {
                    Ok(intent) => dispatch_global_message(Message::IntentDetected { message, intent }),
                    // Intent routing is optional; the chat reply still arrives.
                    Err(e) => log::warn!("Intent detection failed: {}", e),
                }
            });
        }
        Command::TriggerWorkflow(request) => {
            spawn_local(async move {
                match ApiClient::trigger_workflow(&request).await {
                    Ok(execution) => {
                        toast::show(
                            &format!("Workflow started (execution {})", execution.execution_id),
                            toast::ToastKind::Info,
                        );
                        dispatch_global_message(Message::ExecutionUpdated(execution));
                    }
                    Err(e) => toast::error(&report_api_error("Failed to trigger workflow", &e)),
                }
            });
        }

        Command::FetchExecutions => {
            spawn_local(async move {
                match ApiClient::list_executions().await {
                    Ok(records) => dispatch_global_message(Message::ExecutionsLoaded(records)),
                    Err(e) => {
                        report_api_error("Failed to fetch executions", &e);
                        dispatch_global_message(Message::ExecutionsLoaded(Vec::new()));
                    }
                }
            });
        }
        Command::CancelExecution(id) => {
            spawn_local(async move {
                match ApiClient::cancel_execution(&id).await {
                    Ok(()) => match ApiClient::get_execution(&id).await {
                        Ok(record) => dispatch_global_message(Message::ExecutionUpdated(record)),
                        Err(_) => dispatch_global_message(Message::RefreshExecutions),
                    },
                    Err(e) => toast::error(&report_api_error("Failed to cancel execution", &e)),
                }
            });
        }

        Command::Login { username, password } => {
            spawn_local(async move {
                let request = LoginRequest { username: username.clone(), password };
                let token = match ApiClient::login(&request).await {
                    Ok(token) => token,
                    Err(e) => {
                        log::warn!("Login failed: {}", e);
                        dispatch_global_message(Message::LoginFailed(e.to_string()));
                        return;
                    }
                };

                // The token must be stored before `/users/me` can succeed.
                let mut session = Session {
                    token: token.access_token,
                    user_id: String::new(),
                    username: Some(username),
                };
                persist("session", |s| storage::save_session(s, &session));

                let user = match token.user {
                    Some(user) => Some(user),
                    None => ApiClient::fetch_current_user().await.ok(),
                };
                match user {
                    Some(user) => {
                        session.user_id = user.id.clone();
                        dispatch_global_message(Message::LoggedIn {
                            session,
                            user: Some(user),
                        });
                    }
                    None => {
                        dispatch_global_message(Message::LoginFailed(
                            "could not load the user profile".into(),
                        ));
                        persist("session", |s| storage::clear_session(s));
                    }
                }
            });
        }
        Command::ConnectLiveChannel { user_id } => {
            if let Err(e) = with_live_channel(|channel| channel.connect(&user_id)) {
                log::error!("Failed to open live channel: {}", e);
                toast::error("Live updates unavailable");
            }
        }
        Command::DisconnectLiveChannel => with_live_channel(|channel| channel.close()),

        Command::PersistSession(session) => {
            persist("session", |store| match &session {
                Some(session) => storage::save_session(store, session),
                None => storage::clear_session(store),
            });
        }
        Command::PersistLlmSettings(settings) => {
            persist("LLM settings", |s| storage::save_llm_settings(s, &settings));
        }
        Command::PersistTemplateSettings(settings) => {
            persist("template settings", |s| storage::save_template_settings(s, &settings));
        }
        Command::CacheCustomTemplate(template) => {
            persist("custom template", |s| storage::cache_custom_template(s, &template));
        }
        Command::ForgetCustomTemplate(id) => {
            persist("custom template removal", |s| storage::remove_custom_template(s, &id));
        }

        Command::DownloadFile { file_name, mime_type, contents } => {
            if let Err(e) = dom_utils::download_file(&file_name, &mime_type, &contents) {
                log::error!("Download of {} failed: {:?}", file_name, e);
                toast::error("Failed to export template");
            }
        }

        Command::CheckHealth => {
            spawn_local(async move {
                let (ok, detail) = match ApiClient::health().await {
                    Ok(body) => {
                        // A reachable backend may still report its database down.
                        let db_ok = body
                            .get("database")
                            .and_then(|v| v.as_str())
                            .map_or(true, |s| matches!(s, "ok" | "healthy" | "connected"));
                        (db_ok, (!db_ok).then(|| format!("Database status: {}", body["database"])))
                    }
                    Err(e) => (false, Some(e.to_string())),
                };
                dispatch_global_message(Message::HealthChecked { ok, detail });
            });
        }
        Command::ShowDbErrorBanner(detail) => {
            if let Err(e) = dom_utils::render_db_error_banner(detail.as_deref()) {
                log::warn!("Failed to render database banner: {:?}", e);
            }
        }
    }
}


/// Route live channel events into the message loop. Called once at start-up.
pub fn bridge_live_channel() {
    with_live_channel(|channel| {
        let subscribers = channel.subscribers();
        let mut subs = subscribers.borrow_mut();
        subs.subscribe_chat_message(|msg| {
            dispatch_global_message(Message::ChatReceived(msg.clone()));
        });
        subs.subscribe_execution_update(|record| {
            dispatch_global_message(Message::ExecutionUpdated(record.clone()));
        });
        subs.subscribe_agent_thought(|thought| {
            dispatch_global_message(Message::AgentThoughtReceived(thought.clone()));
        });
        subs.subscribe_connect(|| {
            dispatch_global_message(Message::LiveChannelStatus(ConnectionState::Connected));
        });
        subs.subscribe_disconnect(|| {
            dispatch_global_message(Message::LiveChannelStatus(ConnectionState::Disconnected));
        });
        subs.subscribe_error(|error| {
            dispatch_global_message(Message::LiveChannelStatus(ConnectionState::Error(error.clone())));
        });
    });
}
