// src/update.rs
//
// Root reducer. Domain reducers get the first look at every message; what
// they leave (session, settings, health) is handled here.
//
use crate::messages::{Command, Message};
use crate::network::ConnectionState;
use crate::state::AppState;

pub fn update(state: &mut AppState, msg: Message) -> Vec<Command> {
    let mut commands = Vec::new();

    if crate::reducers::graph::update(state, &msg, &mut commands) {
        return commands;
    }
    if crate::reducers::templates::update(state, &msg, &mut commands) {
        return commands;
    }
    if crate::reducers::chat::update(state, &msg, &mut commands) {
        return commands;
    }
    if crate::reducers::monitoring::update(state, &msg, &mut commands) {
        return commands;
    }

    match msg {
        Message::Login { username, password } => {
            if username.trim().is_empty() || password.is_empty() {
                commands.push(Command::error_toast("Username and password are required"));
            } else {
                commands.push(Command::Login {
                    username: username.trim().to_string(),
                    password,
                });
            }
        }
        Message::LoggedIn { session, user } => {
            let user_id = session.user_id.clone();
            state.session = Some(session.clone());
            state.current_user = user;
            commands.push(Command::PersistSession(Some(session)));
            commands.push(Command::ConnectLiveChannel { user_id });
            commands.push(Command::SendMessage(Message::RequestTemplates));
            commands.push(Command::RefreshView);
        }
        Message::LoginFailed(error) => {
            commands.push(Command::error_toast(format!("Login failed: {}", error)));
        }
        Message::Logout | Message::SessionExpired => {
            let expired = matches!(msg, Message::SessionExpired);
            state.session = None;
            state.current_user = None;
            state.chat = Default::default();
            commands.push(Command::PersistSession(None));
            commands.push(Command::DisconnectLiveChannel);
            if expired {
                commands.push(Command::error_toast("Session expired, please log in again"));
            }
            commands.push(Command::RefreshView);
        }
        Message::LiveChannelStatus(status) => {
            if status == ConnectionState::Connected && state.live_status.is_some() {
                // Reconnected: catch up on anything missed while offline.
                commands.push(Command::FetchExecutions);
            }
            state.live_status = Some(status);
            commands.push(Command::RefreshView);
        }
        Message::UpdateLlmSettings(settings) => match settings.validate() {
            Ok(()) => {
                state.llm_settings = settings.clone();
                commands.push(Command::PersistLlmSettings(settings));
                commands.push(Command::success_toast("LLM settings saved"));
            }
            Err(e) => commands.push(Command::error_toast(e.to_string())),
        },
        Message::UpdateTemplateSettings(settings) => {
            state.template_settings = settings.clone();
            commands.push(Command::PersistTemplateSettings(settings));
        }
        Message::CheckHealth => {
            commands.push(Command::CheckHealth);
        }
        Message::HealthChecked { ok, detail } => {
            let error = if ok {
                None
            } else {
                Some(detail.unwrap_or_else(|| "Unable to reach the database".to_string()))
            };
            if error != state.db_error {
                if let Some(e) = &error {
                    log::error!("Backend health check failed: {}", e);
                }
                state.db_error = error.clone();
                commands.push(Command::ShowDbErrorBanner(error));
            }
        }
        other => {
            log::warn!("Unhandled message: {:?}", other);
        }
    }

    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{LlmSettings, Session};

    fn session() -> Session {
        Session { token: "tok".into(), user_id: "u1".into(), username: Some("ada".into()) }
    }

    #[test]
    fn login_connects_live_channel() {
        let mut state = AppState::new();
        let commands = update(&mut state, Message::LoggedIn { session: session(), user: None });
        assert!(state.is_logged_in());
        assert!(commands
            .iter()
            .any(|c| matches!(c, Command::ConnectLiveChannel { user_id } if user_id == "u1")));
    }

    #[test]
    fn expiry_clears_session_and_disconnects() {
        let mut state = AppState::new();
        state.session = Some(session());
        let commands = update(&mut state, Message::SessionExpired);
        assert!(!state.is_logged_in());
        assert!(commands.iter().any(|c| matches!(c, Command::DisconnectLiveChannel)));
        assert!(commands.iter().any(|c| matches!(c, Command::PersistSession(None))));
    }

    #[test]
    fn invalid_llm_settings_are_not_stored() {
        let mut state = AppState::new();
        let mut settings = LlmSettings::default();
        settings.temperature = 5.0;
        let commands = update(&mut state, Message::UpdateLlmSettings(settings));
        assert_eq!(state.llm_settings, LlmSettings::default());
        assert!(matches!(commands.as_slice(), [Command::Toast { .. }]));
    }

    #[test]
    fn banner_toggles_only_on_change() {
        let mut state = AppState::new();
        let down = update(&mut state, Message::HealthChecked { ok: false, detail: None });
        assert!(matches!(down.as_slice(), [Command::ShowDbErrorBanner(Some(_))]));
        assert!(update(&mut state, Message::HealthChecked { ok: false, detail: None }).is_empty());
        let up = update(&mut state, Message::HealthChecked { ok: true, detail: None });
        assert!(matches!(up.as_slice(), [Command::ShowDbErrorBanner(None)]));
        assert!(state.db_error.is_none());
    }
}
