//! Chat panel: local sends, backend replies, live frames and intent routing.

use serde_json::json;

use crate::messages::{Command, Message};
use crate::models::{ChatRequest, WorkflowTriggerRequest};
use crate::network::ChatMessage;
use crate::state::{AppState, ChatEntry};
use crate::utils::{client_id, now_ms};

pub const USER_SENDER: &str = "user";
pub const ASSISTANT_SENDER: &str = "assistant";

// Below this confidence a detected intent is not acted upon.
const INTENT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Append a message unless it duplicates a recent one. Returns whether it
/// was appended.
fn push_entry(state: &mut AppState, message: &ChatMessage, local: bool) -> bool {
    if !state.chat.dedup.accept(message) {
        return false;
    }
    state.chat.entries.push(ChatEntry {
        id: message.id.clone().unwrap_or_else(|| client_id("msg")),
        sender: message.sender.clone(),
        content: message.content.clone(),
        timestamp: message.timestamp,
        hitl: message.hitl,
        local,
    });
    true
}

/// Returns true if the message was handled by this reducer
pub fn update(state: &mut AppState, msg: &Message, commands: &mut Vec<Command>) -> bool {
    match msg {
        Message::SendChat { text, enhanced } => {
            let text = text.trim();
            if text.is_empty() {
                return true;
            }
            let outgoing = ChatMessage::new(USER_SENDER, text, now_ms());
            push_entry(state, &outgoing, true);
            state.chat.pending = true;

            let request = ChatRequest {
                message: text.to_string(),
                conversation_id: state.chat.conversation_id.clone(),
                template_id: state.template_settings.last_template_id.clone(),
                provider: Some(state.llm_settings.provider.clone()),
                model: Some(state.llm_settings.model.clone()),
            };
            commands.push(Command::SendChat {
                request,
                enhanced: *enhanced,
            });
            if *enhanced {
                commands.push(Command::DetectIntent(text.to_string()));
            }
        }
        Message::ChatReceived(message) => {
            if !push_entry(state, message, false) {
                return true;
            }
            if message.sender != USER_SENDER {
                state.chat.pending = false;
            }
        }
        Message::ChatReplyReceived(reply) => {
            state.chat.pending = false;
            if reply.conversation_id.is_some() {
                state.chat.conversation_id = reply.conversation_id.clone();
            }
            if !reply.response.trim().is_empty() {
                let mut message = ChatMessage::new(ASSISTANT_SENDER, reply.response.clone(), now_ms());
                message.conversation_id = reply.conversation_id.clone();
                push_entry(state, &message, false);
            }
            if let (Some(true), Some(execution_id)) = (reply.workflow_triggered, &reply.execution_id) {
                commands.push(Command::Toast {
                    kind: crate::toast::ToastKind::Info,
                    message: format!("Workflow started (execution {})", execution_id),
                });
                commands.push(Command::FetchExecutions);
            }
        }
        Message::ChatFailed(error) => {
            state.chat.pending = false;
            commands.push(Command::error_toast(format!("Chat failed: {}", error)));
        }
        Message::IntentDetected { message, intent } => {
            let workflow_id = match &intent.workflow_id {
                Some(id) if intent.confidence >= INTENT_CONFIDENCE_THRESHOLD => id.clone(),
                _ => {
                    log::debug!(
                        "Intent '{}' ({:.2}) does not route to a workflow",
                        intent.intent,
                        intent.confidence
                    );
                    return true;
                }
            };
            let input = match &intent.parameters {
                serde_json::Value::Object(_) => intent.parameters.clone(),
                _ => json!({ "message": message }),
            };
            commands.push(Command::TriggerWorkflow(WorkflowTriggerRequest {
                workflow_id,
                input,
            }));
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
    use crate::models::{ChatResponse, IntentResponse};

    #[test]
    fn sending_appends_and_requests() {
        let mut state = AppState::new();
        let mut commands = Vec::new();
        update(
            &mut state,
            &Message::SendChat { text: "  hello ".into(), enhanced: true },
            &mut commands,
        );
        assert_eq!(state.chat.entries.len(), 1);
        assert!(state.chat.entries[0].local);
        assert!(state.chat.pending);
        match &commands[0] {
            Command::SendChat { request, enhanced } => {
                assert_eq!(request.message, "hello");
                assert!(*enhanced);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(commands[1], Command::DetectIntent(_)));
    }

    #[test]
    fn blank_messages_are_ignored() {
        let mut state = AppState::new();
        let mut commands = Vec::new();
        update(&mut state, &Message::SendChat { text: "   ".into(), enhanced: false }, &mut commands);
        assert!(state.chat.entries.is_empty());
        assert!(commands.is_empty());
    }

    #[test]
    fn live_echo_of_a_reply_is_suppressed() {
        let mut state = AppState::new();
        let mut commands = Vec::new();
        let reply = ChatResponse {
            response: "Done".into(),
            conversation_id: Some("c1".into()),
            ..ChatResponse::default()
        };
        update(&mut state, &Message::ChatReplyReceived(reply), &mut commands);
        let echo = ChatMessage::new(ASSISTANT_SENDER, "Done", now_ms());
        update(&mut state, &Message::ChatReceived(echo), &mut commands);

        assert_eq!(state.chat.entries.len(), 1);
        assert_eq!(state.chat.conversation_id.as_deref(), Some("c1"));
    }

    #[test]
    fn confident_intent_triggers_workflow() {
        let mut state = AppState::new();
        let mut commands = Vec::new();
        let intent = IntentResponse {
            intent: "run_report".into(),
            confidence: 0.9,
            workflow_id: Some("12".into()),
            parameters: serde_json::Value::Null,
        };
        update(
            &mut state,
            &Message::IntentDetected { message: "weekly report".into(), intent: intent.clone() },
            &mut commands,
        );
        match &commands[0] {
            Command::TriggerWorkflow(req) => {
                assert_eq!(req.workflow_id, "12");
                assert_eq!(req.input["message"], "weekly report");
            }
            other => panic!("unexpected {:?}", other),
        }

        commands.clear();
        let weak = IntentResponse { confidence: 0.2, ..intent };
        update(
            &mut state,
            &Message::IntentDetected { message: "hm".into(), intent: weak },
            &mut commands,
        );
        assert!(commands.is_empty());
    }
}
