//! Execution monitoring and the agent thought stream.

use crate::constants::MAX_AGENT_THOUGHTS;
use crate::messages::{Command, Message};
use crate::models::ExecutionRecord;
use crate::state::{AppState, MonitoringState};
use crate::utils::{format_duration_ms, now_ms};

/// Merge one update into the execution table. Progress is clamped to
/// 0..=100 and a terminal status is never replaced by a stale non-terminal
/// one.
pub fn apply_execution_update(monitoring: &mut MonitoringState, update: &ExecutionRecord) {
    let mut incoming = update.clone();
    incoming.progress = if incoming.progress.is_finite() {
        incoming.progress.clamp(0.0, 100.0)
    } else {
        0.0
    };

    match monitoring.executions.get_mut(&incoming.execution_id) {
        Some(existing) if existing.status.is_terminal() && !incoming.status.is_terminal() => {
            log::debug!(
                "Ignoring stale {} update for finished execution {}",
                incoming.status,
                incoming.execution_id
            );
        }
        Some(existing) => {
            existing.status = incoming.status;
            existing.progress = incoming.progress;
            if incoming.workflow_id.is_some() {
                existing.workflow_id = incoming.workflow_id;
            }
            if incoming.current_step.is_some() {
                existing.current_step = incoming.current_step;
            }
            if incoming.message.is_some() {
                existing.message = incoming.message;
            }
            if incoming.updated_at.is_some() {
                existing.updated_at = incoming.updated_at;
            }
        }
        None => {
            monitoring
                .executions
                .insert(incoming.execution_id.clone(), incoming);
        }
    }
}

/// Human-readable age of an execution's last update, e.g. `"12 s"`.
pub fn update_age(record: &ExecutionRecord) -> Option<String> {
    let updated = record.updated_at?.timestamp_millis();
    Some(format_duration_ms((now_ms() - updated).max(0) as u64))
}

/// Returns true if the message was handled by this reducer
pub fn update(state: &mut AppState, msg: &Message, commands: &mut Vec<Command>) -> bool {
    match msg {
        Message::RefreshExecutions => {
            state.monitoring.loading = true;
            commands.push(Command::FetchExecutions);
            return true;
        }
        Message::ExecutionsLoaded(records) => {
            state.monitoring.loading = false;
            for record in records {
                apply_execution_update(&mut state.monitoring, record);
            }
        }
        Message::ExecutionUpdated(record) => {
            let was_terminal = state
                .monitoring
                .executions
                .get(&record.execution_id)
                .map_or(false, |e| e.status.is_terminal());
            apply_execution_update(&mut state.monitoring, record);
            if !was_terminal && record.status.is_terminal() {
                let message = format!("Execution {} {}", record.execution_id, record.status);
                commands.push(if record.status == crate::models::ExecutionStatus::Completed {
                    Command::success_toast(message)
                } else {
                    Command::error_toast(message)
                });
            }
        }
        Message::AgentThoughtReceived(thought) => {
            let thoughts = &mut state.monitoring.thoughts;
            thoughts.push_back(thought.clone());
            while thoughts.len() > MAX_AGENT_THOUGHTS {
                thoughts.pop_front();
            }
        }
        Message::CancelExecution(id) => {
            commands.push(Command::CancelExecution(id.clone()));
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
    use crate::models::ExecutionStatus;
    use crate::network::AgentThought;

    fn record(id: &str, status: ExecutionStatus, progress: f64) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: id.into(),
            workflow_id: None,
            status,
            progress,
            current_step: None,
            message: None,
            updated_at: None,
        }
    }

    #[test]
    fn progress_is_clamped() {
        let mut m = MonitoringState::default();
        apply_execution_update(&mut m, &record("1", ExecutionStatus::Running, 140.0));
        assert_eq!(m.executions["1"].progress, 100.0);
        apply_execution_update(&mut m, &record("1", ExecutionStatus::Running, -3.0));
        assert_eq!(m.executions["1"].progress, 0.0);
        apply_execution_update(&mut m, &record("1", ExecutionStatus::Running, f64::NAN));
        assert_eq!(m.executions["1"].progress, 0.0);
    }

    #[test]
    fn finished_executions_do_not_regress() {
        let mut m = MonitoringState::default();
        apply_execution_update(&mut m, &record("1", ExecutionStatus::Completed, 100.0));
        apply_execution_update(&mut m, &record("1", ExecutionStatus::Running, 50.0));
        assert_eq!(m.executions["1"].status, ExecutionStatus::Completed);
        assert_eq!(m.executions["1"].progress, 100.0);
    }

    #[test]
    fn terminal_transition_toasts_once() {
        let mut state = AppState::new();
        let mut commands = Vec::new();
        let done = record("9", ExecutionStatus::Failed, 30.0);
        update(&mut state, &Message::ExecutionUpdated(done.clone()), &mut commands);
        update(&mut state, &Message::ExecutionUpdated(done), &mut commands);
        let toasts = commands.iter().filter(|c| matches!(c, Command::Toast { .. })).count();
        assert_eq!(toasts, 1);
    }

    #[test]
    fn thoughts_are_capped_newest_last() {
        let mut state = AppState::new();
        let mut commands = Vec::new();
        for i in 0..(MAX_AGENT_THOUGHTS + 25) {
            let thought = AgentThought {
                agent_id: Some("a".into()),
                agent_name: None,
                execution_id: None,
                thought: format!("t{}", i),
                timestamp: i as i64,
            };
            update(&mut state, &Message::AgentThoughtReceived(thought), &mut commands);
        }
        let thoughts = &state.monitoring.thoughts;
        assert_eq!(thoughts.len(), MAX_AGENT_THOUGHTS);
        assert_eq!(thoughts.back().map(|t| t.thought.as_str()), Some("t224"));
        assert_eq!(thoughts.front().map(|t| t.thought.as_str()), Some("t25"));
    }

    #[test]
    fn age_is_reported_for_timestamped_records() {
        let mut r = record("1", ExecutionStatus::Running, 0.0);
        assert_eq!(update_age(&r), None);
        r.updated_at = Some(chrono::Utc::now() - chrono::Duration::seconds(5));
        let age = update_age(&r).unwrap();
        assert!(age.ends_with(" s"), "{}", age);
    }
}
