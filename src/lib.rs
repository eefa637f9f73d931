use wasm_bindgen::prelude::*;

pub mod bindings;
pub mod command_executors;
pub mod constants;
pub mod dom_utils;
pub mod editor;
pub mod error;
pub mod layout;
pub mod messages;
pub mod models;
pub mod network;
pub mod reducers;
pub mod settings;
pub mod state;
pub mod storage;
pub mod templates;
pub mod toast;
pub mod update;
pub mod utils;

use messages::Message;
use state::{dispatch_global_message, AppState, APP_STATE};
use storage::LocalStore;

// Main entry point for the WASM application
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    // Initialize better panic messages
    console_error_panic_hook::set_once();
    if let Err(e) = console_log::init_with_level(constants::LOG_LEVEL) {
        web_sys::console::warn_1(&format!("Logger already initialised: {}", e).into());
    }

    // Restore settings and the session; a browser without localStorage
    // still gets a working (non-persistent) console.
    let restored = match LocalStore::open() {
        Ok(store) => AppState::load(&store),
        Err(e) => {
            log::warn!("localStorage unavailable, starting fresh: {}", e);
            AppState::new()
        }
    };
    let user_id = restored.session.as_ref().map(|s| s.user_id.clone());
    APP_STATE.with(|state| *state.borrow_mut() = restored);

    command_executors::bridge_live_channel();
    dispatch_global_message(Message::CheckHealth);

    match user_id {
        Some(user_id) => {
            log::info!("Resuming session for user {}", user_id);
            command_executors::execute(messages::Command::ConnectLiveChannel { user_id });
            dispatch_global_message(Message::RequestTemplates);
            dispatch_global_message(Message::RefreshExecutions);
        }
        None => log::info!("No stored session; waiting for login"),
    }

    Ok(())
}
