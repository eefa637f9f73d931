//! Local persisted state: plain JSON blobs under fixed keys, no versioning.

use std::cell::RefCell;
use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{js_message, ConsoleError, Result};
use crate::models::Template;
use crate::settings::{LlmSettings, Session, TemplateSettings};

pub const TEMPLATE_SETTINGS_KEY: &str = "console.template_settings";
pub const LLM_SETTINGS_KEY: &str = "console.llm_settings";
pub const CUSTOM_TEMPLATES_KEY: &str = "console.custom_templates";
pub const SESSION_KEY: &str = "console.session";

/// Minimal string key/value store. Implemented by `localStorage` in the
/// browser and by [`MemoryStore`] in tests.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Browser `window.localStorage`.
pub struct LocalStore {
    storage: web_sys::Storage,
}

impl LocalStore {
    pub fn open() -> Result<Self> {
        let window = web_sys::window()
            .ok_or_else(|| ConsoleError::Storage("no global window exists".into()))?;
        let storage = window
            .local_storage()
            .map_err(|e| ConsoleError::Storage(js_message(&e)))?
            .ok_or_else(|| ConsoleError::Storage("no local storage exists".into()))?;
        Ok(Self { storage })
    }
}

impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.storage
            .get_item(key)
            .map_err(|e| ConsoleError::Storage(js_message(&e)))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.storage
            .set_item(key, value)
            .map_err(|e| ConsoleError::Storage(js_message(&e)))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.storage
            .remove_item(key)
            .map_err(|e| ConsoleError::Storage(js_message(&e)))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    items: RefCell<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.items.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.items.borrow_mut().remove(key);
        Ok(())
    }
}

fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

fn save_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    store.set(key, &serde_json::to_string(value)?)
}

/// Corrupt blobs are logged and replaced by defaults.
fn load_or_default<T: DeserializeOwned + Default>(store: &dyn KeyValueStore, key: &str) -> T {
    match load_json(store, key) {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(e) => {
            log::warn!("Ignoring unreadable '{}' in storage: {}", key, e);
            T::default()
        }
    }
}

pub fn load_template_settings(store: &dyn KeyValueStore) -> TemplateSettings {
    load_or_default(store, TEMPLATE_SETTINGS_KEY)
}

pub fn save_template_settings(store: &dyn KeyValueStore, settings: &TemplateSettings) -> Result<()> {
    save_json(store, TEMPLATE_SETTINGS_KEY, settings)
}

pub fn load_llm_settings(store: &dyn KeyValueStore) -> LlmSettings {
    load_or_default(store, LLM_SETTINGS_KEY)
}

pub fn save_llm_settings(store: &dyn KeyValueStore, settings: &LlmSettings) -> Result<()> {
    save_json(store, LLM_SETTINGS_KEY, settings)
}

/// Fallback cache of user-created templates, used when the backend is
/// unreachable.
pub fn load_custom_templates(store: &dyn KeyValueStore) -> Vec<Template> {
    load_or_default(store, CUSTOM_TEMPLATES_KEY)
}

pub fn save_custom_templates(store: &dyn KeyValueStore, templates: &[Template]) -> Result<()> {
    save_json(store, CUSTOM_TEMPLATES_KEY, templates)
}

/// Insert or replace (by id) a template in the fallback cache.
pub fn cache_custom_template(store: &dyn KeyValueStore, template: &Template) -> Result<()> {
    let mut templates = load_custom_templates(store);
    match templates.iter_mut().find(|t| t.id == template.id) {
        Some(existing) => *existing = template.clone(),
        None => templates.push(template.clone()),
    }
    save_custom_templates(store, &templates)
}

pub fn remove_custom_template(store: &dyn KeyValueStore, template_id: &str) -> Result<()> {
    let mut templates = load_custom_templates(store);
    templates.retain(|t| t.id != template_id);
    save_custom_templates(store, &templates)
}

pub fn load_session(store: &dyn KeyValueStore) -> Option<Session> {
    load_json(store, SESSION_KEY).ok().flatten()
}

pub fn save_session(store: &dyn KeyValueStore, session: &Session) -> Result<()> {
    save_json(store, SESSION_KEY, session)
}

pub fn clear_session(store: &dyn KeyValueStore) -> Result<()> {
    store.remove(SESSION_KEY)
}

/// Run `f` against `localStorage`, logging instead of failing when storage
/// is unavailable (private mode, unit tests).
pub fn with_local_store<T>(f: impl FnOnce(&dyn KeyValueStore) -> T) -> Option<T> {
    match LocalStore::open() {
        Ok(store) => Some(f(&store)),
        Err(e) => {
            log::warn!("localStorage unavailable: {}", e);
            None
        }
    }
}

/// Bearer token of the current session, if any.
pub fn current_token() -> Option<String> {
    with_local_store(load_session).flatten().map(|s| s.token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::create_template_from_workflow;

    #[test]
    fn settings_default_when_missing_or_corrupt() {
        let store = MemoryStore::default();
        assert_eq!(load_llm_settings(&store), LlmSettings::default());
        store.set(LLM_SETTINGS_KEY, "{not json").unwrap();
        assert_eq!(load_llm_settings(&store), LlmSettings::default());
    }

    #[test]
    fn custom_templates_are_upserted_by_id() {
        let store = MemoryStore::default();
        let mut template = create_template_from_workflow("A", "", "c", vec![], vec![], vec![]);
        cache_custom_template(&store, &template).unwrap();
        template.name = "A2".into();
        cache_custom_template(&store, &template).unwrap();

        let cached = load_custom_templates(&store);
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].name, "A2");

        remove_custom_template(&store, &template.id).unwrap();
        assert!(load_custom_templates(&store).is_empty());
    }

    #[test]
    fn session_round_trips_and_clears() {
        let store = MemoryStore::default();
        let session = Session { token: "t".into(), user_id: "42".into(), username: None };
        save_session(&store, &session).unwrap();
        assert_eq!(load_session(&store), Some(session));
        clear_session(&store).unwrap();
        assert_eq!(load_session(&store), None);
    }
}
