//! User-facing settings persisted in local storage.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_TEMPLATE_CATEGORY;
use crate::error::{ConsoleError, Result};
use crate::templates::FileFormat;

#[derive(Clone, Debug, PartialEq)]
pub struct LlmProvider {
    pub id: &'static str,
    pub display_name: &'static str,
    pub default_model: &'static str,
    pub requires_api_key: bool,
}

lazy_static! {
    /// Providers the backend knows how to route chat requests to.
    pub static ref LLM_PROVIDERS: Vec<LlmProvider> = vec![
        LlmProvider {
            id: "openai",
            display_name: "OpenAI",
            default_model: "gpt-4o-mini",
            requires_api_key: true,
        },
        LlmProvider {
            id: "anthropic",
            display_name: "Anthropic",
            default_model: "claude-3-5-sonnet-latest",
            requires_api_key: true,
        },
        LlmProvider {
            id: "google",
            display_name: "Google Gemini",
            default_model: "gemini-1.5-flash",
            requires_api_key: true,
        },
        LlmProvider {
            id: "ollama",
            display_name: "Ollama (local)",
            default_model: "llama3",
            requires_api_key: false,
        },
    ];
}

// Needs no key, so fresh settings pass validation.
const DEFAULT_PROVIDER: &str = "ollama";

pub fn find_provider(id: &str) -> Option<&'static LlmProvider> {
    LLM_PROVIDERS.iter().find(|p| p.id == id)
}

/// Provider selection plus per-provider API keys.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: String,
    pub model: String,
    pub api_keys: BTreeMap<String, String>,
    pub temperature: f64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        let provider = find_provider(DEFAULT_PROVIDER).unwrap_or(&LLM_PROVIDERS[0]);
        Self {
            provider: provider.id.to_string(),
            model: provider.default_model.to_string(),
            api_keys: BTreeMap::new(),
            temperature: 0.7,
        }
    }
}

impl LlmSettings {
    /// Switch provider, resetting the model to that provider's default.
    pub fn select_provider(&mut self, provider_id: &str) -> Result<()> {
        let provider = find_provider(provider_id).ok_or_else(|| {
            ConsoleError::Validation(format!("Unknown LLM provider '{}'", provider_id))
        })?;
        self.provider = provider.id.to_string();
        self.model = provider.default_model.to_string();
        Ok(())
    }

    pub fn set_api_key(&mut self, provider_id: &str, key: &str) {
        let key = key.trim();
        if key.is_empty() {
            self.api_keys.remove(provider_id);
        } else {
            self.api_keys.insert(provider_id.to_string(), key.to_string());
        }
    }

    /// Copy with a form edit applied. Keys of other providers are kept; an
    /// empty `api_key` removes the key of the selected provider.
    pub fn edited(
        &self,
        provider_id: &str,
        model: &str,
        temperature: f64,
        api_key: Option<&str>,
    ) -> Result<Self> {
        let mut next = self.clone();
        if next.provider != provider_id {
            next.select_provider(provider_id)?;
        }
        if !model.trim().is_empty() {
            next.model = model.trim().to_string();
        }
        next.temperature = temperature;
        if let Some(key) = api_key {
            let id = next.provider.clone();
            next.set_api_key(&id, key);
        }
        Ok(next)
    }

    pub fn validate(&self) -> Result<()> {
        let provider = find_provider(&self.provider).ok_or_else(|| {
            ConsoleError::Validation(format!("Unknown LLM provider '{}'", self.provider))
        })?;
        if self.model.trim().is_empty() {
            return Err(ConsoleError::Validation("Model must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConsoleError::Validation(
                "Temperature must be between 0 and 2".into(),
            ));
        }
        if provider.requires_api_key && !self.api_keys.contains_key(provider.id) {
            return Err(ConsoleError::Validation(format!(
                "{} requires an API key",
                provider.display_name
            )));
        }
        Ok(())
    }
}

/// Preferences of the template gallery and designers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    pub default_category: String,
    pub export_format: String,
    pub show_builtin_templates: bool,
    pub last_template_id: Option<String>,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            default_category: DEFAULT_TEMPLATE_CATEGORY.to_string(),
            export_format: FileFormat::Json.extension().to_string(),
            show_builtin_templates: true,
            last_template_id: None,
        }
    }
}

impl TemplateSettings {
    pub fn export_format(&self) -> FileFormat {
        FileFormat::from_file_name(&format!("x.{}", self.export_format)).unwrap_or(FileFormat::Json)
    }
}

/// Logged-in user as far as the client knows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
}
