//! REST client for the console backend.
//!
//! Every call is a single `fetch` attempt: no retry, no timeout. Non-2xx
//! responses are translated by [`error_for_status`]; a 401 also drops the
//! stored session so the next screen asks for a login.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use super::config::api_config;
use crate::error::{js_message, ApiError};
use crate::models::{
    ApiTemplateRecord, ApiUser, ChatRequest, ChatResponse, ExecutionRecord, IntentRequest,
    IntentResponse, LoginRequest, RegisterRequest, TemplateType, TokenResponse,
    WorkflowTriggerRequest,
};
use crate::storage;

pub type ApiResult<T> = Result<T, ApiError>;

/// The two template collections share one CRUD surface.
pub fn collection_path(template_type: TemplateType) -> &'static str {
    match template_type {
        TemplateType::Workflow => "/workflows",
        TemplateType::Agent => "/agents/templates",
    }
}

pub fn item_path(template_type: TemplateType, id: &str) -> String {
    format!("{}/{}", collection_path(template_type), id)
}

/// Map a failed HTTP status to the console's error taxonomy.
pub fn error_for_status(status: u16, message: &str) -> ApiError {
    match status {
        401 | 403 => ApiError::Authentication { status },
        404 => ApiError::NotFound(message.to_string()),
        _ => ApiError::Http {
            status,
            message: message.to_string(),
        },
    }
}

/// Decode a list response. The backend answers list endpoints either with a
/// bare array or with an object wrapping it (`items`, `templates`,
/// `workflows`, `executions`).
pub fn decode_list<T: DeserializeOwned>(body: &str) -> ApiResult<Vec<T>> {
    let value: Value = serde_json::from_str(body).map_err(|e| ApiError::Parse(e.to_string()))?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => ["items", "templates", "workflows", "executions", "data"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| ApiError::Parse("expected a list response".to_string()))?,
        other => {
            return Err(ApiError::Parse(format!("expected a list response, got {}", other)))
        }
    };
    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(|e| ApiError::Parse(e.to_string())))
        .collect()
}

fn decode<T: DeserializeOwned>(body: &str) -> ApiResult<T> {
    serde_json::from_str(body).map_err(|e| ApiError::Parse(e.to_string()))
}

fn encode<T: Serialize>(body: &T) -> ApiResult<String> {
    serde_json::to_string(body).map_err(|e| ApiError::Parse(e.to_string()))
}

// REST API Client for templates, chat, users and executions
pub struct ApiClient;

impl ApiClient {
    fn url(path: &str) -> String {
        api_config().url(path)
    }

    // ---------------- Templates (workflows + agent templates) ----------------

    pub async fn list_templates(template_type: TemplateType) -> ApiResult<Vec<ApiTemplateRecord>> {
        let body = Self::fetch_json(&Self::url(collection_path(template_type)), "GET", None).await?;
        decode_list(&body)
    }

    pub async fn get_template(template_type: TemplateType, id: &str) -> ApiResult<ApiTemplateRecord> {
        let body = Self::fetch_json(&Self::url(&item_path(template_type, id)), "GET", None).await?;
        decode(&body)
    }

    pub async fn create_template(record: &ApiTemplateRecord) -> ApiResult<ApiTemplateRecord> {
        let template_type = record_type(record);
        let payload = encode(record)?;
        let body = Self::fetch_json(
            &Self::url(collection_path(template_type)),
            "POST",
            Some(&payload),
        )
        .await?;
        decode(&body)
    }

    pub async fn update_template(id: &str, record: &ApiTemplateRecord) -> ApiResult<ApiTemplateRecord> {
        let template_type = record_type(record);
        let payload = encode(record)?;
        let body = Self::fetch_json(
            &Self::url(&item_path(template_type, id)),
            "PUT",
            Some(&payload),
        )
        .await?;
        decode(&body)
    }

    pub async fn delete_template(template_type: TemplateType, id: &str) -> ApiResult<()> {
        Self::fetch_json(&Self::url(&item_path(template_type, id)), "DELETE", None).await?;
        Ok(())
    }

    pub async fn clone_template(template_type: TemplateType, id: &str) -> ApiResult<ApiTemplateRecord> {
        let url = Self::url(&format!("{}/clone", item_path(template_type, id)));
        let body = Self::fetch_json(&url, "POST", None).await?;
        decode(&body)
    }

    // ---------------- Chat / intent / trigger ----------------

    pub async fn send_chat(request: &ChatRequest, enhanced: bool) -> ApiResult<ChatResponse> {
        let path = if enhanced { "/chat/enhanced" } else { "/chat" };
        let payload = encode(request)?;
        let body = Self::fetch_json(&Self::url(path), "POST", Some(&payload)).await?;
        decode(&body)
    }

    pub async fn detect_intent(message: &str) -> ApiResult<IntentResponse> {
        let payload = encode(&IntentRequest {
            message: message.to_string(),
        })?;
        let body = Self::fetch_json(&Self::url("/intent/detect"), "POST", Some(&payload)).await?;
        decode(&body)
    }

    pub async fn trigger_workflow(request: &WorkflowTriggerRequest) -> ApiResult<ExecutionRecord> {
        let payload = encode(request)?;
        let body = Self::fetch_json(&Self::url("/workflow/trigger"), "POST", Some(&payload)).await?;
        decode(&body)
    }

    // ---------------- Users ----------------

    pub async fn login(request: &LoginRequest) -> ApiResult<TokenResponse> {
        let payload = encode(request)?;
        let body = Self::fetch_json(&Self::url("/users/login"), "POST", Some(&payload)).await?;
        decode(&body)
    }

    pub async fn register(request: &RegisterRequest) -> ApiResult<ApiUser> {
        let payload = encode(request)?;
        let body = Self::fetch_json(&Self::url("/users/register"), "POST", Some(&payload)).await?;
        decode(&body)
    }

    /// Requires a stored session token, otherwise the backend answers 401.
    pub async fn fetch_current_user() -> ApiResult<ApiUser> {
        let body = Self::fetch_json(&Self::url("/users/me"), "GET", None).await?;
        decode(&body)
    }

    // ---------------- Executions ----------------

    pub async fn list_executions() -> ApiResult<Vec<ExecutionRecord>> {
        let body = Self::fetch_json(&Self::url("/executions"), "GET", None).await?;
        decode_list(&body)
    }

    pub async fn get_execution(id: &str) -> ApiResult<ExecutionRecord> {
        let body = Self::fetch_json(&Self::url(&format!("/executions/{}", id)), "GET", None).await?;
        decode(&body)
    }

    pub async fn cancel_execution(id: &str) -> ApiResult<()> {
        let url = Self::url(&format!("/executions/{}/cancel", id));
        Self::fetch_json(&url, "POST", None).await?;
        Ok(())
    }

    // ---------------- Health ----------------

    /// `Ok` when the backend and its database answer.
    pub async fn health() -> ApiResult<Value> {
        let body = Self::fetch_json(&Self::url("/health"), "GET", None).await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        decode(&body)
    }

    /// Issue one request and return the response body as text.
    pub async fn fetch_json(url: &str, method: &str, body: Option<&str>) -> ApiResult<String> {
        use wasm_bindgen::JsValue;
        use web_sys::{Headers, Request, RequestInit, RequestMode, Response};

        let network = |e: JsValue| ApiError::Network(js_message(&e));

        let opts = RequestInit::new();
        opts.set_method(method);
        opts.set_mode(RequestMode::Cors);

        let headers = Headers::new().map_err(network)?;
        if let Some(token) = storage::current_token() {
            headers
                .append("Authorization", &format!("Bearer {}", token))
                .map_err(network)?;
        }
        if let Some(data) = body {
            opts.set_body(&JsValue::from_str(data));
            headers
                .append("Content-Type", "application/json")
                .map_err(network)?;
        }
        opts.set_headers(&headers);

        let request = Request::new_with_str_and_init(url, &opts).map_err(network)?;
        let window =
            web_sys::window().ok_or_else(|| ApiError::Network("no global window exists".into()))?;
        log::debug!("{} {}", method, url);
        let resp_value = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(network)?;
        let resp: Response = resp_value.dyn_into().map_err(network)?;

        if !resp.ok() {
            let status = resp.status();
            if status == 401 {
                storage::with_local_store(|store| {
                    if let Err(e) = storage::clear_session(store) {
                        log::warn!("Failed to clear session: {}", e);
                    }
                });
            }
            let text = match resp.text() {
                Ok(promise) => JsFuture::from(promise)
                    .await
                    .ok()
                    .and_then(|v| v.as_string())
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| resp.status_text()),
                Err(_) => resp.status_text(),
            };
            log::warn!("{} {} failed with {}", method, url, status);
            return Err(error_for_status(status, &text));
        }

        let text = JsFuture::from(resp.text().map_err(network)?)
            .await
            .map_err(network)?;
        Ok(text.as_string().unwrap_or_default())
    }
}

fn record_type(record: &ApiTemplateRecord) -> TemplateType {
    match record.template_type.as_deref() {
        Some("agent") => TemplateType::Agent,
        Some("workflow") => TemplateType::Workflow,
        _ if record.agents_data.is_some() => TemplateType::Agent,
        _ => TemplateType::Workflow,
    }
}
