//! dom_utils.rs: thin helper layer for the few DOM operations the console
//! performs itself (confirm dialogs, file downloads, the database banner).

use js_sys::Array;
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{Blob, BlobPropertyBag, Document, HtmlAnchorElement, Url};

const DB_BANNER_ID: &str = "db-error-banner";

fn document() -> Result<Document, JsValue> {
    web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("no document"))
}

/// `window.confirm(prompt)`; `false` when no window is available.
pub fn confirm(prompt: &str) -> bool {
    web_sys::window()
        .and_then(|w| w.confirm_with_message(prompt).ok())
        .unwrap_or(false)
}

/// Offer `contents` as a file download through a temporary object URL.
pub fn download_file(file_name: &str, mime_type: &str, contents: &str) -> Result<(), JsValue> {
    let document = document()?;

    let parts = Array::new();
    parts.push(&JsValue::from_str(contents));
    let options = BlobPropertyBag::new();
    options.set_type(mime_type);
    let blob = Blob::new_with_str_sequence_and_options(&parts, &options)?;
    let url = Url::create_object_url_with_blob(&blob)?;

    let anchor: HtmlAnchorElement = document.create_element("a")?.dyn_into()?;
    anchor.set_href(&url);
    anchor.set_download(file_name);
    anchor.click();

    Url::revoke_object_url(&url)?;
    Ok(())
}

/// Show the "Database Connection Error" banner with a Retry button that
/// reloads the page, or remove it when `detail` is `None`.
pub fn render_db_error_banner(detail: Option<&str>) -> Result<(), JsValue> {
    let document = document()?;
    let existing = document.get_element_by_id(DB_BANNER_ID);

    let detail = match detail {
        Some(detail) => detail,
        None => {
            if let Some(banner) = existing {
                banner.remove();
            }
            return Ok(());
        }
    };

    let banner = match existing {
        Some(banner) => {
            banner.set_inner_html("");
            banner
        }
        None => {
            let banner = document.create_element("div")?;
            banner.set_id(DB_BANNER_ID);
            banner.set_class_name("db-error-banner");
            document
                .body()
                .ok_or_else(|| JsValue::from_str("no body"))?
                .prepend_with_node_1(&banner)?;
            banner
        }
    };
    crate::toast::ensure_styles(&document)?;

    let title = document.create_element("strong")?;
    title.set_text_content(Some("Database Connection Error"));
    let text = document.create_element("span")?;
    text.set_text_content(Some(detail));
    let retry = document.create_element("button")?;
    retry.set_text_content(Some("Retry"));

    let on_retry = Closure::wrap(Box::new(move || {
        if let Some(window) = web_sys::window() {
            if let Err(e) = window.location().reload() {
                log::error!("Reload failed: {:?}", e);
            }
        }
    }) as Box<dyn FnMut()>);
    retry.add_event_listener_with_callback("click", on_retry.as_ref().unchecked_ref())?;
    on_retry.forget();

    banner.append_child(&title)?;
    banner.append_child(&text)?;
    banner.append_child(&retry)?;
    Ok(())
}
