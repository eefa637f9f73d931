//! Utility helpers shared across the console.

use unicode_segmentation::UnicodeSegmentation;

/// Return the current timestamp in **milliseconds** since UNIX epoch.
///
/// Goes through chrono so the same code runs in the browser (via the
/// `wasmbind` feature) and in native unit tests.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Fresh client-side identifier, e.g. `agent-3f2c…`.
pub fn client_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Shorten `text` to at most `max` grapheme clusters, appending an ellipsis
/// when something was cut. Never splits an emoji or combined character.
pub fn preview(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    let mut graphemes = trimmed.graphemes(true);
    let head: String = graphemes.by_ref().take(max).collect();
    if graphemes.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

/// Format a duration given in **milliseconds** into a short human-readable
/// string such as `"1 m 23 s"` or `"12 s"`.
pub fn format_duration_ms(ms: u64) -> String {
    let secs_total = ms / 1000;
    let minutes = secs_total / 60;
    let seconds = secs_total % 60;

    if minutes > 0 {
        format!("{} m {:02} s", minutes, seconds)
    } else {
        format!("{} s", seconds)
    }
}
