use crate::transcript::Segment;
use serde_json::{Map, Value};

/// Turns a template name plus parameters into styled text.
///
/// The core only names templates (`window_status` for window status lines);
/// their syntax belongs to the implementation.
pub trait Theme: Send + Sync {
    fn format(&self, template: &str, params: &Map<String, Value>) -> Vec<Segment>;
}

/// Fallback theme: the `text` parameter if present, else `key=value` pairs.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTheme;

impl Theme for PlainTheme {
    fn format(&self, template: &str, params: &Map<String, Value>) -> Vec<Segment> {
        if template == "window_status" {
            let field = |k: &str| params.get(k).map(value_text).unwrap_or_default();
            return vec![Segment::plain(format!(
                "[{}] {} {}",
                field("buffer_num"),
                field("buffer_name"),
                field("buffer_descr")
            ))];
        }
        if let Some(text) = params.get("text") {
            return vec![Segment::plain(value_text(text))];
        }
        let pairs: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{k}={}", value_text(v)))
            .collect();
        vec![Segment::plain(format!("{template}: {}", pairs.join(" ")))]
    }
}

/// Strings without quotes, everything else as JSON.
pub fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn window_status_uses_buffer_fields() {
        let params = json!({"buffer_num": 2, "buffer_name": "status", "buffer_descr": "log"});
        let out = PlainTheme.format("window_status", params.as_object().unwrap());
        assert_eq!(out[0].text, "[2] status log");
    }

    #[test]
    fn text_param_wins() {
        let params = json!({"text": "hello", "other": 1});
        let out = PlainTheme.format("anything", params.as_object().unwrap());
        assert_eq!(out[0].text, "hello");
    }
}
