use serde_json::{Map, Value};
use std::collections::BTreeMap;
use switchboard_tui::{PlainTheme, Segment, Theme, value_text};

/// `{key}` placeholders filled from the parameters; `{{` and `}}` are
/// literal braces. Unknown keys render empty.
pub struct TemplateTheme {
    templates: BTreeMap<String, String>,
}

impl TemplateTheme {
    pub fn new(templates: BTreeMap<String, String>) -> Self {
        Self { templates }
    }
}

impl Theme for TemplateTheme {
    fn format(&self, template: &str, params: &Map<String, Value>) -> Vec<Segment> {
        match self.templates.get(template) {
            Some(text) => vec![Segment::plain(render(text, params))],
            None => PlainTheme.format(template, params),
        }
    }
}

fn render(template: &str, params: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let key: String = chars.by_ref().take_while(|&k| k != '}').collect();
                if let Some(v) = params.get(key.trim()) {
                    out.push_str(&value_text(v));
                }
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn params(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn fills_placeholders() {
        let p = params(json!({"buffer_num": 3, "buffer_name": "status", "buffer_descr": ""}));
        assert_eq!(
            render("[{buffer_num}] {buffer_name} {missing}", &p),
            "[3] status "
        );
    }

    #[test]
    fn doubled_braces_are_literal() {
        assert_eq!(render("{{x}}", &Map::new()), "{x}");
    }

    #[test]
    fn unknown_template_falls_back() {
        let theme = TemplateTheme::new(BTreeMap::new());
        let out = theme.format("status_line", &params(json!({"text": "hi"})));
        assert_eq!(out[0].text, "hi");
    }
}
