use ratatui::style::Style;

/// Run of text sharing one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub style: Style,
}

impl Segment {
    pub fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Style::default())
    }
}

/// One logical line of buffer content. Wrapping happens at paint time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextLine(pub Vec<Segment>);

impl TextLine {
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|s| s.text.is_empty())
    }

    pub fn text(&self) -> String {
        self.0.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }
}

/// Split styled segments on `'\n'` into lines. The first line continues
/// `open`, the line currently being written; a trailing newline closes the
/// last line without starting an empty one.
pub(crate) fn split_lines(open: &mut Option<TextLine>, segments: Vec<Segment>) -> Vec<TextLine> {
    let mut done = Vec::new();
    for seg in segments {
        let mut parts = seg.text.split('\n').peekable();
        while let Some(part) = parts.next() {
            let line = open.get_or_insert_with(TextLine::default);
            if !part.is_empty() {
                line.0.push(Segment::new(part, seg.style));
            }
            if parts.peek().is_some() {
                done.extend(open.take());
            }
        }
    }
    done
}
