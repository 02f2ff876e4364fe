use crate::buffer::Activity;
use crate::styles;
use crate::transcript::TextLine;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph},
};
use textwrap::wrap;
use unicode_width::UnicodeWidthStr;

/// Everything one frame needs, copied out of the screen so painting runs
/// without touching buffer state.
#[derive(Debug, Clone, Default)]
pub struct ViewSnap {
    pub title: Option<String>,
    pub background: Option<Color>,
    pub windows: Vec<WindowSnap>,
    pub activity: Vec<(usize, Activity)>,
    pub input: InputSnap,
}

#[derive(Debug, Clone, Default)]
pub struct WindowSnap {
    pub lines: Vec<TextLine>,
    pub scroll: usize,
    pub status: TextLine,
    pub focused: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InputSnap {
    /// Already elided to fit.
    pub prompt: Option<String>,
    pub text: String,
    /// Byte offset into `text`.
    pub cursor: usize,
    pub private: bool,
}

pub fn draw(frame: &mut Frame, snap: &ViewSnap) {
    let area = frame.area();
    if let Some(bg) = snap.background {
        frame.render_widget(Block::default().style(Style::default().bg(bg)), area);
    }

    let mut constraints = Vec::with_capacity(snap.windows.len() + 2);
    if snap.title.is_some() {
        constraints.push(Constraint::Length(1));
    }
    constraints.extend(snap.windows.iter().map(|_| Constraint::Fill(1)));
    constraints.push(Constraint::Length(1));
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let mut next = 0;
    if let Some(title) = &snap.title {
        let header = Paragraph::new(Line::from(Span::styled(format!(" {title} "), styles::title())));
        frame.render_widget(header, rows[next]);
        next += 1;
    }

    for win in &snap.windows {
        draw_window(frame, rows[next], win, &snap.activity);
        next += 1;
    }

    draw_input(frame, rows[next], &snap.input);
}

fn draw_window(frame: &mut Frame, area: Rect, win: &WindowSnap, activity: &[(usize, Activity)]) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    let visible_h = parts[0].height as usize;
    let wrapped: Vec<Line<'static>> = win
        .lines
        .iter()
        .flat_map(|l| wrap_line(l, parts[0].width as usize))
        .collect();
    let total = wrapped.len();
    let start = total.saturating_sub(visible_h + win.scroll);
    let end = total.saturating_sub(win.scroll);
    frame.render_widget(Paragraph::new(wrapped[start..end].to_vec()), parts[0]);

    let bar = if win.focused {
        styles::bar_focused()
    } else {
        styles::bar()
    };
    let mut spans: Vec<Span> = win
        .status
        .segments()
        .iter()
        .map(|s| Span::styled(s.text.clone(), bar.patch(s.style)))
        .collect();
    if win.focused && !activity.is_empty() {
        spans.push(Span::styled(" [Act: ", bar));
        for (i, (num, level)) in activity.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(",", bar));
            }
            spans.push(Span::styled(num.to_string(), styles::activity(*level)));
        }
        spans.push(Span::styled("]", bar));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)).style(bar), parts[1]);
}

fn draw_input(frame: &mut Frame, area: Rect, input: &InputSnap) {
    let prompt = input.prompt.as_deref().unwrap_or("");
    let shown: String = if input.private {
        "*".repeat(input.text.chars().count())
    } else {
        input.text.clone()
    };
    let shown_cursor = if input.private {
        input.text[..input.cursor].chars().count()
    } else {
        input.cursor
    };

    // Keep the caret inside the row by dropping leading characters.
    let room = (area.width as usize).saturating_sub(prompt.width() + 1).max(1);
    let mut skip = 0;
    while shown[skip..shown_cursor].width() > room {
        skip += shown[skip..].chars().next().map_or(1, char::len_utf8);
    }

    let line = Line::from(vec![
        Span::styled(prompt.to_string(), styles::prompt()),
        Span::raw(shown[skip..].to_string()),
    ]);
    frame.render_widget(Clear, area);
    frame.render_widget(Paragraph::new(line), area);

    let caret = prompt.width() + shown[skip..shown_cursor].width();
    frame.set_cursor_position(Position {
        x: area.x + (caret as u16).min(area.width.saturating_sub(1)),
        y: area.y,
    });
}

/// Word-wrap a styled line. Rows come from `textwrap` on the plain text;
/// each kept character is matched back to the segment it came from, since
/// wrapping only drops whitespace at the breaks.
fn wrap_line(line: &TextLine, width: usize) -> Vec<Line<'static>> {
    let segs = line.segments();
    let chars: Vec<(char, usize)> = segs
        .iter()
        .enumerate()
        .flat_map(|(i, seg)| {
            seg.text
                .chars()
                .map(move |c| (if c == '\t' { ' ' } else { c }, i))
        })
        .collect();
    let plain: String = chars.iter().map(|&(c, _)| c).collect();
    let style_of = |i: usize| segs.get(i).map_or(Style::default(), |s| s.style);

    let mut pos = 0;
    let mut rows = Vec::new();
    for row in wrap(&plain, width.max(1)) {
        let mut spans = Vec::new();
        let mut run: Option<(usize, String)> = None;
        for ch in row.chars() {
            while chars.get(pos).is_some_and(|&(c, _)| c != ch) {
                pos += 1;
            }
            let seg = chars.get(pos).map_or(0, |&(_, i)| i);
            pos += 1;
            match &mut run {
                Some((i, text)) if *i == seg => text.push(ch),
                _ => {
                    if let Some((i, text)) = run.replace((seg, ch.to_string())) {
                        spans.push(Span::styled(text, style_of(i)));
                    }
                }
            }
        }
        if let Some((i, text)) = run {
            spans.push(Span::styled(text, style_of(i)));
        }
        rows.push(Line::from(spans));
    }
    if rows.is_empty() {
        rows.push(Line::default());
    }
    rows
}
