//! Command line and question overlay.
//!
//! The controller only edits text and decides what a key means; acting on
//! it (dispatching commands, delivering answers) happens on [`Screen`] so
//! handlers run with the screen lock held and no inner guard taken.
use crate::buffer::BufferId;
use crate::error::{Result, UiError, run_guarded};
use crate::question::{Question, QuestionView};
use crate::screen::Screen;
use crate::view::InputSnap;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineEditor {
    text: String,
    /// Byte offset, always on a char boundary.
    cursor: usize,
}

impl LineEditor {
    pub fn with_text(text: String) -> Self {
        let cursor = text.len();
        Self { text, cursor }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set(&mut self, text: String, cursor: usize) {
        let mut cursor = cursor.min(text.len());
        while !text.is_char_boundary(cursor) {
            cursor -= 1;
        }
        self.text = text;
        self.cursor = cursor;
    }

    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    fn cursor_left(&mut self) {
        if let Some(c) = self.text[..self.cursor].chars().next_back() {
            self.cursor -= c.len_utf8();
        }
    }

    fn cursor_right(&mut self) {
        if let Some(c) = self.text[self.cursor..].chars().next() {
            self.cursor += c.len_utf8();
        }
    }

    fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    fn cursor_end(&mut self) {
        self.cursor = self.text.len();
    }

    fn insert_char(&mut self, ch: char) {
        self.text.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn backspace(&mut self) {
        let end = self.cursor;
        self.cursor_left();
        self.text.drain(self.cursor..end);
    }

    fn delete(&mut self) {
        if let Some(c) = self.text[self.cursor..].chars().next() {
            let start = self.cursor;
            self.text.drain(start..start + c.len_utf8());
        }
    }

    fn kill_to_start(&mut self) {
        self.text.drain(..self.cursor);
        self.cursor = 0;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    CommandLine,
    Question { buffer: BufferId, view: QuestionView },
}

/// What a key asks the screen to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    Confirm(String),
    Complete,
    Abort,
    Quit,
    Redraw,
    NextWindow,
    ShowBuffer(usize),
    /// Pages to scroll back; negative scrolls forward.
    Scroll(isize),
    Edited,
    None,
}

#[derive(Debug)]
pub struct InputController {
    command_line: LineEditor,
    answer_line: LineEditor,
    mode: Mode,
    /// Line and cursor of the last completion that found several candidates.
    last_completion: Option<(String, usize)>,
}

impl Default for InputController {
    fn default() -> Self {
        Self::new()
    }
}

impl InputController {
    pub fn new() -> Self {
        Self {
            command_line: LineEditor::default(),
            answer_line: LineEditor::default(),
            mode: Mode::CommandLine,
            last_completion: None,
        }
    }

    pub fn in_question(&self) -> bool {
        matches!(self.mode, Mode::Question { .. })
    }

    /// Switch mode for the focused buffer's pending question, if any.
    /// The answer line survives a refresh of the same question.
    pub fn current_buffer_changed(&mut self, question: Option<(BufferId, QuestionView)>) {
        match question {
            Some((buffer, view)) => {
                let same = matches!(&self.mode, Mode::Question { view: v, .. } if v.serial == view.serial);
                if !same {
                    debug!(serial = view.serial, "input.question_mode");
                    self.answer_line = LineEditor::with_text(view.initial.clone());
                }
                self.mode = Mode::Question { buffer, view };
            }
            None => {
                if self.in_question() {
                    debug!("input.command_mode");
                }
                self.mode = Mode::CommandLine;
                self.answer_line = LineEditor::default();
            }
        }
    }

    /// Buffer and serial of the question being answered.
    pub fn question_target(&self) -> Option<(BufferId, u64)> {
        match &self.mode {
            Mode::Question { buffer, view } => Some((*buffer, view.serial)),
            Mode::CommandLine => None,
        }
    }

    fn editor(&mut self) -> &mut LineEditor {
        match self.mode {
            Mode::CommandLine => &mut self.command_line,
            Mode::Question { .. } => &mut self.answer_line,
        }
    }

    pub fn command_line(&self) -> &LineEditor {
        &self.command_line
    }

    pub fn set_command_line(&mut self, text: String, cursor: usize) {
        self.command_line.set(text, cursor);
    }

    pub(crate) fn restore_answer(&mut self, text: String) {
        self.answer_line = LineEditor::with_text(text);
    }

    /// True when the same multi-candidate completion is asked for twice in a row.
    pub(crate) fn completion_repeated(&mut self) -> bool {
        let key = (self.command_line.text.clone(), self.command_line.cursor);
        if self.last_completion.as_ref() == Some(&key) {
            self.last_completion = None;
            true
        } else {
            self.last_completion = Some(key);
            false
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> KeyAction {
        if key.code != KeyCode::Tab {
            self.last_completion = None;
        }
        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL)
            | (KeyCode::Char('q'), KeyModifiers::CONTROL) => KeyAction::Quit,
            (KeyCode::Char('l'), KeyModifiers::CONTROL) => KeyAction::Redraw,
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => {
                self.editor().kill_to_start();
                KeyAction::Edited
            }
            (KeyCode::Char('a'), KeyModifiers::CONTROL) => {
                self.editor().cursor_home();
                KeyAction::Edited
            }
            (KeyCode::Char('e'), KeyModifiers::CONTROL) => {
                self.editor().cursor_end();
                KeyAction::Edited
            }
            (KeyCode::Char(d), KeyModifiers::ALT) if d.is_ascii_digit() => {
                KeyAction::ShowBuffer(d.to_digit(10).map_or(0, |n| n as usize))
            }
            (KeyCode::Tab, KeyModifiers::ALT) => KeyAction::NextWindow,
            (KeyCode::Tab, _) => KeyAction::Complete,
            (KeyCode::PageUp, _) => KeyAction::Scroll(1),
            (KeyCode::PageDown, _) => KeyAction::Scroll(-1),
            (KeyCode::Enter, _) => KeyAction::Confirm(self.editor().take()),
            (KeyCode::Esc, _) => {
                if self.in_question() {
                    KeyAction::Abort
                } else {
                    self.command_line.take();
                    KeyAction::Edited
                }
            }
            (KeyCode::Left, _) => {
                self.editor().cursor_left();
                KeyAction::Edited
            }
            (KeyCode::Right, _) => {
                self.editor().cursor_right();
                KeyAction::Edited
            }
            (KeyCode::Home, _) => {
                self.editor().cursor_home();
                KeyAction::Edited
            }
            (KeyCode::End, _) => {
                self.editor().cursor_end();
                KeyAction::Edited
            }
            (KeyCode::Backspace, _) => {
                self.editor().backspace();
                KeyAction::Edited
            }
            (KeyCode::Delete, _) => {
                self.editor().delete();
                KeyAction::Edited
            }
            (KeyCode::Char(ch), m) if !m.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
                self.editor().insert_char(ch);
                KeyAction::Edited
            }
            _ => KeyAction::None,
        }
    }

    pub fn snap(&self, width: usize) -> InputSnap {
        match &self.mode {
            Mode::CommandLine => InputSnap {
                prompt: None,
                text: self.command_line.text.clone(),
                cursor: self.command_line.cursor,
                private: false,
            },
            Mode::Question { view, .. } => InputSnap {
                prompt: Some(format!("{} ", elide_middle(&view.label(), width))),
                text: self.answer_line.text.clone(),
                cursor: self.answer_line.cursor,
                private: view.private,
            },
        }
    }
}

/// Shorten a prompt wider than half the row by cutting out its middle.
pub fn elide_middle(prompt: &str, width: usize) -> String {
    let chars: Vec<char> = prompt.chars().collect();
    if chars.len() <= width / 2 {
        return prompt.to_string();
    }
    let head = (width / 4).saturating_sub(3).min(chars.len());
    let tail = (width / 4).saturating_sub(4).min(chars.len() - head);
    let mut out: String = chars[..head].iter().collect();
    out.push_str("(...)");
    out.extend(&chars[chars.len() - tail..]);
    out
}

/// Strip one backslash protecting a leading marker or backslash.
fn unescape_leading(line: &str, marker: char) -> &str {
    let mut chars = line.chars();
    match (chars.next(), chars.next()) {
        (Some('\\'), Some(c)) if c == marker || c == '\\' => &line[1..],
        _ => line,
    }
}

impl Screen {
    pub fn handle_key(&self, key: KeyEvent) {
        let _g = self.lock();
        let action = self.input.lock().handle_key(key);
        match action {
            KeyAction::Confirm(line) => self.confirm(line),
            KeyAction::Complete => self.complete(),
            KeyAction::Abort => {
                if let Err(e) = self.abort_question() {
                    debug!(error = %e, "question.abort.rejected");
                }
            }
            KeyAction::Quit => self.request_quit(),
            KeyAction::Redraw => self.stage_clear(),
            KeyAction::NextWindow => self.focus_next(),
            KeyAction::ShowBuffer(n) => self.show_buffer_number(n),
            KeyAction::Scroll(pages) => self.scroll_pages(pages),
            KeyAction::Edited => self.stage_input(),
            KeyAction::None => {}
        }
    }

    fn confirm(&self, line: String) {
        let target = self.input.lock().question_target();
        self.stage_input();
        match target {
            Some((buffer, serial)) => self.answer(buffer, serial, line),
            None => self.user_input(&line),
        }
    }

    /// Route a confirmed command-line entry: marker lines go to the command
    /// registry, everything else to the focused buffer.
    pub fn user_input(&self, line: &str) {
        let _g = self.lock();
        if line.is_empty() {
            return;
        }
        let marker = self.options().command_marker;
        if let Some(command) = line.strip_prefix(marker) {
            self.commands().run_command(self, command);
            return;
        }
        let text = unescape_leading(line, marker);
        let Some(buffer) = self.current_buffer() else {
            self.beep();
            return;
        };
        match buffer.input_hook() {
            Some(hook) => {
                run_guarded("buffer input", || hook(self, &buffer, text));
            }
            None => {
                debug!(buffer = %buffer.name(), "input.unhandled");
                self.beep();
            }
        }
    }

    fn answer(&self, buffer_id: BufferId, serial: u64, line: String) {
        let Some(buffer) = self.buffers().find(buffer_id) else {
            self.refresh_input();
            return;
        };
        let answer = match buffer.parse_answer(serial, &line) {
            None => {
                self.refresh_input();
                return;
            }
            Some(Err(e)) => {
                debug!(error = %e, "question.answer.invalid");
                self.beep();
                self.input.lock().restore_answer(line);
                return;
            }
            Some(Ok(answer)) => answer,
        };
        let Some(question) = buffer.take_question_if(serial) else {
            return;
        };
        // The question is gone before its handler runs, so it may ask again.
        self.refresh_input();
        let (token, handler) = question.into_answer();
        run_guarded("question answer", || handler(self, token, answer));
    }

    /// Abort the question currently on the input line.
    pub fn abort_question(&self) -> Result<()> {
        let _g = self.lock();
        let Some((buffer_id, serial)) = self.input.lock().question_target() else {
            return Ok(());
        };
        let Some(buffer) = self.buffers().find(buffer_id) else {
            self.refresh_input();
            return Ok(());
        };
        if !buffer
            .question()
            .is_some_and(|q| q.serial == serial && q.abortable)
        {
            self.beep();
            return Err(UiError::NotAbortable);
        }
        let Some(question) = buffer.take_question_if(serial) else {
            return Ok(());
        };
        self.refresh_input();
        if let Some((token, handler)) = question.into_abort() {
            run_guarded("question abort", || handler(self, token));
        }
        Ok(())
    }

    pub fn set_command_line(&self, text: String, cursor: usize) {
        let _g = self.lock();
        self.input.lock().set_command_line(text, cursor);
        self.stage_input();
    }

    /// Complete the word under the cursor: command names after the marker,
    /// otherwise the focused buffer's completion words.
    pub fn complete(&self) {
        let _g = self.lock();
        let (line, cursor) = {
            let input = self.input.lock();
            if input.in_question() {
                return;
            }
            let editor = input.command_line();
            (editor.text().to_string(), editor.cursor())
        };
        let marker = self.options().command_marker;
        let before = &line[..cursor];

        let (start, mut candidates) = if before.starts_with(marker)
            && !before.contains(char::is_whitespace)
        {
            let start = marker.len_utf8();
            let prefix = &line[start..cursor];
            let names = self.commands().active_command_names();
            (start, filter_prefix(names, prefix))
        } else {
            let start = before
                .char_indices()
                .rev()
                .find(|(_, c)| c.is_whitespace())
                .map_or(0, |(i, c)| i + c.len_utf8());
            let prefix = &line[start..cursor];
            let words = self
                .current_buffer()
                .map(|b| b.completion_words())
                .unwrap_or_default();
            (start, filter_prefix(words, prefix))
        };
        candidates.sort();
        candidates.dedup();

        match candidates.len() {
            0 => self.beep(),
            1 => self.insert_completion(&line, start, cursor, &candidates[0]),
            _ if !self.input.lock().completion_repeated() => self.beep(),
            _ => self.ask_completion(line, start, cursor, candidates),
        }
    }

    /// Replace the word being completed; the cursor lands right after it.
    fn insert_completion(&self, line: &str, start: usize, cursor: usize, word: &str) {
        let text = format!("{}{word}{}", &line[..start], &line[cursor..]);
        self.set_command_line(text, start + word.len());
    }

    fn ask_completion(&self, line: String, start: usize, cursor: usize, candidates: Vec<String>) {
        let Some(buffer) = self.current_buffer() else {
            self.beep();
            return;
        };
        let first = candidates[0].clone();
        let question = Question::builder("Complete with", "list-single", move |screen, _, answer| {
            if let Some(word) = answer.as_text() {
                screen.insert_completion(&line, start, cursor, word);
            }
            Ok(())
        })
        .values(candidates)
        .default_value(first)
        .on_abort(|_, _| Ok(()));
        if let Err(e) = self.ask_question(&buffer, question) {
            warn!(error = %e, "completion.question_failed");
        }
    }

    pub fn input_snap(&self) -> InputSnap {
        let width = self.size().0 as usize;
        self.input.lock().snap(width)
    }
}

fn filter_prefix(words: Vec<String>, prefix: &str) -> Vec<String> {
    words.into_iter().filter(|w| w.starts_with(prefix)).collect()
}
