//! Modal, buffer-scoped questions.
//!
//! A [`QuestionBuilder`] is validated as a whole in [`QuestionBuilder::build`],
//! so a rejected question never touches the buffer it was meant for.
use crate::error::{Result, UiError};
use crate::screen::Screen;
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Correlation value handed back to the answer or abort handler.
pub type Token = Box<dyn Any + Send>;
pub type AnswerHandler = Box<dyn FnOnce(&Screen, Token, Answer) -> Result<()> + Send>;
pub type AbortHandler = Box<dyn FnOnce(&Screen, Token) -> Result<()> + Send>;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    TextSingle,
    TextPrivate,
    Boolean,
    Choice,
    ListSingle,
    ListMulti,
}

impl QuestionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextSingle => "text-single",
            Self::TextPrivate => "text-private",
            Self::Boolean => "boolean",
            Self::Choice => "choice",
            Self::ListSingle => "list-single",
            Self::ListMulti => "list-multi",
        }
    }
}

impl FromStr for QuestionKind {
    type Err = UiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text-single" => Ok(Self::TextSingle),
            "text-private" => Ok(Self::TextPrivate),
            "boolean" => Ok(Self::Boolean),
            "choice" => Ok(Self::Choice),
            "list-single" => Ok(Self::ListSingle),
            "list-multi" => Ok(Self::ListMulti),
            other => Err(UiError::InputConfiguration(format!(
                "Unknown input type: {other}"
            ))),
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed answer delivered to the answer handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Text(String),
    Bool(bool),
    Choice(String),
    Many(Vec<String>),
    /// Optional question left blank without a default.
    Empty,
}

impl Answer {
    /// Single textual value, if the answer has one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Choice(s) => Some(s),
            _ => None,
        }
    }
}

/// Input widget of a question, one case per kind, each with its own rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionInput {
    Text {
        default: Option<String>,
        private: bool,
    },
    Boolean {
        default: Option<bool>,
    },
    Choice {
        default: Option<String>,
        values: Vec<String>,
    },
    ListSingle {
        default: Option<String>,
        values: Vec<String>,
    },
    ListMulti {
        default: Vec<String>,
        values: Vec<String>,
    },
}

impl QuestionInput {
    pub fn new(kind: QuestionKind, default: Option<&str>, values: &[String]) -> Result<Self> {
        let needs_values = matches!(
            kind,
            QuestionKind::Choice | QuestionKind::ListSingle | QuestionKind::ListMulti
        );
        if needs_values && values.is_empty() {
            return Err(UiError::InputConfiguration(format!(
                "Values required for '{kind}' input."
            )));
        }
        let check_default = |d: &str| {
            if values.iter().any(|v| v == d) {
                Ok(d.to_string())
            } else {
                Err(UiError::InputConfiguration(format!(
                    "Default {d:?} is not one of the allowed values"
                )))
            }
        };

        Ok(match kind {
            QuestionKind::TextSingle | QuestionKind::TextPrivate => Self::Text {
                default: default.map(str::to_string),
                private: kind == QuestionKind::TextPrivate,
            },
            QuestionKind::Boolean => Self::Boolean {
                default: default
                    .map(|d| {
                        parse_bool(d).ok_or_else(|| {
                            UiError::InputConfiguration(format!("Invalid boolean default {d:?}"))
                        })
                    })
                    .transpose()?,
            },
            QuestionKind::Choice => Self::Choice {
                default: default.map(check_default).transpose()?,
                values: values.to_vec(),
            },
            QuestionKind::ListSingle => Self::ListSingle {
                default: default.map(check_default).transpose()?,
                values: values.to_vec(),
            },
            QuestionKind::ListMulti => Self::ListMulti {
                default: default
                    .map(|d| split_multi(d).iter().map(|v| check_default(v)).collect())
                    .transpose()?
                    .unwrap_or_default(),
                values: values.to_vec(),
            },
        })
    }

    pub fn kind(&self) -> QuestionKind {
        match self {
            Self::Text { private: false, .. } => QuestionKind::TextSingle,
            Self::Text { private: true, .. } => QuestionKind::TextPrivate,
            Self::Boolean { .. } => QuestionKind::Boolean,
            Self::Choice { .. } => QuestionKind::Choice,
            Self::ListSingle { .. } => QuestionKind::ListSingle,
            Self::ListMulti { .. } => QuestionKind::ListMulti,
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Self::Text { private: true, .. })
    }

    /// Text placed in the answer line when the question opens.
    pub fn initial_text(&self) -> String {
        match self {
            Self::Text { default, private: false } => default.clone().unwrap_or_default(),
            _ => String::new(),
        }
    }

    /// Short legend painted after the prompt.
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Text { .. } => None,
            Self::Boolean { default } => Some(match default {
                Some(true) => "[Y/n]".to_string(),
                Some(false) => "[y/N]".to_string(),
                None => "[y/n]".to_string(),
            }),
            Self::Choice { values, .. } => Some(format!("[{}]", values.join("/"))),
            Self::ListSingle { values, .. } | Self::ListMulti { values, .. } => Some(
                values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| format!("{}:{v}", i + 1))
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
        }
    }

    /// Allowed values, empty for free-form kinds.
    pub fn values(&self) -> &[String] {
        match self {
            Self::Choice { values, .. }
            | Self::ListSingle { values, .. }
            | Self::ListMulti { values, .. } => values,
            _ => &[],
        }
    }

    /// Validate a typed line against this widget.
    pub fn parse(&self, line: &str, required: bool) -> Result<Answer> {
        let raw = if self.is_private() { line } else { line.trim() };
        if raw.is_empty() {
            return self.empty_answer(required);
        }

        match self {
            Self::Text { .. } => Ok(Answer::Text(raw.to_string())),
            Self::Boolean { .. } => parse_bool(raw)
                .map(Answer::Bool)
                .ok_or_else(|| UiError::InvalidAnswer("Answer 'y' or 'n'".into())),
            Self::Choice { values, .. } => values
                .iter()
                .find(|v| v.as_str() == raw)
                .map(|v| Answer::Choice(v.clone()))
                .ok_or_else(|| UiError::InvalidAnswer(format!("{raw:?} is not a valid choice"))),
            Self::ListSingle { values, .. } => pick(values, raw).map(Answer::Choice),
            Self::ListMulti { values, .. } => split_multi(raw)
                .iter()
                .map(|item| pick(values, item))
                .collect::<Result<Vec<_>>>()
                .map(Answer::Many),
        }
    }

    fn empty_answer(&self, required: bool) -> Result<Answer> {
        let default = match self {
            Self::Text { default, .. } => default.clone().map(Answer::Text),
            Self::Boolean { default } => default.map(Answer::Bool),
            Self::Choice { default, .. } | Self::ListSingle { default, .. } => {
                default.clone().map(Answer::Choice)
            }
            Self::ListMulti { default, .. } if !default.is_empty() => {
                Some(Answer::Many(default.clone()))
            }
            Self::ListMulti { .. } => None,
        };
        match default {
            Some(answer) => Ok(answer),
            None if required => Err(UiError::InvalidAnswer("An answer is required".into())),
            None => Ok(Answer::Empty),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "y" | "yes" | "true" | "1" | "on" => Some(true),
        "n" | "no" | "false" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn split_multi(s: &str) -> Vec<String> {
    s.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Value by exact match or 1-based index.
fn pick(values: &[String], raw: &str) -> Result<String> {
    if let Some(v) = values.iter().find(|v| v.as_str() == raw) {
        return Ok(v.clone());
    }
    raw.parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| values.get(i))
        .cloned()
        .ok_or_else(|| UiError::InvalidAnswer(format!("{raw:?} is not on the list")))
}

/// Rendering snapshot of a pending question, detached from its handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub serial: u64,
    pub prompt: String,
    pub hint: Option<String>,
    pub initial: String,
    pub private: bool,
    pub abortable: bool,
}

impl QuestionView {
    /// Prompt followed by the input hint, as painted before the answer line.
    pub fn label(&self) -> String {
        match &self.hint {
            Some(hint) => format!("{} {hint}", self.prompt),
            None => self.prompt.clone(),
        }
    }
}

/// A pending question, stored on its buffer until answered or aborted.
pub struct Question {
    serial: u64,
    prompt: String,
    input: QuestionInput,
    required: bool,
    token: Token,
    on_answer: AnswerHandler,
    on_abort: Option<AbortHandler>,
}

impl fmt::Debug for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Question")
            .field("serial", &self.serial)
            .field("prompt", &self.prompt)
            .field("input", &self.input)
            .field("required", &self.required)
            .field("abortable", &self.on_abort.is_some())
            .finish_non_exhaustive()
    }
}

impl Question {
    pub fn builder<F>(prompt: impl Into<String>, kind: impl Into<String>, on_answer: F) -> QuestionBuilder
    where
        F: FnOnce(&Screen, Token, Answer) -> Result<()> + Send + 'static,
    {
        QuestionBuilder {
            prompt: prompt.into(),
            kind: kind.into(),
            default: None,
            values: Vec::new(),
            required: true,
            token: Box::new(()),
            on_answer: Box::new(on_answer),
            on_abort: None,
        }
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn input(&self) -> &QuestionInput {
        &self.input
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_abortable(&self) -> bool {
        self.on_abort.is_some()
    }

    pub fn view(&self) -> QuestionView {
        QuestionView {
            serial: self.serial,
            prompt: self.prompt.clone(),
            hint: self.input.hint(),
            initial: self.input.initial_text(),
            private: self.input.is_private(),
            abortable: self.is_abortable(),
        }
    }

    pub(crate) fn into_answer(self) -> (Token, AnswerHandler) {
        (self.token, self.on_answer)
    }

    pub(crate) fn into_abort(self) -> Option<(Token, AbortHandler)> {
        let token = self.token;
        self.on_abort.map(|h| (token, h))
    }
}

pub struct QuestionBuilder {
    prompt: String,
    kind: String,
    default: Option<String>,
    values: Vec<String>,
    required: bool,
    token: Token,
    on_answer: AnswerHandler,
    on_abort: Option<AbortHandler>,
}

impl QuestionBuilder {
    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn token<T: Any + Send>(mut self, token: T) -> Self {
        self.token = Box::new(token);
        self
    }

    pub fn on_abort<F>(mut self, on_abort: F) -> Self
    where
        F: FnOnce(&Screen, Token) -> Result<()> + Send + 'static,
    {
        self.on_abort = Some(Box::new(on_abort));
        self
    }

    pub fn build(self) -> Result<Question> {
        let kind: QuestionKind = self.kind.parse()?;
        let input = QuestionInput::new(kind, self.default.as_deref(), &self.values)?;
        Ok(Question {
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            prompt: self.prompt,
            input,
            required: self.required,
            token: self.token,
            on_answer: self.on_answer,
            on_abort: self.on_abort,
        })
    }
}
