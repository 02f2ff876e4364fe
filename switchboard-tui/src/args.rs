//! Destructive cursor over a raw command argument string.
//!
//! A token is either a maximal run of non-whitespace characters or, when the
//! remaining text starts with `"`, everything up to the next unescaped `"`.
//! Inside quotes only `\\`, `\"`, `\t` and `\n` are escapes; any other
//! backslash is kept as written.
use crate::error::{Result, UiError};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    rest: String,
}

impl CommandArgs {
    pub fn new(args: impl Into<String>) -> Self {
        Self { rest: args.into() }
    }

    /// Remaining, not yet consumed text.
    pub fn as_str(&self) -> &str {
        &self.rest
    }

    pub fn is_empty(&self) -> bool {
        self.rest.trim().is_empty()
    }

    /// Peek the next token without consuming it.
    pub fn get(&self) -> Result<Option<String>> {
        Ok(self.next_token()?.map(|(token, _)| token))
    }

    /// Consume and return the next token.
    pub fn shift(&mut self) -> Result<Option<String>> {
        let Some((token, end)) = self.next_token()? else {
            self.rest.clear();
            return Ok(None);
        };
        self.rest = self.rest[end..].trim_start().to_string();
        Ok(Some(token))
    }

    /// Consume the remaining text verbatim.
    pub fn all(&mut self) -> String {
        std::mem::take(&mut self.rest)
    }

    /// Fail if anything but whitespace is left.
    pub fn finish(&mut self) -> Result<()> {
        let trimmed = self.rest.trim();
        if trimmed.is_empty() {
            self.rest.clear();
            Ok(())
        } else {
            Err(UiError::argument("Too many arguments"))
        }
    }

    /// Append `s` as one token, quoting it when it would not survive `shift`.
    pub fn add_quoted(&mut self, s: &str) {
        self.separate();
        if needs_quoting(s) {
            self.rest.push('"');
            self.rest.push_str(&quote(s));
            self.rest.push('"');
        } else {
            self.rest.push_str(s);
        }
    }

    /// Append `s` as raw text.
    pub fn add_unquoted(&mut self, s: &str) {
        self.separate();
        self.rest.push_str(s);
    }

    fn separate(&mut self) {
        if !self.rest.is_empty() {
            self.rest.push(' ');
        }
    }

    /// Next token plus the byte offset in `rest` just past it.
    fn next_token(&self) -> Result<Option<(String, usize)>> {
        let start = self.rest.len() - self.rest.trim_start().len();
        let body = &self.rest[start..];
        if body.is_empty() {
            return Ok(None);
        }

        if !body.starts_with('"') {
            let len = body.find(char::is_whitespace).unwrap_or(body.len());
            return Ok(Some((body[..len].to_string(), start + len)));
        }

        let mut out = String::new();
        let mut chars = body.char_indices().skip(1);
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => return Ok(Some((out, start + i + 1))),
                '\\' => match chars.next() {
                    Some((_, '\\')) => out.push('\\'),
                    Some((_, '"')) => out.push('"'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, other)) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => break,
                },
                _ => out.push(c),
            }
        }
        Err(UiError::argument("Command arguments syntax error"))
    }
}

impl fmt::Display for CommandArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rest)
    }
}

impl From<&str> for CommandArgs {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

fn needs_quoting(s: &str) -> bool {
    s.is_empty()
        || s
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\\' || c.is_control())
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}
