use std::panic::{self, AssertUnwindSafe};

/// Errors raised by the multiplexing core.
#[derive(thiserror::Error, Debug)]
pub enum UiError {
    /// No active table exposes the command and no default handler took it.
    #[error("unknown command: {0}")]
    CommandNotFound(String),

    /// Malformed, missing or excess command arguments.
    #[error("{0}")]
    CommandArgument(String),

    /// Unsupported question kind, or a choice/select question without values.
    #[error("{0}")]
    InputConfiguration(String),

    #[error("command table not found: {0}")]
    TableNotFound(String),

    /// Abort requested for a question that registered no abort handler.
    #[error("question cannot be aborted")]
    NotAbortable,

    /// Typed answer does not satisfy the pending question.
    #[error("{0}")]
    InvalidAnswer(String),

    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl UiError {
    pub fn argument(msg: impl Into<String>) -> Self {
        Self::CommandArgument(msg.into())
    }
}

/// Convenient alias for results that use [`UiError`].
pub type Result<T> = std::result::Result<T, UiError>;

/// Run a handler at a dispatch boundary: errors and panics are logged, never
/// propagated. Returns `true` when the handler completed successfully.
pub(crate) fn run_guarded<F>(what: &str, f: F) -> bool
where
    F: FnOnce() -> Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => true,
        Ok(Err(UiError::Other(e))) => {
            tracing::error!(target: "switchboard", handler = what, error = ?e, "handler failed");
            false
        }
        Ok(Err(e)) => {
            tracing::error!(target: "switchboard", "{what}: {e}");
            false
        }
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            tracing::error!(target: "switchboard", handler = what, panic = %msg, "unexpected failure in handler");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guarded_reports_success_and_failure() {
        assert!(run_guarded("ok", || Ok(())));
        assert!(!run_guarded("arg", || Err(UiError::argument("Too many arguments"))));
        assert!(!run_guarded("other", || Err(anyhow::anyhow!("boom").into())));
    }

    #[test]
    fn guarded_swallows_panics() {
        assert!(!run_guarded("panic", || panic!("handler exploded")));
    }
}
