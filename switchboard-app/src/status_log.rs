//! Mirrors warnings and errors into the status buffer.
use chrono::Local;
use std::fmt::Write as _;
use std::sync::Arc;
use switchboard_tui::{Buffer, Screen, Segment, styles};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio_util::sync::CancellationToken;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub level: Level,
    pub text: String,
}

pub struct StatusLogLayer {
    tx: UnboundedSender<StatusLine>,
}

pub fn layer() -> (StatusLogLayer, UnboundedReceiver<StatusLine>) {
    let (tx, rx) = unbounded_channel();
    (StatusLogLayer { tx }, rx)
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={value}", field.name());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={value:?}", field.name());
        }
    }
}

impl<S: Subscriber> Layer<S> for StatusLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > Level::WARN {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        // Receiver gone means the UI is shutting down.
        let _ = self.tx.send(StatusLine {
            level,
            text: format!("{}{}", visitor.message, visitor.fields),
        });
    }
}

/// Append mirrored log lines to `buffer` until cancelled.
pub async fn drain(
    screen: Arc<Screen>,
    buffer: Arc<Buffer>,
    mut rx: UnboundedReceiver<StatusLine>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = rx.recv() => {
                let Some(line) = line else { break };
                let style = if line.level == Level::ERROR {
                    styles::error()
                } else {
                    styles::system()
                };
                let stamp = Local::now().format("%H:%M:%S");
                screen.append(
                    &buffer,
                    vec![
                        Segment::new(format!("{stamp} "), styles::dim()),
                        Segment::new(format!("{} {}\n", line.level, line.text), style),
                    ],
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn only_warnings_and_errors_are_forwarded() {
        let (layer, mut rx) = layer();
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("quiet");
            tracing::warn!(command = "frob", "command.unknown");
            tracing::error!("boom");
        });

        let first = rx.try_recv().unwrap();
        assert_eq!(first.level, Level::WARN);
        assert_eq!(first.text, "command.unknown command=frob");
        assert_eq!(rx.try_recv().unwrap().text, "boom");
        assert!(rx.try_recv().is_err());
    }
}
