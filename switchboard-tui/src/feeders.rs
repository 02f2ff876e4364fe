use crate::error::Result;
use crate::screen::Screen;
use crossterm::event::{self, Event, KeyEventKind};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Poll the terminal on a blocking thread until cancelled or a quit is
/// requested. Each round commits whatever was staged meanwhile, so updates
/// from other tasks show up within one poll timeout.
pub fn spawn_input_loop(screen: Arc<Screen>, cancel: CancellationToken) -> JoinHandle<Result<()>> {
    tokio::task::spawn_blocking(move || run_input_loop(&screen, &cancel))
}

pub fn run_input_loop(screen: &Screen, cancel: &CancellationToken) -> Result<()> {
    let timeout = screen.options().poll_timeout;
    screen.commit()?;
    while !cancel.is_cancelled() && !screen.quit_requested() {
        if !screen.is_active() {
            // Terminal belongs to a subprocess.
            std::thread::sleep(timeout);
            continue;
        }
        if event::poll(timeout)? {
            dispatch_event(screen, event::read()?);
        }
        if let Err(e) = screen.commit() {
            warn!(error = %e, "screen.commit.failed");
        }
    }
    debug!(cancelled = cancel.is_cancelled(), "input.loop.stopped");
    Ok(())
}

/// Feed one terminal event to the screen.
pub fn dispatch_event(screen: &Screen, ev: Event) {
    match ev {
        Event::Key(key) if key.kind != KeyEventKind::Release => screen.handle_key(key),
        Event::Resize(width, height) => screen.resize(width, height),
        _ => {}
    }
}
