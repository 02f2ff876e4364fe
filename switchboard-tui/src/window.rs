use crate::buffer::BufferId;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_WINDOW: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u64);

impl WindowId {
    pub(crate) fn next() -> Self {
        Self(NEXT_WINDOW.fetch_add(1, Ordering::Relaxed))
    }
}

/// Screen region showing at most one buffer, plus its status line.
///
/// A locked window keeps its buffer: [`crate::Screen::display_buffer`] and
/// buffer rotation skip it.
#[derive(Debug, Clone)]
pub struct Window {
    pub(crate) id: WindowId,
    pub(crate) buffer: Option<BufferId>,
    pub(crate) locked: bool,
    pub(crate) height: u16,
}

impl Window {
    pub(crate) fn new() -> Self {
        Self {
            id: WindowId::next(),
            buffer: None,
            locked: false,
            height: 0,
        }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn buffer(&self) -> Option<BufferId> {
        self.buffer
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Rows of content, excluding the status line, from the last layout.
    pub fn height(&self) -> u16 {
        self.height
    }
}
