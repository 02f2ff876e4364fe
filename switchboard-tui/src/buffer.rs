//! Numbered content streams and the registry that owns their slots.
//!
//! A buffer's number is its registry position plus one. Closing a buffer
//! leaves a hole that [`BufferRegistry::register`] reuses and
//! [`BufferRegistry::reorder`] compacts away.
//!
//! Lock order: registry slots, then a buffer's state, then the command
//! registry. Observers run after every guard is released.
use crate::cmdtable::{CommandRegistry, Receiver};
use crate::error::{Result, UiError};
use crate::question::{Answer, Question, QuestionView};
use crate::screen::Screen;
use crate::transcript::{Segment, TextLine, split_lines};
use crate::window::WindowId;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static NEXT_BUFFER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

/// Attention level of a buffer that is not on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Activity {
    #[default]
    Quiet = 0,
    Unread = 1,
    NeedsInput = 2,
}

/// Consumes plain (non-command) lines typed while the buffer is focused.
pub type InputHook = Arc<dyn Fn(&Screen, &Arc<Buffer>, &str) -> Result<()> + Send + Sync>;

struct BufferState {
    info: Map<String, Value>,
    table: Option<String>,
    /// `None` binds the buffer itself as the table receiver.
    receiver: Option<Receiver>,
    table_active: bool,
    window: Option<WindowId>,
    activity: Activity,
    question: Option<Question>,
    lines: VecDeque<TextLine>,
    open_line: Option<TextLine>,
    scrollback: usize,
    scroll: usize,
    dirty: bool,
    completion_words: Vec<String>,
    on_input: Option<InputHook>,
}

pub struct Buffer {
    id: BufferId,
    state: Mutex<BufferState>,
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.state.lock();
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("name", &st.info.get("buffer_name"))
            .field("window", &st.window)
            .field("activity", &st.activity)
            .finish_non_exhaustive()
    }
}

impl Buffer {
    pub fn builder(name: impl Into<String>) -> BufferBuilder {
        BufferBuilder {
            name: name.into(),
            descr: String::new(),
            table: None,
            receiver: None,
            info: Map::new(),
            on_input: None,
            completion_words: Vec::new(),
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn name(&self) -> String {
        self.info_str("buffer_name").unwrap_or_default()
    }

    /// Slot number, or `None` once the buffer has been closed.
    pub fn number(&self) -> Option<usize> {
        self.state
            .lock()
            .info
            .get("buffer_num")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
    }

    pub fn info(&self) -> Map<String, Value> {
        self.state.lock().info.clone()
    }

    pub fn info_str(&self, key: &str) -> Option<String> {
        self.state
            .lock()
            .info
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Merge `partial` into the metadata. `null` values remove keys.
    pub fn update_info(&self, partial: Map<String, Value>) {
        let mut st = self.state.lock();
        for (k, v) in partial {
            if v.is_null() {
                st.info.remove(&k);
            } else {
                st.info.insert(k, v);
            }
        }
        st.dirty = true;
    }

    pub(crate) fn set_number(&self, num: Option<usize>) {
        let mut st = self.state.lock();
        match num {
            Some(n) => st.info.insert("buffer_num".into(), Value::from(n)),
            None => st.info.remove("buffer_num"),
        };
        st.dirty = true;
    }

    pub fn window(&self) -> Option<WindowId> {
        self.state.lock().window
    }

    pub fn activity(&self) -> Activity {
        self.state.lock().activity
    }

    pub fn command_table(&self) -> Option<String> {
        self.state.lock().table.clone()
    }

    fn receiver(self: &Arc<Self>, st: &BufferState) -> Receiver {
        st.receiver
            .clone()
            .unwrap_or_else(|| Receiver::new(self.clone()))
    }

    /// Bind the buffer's table to its receiver. Only takes effect on screen;
    /// a hidden buffer just remembers that its table should be active.
    pub fn activate_command_table(self: &Arc<Self>, commands: &CommandRegistry) -> Result<()> {
        let mut st = self.state.lock();
        st.table_active = true;
        if let (Some(table), Some(_)) = (st.table.clone(), st.window) {
            commands.activate(&table, self.receiver(&st))?;
        }
        Ok(())
    }

    pub fn deactivate_command_table(self: &Arc<Self>, commands: &CommandRegistry) {
        let mut st = self.state.lock();
        st.table_active = false;
        if let Some(table) = st.table.clone() {
            commands.deactivate(&table, Some(&self.receiver(&st)));
        }
    }

    pub(crate) fn attach_window(self: &Arc<Self>, win: WindowId, commands: &CommandRegistry) {
        let mut st = self.state.lock();
        st.window = Some(win);
        st.dirty = true;
        if let (Some(table), true) = (st.table.clone(), st.table_active) {
            if let Err(e) = commands.activate(&table, self.receiver(&st)) {
                debug!(buffer = ?self.id, error = %e, "buffer.attach.table_missing");
            }
        }
    }

    /// Returns the window the buffer was shown in.
    pub(crate) fn detach_window(self: &Arc<Self>, commands: &CommandRegistry) -> Option<WindowId> {
        let mut st = self.state.lock();
        let win = st.window.take()?;
        if let Some(table) = st.table.clone() {
            commands.deactivate(&table, Some(&self.receiver(&st)));
        }
        Some(win)
    }

    /// Visible buffers drop to quiet; hidden ones only ever go up.
    pub(crate) fn apply_activity(&self, level: Activity) -> bool {
        let mut st = self.state.lock();
        let next = match st.window {
            Some(_) if st.activity != Activity::Quiet => Activity::Quiet,
            None if level > st.activity => level,
            _ => return false,
        };
        st.activity = next;
        true
    }

    pub(crate) fn clear_activity(&self) -> bool {
        let mut st = self.state.lock();
        let changed = st.activity != Activity::Quiet;
        st.activity = Activity::Quiet;
        changed
    }

    pub fn has_question(&self) -> bool {
        self.state.lock().question.is_some()
    }

    pub fn question(&self) -> Option<QuestionView> {
        self.state.lock().question.as_ref().map(Question::view)
    }

    pub(crate) fn set_question(&self, question: Question) -> Option<Question> {
        self.state.lock().question.replace(question)
    }

    pub(crate) fn take_question(&self) -> Option<Question> {
        self.state.lock().question.take()
    }

    /// Take the pending question only if it is still the one with `serial`.
    pub(crate) fn take_question_if(&self, serial: u64) -> Option<Question> {
        let mut st = self.state.lock();
        match &st.question {
            Some(q) if q.serial() == serial => st.question.take(),
            _ => None,
        }
    }

    /// Validate `line` against the pending question with `serial`.
    /// `None` when that question is no longer pending.
    pub(crate) fn parse_answer(&self, serial: u64, line: &str) -> Option<Result<Answer>> {
        let st = self.state.lock();
        let q = st.question.as_ref().filter(|q| q.serial() == serial)?;
        Some(q.input().parse(line, q.is_required()))
    }

    pub(crate) fn push(&self, segments: Vec<Segment>) {
        let mut st = self.state.lock();
        let st = &mut *st;
        let done = split_lines(&mut st.open_line, segments);
        let added = done.len();
        st.lines.extend(done);
        let overflow = st.lines.len().saturating_sub(st.scrollback);
        st.lines.drain(..overflow);
        if st.scroll > 0 {
            st.scroll = (st.scroll + added).min(st.lines.len());
        }
        st.dirty = true;
    }

    /// Closed lines plus the line still being written.
    pub fn lines(&self) -> Vec<TextLine> {
        let st = self.state.lock();
        st.lines.iter().chain(st.open_line.iter()).cloned().collect()
    }

    /// Lines scrolled back from the bottom.
    pub fn scroll(&self) -> usize {
        self.state.lock().scroll
    }

    pub(crate) fn scroll_by(&self, delta: isize) {
        let mut st = self.state.lock();
        let max = st.lines.len().saturating_sub(1);
        st.scroll = st.scroll.saturating_add_signed(delta).min(max);
        st.dirty = true;
    }

    pub(crate) fn take_dirty(&self) -> bool {
        std::mem::take(&mut self.state.lock().dirty)
    }

    pub fn completion_words(&self) -> Vec<String> {
        self.state.lock().completion_words.clone()
    }

    pub fn set_completion_words(&self, words: Vec<String>) {
        self.state.lock().completion_words = words;
    }

    pub(crate) fn input_hook(&self) -> Option<InputHook> {
        self.state.lock().on_input.clone()
    }

    pub fn set_input_hook(&self, hook: Option<InputHook>) {
        self.state.lock().on_input = hook;
    }
}

pub struct BufferBuilder {
    name: String,
    descr: String,
    table: Option<String>,
    receiver: Option<Receiver>,
    info: Map<String, Value>,
    on_input: Option<InputHook>,
    completion_words: Vec<String>,
}

impl BufferBuilder {
    pub fn descr(mut self, descr: impl Into<String>) -> Self {
        self.descr = descr.into();
        self
    }

    /// Table activated while the buffer is on screen. Without an explicit
    /// `receiver` the buffer itself is passed to the table's handlers.
    pub fn command_table(mut self, name: impl Into<String>, receiver: Option<Receiver>) -> Self {
        self.table = Some(name.into());
        self.receiver = receiver;
        self
    }

    pub fn info(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }

    pub fn on_input<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Screen, &Arc<Buffer>, &str) -> Result<()> + Send + Sync + 'static,
    {
        self.on_input = Some(Arc::new(hook));
        self
    }

    pub fn completion_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.completion_words = words.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn build(self, scrollback: usize) -> Arc<Buffer> {
        let mut info = self.info;
        info.insert("buffer_name".into(), Value::from(self.name));
        info.insert("buffer_descr".into(), Value::from(self.descr));
        Arc::new(Buffer {
            id: BufferId(NEXT_BUFFER.fetch_add(1, Ordering::Relaxed)),
            state: Mutex::new(BufferState {
                info,
                table: self.table,
                receiver: self.receiver,
                table_active: true,
                window: None,
                activity: Activity::Quiet,
                question: None,
                lines: VecDeque::new(),
                open_line: None,
                scrollback: scrollback.max(1),
                scroll: 0,
                dirty: true,
                completion_words: self.completion_words,
                on_input: self.on_input,
            }),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Arc<dyn Fn() + Send + Sync>;

/// What happened to the window of a closed buffer.
#[derive(Debug, Default)]
pub(crate) struct CloseOutcome {
    pub(crate) window: Option<WindowId>,
    /// Window-less buffer now shown in `window`; `None` leaves it empty.
    pub(crate) replacement: Option<Arc<Buffer>>,
}

/// Most buffer numbers a `move` may reach.
pub const MAX_BUFFERS: usize = 999;

/// Numbered buffer slots. Structural changes go through [`Screen`] so the
/// window layout stays in step; this type only exposes lookups.
///
/// [`Screen`]: crate::Screen
pub struct BufferRegistry {
    slots: Mutex<Vec<Option<Arc<Buffer>>>>,
    observers: Mutex<Vec<(ObserverId, Observer)>>,
    next_observer: AtomicU64,
    commands: Arc<CommandRegistry>,
}

impl fmt::Debug for BufferRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots: Vec<_> = self
            .slots
            .lock()
            .iter()
            .map(|s| s.as_ref().map(|b| b.id))
            .collect();
        f.debug_struct("BufferRegistry").field("slots", &slots).finish()
    }
}

impl BufferRegistry {
    pub fn new(commands: Arc<CommandRegistry>) -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
            observers: Mutex::new(Vec::new()),
            next_observer: AtomicU64::new(1),
            commands,
        }
    }

    pub fn commands(&self) -> &Arc<CommandRegistry> {
        &self.commands
    }

    /// Occupy the first hole, else append. Returns the assigned number.
    pub(crate) fn register(&self, buffer: Arc<Buffer>) -> usize {
        let num = {
            let mut slots = self.slots.lock();
            let idx = match slots.iter().position(Option::is_none) {
                Some(idx) => {
                    slots[idx] = Some(buffer.clone());
                    idx
                }
                None => {
                    slots.push(Some(buffer.clone()));
                    slots.len() - 1
                }
            };
            idx + 1
        };
        buffer.set_number(Some(num));
        debug!(buffer = ?buffer.id(), num, "buffer.register");
        self.notify();
        num
    }

    /// `0` stands for slot 10.
    pub fn get_by_number(&self, num: usize) -> Option<Arc<Buffer>> {
        let num = if num == 0 { 10 } else { num };
        self.slots.lock().get(num - 1).cloned().flatten()
    }

    pub fn find(&self, id: BufferId) -> Option<Arc<Buffer>> {
        self.slots
            .lock()
            .iter()
            .flatten()
            .find(|b| b.id == id)
            .cloned()
    }

    pub fn number_of(&self, id: BufferId) -> Option<usize> {
        self.index_of(id).map(|i| i + 1)
    }

    fn index_of(&self, id: BufferId) -> Option<usize> {
        self.slots
            .lock()
            .iter()
            .position(|s| s.as_ref().is_some_and(|b| b.id == id))
    }

    /// Registered buffers in slot order, holes skipped.
    pub fn buffers(&self) -> Vec<Arc<Buffer>> {
        self.slots.lock().iter().flatten().cloned().collect()
    }

    /// Slot numbers in order; `None` marks a hole.
    pub fn slots(&self) -> Vec<Option<BufferId>> {
        self.slots
            .lock()
            .iter()
            .map(|s| s.as_ref().map(|b| b.id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().iter().all(Option::is_none)
    }

    /// Remove `buffer`, leaving a hole. Its window, if any, moves to the
    /// nearest earlier buffer that has none.
    pub(crate) fn close(&self, buffer: &Arc<Buffer>) -> CloseOutcome {
        let Some(idx) = self.index_of(buffer.id) else {
            return CloseOutcome::default();
        };
        buffer.clear_activity();
        buffer.take_question();
        let window = buffer.detach_window(&self.commands);
        buffer.deactivate_command_table(&self.commands);

        let replacement = window.and_then(|win| {
            let candidate = {
                let slots = self.slots.lock();
                slots[..idx]
                    .iter()
                    .rev()
                    .flatten()
                    .find(|b| b.window().is_none())
                    .cloned()
            };
            candidate.inspect(|b| b.attach_window(win, &self.commands))
        });
        if let Some(b) = &replacement {
            b.clear_activity();
        }

        if let Some(slot) = self.slots.lock().get_mut(idx) {
            *slot = None;
        }
        buffer.set_number(None);
        debug!(buffer = ?buffer.id(), num = idx + 1, "buffer.close");
        self.notify();
        CloseOutcome {
            window,
            replacement,
        }
    }

    /// Swap slots `old` and `new`, growing the registry with holes if needed.
    pub(crate) fn move_buffer(&self, old: usize, new: usize) -> Result<()> {
        if old == 0 || new == 0 {
            return Err(UiError::argument("Buffer numbers start at 1"));
        }
        if new > MAX_BUFFERS {
            return Err(UiError::argument(format!(
                "No such buffer number {new} (at most {MAX_BUFFERS})"
            )));
        }
        let moved = {
            let mut slots = self.slots.lock();
            if old > slots.len() || slots[old - 1].is_none() {
                return Err(UiError::argument(format!("No buffer number {old}")));
            }
            if new > slots.len() {
                slots.resize(new, None);
            }
            slots.swap(old - 1, new - 1);
            [
                (slots[old - 1].clone(), old),
                (slots[new - 1].clone(), new),
            ]
        };
        for (buf, num) in moved {
            if let Some(buf) = buf {
                buf.set_number(Some(num));
            }
        }
        debug!(old, new, "buffer.move");
        self.notify();
        Ok(())
    }

    /// Compact away holes, keeping relative order.
    pub(crate) fn reorder(&self) {
        let buffers = {
            let mut slots = self.slots.lock();
            slots.retain(Option::is_some);
            slots.iter().flatten().cloned().collect::<Vec<_>>()
        };
        for (i, buf) in buffers.iter().enumerate() {
            buf.set_number(Some(i + 1));
        }
        self.notify();
    }

    /// Apply the activity rule and notify observers on change.
    pub(crate) fn activity(&self, buffer: &Buffer, level: Activity) -> bool {
        let changed = buffer.apply_activity(level);
        if changed {
            self.notify();
        }
        changed
    }

    /// Numbers of buffers that want attention, with their level.
    pub fn activity_summary(&self) -> Vec<(usize, Activity)> {
        self.slots
            .lock()
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                let level = s.as_ref()?.activity();
                (level != Activity::Quiet).then_some((i + 1, level))
            })
            .collect()
    }

    /// First window-less buffer after `current` in slot order, wrapping
    /// around. `reverse` walks backwards.
    pub fn next_free(&self, current: Option<BufferId>, reverse: bool) -> Option<Arc<Buffer>> {
        let slots = self.slots.lock();
        let len = slots.len();
        if len == 0 {
            return None;
        }
        let start = current.and_then(|id| {
            slots
                .iter()
                .position(|s| s.as_ref().is_some_and(|b| b.id == id))
        });
        let order: Vec<usize> = match (start, reverse) {
            (Some(s), false) => (1..len).map(|k| (s + k) % len).collect(),
            (Some(s), true) => (1..len).map(|k| (s + len - k) % len).collect(),
            (None, false) => (0..len).collect(),
            (None, true) => (0..len).rev().collect(),
        };
        order
            .into_iter()
            .filter_map(|i| slots[i].as_ref())
            .find(|b| b.window().is_none())
            .cloned()
    }

    pub fn subscribe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = ObserverId(self.next_observer.fetch_add(1, Ordering::Relaxed));
        self.observers.lock().push((id, Arc::new(observer)));
        id
    }

    pub fn unsubscribe(&self, id: ObserverId) {
        self.observers.lock().retain(|(oid, _)| *oid != id);
    }

    fn notify(&self) {
        let observers: Vec<Observer> = self
            .observers
            .lock()
            .iter()
            .map(|(_, o)| o.clone())
            .collect();
        for observer in observers {
            observer();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmdtable::CommandTable;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    fn registry() -> BufferRegistry {
        BufferRegistry::new(Arc::new(CommandRegistry::new()))
    }

    fn add(reg: &BufferRegistry, name: &str) -> Arc<Buffer> {
        let buf = Buffer::builder(name).build(100);
        reg.register(buf.clone());
        buf
    }

    fn numbers(bufs: &[&Arc<Buffer>]) -> Vec<Option<usize>> {
        bufs.iter().map(|b| b.number()).collect()
    }

    #[test]
    fn register_reuses_first_hole() {
        let reg = registry();
        let a = add(&reg, "a");
        let b = add(&reg, "b");
        let c = add(&reg, "c");
        reg.close(&b);
        let d = add(&reg, "d");
        assert_eq!(numbers(&[&a, &c, &d]), vec![Some(1), Some(3), Some(2)]);
        assert_eq!(b.number(), None);
    }

    #[test]
    fn zero_is_slot_ten() {
        let reg = registry();
        let bufs: Vec<_> = (1..=10).map(|i| add(&reg, &format!("b{i}"))).collect();
        assert_eq!(reg.get_by_number(0).unwrap().id(), bufs[9].id());
        assert!(reg.get_by_number(11).is_none());
    }

    #[test]
    fn move_twice_restores_numbers() {
        let reg = registry();
        let a = add(&reg, "a");
        let b = add(&reg, "b");
        let c = add(&reg, "c");
        reg.move_buffer(1, 3).unwrap();
        assert_eq!(numbers(&[&a, &b, &c]), vec![Some(3), Some(2), Some(1)]);
        reg.move_buffer(3, 1).unwrap();
        assert_eq!(numbers(&[&a, &b, &c]), vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn move_past_end_grows_with_holes() {
        let reg = registry();
        let a = add(&reg, "a");
        reg.move_buffer(1, 4).unwrap();
        assert_eq!(a.number(), Some(4));
        assert_eq!(reg.slots(), vec![None, None, None, Some(a.id())]);
        assert!(reg.move_buffer(2, 1).is_err());
        assert!(reg.move_buffer(0, 1).is_err());
    }

    #[test]
    fn move_beyond_limit_is_rejected() {
        let reg = registry();
        let a = add(&reg, "a");
        assert!(matches!(
            reg.move_buffer(1, MAX_BUFFERS + 1),
            Err(UiError::CommandArgument(_))
        ));
        assert_eq!(a.number(), Some(1));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn reorder_compacts() {
        let reg = registry();
        let a = add(&reg, "a");
        let b = add(&reg, "b");
        let c = add(&reg, "c");
        reg.close(&b);
        assert_eq!(numbers(&[&a, &c]), vec![Some(1), Some(3)]);
        reg.reorder();
        assert_eq!(numbers(&[&a, &c]), vec![Some(1), Some(2)]);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn close_hands_window_to_nearest_earlier_free_buffer() {
        let reg = registry();
        let a = add(&reg, "a");
        let b = add(&reg, "b");
        let c = add(&reg, "c");
        let (w1, w2) = (WindowId::next(), WindowId::next());
        b.attach_window(w1, reg.commands());
        c.attach_window(w2, reg.commands());

        let outcome = reg.close(&c);
        assert_eq!(outcome.window, Some(w2));
        assert_eq!(outcome.replacement.unwrap().id(), a.id());
        assert_eq!(a.window(), Some(w2));

        let outcome = reg.close(&a);
        assert_eq!(outcome.window, Some(w2));
        assert!(outcome.replacement.is_none());
    }

    #[test]
    fn activity_rules() {
        let reg = registry();
        let a = add(&reg, "a");
        assert!(reg.activity(&a, Activity::Unread));
        assert!(!reg.activity(&a, Activity::Unread));
        assert!(reg.activity(&a, Activity::NeedsInput));
        assert!(!reg.activity(&a, Activity::Unread));
        assert_eq!(reg.activity_summary(), vec![(1, Activity::NeedsInput)]);

        a.attach_window(WindowId::next(), reg.commands());
        assert!(reg.activity(&a, Activity::Unread));
        assert_eq!(a.activity(), Activity::Quiet);
        assert!(!reg.activity(&a, Activity::NeedsInput));
    }

    #[test]
    fn observers_fire_until_unsubscribed() {
        let reg = registry();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let id = reg.subscribe(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let a = add(&reg, "a");
        reg.activity(&a, Activity::Unread);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        reg.unsubscribe(id);
        reg.reorder();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn shared_table_follows_the_visible_buffer() {
        let reg = registry();
        reg.commands().install(CommandTable::new("chat", 50));
        let one = Buffer::builder("one").command_table("chat", None).build(10);
        let two = Buffer::builder("two").command_table("chat", None).build(10);
        reg.register(one.clone());
        reg.register(two.clone());

        one.attach_window(WindowId::next(), reg.commands());
        two.attach_window(WindowId::next(), reg.commands());
        one.detach_window(reg.commands());
        assert!(reg.commands().is_active("chat").unwrap());
        let bound = reg.commands().receiver_of("chat").unwrap().unwrap();
        assert!(bound.downcast::<Buffer>().is_some_and(|b| b.id() == two.id()));

        two.detach_window(reg.commands());
        assert!(!reg.commands().is_active("chat").unwrap());
    }

    #[test]
    fn next_free_wraps_and_skips_shown() {
        let reg = registry();
        let a = add(&reg, "a");
        let b = add(&reg, "b");
        let c = add(&reg, "c");
        b.attach_window(WindowId::next(), reg.commands());
        assert_eq!(reg.next_free(Some(b.id()), false).unwrap().id(), c.id());
        assert_eq!(reg.next_free(Some(b.id()), true).unwrap().id(), a.id());
        assert_eq!(reg.next_free(Some(c.id()), false).unwrap().id(), a.id());
        assert_eq!(reg.next_free(None, false).unwrap().id(), a.id());
    }

    #[test]
    fn scrollback_drops_oldest_lines() {
        let buf = Buffer::builder("log").build(2);
        buf.push(vec![Segment::plain("1\n2\n3\n")]);
        let texts: Vec<_> = buf.lines().iter().map(TextLine::text).collect();
        assert_eq!(texts, vec!["2", "3"]);
    }

    #[test]
    fn update_info_merges_and_removes() {
        let buf = Buffer::builder("chat").descr("with bob").info("jid", "bob@example").build(10);
        let mut partial = Map::new();
        partial.insert("buffer_descr".into(), Value::from("away"));
        partial.insert("jid".into(), Value::Null);
        buf.update_info(partial);
        assert_eq!(buf.info_str("buffer_descr").as_deref(), Some("away"));
        assert!(buf.info_str("jid").is_none());
        assert_eq!(buf.name(), "chat");
    }
}
