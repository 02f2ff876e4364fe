//! Windows, focus and two-phase redraw over the buffer registry.
//!
//! Every structural change runs under the screen's reentrant lock, so
//! command handlers invoked from the input path may call back into the
//! screen freely. Mutations only *stage* what needs repainting;
//! [`Screen::commit`] paints one complete frame.
use crate::buffer::{Activity, Buffer, BufferBuilder, BufferId, BufferRegistry};
use crate::cmdtable::{Command, CommandRegistry, CommandTable, Receiver};
use crate::error::{Result, UiError};
use crate::input::InputController;
use crate::question::QuestionBuilder;
use crate::surface::Surface;
use crate::theme::Theme;
use crate::transcript::{Segment, TextLine};
use crate::view::{ViewSnap, WindowSnap};
use crate::window::{Window, WindowId};
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use ratatui::style::{Color, Style};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const SCREEN_TABLE: &str = "screen";
pub const BUFFER_TABLE: &str = "buffer";

#[derive(Debug, Clone)]
pub struct ScreenOptions {
    pub windows: usize,
    pub scrollback: usize,
    pub command_marker: char,
    pub beep: bool,
    pub poll_timeout: Duration,
}

impl Default for ScreenOptions {
    fn default() -> Self {
        Self {
            windows: 1,
            scrollback: 1000,
            command_marker: '/',
            beep: true,
            poll_timeout: Duration::from_millis(100),
        }
    }
}

struct LayoutState {
    windows: Vec<Window>,
    focused: Option<WindowId>,
    size: (u16, u16),
    /// `false` while the terminal is handed to a subprocess.
    active: bool,
    title: Option<String>,
    background: Option<Color>,
}

impl LayoutState {
    fn window_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        self.windows.iter_mut().find(|w| w.id == id)
    }

    fn relayout(&mut self) {
        let n = self.windows.len().max(1) as u16;
        let title = u16::from(self.title.is_some());
        let avail = self.size.1.saturating_sub(1 + title);
        for win in &mut self.windows {
            win.height = (avail / n).saturating_sub(1);
        }
    }
}

#[derive(Debug, Default)]
struct Stage {
    full: bool,
    clear: bool,
    input: bool,
    windows: Vec<WindowId>,
}

impl Stage {
    fn is_empty(&self) -> bool {
        !self.full && !self.clear && !self.input && self.windows.is_empty()
    }
}

pub struct Screen {
    lock: ReentrantMutex<()>,
    layout: Mutex<LayoutState>,
    stage: Mutex<Stage>,
    buffers: BufferRegistry,
    commands: Arc<CommandRegistry>,
    pub(crate) input: Mutex<InputController>,
    surface: Mutex<Box<dyn Surface>>,
    theme: Box<dyn Theme>,
    options: ScreenOptions,
    quit: AtomicBool,
}

impl Screen {
    /// Build a screen over an already entered surface, with `options.windows`
    /// stacked windows and the built-in `screen` and `buffer` tables installed.
    pub fn new(
        surface: Box<dyn Surface>,
        theme: Box<dyn Theme>,
        options: ScreenOptions,
    ) -> Result<Arc<Self>> {
        let size = surface.size()?;
        let commands = Arc::new(CommandRegistry::new());
        commands.install(screen_table());
        commands.install(buffer_table());
        commands.activate(SCREEN_TABLE, Receiver::unit())?;

        let windows: Vec<Window> = (0..options.windows.max(1)).map(|_| Window::new()).collect();
        let focused = windows.first().map(Window::id);
        let mut layout = LayoutState {
            windows,
            focused,
            size,
            active: true,
            title: None,
            background: None,
        };
        layout.relayout();
        info!(windows = layout.windows.len(), width = size.0, height = size.1, "screen.init");

        Ok(Arc::new(Self {
            lock: ReentrantMutex::new(()),
            layout: Mutex::new(layout),
            stage: Mutex::new(Stage {
                full: true,
                ..Stage::default()
            }),
            buffers: BufferRegistry::new(commands.clone()),
            commands,
            input: Mutex::new(InputController::new()),
            surface: Mutex::new(surface),
            theme,
            options,
            quit: AtomicBool::new(false),
        }))
    }

    /// Hold the screen-wide lock across several calls.
    pub fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.lock.lock()
    }

    pub fn buffers(&self) -> &BufferRegistry {
        &self.buffers
    }

    pub fn commands(&self) -> &Arc<CommandRegistry> {
        &self.commands
    }

    pub fn options(&self) -> &ScreenOptions {
        &self.options
    }

    pub fn theme(&self) -> &dyn Theme {
        self.theme.as_ref()
    }

    pub fn create_buffer(&self, builder: BufferBuilder) -> Arc<Buffer> {
        let _g = self.lock.lock();
        let buffer = builder.build(self.options.scrollback);
        self.buffers.register(buffer.clone());
        self.stage_full();
        buffer
    }

    pub fn close_buffer(&self, buffer: &Arc<Buffer>) {
        let _g = self.lock.lock();
        let outcome = self.buffers.close(buffer);
        if let Some(win) = outcome.window {
            let replacement = outcome.replacement.as_ref().map(|b| b.id());
            if let Some(w) = self.layout.lock().window_mut(win) {
                w.buffer = replacement;
            }
            self.stage_window(win);
        }
        self.stage_full();
        self.refresh_input();
    }

    pub fn windows(&self) -> Vec<Window> {
        self.layout.lock().windows.clone()
    }

    pub fn focused_window(&self) -> Option<WindowId> {
        self.layout.lock().focused
    }

    /// Buffer of the focused window.
    pub fn current_buffer(&self) -> Option<Arc<Buffer>> {
        let id = self.window_buffer(self.focused_window()?)?;
        self.buffers.find(id)
    }

    fn window_buffer(&self, win: WindowId) -> Option<BufferId> {
        let layout = self.layout.lock();
        layout.windows.iter().find(|w| w.id == win)?.buffer
    }

    pub fn add_window(&self) -> WindowId {
        let _g = self.lock.lock();
        let mut layout = self.layout.lock();
        let win = Window::new();
        let id = win.id;
        layout.windows.push(win);
        layout.focused.get_or_insert(id);
        layout.relayout();
        drop(layout);
        self.stage_full();
        id
    }

    pub fn focus_window(&self, win: Option<WindowId>) {
        let _g = self.lock.lock();
        let Some(win) = win else { return };
        let previous = {
            let mut layout = self.layout.lock();
            if layout.focused == Some(win) || !layout.windows.iter().any(|w| w.id == win) {
                return;
            }
            layout.focused.replace(win)
        };
        if let Some(prev) = previous {
            self.stage_window(prev);
        }
        self.stage_window(win);
        self.refresh_input();
    }

    pub fn focus_next(&self) {
        self.focus_step(1);
    }

    pub fn focus_prev(&self) {
        self.focus_step(-1);
    }

    fn focus_step(&self, step: isize) {
        let _g = self.lock.lock();
        let target = {
            let layout = self.layout.lock();
            let n = layout.windows.len();
            if n <= 1 {
                return;
            }
            let cur = layout
                .focused
                .and_then(|f| layout.windows.iter().position(|w| w.id == f))
                .unwrap_or(0);
            layout.windows[(cur as isize + step).rem_euclid(n as isize) as usize].id
        };
        self.focus_window(Some(target));
    }

    /// Show `buffer` in `win`. A buffer already shown elsewhere swaps places
    /// with the window's previous buffer.
    pub fn set_window_buffer(&self, win: WindowId, buffer: Option<&Arc<Buffer>>) {
        let _g = self.lock.lock();
        let old = self.window_buffer(win).and_then(|id| self.buffers.find(id));
        if let (Some(old), Some(new)) = (&old, buffer) {
            if old.id() == new.id() {
                return;
            }
        }
        if old.is_none() && buffer.is_none() {
            return;
        }

        if let Some(old) = &old {
            old.detach_window(&self.commands);
        }
        let other = buffer.and_then(|b| b.window().map(|w| (b, w)));
        if let Some((b, other_win)) = other {
            b.detach_window(&self.commands);
            let swapped = old.as_ref().map(|o| o.id());
            if let Some(w) = self.layout.lock().window_mut(other_win) {
                w.buffer = swapped;
            }
            if let Some(old) = &old {
                old.attach_window(other_win, &self.commands);
                self.buffers.activity(old, Activity::Quiet);
            }
            self.stage_window(other_win);
        }

        if let Some(b) = buffer {
            b.attach_window(win, &self.commands);
            self.buffers.activity(b, Activity::Quiet);
        }
        if let Some(w) = self.layout.lock().window_mut(win) {
            w.buffer = buffer.map(|b| b.id());
        }
        debug!(window = ?win, buffer = ?buffer.map(|b| b.id()), "window.set_buffer");
        self.stage_window(win);
        if self.focused_window() == Some(win) {
            self.refresh_input();
        }
    }

    pub fn set_window_locked(&self, win: WindowId, locked: bool) {
        let _g = self.lock.lock();
        if let Some(w) = self.layout.lock().window_mut(win) {
            w.locked = locked;
        }
    }

    /// Window showing `buffer`, placing it first if needed. `None` when
    /// every window is locked.
    pub fn display_buffer(&self, buffer: &Arc<Buffer>) -> Option<WindowId> {
        let _g = self.lock.lock();
        if let Some(win) = buffer.window() {
            return Some(win);
        }
        let target = {
            let layout = self.layout.lock();
            let focused = layout
                .focused
                .and_then(|f| layout.windows.iter().find(|w| w.id == f))
                .filter(|w| !w.locked);
            focused
                .or_else(|| layout.windows.iter().find(|w| !w.locked))
                .map(Window::id)
        };
        let Some(win) = target else {
            debug!(buffer = ?buffer.id(), "window.display.all_locked");
            return None;
        };
        self.set_window_buffer(win, Some(buffer));
        Some(win)
    }

    /// Show buffer number `num` in the focused window.
    pub fn show_buffer_number(&self, num: usize) {
        let _g = self.lock.lock();
        match (self.focused_window(), self.buffers.get_by_number(num)) {
            (Some(win), Some(buf)) => self.set_window_buffer(win, Some(&buf)),
            _ => self.beep(),
        }
    }

    pub fn nextbuf(&self) {
        self.rotate_buffer(false);
    }

    pub fn prevbuf(&self) {
        self.rotate_buffer(true);
    }

    fn rotate_buffer(&self, reverse: bool) {
        let _g = self.lock.lock();
        let Some(win) = self.focused_window() else {
            self.beep();
            return;
        };
        match self.buffers.next_free(self.window_buffer(win), reverse) {
            Some(buf) => self.set_window_buffer(win, Some(&buf)),
            None => self.beep(),
        }
    }

    pub fn move_buffer(&self, old: usize, new: usize) -> Result<()> {
        let _g = self.lock.lock();
        self.buffers.move_buffer(old, new)?;
        self.stage_full();
        Ok(())
    }

    pub fn reorder(&self) {
        let _g = self.lock.lock();
        self.buffers.reorder();
        self.stage_full();
    }

    /// Best effort; a terminal without a bell is fine.
    pub fn beep(&self) {
        if !self.options.beep || !self.layout.lock().active {
            return;
        }
        if let Err(e) = self.surface.lock().bell() {
            debug!(error = %e, "screen.beep.failed");
        }
    }

    pub fn resize(&self, width: u16, height: u16) {
        let _g = self.lock.lock();
        if let Err(e) = self.surface.lock().resize(width, height) {
            warn!(error = %e, "screen.resize.failed");
        }
        {
            let mut layout = self.layout.lock();
            layout.size = (width, height);
            layout.relayout();
        }
        self.stage_clear();
        if let Err(e) = self.commit() {
            warn!(error = %e, "screen.commit.failed");
        }
    }

    pub fn size(&self) -> (u16, u16) {
        self.layout.lock().size
    }

    /// Give the terminal back to the shell. Repeated calls are no-ops.
    pub fn shell_mode(&self) -> Result<()> {
        let _g = self.lock.lock();
        if !self.layout.lock().active {
            return Ok(());
        }
        if let Err(e) = self.surface.lock().suspend() {
            warn!(error = %e, "screen.shell_mode.failed");
            return Err(e);
        }
        self.layout.lock().active = false;
        Ok(())
    }

    /// Take the terminal back and repaint everything.
    pub fn prog_mode(&self) -> Result<()> {
        let _g = self.lock.lock();
        if self.layout.lock().active {
            return Ok(());
        }
        self.surface.lock().resume()?;
        self.layout.lock().active = true;
        self.stage_clear();
        self.commit()
    }

    pub fn is_active(&self) -> bool {
        self.layout.lock().active
    }

    pub fn activity(&self, buffer: &Arc<Buffer>, level: Activity) {
        let _g = self.lock.lock();
        if self.buffers.activity(buffer, level) {
            self.stage_full();
        }
    }

    /// Attach a question to `buffer`. Nothing changes if it fails validation.
    pub fn ask_question(&self, buffer: &Arc<Buffer>, question: QuestionBuilder) -> Result<()> {
        let _g = self.lock.lock();
        let question = question.build()?;
        debug!(buffer = ?buffer.id(), serial = question.serial(), "question.ask");
        if buffer.set_question(question).is_some() {
            debug!(buffer = ?buffer.id(), "question.replaced");
        }
        self.activity(buffer, Activity::NeedsInput);
        if self.is_current(buffer) {
            self.refresh_input();
        }
        Ok(())
    }

    pub fn unask_question(&self, buffer: &Arc<Buffer>) {
        let _g = self.lock.lock();
        if buffer.take_question().is_some() && self.is_current(buffer) {
            self.refresh_input();
        }
    }

    fn is_current(&self, buffer: &Buffer) -> bool {
        let focused = self.focused_window();
        focused.is_some() && buffer.window() == focused
    }

    /// Append styled text; `'\n'` ends lines. Hidden buffers become unread.
    pub fn append(&self, buffer: &Arc<Buffer>, segments: Vec<Segment>) {
        let _g = self.lock.lock();
        buffer.push(segments);
        self.activity(buffer, Activity::Unread);
        if let Some(win) = buffer.window() {
            self.stage_window(win);
        }
    }

    pub fn append_line(&self, buffer: &Arc<Buffer>, text: &str) {
        self.append_styled(buffer, text, Style::default());
    }

    pub fn append_styled(&self, buffer: &Arc<Buffer>, text: &str, style: Style) {
        self.append(buffer, vec![Segment::new(format!("{text}\n"), style)]);
    }

    /// Render `template` through the theme and append it as whole lines.
    pub fn append_themed(&self, buffer: &Arc<Buffer>, template: &str, params: &Map<String, Value>) {
        let mut segments = self.theme.format(template, params);
        segments.push(Segment::plain("\n"));
        self.append(buffer, segments);
    }

    pub fn update_info(&self, buffer: &Arc<Buffer>, partial: Map<String, Value>) {
        let _g = self.lock.lock();
        buffer.update_info(partial);
        if let Some(win) = buffer.window() {
            self.stage_window(win);
        }
    }

    pub fn set_title(&self, title: Option<String>) {
        let _g = self.lock.lock();
        {
            let mut layout = self.layout.lock();
            layout.title = title;
            layout.relayout();
        }
        self.stage_full();
    }

    pub fn set_background(&self, background: Option<Color>) {
        let _g = self.lock.lock();
        self.layout.lock().background = background;
        self.stage_clear();
    }

    pub fn request_quit(&self) {
        info!("screen.quit_requested");
        self.quit.store(true, Ordering::SeqCst);
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }

    pub fn stage_full(&self) {
        self.stage.lock().full = true;
    }

    /// Full repaint starting from a cleared terminal.
    pub fn stage_clear(&self) {
        let mut stage = self.stage.lock();
        stage.full = true;
        stage.clear = true;
    }

    pub fn stage_input(&self) {
        self.stage.lock().input = true;
    }

    pub fn stage_window(&self, win: WindowId) {
        let mut stage = self.stage.lock();
        if !stage.windows.contains(&win) {
            stage.windows.push(win);
        }
    }

    /// Paint if anything was staged or a shown buffer changed.
    pub fn commit(&self) -> Result<()> {
        let _g = self.lock.lock();
        if !self.layout.lock().active {
            return Ok(());
        }
        let stage = std::mem::take(&mut *self.stage.lock());
        let mut dirty = false;
        for win in self.windows() {
            if let Some(buf) = win.buffer.and_then(|id| self.buffers.find(id)) {
                dirty |= buf.take_dirty();
            }
        }
        if stage.is_empty() && !dirty {
            return Ok(());
        }

        let snap = self.snapshot();
        let res = self.surface.lock().paint(&snap, stage.clear);
        if res.is_err() {
            self.stage_clear();
        }
        res
    }

    fn snapshot(&self) -> ViewSnap {
        let (windows, focused, width, title, background) = {
            let layout = self.layout.lock();
            (
                layout.windows.clone(),
                layout.focused,
                layout.size.0,
                layout.title.clone(),
                layout.background,
            )
        };
        let windows = windows
            .iter()
            .map(|w| {
                let focused = Some(w.id) == focused;
                match w.buffer.and_then(|id| self.buffers.find(id)) {
                    Some(buf) => WindowSnap {
                        lines: buf.lines(),
                        scroll: buf.scroll(),
                        status: TextLine(self.theme.format("window_status", &buf.info())),
                        focused,
                    },
                    None => WindowSnap {
                        focused,
                        ..WindowSnap::default()
                    },
                }
            })
            .collect();
        ViewSnap {
            title,
            background,
            windows,
            activity: self.buffers.activity_summary(),
            input: self.input.lock().snap(width as usize),
        }
    }

    /// Sync the input controller with the focused window's buffer.
    pub fn refresh_input(&self) {
        let _g = self.lock.lock();
        let question = self
            .current_buffer()
            .and_then(|b| b.question().map(|q| (b.id(), q)));
        self.input.lock().current_buffer_changed(question);
        self.stage_input();
    }

    /// Scroll the focused window by whole pages; positive goes back in time.
    pub fn scroll_pages(&self, pages: isize) {
        let _g = self.lock.lock();
        let Some(win) = self.focused_window() else { return };
        let page = self
            .windows()
            .iter()
            .find(|w| w.id == win)
            .map_or(1, |w| w.height.max(1) as isize);
        if let Some(buf) = self.current_buffer() {
            buf.scroll_by(pages * page);
            self.stage_window(win);
        }
    }
}

fn parse_number(token: Option<String>) -> Result<usize> {
    let token = token.ok_or_else(|| UiError::argument("Buffer number expected"))?;
    token
        .parse()
        .map_err(|_| UiError::argument(format!("Not a buffer number: {token}")))
}

fn screen_table() -> CommandTable {
    CommandTable::new(SCREEN_TABLE, 90)
        .with(Command::new("next", "/next", "Focus the next window", |s, _, args| {
            args.finish()?;
            s.focus_next();
            Ok(())
        }))
        .with(Command::new("prev", "/prev", "Focus the previous window", |s, _, args| {
            args.finish()?;
            s.focus_prev();
            Ok(())
        }))
        .with_alias("previous", "prev")
        .with(Command::new(
            "nextbuf",
            "/nextbuf",
            "Show the next hidden buffer in this window",
            |s, _, args| {
                args.finish()?;
                s.nextbuf();
                Ok(())
            },
        ))
        .with(Command::new(
            "prevbuf",
            "/prevbuf",
            "Show the previous hidden buffer in this window",
            |s, _, args| {
                args.finish()?;
                s.prevbuf();
                Ok(())
            },
        ))
        .with(
            Command::new(
                "move",
                "/move [old] new",
                "Change the number of a buffer",
                |s, _, args| {
                    let first = parse_number(args.shift()?)?;
                    let second = args.shift()?.map(|t| parse_number(Some(t))).transpose()?;
                    args.finish()?;
                    let (old, new) = match second {
                        Some(new) => (first, new),
                        None => {
                            let cur = s
                                .current_buffer()
                                .and_then(|b| b.number())
                                .ok_or_else(|| UiError::argument("No current buffer"))?;
                            (cur, first)
                        }
                    };
                    s.move_buffer(old, new)
                },
            )
            .with_hints(["buffer-number", "buffer-number"]),
        )
        .with(Command::new(
            "reorder",
            "/reorder",
            "Renumber buffers, removing gaps",
            |s, _, args| {
                args.finish()?;
                s.reorder();
                Ok(())
            },
        ))
        .with(Command::new("beep", "/beep", "Ring the terminal bell", |s, _, args| {
            args.finish()?;
            s.beep();
            Ok(())
        }))
}

fn buffer_table() -> CommandTable {
    CommandTable::new(BUFFER_TABLE, 50).with(Command::bound::<Buffer, _>(
        "close",
        "/close",
        "Close the current buffer",
        |s, buffer, args| {
            args.finish()?;
            s.close_buffer(&buffer);
            Ok(())
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::HeadlessSurface;
    use crate::theme::PlainTheme;

    fn screen(windows: usize) -> Arc<Screen> {
        let (surface, _probe) = HeadlessSurface::new(40, 12).unwrap();
        let options = ScreenOptions {
            windows,
            ..ScreenOptions::default()
        };
        Screen::new(Box::new(surface), Box::new(PlainTheme), options).unwrap()
    }

    #[test]
    fn window_heights_share_the_rows() {
        let s = screen(2);
        let heights: Vec<_> = s.windows().iter().map(Window::height).collect();
        assert_eq!(heights, vec![4, 4]);
        s.set_title(Some("t".into()));
        assert_eq!(s.windows()[0].height(), 4);
    }

    #[test]
    fn focus_cycles_with_wraparound() {
        let s = screen(3);
        let ids: Vec<_> = s.windows().iter().map(Window::id).collect();
        s.focus_prev();
        assert_eq!(s.focused_window(), Some(ids[2]));
        s.focus_next();
        assert_eq!(s.focused_window(), Some(ids[0]));
    }

    /// Headless surface that refuses to let go of the terminal.
    struct StuckSurface(HeadlessSurface);

    impl Surface for StuckSurface {
        fn size(&self) -> Result<(u16, u16)> {
            self.0.size()
        }
        fn paint(&mut self, snap: &ViewSnap, clear: bool) -> Result<()> {
            self.0.paint(snap, clear)
        }
        fn bell(&mut self) -> Result<()> {
            self.0.bell()
        }
        fn suspend(&mut self) -> Result<()> {
            Err(std::io::Error::other("tty busy").into())
        }
        fn resume(&mut self) -> Result<()> {
            self.0.resume()
        }
        fn resize(&mut self, width: u16, height: u16) -> Result<()> {
            self.0.resize(width, height)
        }
    }

    #[test]
    fn failed_shell_mode_keeps_painting() {
        let (surface, probe) = HeadlessSurface::new(40, 12).unwrap();
        let s = Screen::new(
            Box::new(StuckSurface(surface)),
            Box::new(PlainTheme),
            ScreenOptions::default(),
        )
        .unwrap();
        assert!(matches!(s.shell_mode(), Err(UiError::Terminal(_))));
        assert!(s.is_active());

        let painted = probe.paints();
        s.stage_full();
        s.commit().unwrap();
        assert!(probe.paints() > painted);
    }

    #[test]
    fn single_window_focus_step_is_noop() {
        let s = screen(1);
        let before = s.focused_window();
        s.focus_next();
        assert_eq!(s.focused_window(), before);
    }

    #[test]
    fn showing_a_displayed_buffer_swaps_windows() {
        let s = screen(2);
        let ids: Vec<_> = s.windows().iter().map(Window::id).collect();
        let a = s.create_buffer(Buffer::builder("a"));
        let b = s.create_buffer(Buffer::builder("b"));
        s.set_window_buffer(ids[0], Some(&a));
        s.set_window_buffer(ids[1], Some(&b));
        s.set_window_buffer(ids[0], Some(&b));
        assert_eq!(b.window(), Some(ids[0]));
        assert_eq!(a.window(), Some(ids[1]));
    }

    #[test]
    fn move_command_defaults_to_current_buffer() {
        let s = screen(1);
        let a = s.create_buffer(Buffer::builder("a"));
        let _b = s.create_buffer(Buffer::builder("b"));
        s.display_buffer(&a);
        s.commands().run_command(&s, "move 3");
        assert_eq!(a.number(), Some(3));
    }
}
