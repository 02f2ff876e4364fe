//! Terminal device behind the screen.
//!
//! [`CrosstermSurface`] owns the real terminal; [`HeadlessSurface`] paints
//! into an in-memory buffer and reports what it saw through a probe.
use crate::error::Result;
use crate::view::{ViewSnap, draw};
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use parking_lot::Mutex;
use ratatui::{
    Terminal,
    backend::{CrosstermBackend, TestBackend},
    layout::Rect,
};
use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub trait Surface: Send {
    /// Columns and rows.
    fn size(&self) -> Result<(u16, u16)>;
    fn paint(&mut self, snap: &ViewSnap, clear: bool) -> Result<()>;
    fn bell(&mut self) -> Result<()>;
    /// Hand the terminal back to the shell.
    fn suspend(&mut self) -> Result<()>;
    fn resume(&mut self) -> Result<()>;
    fn resize(&mut self, width: u16, height: u16) -> Result<()>;
}

pub struct CrosstermSurface {
    term: Terminal<CrosstermBackend<Stdout>>,
    suspended: bool,
}

impl CrosstermSurface {
    /// Take over the terminal: raw mode plus the alternate screen.
    pub fn enter() -> Result<Self> {
        take_over()?;
        let backend = CrosstermBackend::new(io::stdout());
        match Terminal::new(backend) {
            Ok(term) => Ok(Self {
                term,
                suspended: false,
            }),
            Err(e) => {
                let _ = give_back();
                Err(e.into())
            }
        }
    }
}

fn take_over() -> io::Result<()> {
    enable_raw_mode()?;
    if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
        let _ = disable_raw_mode();
        return Err(e);
    }
    Ok(())
}

/// Both steps always run; the first error is reported.
fn give_back() -> io::Result<()> {
    let screen = execute!(io::stdout(), LeaveAlternateScreen);
    let raw = disable_raw_mode();
    screen.and(raw)
}

impl Surface for CrosstermSurface {
    fn size(&self) -> Result<(u16, u16)> {
        let size = self.term.size()?;
        Ok((size.width, size.height))
    }

    fn paint(&mut self, snap: &ViewSnap, clear: bool) -> Result<()> {
        if clear {
            self.term.clear()?;
        }
        self.term.draw(|frame| draw(frame, snap))?;
        Ok(())
    }

    fn bell(&mut self) -> Result<()> {
        let mut out = io::stdout();
        out.write_all(b"\x07")?;
        out.flush()?;
        Ok(())
    }

    fn suspend(&mut self) -> Result<()> {
        if self.suspended {
            return Ok(());
        }
        self.suspended = true;
        let cursor = self.term.show_cursor();
        give_back()?;
        cursor?;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if !self.suspended {
            return Ok(());
        }
        take_over()?;
        self.suspended = false;
        self.term.clear()?;
        Ok(())
    }

    fn resize(&mut self, width: u16, height: u16) -> Result<()> {
        self.term.resize(Rect::new(0, 0, width, height))?;
        Ok(())
    }
}

impl Drop for CrosstermSurface {
    fn drop(&mut self) {
        if !self.suspended {
            let _ = self.term.show_cursor();
            let _ = give_back();
        }
    }
}

#[derive(Default)]
struct ProbeState {
    bells: AtomicUsize,
    paints: AtomicUsize,
    clears: AtomicUsize,
    suspended: AtomicBool,
    frame: Mutex<Vec<String>>,
}

/// Read side of a [`HeadlessSurface`], kept by tests after the surface has
/// been handed to a screen.
#[derive(Clone, Default)]
pub struct HeadlessProbe(Arc<ProbeState>);

impl HeadlessProbe {
    pub fn bells(&self) -> usize {
        self.0.bells.load(Ordering::SeqCst)
    }

    pub fn paints(&self) -> usize {
        self.0.paints.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> usize {
        self.0.clears.load(Ordering::SeqCst)
    }

    pub fn is_suspended(&self) -> bool {
        self.0.suspended.load(Ordering::SeqCst)
    }

    /// Rows of the last painted frame, trailing blanks trimmed.
    pub fn frame(&self) -> Vec<String> {
        self.0.frame.lock().clone()
    }

    pub fn shows(&self, needle: &str) -> bool {
        self.0.frame.lock().iter().any(|row| row.contains(needle))
    }
}

pub struct HeadlessSurface {
    term: Terminal<TestBackend>,
    probe: HeadlessProbe,
}

impl HeadlessSurface {
    pub fn new(width: u16, height: u16) -> Result<(Self, HeadlessProbe)> {
        let term = Terminal::new(TestBackend::new(width, height))?;
        let probe = HeadlessProbe::default();
        Ok((
            Self {
                term,
                probe: probe.clone(),
            },
            probe,
        ))
    }

    fn capture(&self) {
        let buf = self.term.backend().buffer();
        let area = buf.area;
        let rows = (area.top()..area.bottom())
            .map(|y| {
                let row: String = (area.left()..area.right())
                    .filter_map(|x| buf.cell((x, y)).map(|c| c.symbol().to_string()))
                    .collect();
                row.trim_end().to_string()
            })
            .collect();
        *self.probe.0.frame.lock() = rows;
    }
}

impl Surface for HeadlessSurface {
    fn size(&self) -> Result<(u16, u16)> {
        let size = self.term.size()?;
        Ok((size.width, size.height))
    }

    fn paint(&mut self, snap: &ViewSnap, clear: bool) -> Result<()> {
        if clear {
            self.term.clear()?;
            self.probe.0.clears.fetch_add(1, Ordering::SeqCst);
        }
        self.term.draw(|frame| draw(frame, snap))?;
        self.probe.0.paints.fetch_add(1, Ordering::SeqCst);
        self.capture();
        Ok(())
    }

    fn bell(&mut self) -> Result<()> {
        self.probe.0.bells.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn suspend(&mut self) -> Result<()> {
        self.probe.0.suspended.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.probe.0.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn resize(&mut self, width: u16, height: u16) -> Result<()> {
        self.term.backend_mut().resize(width, height);
        self.term.resize(Rect::new(0, 0, width, height))?;
        Ok(())
    }
}
