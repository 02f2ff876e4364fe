#![allow(dead_code)]

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::sync::Arc;
use switchboard_tui::{HeadlessProbe, HeadlessSurface, PlainTheme, Screen, ScreenOptions};

pub fn screen(windows: usize) -> (Arc<Screen>, HeadlessProbe) {
    let (surface, probe) = HeadlessSurface::new(40, 12).expect("headless surface");
    let options = ScreenOptions {
        windows,
        ..ScreenOptions::default()
    };
    let screen = Screen::new(Box::new(surface), Box::new(PlainTheme), options).expect("screen");
    (screen, probe)
}

pub fn press(screen: &Screen, code: KeyCode) {
    screen.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
}

pub fn type_line(screen: &Screen, text: &str) {
    for ch in text.chars() {
        press(screen, KeyCode::Char(ch));
    }
    press(screen, KeyCode::Enter);
}
