use crate::buffer::Activity;
use ratatui::style::{Color, Modifier, Style};

pub fn bar() -> Style {
    Style::default().fg(Color::White).bg(Color::Blue)
}

pub fn bar_focused() -> Style {
    bar().add_modifier(Modifier::BOLD)
}

pub fn title() -> Style {
    Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}

pub fn prompt() -> Style {
    Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD)
}

pub fn dim() -> Style {
    Style::default().fg(Color::DarkGray)
}

pub fn system() -> Style {
    Style::default().fg(Color::Gray)
}

pub fn error() -> Style {
    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
}

pub fn activity(level: Activity) -> Style {
    match level {
        Activity::Quiet => bar(),
        Activity::Unread => bar().fg(Color::LightGreen).add_modifier(Modifier::BOLD),
        Activity::NeedsInput => bar().fg(Color::LightRed).add_modifier(Modifier::BOLD),
    }
}
