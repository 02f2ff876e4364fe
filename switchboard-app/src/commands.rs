use std::sync::Arc;
use switchboard_tui::{
    BUFFER_TABLE, Buffer, Command, CommandTable, Receiver, Result, Screen, UiError, styles,
};

pub const APP_TABLE: &str = "app";

/// Install and activate the application's own commands. Output goes to
/// `status`, which is also the table's receiver.
pub fn install(screen: &Screen, status: &Arc<Buffer>) -> Result<()> {
    let table = CommandTable::new(APP_TABLE, 10)
        .with(Command::bound::<Buffer, _>(
            "help",
            "/help [command]",
            "List commands, or describe one",
            help,
        ))
        .with(Command::new("quit", "/quit", "Leave the program", |s, _, args| {
            args.finish()?;
            s.request_quit();
            Ok(())
        }))
        .with_alias("exit", "quit")
        .with(Command::new(
            "new",
            "/new name",
            "Open a scratch buffer that echoes what you type",
            |s, _, args| {
                let name = args
                    .shift()?
                    .ok_or_else(|| UiError::argument("Buffer name expected"))?;
                args.finish()?;
                let buffer = s.create_buffer(scratch(&name));
                s.display_buffer(&buffer);
                Ok(())
            },
        ));
    screen.commands().install(table);
    screen
        .commands()
        .activate(APP_TABLE, Receiver::new(status.clone()))
}

fn help(screen: &Screen, status: Arc<Buffer>, args: &mut switchboard_tui::CommandArgs) -> Result<()> {
    let wanted = args.shift()?;
    args.finish()?;
    let out = screen.current_buffer().unwrap_or(status);
    match wanted {
        Some(name) => {
            let name = name.trim_start_matches(screen.options().command_marker);
            let cmd = screen.commands().lookup_command(name, false)?;
            screen.append_styled(&out, cmd.usage(), styles::prompt());
            screen.append_line(&out, &format!("  {}", cmd.description()));
        }
        None => {
            for cmd in screen.commands().all_commands() {
                screen.append_line(&out, &format!("{:<18} {}", cmd.usage(), cmd.description()));
            }
        }
    }
    Ok(())
}

pub fn scratch(name: &str) -> switchboard_tui::BufferBuilder {
    Buffer::builder(name)
        .descr("scratch")
        .command_table(BUFFER_TABLE, None)
        .on_input(|screen, buffer, text| {
            screen.append_line(buffer, text);
            Ok(())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_tui::{Dispatch, HeadlessSurface, PlainTheme, ScreenOptions, TextLine};

    fn setup() -> (Arc<Screen>, Arc<Buffer>) {
        let (surface, _probe) = HeadlessSurface::new(60, 20).unwrap();
        let screen =
            Screen::new(Box::new(surface), Box::new(PlainTheme), ScreenOptions::default()).unwrap();
        let status = screen.create_buffer(Buffer::builder("status"));
        screen.display_buffer(&status);
        install(&screen, &status).unwrap();
        (screen, status)
    }

    #[test]
    fn help_describes_one_command() {
        let (screen, status) = setup();
        assert_eq!(screen.commands().run_command(&screen, "help /move"), Dispatch::Handled);
        let text: Vec<_> = status.lines().iter().map(TextLine::text).collect();
        assert_eq!(text, vec!["/move [old] new", "  Change the number of a buffer"]);
    }

    #[test]
    fn help_for_unknown_command_fails() {
        let (screen, _) = setup();
        assert_eq!(screen.commands().run_command(&screen, "help nothing"), Dispatch::Failed);
    }

    #[test]
    fn new_opens_and_shows_scratch_buffer() {
        let (screen, _) = setup();
        screen.commands().run_command(&screen, "new notes");
        let current = screen.current_buffer().unwrap();
        assert_eq!(current.name(), "notes");
        screen.user_input("remember milk");
        assert_eq!(current.lines()[0].text(), "remember milk");
    }

    #[test]
    fn quit_and_alias_request_quit() {
        let (screen, _) = setup();
        screen.commands().run_command(&screen, "exit");
        assert!(screen.quit_requested());
    }
}
