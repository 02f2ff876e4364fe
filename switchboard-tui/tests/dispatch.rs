mod common;

use common::{screen, type_line};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use switchboard_tui::{
    Buffer, Command, CommandTable, Dispatch, Receiver, UiError, BUFFER_TABLE, SCREEN_TABLE,
};

fn recorder() -> (Arc<Mutex<Vec<String>>>, Arc<Mutex<Vec<String>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    (log.clone(), log)
}

fn recording(name: &str, tag: &'static str, log: Arc<Mutex<Vec<String>>>) -> Command {
    Command::new(name, name, tag, move |_, _, args| {
        log.lock().push(format!("{tag}:{}", args.all()));
        Ok(())
    })
}

#[test]
fn higher_priority_table_wins() {
    let (s, _) = screen(1);
    let (log, seen) = recorder();
    s.commands()
        .install(CommandTable::new("low", 50).with(recording("close", "low", log.clone())));
    s.commands()
        .install(CommandTable::new("high", 90).with(recording("close", "high", log)));
    s.commands().activate("low", Receiver::unit()).unwrap();
    s.commands().activate("high", Receiver::unit()).unwrap();

    assert_eq!(s.commands().run_command(&s, "CLOSE now"), Dispatch::Handled);
    assert_eq!(*seen.lock(), vec!["high:now"]);

    s.commands().deactivate("high", None);
    s.commands().run_command(&s, "close");
    assert_eq!(seen.lock().last().map(String::as_str), Some("low:"));
}

#[test]
fn builtin_tables_are_installed() {
    let (s, _) = screen(1);
    assert!(s.commands().is_active(SCREEN_TABLE).unwrap());
    assert!(!s.commands().is_active(BUFFER_TABLE).unwrap());
    let names = s.commands().active_command_names();
    for name in ["next", "prev", "previous", "nextbuf", "prevbuf", "move", "reorder", "beep"] {
        assert!(names.contains(&name.to_string()), "{name}");
    }
}

#[test]
fn buffer_table_follows_window() {
    let (s, _) = screen(1);
    let status = s.create_buffer(Buffer::builder("status").command_table(BUFFER_TABLE, None));
    assert!(!s.commands().is_active(BUFFER_TABLE).unwrap());
    s.display_buffer(&status);
    assert!(s.commands().is_active(BUFFER_TABLE).unwrap());

    let other = s.create_buffer(Buffer::builder("other"));
    s.commands().run_command(&s, "close");
    assert_eq!(status.number(), None);
    assert_eq!(s.current_buffer().map(|b| b.id()), None);
    assert!(!s.commands().is_active(BUFFER_TABLE).unwrap());
    assert_eq!(other.number(), Some(2));
}

#[test]
fn foreign_receiver_cannot_deactivate() {
    let (s, _) = screen(2);
    s.commands().install(CommandTable::new("chat", 50));
    let one = s.create_buffer(Buffer::builder("one").command_table("chat", None));
    let two = s.create_buffer(Buffer::builder("two").command_table("chat", None));
    let wins = s.windows();
    s.set_window_buffer(wins[0].id(), Some(&one));
    s.set_window_buffer(wins[1].id(), Some(&two));

    let owner = s.commands().receiver_of("chat").unwrap().unwrap();
    one.deactivate_command_table(s.commands());
    assert!(s.commands().is_active("chat").unwrap());
    assert!(s.commands().receiver_of("chat").unwrap().unwrap().same(&owner));
}

#[test]
fn unknown_command_beeps() {
    let (s, probe) = screen(1);
    assert_eq!(s.commands().run_command(&s, "frobnicate"), Dispatch::NotFound);
    assert_eq!(probe.bells(), 1);
    assert!(matches!(
        s.commands().lookup_command("frobnicate", true),
        Err(UiError::CommandNotFound(_))
    ));
}

#[test]
fn default_handler_takes_unknown_lines() {
    let (s, probe) = screen(1);
    let (log, seen) = recorder();
    s.commands().set_default_handler(Some(Arc::new(move |_, name, args| {
        log.lock().push(format!("{name} {}", args.all()));
        Ok(name == "me")
    })));
    assert_eq!(s.commands().run_command(&s, "me waves"), Dispatch::Handled);
    assert_eq!(s.commands().run_command(&s, "you"), Dispatch::NotFound);
    assert_eq!(*seen.lock(), vec!["me waves", "you "]);
    assert_eq!(probe.bells(), 1);
}

#[test]
fn failing_and_panicking_handlers_are_contained() {
    let (s, _) = screen(1);
    s.commands().install(
        CommandTable::new("bad", 10)
            .with(Command::new("fail", "/fail", "", |_, _, _| {
                Err(UiError::argument("nope"))
            }))
            .with(Command::new("boom", "/boom", "", |_, _, _| panic!("boom"))),
    );
    s.commands().activate("bad", Receiver::unit()).unwrap();
    assert_eq!(s.commands().run_command(&s, "fail"), Dispatch::Failed);
    assert_eq!(s.commands().run_command(&s, "boom"), Dispatch::Failed);
    assert_eq!(s.commands().run_command(&s, "next extra"), Dispatch::Failed);
}

#[test]
fn escaped_marker_is_plain_text() {
    let (s, probe) = screen(1);
    let (log, seen) = recorder();
    let chat = s.create_buffer(Buffer::builder("chat").on_input(move |_, _, text| {
        log.lock().push(text.to_string());
        Ok(())
    }));
    s.display_buffer(&chat);

    type_line(&s, "hello");
    type_line(&s, "\\/me is not a command");
    type_line(&s, "\\\\/still text");
    type_line(&s, "/beep");
    assert_eq!(
        *seen.lock(),
        vec!["hello", "/me is not a command", "\\/still text"]
    );
    assert_eq!(probe.bells(), 1);
}

#[test]
fn move_command_validates_arguments() {
    let (s, _) = screen(1);
    let a = s.create_buffer(Buffer::builder("a"));
    s.create_buffer(Buffer::builder("b"));
    assert_eq!(s.commands().run_command(&s, "move 1 2"), Dispatch::Handled);
    assert_eq!(a.number(), Some(2));
    assert_eq!(s.commands().run_command(&s, "move x"), Dispatch::Failed);
    assert_eq!(s.commands().run_command(&s, "move 1 2 3"), Dispatch::Failed);
    assert_eq!(s.commands().run_command(&s, "reorder"), Dispatch::Handled);
}

#[test]
fn move_to_huge_number_fails_without_growing() {
    let (s, _) = screen(1);
    let a = s.create_buffer(Buffer::builder("a"));
    assert_eq!(
        s.commands().run_command(&s, "move 1 2000000000000"),
        Dispatch::Failed
    );
    assert_eq!(a.number(), Some(1));
    assert_eq!(s.buffers().len(), 1);

    let limit = format!("move 1 {}", switchboard_tui::MAX_BUFFERS);
    assert_eq!(s.commands().run_command(&s, &limit), Dispatch::Handled);
    assert_eq!(a.number(), Some(switchboard_tui::MAX_BUFFERS));
}
