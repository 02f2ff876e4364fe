mod common;

use common::screen;
use pretty_assertions::assert_eq;
use switchboard_tui::{Activity, Buffer, Window};

#[test]
fn close_leaves_hole_until_reorder() {
    let (s, _) = screen(1);
    let a = s.create_buffer(Buffer::builder("A"));
    let b = s.create_buffer(Buffer::builder("B"));
    let c = s.create_buffer(Buffer::builder("C"));
    assert_eq!([a.number(), b.number(), c.number()], [Some(1), Some(2), Some(3)]);

    s.close_buffer(&b);
    assert_eq!(s.buffers().slots(), vec![Some(a.id()), None, Some(c.id())]);
    assert_eq!([a.number(), c.number()], [Some(1), Some(3)]);

    s.reorder();
    assert_eq!([a.number(), c.number()], [Some(1), Some(2)]);
    for (i, buf) in s.buffers().buffers().iter().enumerate() {
        assert_eq!(buf.number(), Some(i + 1));
    }
}

#[test]
fn move_and_move_back_restores_numbering() {
    let (s, _) = screen(1);
    let bufs: Vec<_> = ["a", "b", "c", "d"]
        .iter()
        .map(|n| s.create_buffer(Buffer::builder(*n)))
        .collect();
    let before: Vec<_> = bufs.iter().map(|b| b.number()).collect();
    for (x, y) in [(1, 4), (2, 3), (4, 6)] {
        s.move_buffer(x, y).unwrap_or_else(|e| panic!("move {x} {y}: {e}"));
        s.move_buffer(y, x).unwrap_or_else(|e| panic!("move {y} {x}: {e}"));
        let after: Vec<_> = bufs.iter().map(|b| b.number()).collect();
        assert_eq!(after, before);
    }
}

#[test]
fn number_zero_means_ten() {
    let (s, _) = screen(1);
    for i in 1..=10 {
        s.create_buffer(Buffer::builder(format!("b{i}")));
    }
    let zero = s.buffers().get_by_number(0).unwrap();
    let ten = s.buffers().get_by_number(10).unwrap();
    assert_eq!(zero.id(), ten.id());
    assert!(s.buffers().get_by_number(11).is_none());
}

#[test]
fn closing_shown_buffer_moves_window_to_earlier_hidden_one() {
    let (s, _) = screen(1);
    let a = s.create_buffer(Buffer::builder("A"));
    let b = s.create_buffer(Buffer::builder("B"));
    let w1 = s.focused_window().unwrap();
    s.display_buffer(&b);

    s.close_buffer(&b);
    assert_eq!(a.window(), Some(w1));
    assert_eq!(s.current_buffer().map(|x| x.id()), Some(a.id()));

    s.close_buffer(&a);
    assert!(s.windows()[0].buffer().is_none());
    assert!(s.current_buffer().is_none());
}

fn assert_links_agree(s: &switchboard_tui::Screen) {
    for win in s.windows() {
        if let Some(id) = win.buffer() {
            let buf = s.buffers().find(id).expect("window shows a registered buffer");
            assert_eq!(buf.window(), Some(win.id()), "{:?}", win.id());
        }
    }
    for buf in s.buffers().buffers() {
        if let Some(w) = buf.window() {
            let shown = s.windows().iter().find(|x| x.id() == w).and_then(Window::buffer);
            assert_eq!(shown, Some(buf.id()), "{:?}", buf.id());
        }
    }
}

#[test]
fn window_and_buffer_links_agree_after_structural_changes() {
    let (s, _) = screen(2);
    let a = s.create_buffer(Buffer::builder("A"));
    let b = s.create_buffer(Buffer::builder("B"));
    let c = s.create_buffer(Buffer::builder("C"));
    let ids: Vec<_> = s.windows().iter().map(Window::id).collect();
    s.set_window_buffer(ids[0], Some(&b));
    s.set_window_buffer(ids[1], Some(&c));
    assert_links_agree(&s);

    s.close_buffer(&b);
    assert_eq!(s.windows()[0].buffer(), Some(a.id()));
    assert_links_agree(&s);

    s.move_buffer(3, 5).unwrap();
    s.reorder();
    assert_links_agree(&s);

    s.close_buffer(&c);
    assert!(s.windows()[1].buffer().is_none());
    assert_links_agree(&s);
}

#[test]
fn display_buffer_is_idempotent() {
    let (s, _) = screen(2);
    let a = s.create_buffer(Buffer::builder("A"));
    let b = s.create_buffer(Buffer::builder("B"));
    let ids: Vec<_> = s.windows().iter().map(Window::id).collect();
    s.set_window_buffer(ids[1], Some(&b));

    let first = s.display_buffer(&a);
    let second = s.display_buffer(&a);
    assert_eq!(first, Some(ids[0]));
    assert_eq!(second, first);
    assert_eq!(s.windows()[1].buffer(), Some(b.id()));
}

#[test]
fn display_skips_locked_windows() {
    let (s, _) = screen(2);
    let ids: Vec<_> = s.windows().iter().map(Window::id).collect();
    s.set_window_locked(ids[0], true);
    let a = s.create_buffer(Buffer::builder("A"));
    assert_eq!(s.display_buffer(&a), Some(ids[1]));

    s.set_window_locked(ids[1], true);
    let b = s.create_buffer(Buffer::builder("B"));
    assert_eq!(s.display_buffer(&b), None);
}

#[test]
fn nextbuf_reassigns_focused_window() {
    let (s, probe) = screen(1);
    let a = s.create_buffer(Buffer::builder("A"));
    let b = s.create_buffer(Buffer::builder("B"));
    let w1 = s.focused_window().unwrap();
    s.display_buffer(&a);

    s.commands().run_command(&s, "nextbuf");
    assert_eq!(b.window(), Some(w1));
    assert_eq!(a.window(), None);
    assert_eq!(s.focused_window(), Some(w1));

    s.commands().run_command(&s, "prevbuf");
    assert_eq!(a.window(), Some(w1));
    assert_eq!(probe.bells(), 0);
}

#[test]
fn nextbuf_without_candidates_beeps() {
    let (s, probe) = screen(1);
    let a = s.create_buffer(Buffer::builder("A"));
    s.display_buffer(&a);
    s.nextbuf();
    assert_eq!(probe.bells(), 1);
    assert_eq!(s.current_buffer().map(|b| b.id()), Some(a.id()));
}

#[test]
fn hidden_buffer_collects_activity_until_shown() {
    let (s, probe) = screen(1);
    let shown = s.create_buffer(Buffer::builder("status"));
    let hidden = s.create_buffer(Buffer::builder("chat"));
    s.display_buffer(&shown);

    s.append_line(&hidden, "ping");
    assert_eq!(hidden.activity(), Activity::Unread);
    s.commit().unwrap();
    assert!(probe.shows("[Act: 2]"));

    s.show_buffer_number(2);
    assert_eq!(hidden.activity(), Activity::Quiet);
    s.commit().unwrap();
    assert!(probe.shows("ping"));
    assert!(!probe.shows("[Act:"));
}

#[test]
fn observers_see_structural_changes() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    let (s, _) = screen(1);
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let id = s.buffers().subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let a = s.create_buffer(Buffer::builder("A"));
    s.close_buffer(&a);
    s.reorder();
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    s.buffers().unsubscribe(id);
    s.create_buffer(Buffer::builder("B"));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}
