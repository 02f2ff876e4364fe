//! Terminal multiplexing core: numbered buffers shown in stacked windows,
//! prioritised command tables and a command line that doubles as a modal
//! question prompt.
mod args;
mod buffer;
mod cmdtable;
mod error;
mod feeders;
mod input;
mod question;
mod screen;
pub mod styles;
mod surface;
mod theme;
mod transcript;
mod view;
mod window;

pub use args::CommandArgs;
pub use buffer::{
    Activity, Buffer, BufferBuilder, BufferId, BufferRegistry, InputHook, MAX_BUFFERS, ObserverId,
};
pub use cmdtable::{Command, CommandRegistry, CommandTable, DefaultHandler, Dispatch, Handler, Receiver};
pub use error::{Result, UiError};
pub use feeders::{dispatch_event, run_input_loop, spawn_input_loop};
pub use input::{InputController, KeyAction, LineEditor, elide_middle};
pub use question::{
    AbortHandler, Answer, AnswerHandler, Question, QuestionBuilder, QuestionInput, QuestionKind,
    QuestionView, Token,
};
pub use screen::{BUFFER_TABLE, SCREEN_TABLE, Screen, ScreenOptions};
pub use surface::{CrosstermSurface, HeadlessProbe, HeadlessSurface, Surface};
pub use theme::{PlainTheme, Theme, value_text};
pub use transcript::{Segment, TextLine};
pub use view::{InputSnap, ViewSnap, WindowSnap};
pub use window::{Window, WindowId};
