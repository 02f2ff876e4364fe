//! Named, prioritised command tables and the dispatch walk over them.
//!
//! Tables are kept sorted by descending priority; ties keep arrival order.
//! Only active tables take part in dispatch, and the first active table that
//! knows a command wins, so a higher priority table shadows lower ones.
use crate::args::CommandArgs;
use crate::error::{Result, UiError, run_guarded};
use crate::screen::Screen;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Object a table's handlers are invoked on, compared by identity.
#[derive(Clone)]
pub struct Receiver(Arc<dyn Any + Send + Sync>);

impl Receiver {
    pub fn new<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self(value)
    }

    /// A receiver carrying no state, for tables whose handlers only need the screen.
    pub fn unit() -> Self {
        Self(Arc::new(()))
    }

    pub fn same(&self, other: &Receiver) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.0) as *const (),
            Arc::as_ptr(&other.0) as *const (),
        )
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.0.clone().downcast::<T>().ok()
    }
}

impl fmt::Debug for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Receiver({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

pub type Handler = Arc<dyn Fn(&Screen, &Receiver, &mut CommandArgs) -> Result<()> + Send + Sync>;

/// Consumes lines no active table knows. Returns `true` when it took the line.
pub type DefaultHandler = Arc<dyn Fn(&Screen, &str, &mut CommandArgs) -> Result<bool> + Send + Sync>;

pub struct Command {
    name: String,
    handler: Handler,
    usage: String,
    description: String,
    hints: Vec<String>,
}

impl Command {
    pub fn new<F>(name: &str, usage: &str, description: &str, handler: F) -> Self
    where
        F: Fn(&Screen, &Receiver, &mut CommandArgs) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.to_lowercase(),
            handler: Arc::new(handler),
            usage: usage.to_string(),
            description: description.to_string(),
            hints: Vec::new(),
        }
    }

    /// Command whose handler wants the table receiver as a concrete type.
    pub fn bound<T, F>(name: &str, usage: &str, description: &str, handler: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Screen, Arc<T>, &mut CommandArgs) -> Result<()> + Send + Sync + 'static,
    {
        let cmd_name = name.to_lowercase();
        let label = cmd_name.clone();
        Self::new(&cmd_name, usage, description, move |screen, receiver, args| {
            let target = receiver.downcast::<T>().ok_or_else(|| {
                UiError::Other(anyhow::anyhow!(
                    "receiver of /{label} is not a {}",
                    std::any::type_name::<T>()
                ))
            })?;
            handler(screen, target, args)
        })
    }

    /// Completion hints, e.g. `"buffer-number"`.
    pub fn with_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hints = hints.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn usage(&self) -> &str {
        &self.usage
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn hints(&self) -> &[String] {
        &self.hints
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Command(Arc<Command>),
    Alias(String),
}

#[derive(Debug, Clone)]
pub struct CommandTable {
    name: String,
    priority: i32,
    entries: BTreeMap<String, Entry>,
    active: bool,
    receiver: Option<Receiver>,
}

impl CommandTable {
    pub fn new(name: &str, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            entries: BTreeMap::new(),
            active: false,
            receiver: None,
        }
    }

    pub fn with(mut self, command: Command) -> Self {
        self.entries
            .insert(command.name.clone(), Entry::Command(Arc::new(command)));
        self
    }

    /// `alias` resolves to `target` of the same table.
    pub fn with_alias(mut self, alias: &str, target: &str) -> Self {
        self.entries
            .insert(alias.to_lowercase(), Entry::Alias(target.to_lowercase()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Command>> {
        match self.entries.get(name)? {
            Entry::Command(cmd) => Some(cmd.clone()),
            Entry::Alias(target) => match self.entries.get(target)? {
                Entry::Command(cmd) => Some(cmd.clone()),
                Entry::Alias(_) => None,
            },
        }
    }

    /// Primary commands, sorted by name.
    pub fn commands(&self) -> Vec<Arc<Command>> {
        self.entries
            .values()
            .filter_map(|e| match e {
                Entry::Command(cmd) => Some(cmd.clone()),
                Entry::Alias(_) => None,
            })
            .collect()
    }

    /// Every name the table answers to, aliases included.
    pub fn command_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Outcome of [`CommandRegistry::run_command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    Failed,
    NotFound,
}

#[derive(Default)]
pub struct CommandRegistry {
    tables: Mutex<Vec<CommandTable>>,
    default_handler: Mutex<Option<DefaultHandler>>,
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.tables.lock();
        let summary: Vec<_> = tables
            .iter()
            .map(|t| (t.name.as_str(), t.priority, t.active))
            .collect();
        f.debug_struct("CommandRegistry")
            .field("tables", &summary)
            .finish()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert before the first table of strictly lower priority.
    /// A table with the same name is replaced.
    pub fn install(&self, table: CommandTable) {
        let mut tables = self.tables.lock();
        tables.retain(|t| t.name != table.name);
        let pos = tables
            .iter()
            .position(|t| table.priority > t.priority)
            .unwrap_or(tables.len());
        debug!(table = %table.name, priority = table.priority, pos, "cmdtable.install");
        tables.insert(pos, table);
    }

    pub fn uninstall(&self, name: &str) {
        self.tables.lock().retain(|t| t.name != name);
    }

    /// Snapshot of an installed table.
    pub fn lookup_table(&self, name: &str) -> Result<CommandTable> {
        self.with_table(name, CommandTable::clone)
    }

    /// Table names in dispatch order.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.lock().iter().map(|t| t.name.clone()).collect()
    }

    pub fn is_active(&self, name: &str) -> Result<bool> {
        self.with_table(name, |t| t.active)
    }

    /// Receiver currently bound to `name`, if the table is active.
    pub fn receiver_of(&self, name: &str) -> Result<Option<Receiver>> {
        self.with_table(name, |t| t.receiver.clone())
    }

    pub fn activate(&self, name: &str, receiver: Receiver) -> Result<()> {
        let mut tables = self.tables.lock();
        let table = tables
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| UiError::TableNotFound(name.to_string()))?;
        table.active = true;
        table.receiver = Some(receiver);
        Ok(())
    }

    /// Clear the table's binding. When `receiver` is given and the table is
    /// bound to someone else, nothing changes.
    pub fn deactivate(&self, name: &str, receiver: Option<&Receiver>) {
        let mut tables = self.tables.lock();
        let Some(table) = tables.iter_mut().find(|t| t.name == name) else {
            return;
        };
        if let (Some(wanted), Some(bound)) = (receiver, table.receiver.as_ref()) {
            if !wanted.same(bound) {
                debug!(table = name, "cmdtable.deactivate.foreign_receiver");
                return;
            }
        }
        table.active = false;
        table.receiver = None;
    }

    pub fn lookup_command(&self, name: &str, active_only: bool) -> Result<Arc<Command>> {
        let name = name.to_lowercase();
        self.tables
            .lock()
            .iter()
            .filter(|t| !active_only || t.active)
            .find_map(|t| t.lookup(&name))
            .ok_or_else(|| UiError::CommandNotFound(name.clone()))
    }

    /// Names known to active tables, sorted and deduplicated.
    pub fn active_command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .lock()
            .iter()
            .filter(|t| t.active)
            .flat_map(|t| t.command_names())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Primary commands of all installed tables, in dispatch order.
    pub fn all_commands(&self) -> Vec<Arc<Command>> {
        self.tables
            .lock()
            .iter()
            .flat_map(|t| t.commands())
            .collect()
    }

    pub fn set_default_handler(&self, handler: Option<DefaultHandler>) {
        *self.default_handler.lock() = handler;
    }

    /// Dispatch one command line (without the command marker).
    ///
    /// Handler failures and panics are logged and reported as
    /// [`Dispatch::Failed`]; they never reach the caller.
    pub fn run_command(&self, screen: &Screen, line: &str) -> Dispatch {
        let line = line.trim_start();
        let split = line.find(char::is_whitespace).unwrap_or(line.len());
        let name = line[..split].to_lowercase();
        let mut args = CommandArgs::new(line[split..].trim_start());
        if name.is_empty() {
            return Dispatch::NotFound;
        }

        let found = {
            let tables = self.tables.lock();
            tables.iter().filter(|t| t.active).find_map(|t| {
                t.lookup(&name)
                    .map(|cmd| (cmd, t.receiver.clone().unwrap_or_else(Receiver::unit)))
            })
        };

        if let Some((cmd, receiver)) = found {
            debug!(command = %name, "command.run");
            let handler = cmd.handler.clone();
            return if run_guarded(&name, || handler(screen, &receiver, &mut args)) {
                Dispatch::Handled
            } else {
                Dispatch::Failed
            };
        }

        let fallback = self.default_handler.lock().clone();
        if let Some(handler) = fallback {
            let mut consumed = false;
            let ok = run_guarded(&name, || {
                consumed = handler(screen, &name, &mut args)?;
                Ok(())
            });
            if !ok {
                return Dispatch::Failed;
            }
            if consumed {
                return Dispatch::Handled;
            }
        }

        warn!(command = %name, "command.unknown");
        screen.beep();
        Dispatch::NotFound
    }

    fn with_table<R>(&self, name: &str, f: impl FnOnce(&CommandTable) -> R) -> Result<R> {
        self.tables
            .lock()
            .iter()
            .find(|t| t.name == name)
            .map(f)
            .ok_or_else(|| UiError::TableNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn noop(name: &str) -> Command {
        Command::new(name, &format!("/{name}"), "test command", |_, _, _| Ok(()))
    }

    #[test]
    fn install_orders_by_priority_and_keeps_ties_stable() {
        let reg = CommandRegistry::new();
        reg.install(CommandTable::new("low", 10));
        reg.install(CommandTable::new("high", 90));
        reg.install(CommandTable::new("mid-a", 50));
        reg.install(CommandTable::new("mid-b", 50));
        assert_eq!(reg.table_names(), vec!["high", "mid-a", "mid-b", "low"]);
    }

    #[test]
    fn lookup_and_uninstall_tables() {
        let reg = CommandRegistry::new();
        reg.install(CommandTable::new("chat", 50).with(noop("say")));
        let table = reg.lookup_table("chat").unwrap();
        assert_eq!(table.priority(), 50);
        assert!(table.lookup("say").is_some());
        reg.uninstall("chat");
        assert!(matches!(reg.lookup_table("chat"), Err(UiError::TableNotFound(_))));
    }

    #[test]
    fn activate_unknown_table_fails() {
        let reg = CommandRegistry::new();
        assert!(matches!(
            reg.activate("missing", Receiver::unit()),
            Err(UiError::TableNotFound(_))
        ));
    }

    #[test]
    fn deactivate_with_foreign_receiver_is_noop() {
        let reg = CommandRegistry::new();
        reg.install(CommandTable::new("chat", 50).with(noop("say")));
        let owner = Receiver::new(Arc::new(1_u32));
        let other = Receiver::new(Arc::new(2_u32));
        reg.activate("chat", owner.clone()).unwrap();

        reg.deactivate("chat", Some(&other));
        assert!(reg.is_active("chat").unwrap());
        assert!(reg.receiver_of("chat").unwrap().unwrap().same(&owner));

        reg.deactivate("chat", Some(&owner));
        assert!(!reg.is_active("chat").unwrap());
        assert!(reg.receiver_of("chat").unwrap().is_none());
    }

    #[test]
    fn deactivate_without_receiver_always_clears() {
        let reg = CommandRegistry::new();
        reg.install(CommandTable::new("chat", 50));
        reg.activate("chat", Receiver::unit()).unwrap();
        reg.deactivate("chat", None);
        assert!(!reg.is_active("chat").unwrap());
        reg.deactivate("missing", None);
    }

    #[test]
    fn aliases_resolve_and_are_hidden_from_commands() {
        let table = CommandTable::new("screen", 90)
            .with(noop("prev"))
            .with_alias("previous", "prev")
            .with_alias("dangling", "nothing");
        assert_eq!(table.lookup("previous").unwrap().name(), "prev");
        assert!(table.lookup("dangling").is_none());
        assert_eq!(
            table.commands().iter().map(|c| c.name()).collect::<Vec<_>>(),
            vec!["prev"]
        );
        assert_eq!(table.command_names(), vec!["dangling", "prev", "previous"]);
    }

    #[test]
    fn lookup_respects_activity_and_priority() {
        let reg = CommandRegistry::new();
        reg.install(
            CommandTable::new("low", 10).with(Command::new("close", "/close", "low", |_, _, _| Ok(()))),
        );
        reg.install(
            CommandTable::new("high", 90).with(Command::new("close", "/close", "high", |_, _, _| Ok(()))),
        );
        assert!(reg.lookup_command("close", true).is_err());
        assert_eq!(reg.lookup_command("CLOSE", false).unwrap().description(), "high");
        reg.activate("low", Receiver::unit()).unwrap();
        assert_eq!(reg.lookup_command("close", true).unwrap().description(), "low");
        assert_eq!(reg.active_command_names(), vec!["close"]);
    }

    #[test]
    fn receiver_downcast_matches_type() {
        let r = Receiver::new(Arc::new(String::from("hi")));
        assert_eq!(r.downcast::<String>().as_deref().map(String::as_str), Some("hi"));
        assert!(r.downcast::<u32>().is_none());
    }
}
