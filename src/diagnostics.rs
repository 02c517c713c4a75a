//! Structured diagnostics shared by the stage components.
//!
//! Components never talk to the `log` facade directly. They hold a
//! [`Diagnostics`] handle carrying their component name and a shared sink, so a
//! host decides where events go (`LogSink`) and tests can capture them
//! (`RecordingSink`).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl From<Level> for log::Level {
    fn from(level: Level) -> Self {
        match level {
            Level::Info => log::Level::Info,
            Level::Warn => log::Level::Warn,
            Level::Error => log::Level::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub level: Level,
    pub component: &'static str,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}: {}", self.level, self.component, self.message)
    }
}

pub trait DiagnosticSink {
    fn emit(&self, diagnostic: Diagnostic);
}

/// Forwards every event to the `log` facade, using the component as target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn emit(&self, diagnostic: Diagnostic) {
        let level = log::Level::from(diagnostic.level);
        log::log!(target: diagnostic.component, level, "{}", diagnostic.message);
    }
}

/// Keeps every event in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Rc<RefCell<Vec<Diagnostic>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Diagnostic> {
        self.events.borrow().clone()
    }

    pub fn count(&self, level: Level) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.level == level)
            .count()
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.events
            .borrow()
            .iter()
            .any(|event| event.level == level && event.message.contains(needle))
    }
}

impl DiagnosticSink for RecordingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        self.events.borrow_mut().push(diagnostic);
    }
}

/// Per-component handle onto a shared sink.
#[derive(Clone)]
pub struct Diagnostics {
    component: &'static str,
    sink: Rc<dyn DiagnosticSink>,
}

impl Diagnostics {
    pub fn new(component: &'static str, sink: Rc<dyn DiagnosticSink>) -> Self {
        Self { component, sink }
    }

    pub fn to_log(component: &'static str) -> Self {
        Self::new(component, Rc::new(LogSink))
    }

    /// Same sink, different component name.
    pub fn scoped(&self, component: &'static str) -> Self {
        Self {
            component,
            sink: Rc::clone(&self.sink),
        }
    }

    pub fn emit(&self, level: Level, message: impl Into<String>) {
        self.sink.emit(Diagnostic {
            level,
            component: self.component,
            message: message.into(),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(Level::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(Level::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(Level::Error, message);
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}
