//! Validation events and the diagnostic sink
//!
//! Recoverable anomalies encountered while unmarshalling are reported as
//! [`ValidationEvent`]s through a caller-supplied [`EventSink`]. The sink's
//! boolean verdict decides whether processing continues; a "stop" verdict
//! marks the document aborted without unwinding the in-flight call stack.

use std::fmt;

/// Severity of a validation event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational anomaly, processing unaffected
    Warning,
    /// Recoverable anomaly; the offending subtree is discarded
    Error,
    /// Non-recoverable anomaly; the document cannot be completed
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Fatal => write!(f, "fatal"),
        }
    }
}

/// Source position attached to diagnostics.
///
/// Connectors fill in whatever their native parser exposes; absent fields
/// stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Locator {
    /// 1-based line number
    pub line: Option<usize>,
    /// 1-based column number
    pub column: Option<usize>,
    /// Byte offset into the source stream
    pub offset: Option<usize>,
}

impl Locator {
    /// Create an empty locator (no position information)
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Create a locator from a byte offset
    pub fn at_offset(offset: usize) -> Self {
        Self {
            offset: Some(offset),
            ..Self::default()
        }
    }

    /// Create a locator from a line/column pair
    pub fn at_position(line: usize, column: usize) -> Self {
        Self {
            line: Some(line),
            column: Some(column),
            offset: None,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column, self.offset) {
            (Some(l), Some(c), _) => write!(f, "line {}, column {}", l, c),
            (Some(l), None, _) => write!(f, "line {}", l),
            (None, _, Some(o)) => write!(f, "byte offset {}", o),
            _ => write!(f, "unknown position"),
        }
    }
}

/// A single diagnostic produced during unmarshalling
#[derive(Debug, Clone)]
pub struct ValidationEvent {
    /// Event severity
    pub severity: Severity,
    /// Human-readable message
    message: String,
    /// Source position where the anomaly was observed
    locator: Locator,
    /// The element or attribute involved, if known
    subject: Option<String>,
}

impl ValidationEvent {
    /// Create a new validation event
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            locator: Locator::unknown(),
            subject: None,
        }
    }

    /// Set the source position
    pub fn with_locator(mut self, locator: Locator) -> Self {
        self.locator = locator;
        self
    }

    /// Set the element or attribute the event refers to
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Get the event message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source position
    pub fn locator(&self) -> Locator {
        self.locator
    }

    /// Get the subject, if any
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }
}

impl fmt::Display for ValidationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;
        if let Some(ref subject) = self.subject {
            write!(f, " ({})", subject)?;
        }
        write!(f, " at {}", self.locator)
    }
}

/// Diagnostic sink collaborator.
///
/// Returns `true` to continue processing, `false` to stop. A "stop" verdict
/// on a recoverable event marks the document aborted; the terminal failure
/// is surfaced when the result is retrieved.
pub trait EventSink {
    /// Handle one validation event and return the continue verdict
    fn handle(&mut self, event: &ValidationEvent) -> bool;
}

/// Shared-sink support: a sink behind `Rc<RefCell<_>>` can be installed
/// while its owner keeps a handle for later inspection.
impl<S: EventSink> EventSink for std::rc::Rc<std::cell::RefCell<S>> {
    fn handle(&mut self, event: &ValidationEvent) -> bool {
        self.borrow_mut().handle(event)
    }
}

/// Default sink: records every event and always continues
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Vec<ValidationEvent>,
}

impl CollectingSink {
    /// Create an empty collecting sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far
    pub fn events(&self) -> &[ValidationEvent] {
        &self.events
    }

    /// Drain the recorded events
    pub fn take_events(&mut self) -> Vec<ValidationEvent> {
        std::mem::take(&mut self.events)
    }
}

impl EventSink for CollectingSink {
    fn handle(&mut self, event: &ValidationEvent) -> bool {
        self.events.push(event.clone());
        true
    }
}

/// Replace control characters with visible escapes so diagnostics that quote
/// document text stay printable.
pub fn sanitize_for_display(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\t' | '\n' | '\r' => out.push(ch),
            c if c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}
