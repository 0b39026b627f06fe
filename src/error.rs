//! Error types for xmlbind
//!
//! This module defines the crate-level error type. Recoverable anomalies
//! (unexpected elements, bad xsi:type values, leaf parse failures) never
//! surface here — they flow through the [`EventSink`](crate::events::EventSink)
//! collaborator instead. An `Error` value always terminates the current
//! unmarshal call.

use thiserror::Error;

use crate::events::ValidationEvent;

/// Result type alias using xmlbind Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xmlbind operations
#[derive(Error, Debug)]
pub enum Error {
    /// The event sink vetoed further processing. The wrapped event is the
    /// first one for which the sink returned "stop".
    #[error("unmarshalling aborted by event handler: {0}")]
    Aborted(ValidationEvent),

    /// A non-recoverable anomaly was raised mid-document
    #[error("fatal unmarshalling error: {0}")]
    Fatal(ValidationEvent),

    /// The result of an aborted or unfinished document was requested
    #[error("no unmarshalling result available: {0}")]
    NoResult(String),

    /// Binding registry error (unknown type token, malformed binding)
    #[error("binding error: {0}")]
    Binding(String),

    /// XML parsing error from an upstream source
    #[error("XML error: {0}")]
    Xml(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::Xml(e.to_string())
    }
}

impl Error {
    /// Whether this error represents an aborted document (the sink said
    /// "stop") rather than an internal failure.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Aborted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Severity, ValidationEvent};

    #[test]
    fn test_aborted_classification() {
        let event = ValidationEvent::new(Severity::Error, "boom");
        let err = Error::Aborted(event);
        assert!(err.is_aborted());
        assert!(!Error::Other("x".into()).is_aborted());
    }

    #[test]
    fn test_display_includes_message() {
        let event = ValidationEvent::new(Severity::Fatal, "corrupt state");
        let err = Error::Fatal(event);
        assert!(err.to_string().contains("corrupt state"));
    }
}
