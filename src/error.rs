//! Error types for dtdanalyzer
//!
//! This module defines all error types used throughout the library.
//! Failures scoped to a single declaration are usually downgraded to
//! [`Diagnostic`](crate::diagnostics::Diagnostic)s by the model builder;
//! the variants here are what surfaces when an operation cannot continue.

use std::fmt;
use thiserror::Error;

/// Result type alias using dtdanalyzer Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dtdanalyzer operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed element content model
    #[error("content model error: {0}")]
    ContentModel(#[from] ContentModelError),

    /// Malformed attribute-list declaration
    #[error("attribute list error: {0}")]
    AttributeList(String),

    /// Malformed entity declaration
    #[error("entity error: {0}")]
    Entity(String),

    /// The upstream event source failed; no declaration can be trusted
    #[error("event source error: {0}")]
    EventSource(String),

    /// The event source intentionally stopped before the end of its input.
    ///
    /// This is not a failure: collectors treat it as normal completion.
    #[error("end of DTD")]
    EndOfDtd,

    /// None of the requested reachability roots could be analyzed
    #[error("reachability error: {0}")]
    Reachability(String),

    /// Resource loading error
    #[error("resource error: {0}")]
    Resource(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML writing error
    #[error("XML error: {0}")]
    Xml(String),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

/// Content model syntax error with the offending declaration attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentModelError {
    /// Name of the element whose content model failed to parse
    pub element: String,
    /// Raw content-model string as received from the event source
    pub spec: String,
    /// What went wrong
    pub message: String,
    /// Byte offset into the raw content model, if known
    pub position: Option<usize>,
}

impl ContentModelError {
    /// Create a new content model error
    pub fn new(
        element: impl Into<String>,
        spec: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            element: element.into(),
            spec: spec.into(),
            message: message.into(),
            position: None,
        }
    }

    /// Set the position of the offending token
    pub fn with_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }
}

impl fmt::Display for ContentModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "element '{}': {} in '{}'",
            self.element, self.message, self.spec
        )?;

        if let Some(pos) = self.position {
            write!(f, " (at offset {})", pos)?;
        }

        Ok(())
    }
}

impl std::error::Error for ContentModelError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_model_error_display() {
        let err = ContentModelError::new("book", "(a,|b)", "unexpected '|'").with_position(3);

        let msg = format!("{}", err);
        assert!(msg.contains("element 'book'"));
        assert!(msg.contains("unexpected '|'"));
        assert!(msg.contains("(a,|b)"));
        assert!(msg.contains("offset 3"));
    }

    #[test]
    fn test_error_conversion() {
        let cm_err = ContentModelError::new("x", "(", "unterminated group");
        let err: Error = cm_err.into();
        assert!(matches!(err, Error::ContentModel(_)));
    }

    #[test]
    fn test_end_of_dtd_display() {
        assert_eq!(Error::EndOfDtd.to_string(), "end of DTD");
    }
}
