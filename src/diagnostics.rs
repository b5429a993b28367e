//! Non-fatal findings collected while building and analyzing a DTD model
//!
//! Declaration-scoped problems never abort the pipeline. They are recorded
//! as [`Diagnostic`]s next to the successfully built graph and reported to
//! the user as warnings.

use std::fmt;

/// Category of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// An element's content model could not be parsed
    ContentModelSyntax,
    /// An attribute-list record could not be parsed
    MalformedAttributeList,
    /// An entity record could not be parsed
    MalformedEntity,
    /// A notation record could not be parsed
    MalformedNotation,
    /// More than one ID-typed attribute declared for the same element
    DuplicateIdAttribute,
    /// A reference to an entity that is not declared (or cannot be expanded)
    UndeclaredEntity,
    /// A reachability root that is not declared in the graph
    DanglingRoot,
}

impl DiagnosticKind {
    /// Short identifier used in log output
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContentModelSyntax => "content-model-syntax",
            Self::MalformedAttributeList => "malformed-attribute-list",
            Self::MalformedEntity => "malformed-entity",
            Self::MalformedNotation => "malformed-notation",
            Self::DuplicateIdAttribute => "duplicate-id-attribute",
            Self::UndeclaredEntity => "undeclared-entity",
            Self::DanglingRoot => "dangling-root",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single non-fatal finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Category
    pub kind: DiagnosticKind,
    /// Human readable message
    pub message: String,
    /// Name of the declaration the finding is about, if any
    pub declaration: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            declaration: None,
        }
    }

    /// Set the declaration the diagnostic refers to
    pub fn with_declaration(mut self, name: impl Into<String>) -> Self {
        self.declaration = Some(name.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;

        if let Some(ref name) = self.declaration {
            write!(f, " (declaration '{}')", name)?;
        }

        Ok(())
    }
}

/// Ordered list of diagnostics that logs each entry as it is pushed
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic
    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(kind = %diagnostic.kind, "{}", diagnostic.message);
        self.entries.push(diagnostic);
    }

    /// Number of recorded diagnostics
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in recording order
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    /// Diagnostics of one kind
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.kind == kind)
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::new(DiagnosticKind::DanglingRoot, "root 'foo' is not declared")
            .with_declaration("foo");

        let msg = diag.to_string();
        assert!(msg.starts_with("[dangling-root]"));
        assert!(msg.contains("declaration 'foo'"));
    }

    #[test]
    fn test_of_kind() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::new(DiagnosticKind::DanglingRoot, "a"));
        diags.push(Diagnostic::new(DiagnosticKind::UndeclaredEntity, "b"));
        diags.push(Diagnostic::new(DiagnosticKind::DanglingRoot, "c"));

        assert_eq!(diags.len(), 3);
        assert_eq!(diags.of_kind(DiagnosticKind::DanglingRoot).count(), 2);
    }
}
