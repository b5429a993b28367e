//! # dtdanalyzer
//!
//! Converts an XML Document Type Definition into a structured declaration
//! model and serializes that model as XML for downstream transformation.
//!
//! ## Features
//!
//! - Content-model parsing into typed grammar trees (sequences, choices,
//!   occurrence indicators, mixed content)
//! - Order-preserving declaration collection from any event source
//! - Attribute default normalization and entity classification
//! - Reachability filtering from a set of root elements
//! - Canonical XML output of the (filtered) model
//! - A reference scanner for DTD files and XML documents with a DOCTYPE
//! - Protection against entity expansion attacks
//!
//! ## Example
//!
//! ```rust,no_run
//! use dtdanalyzer::{AnalyzerOptions, DtdAnalyzer, DtdScanner};
//!
//! # fn main() -> dtdanalyzer::Result<()> {
//! let mut scanner = DtdScanner::from_dtd_file("book.dtd")?;
//! let options = AnalyzerOptions::new()
//!     .with_title("Book DTD")
//!     .with_roots(["book"]);
//!
//! let analysis = DtdAnalyzer::new(options).analyze(&mut scanner)?;
//! for diagnostic in &analysis.diagnostics {
//!     eprintln!("warning: {}", diagnostic);
//! }
//! analysis.write_xml(std::io::stdout())?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod diagnostics;
pub mod error;
pub mod limits;

// Utilities
pub mod locations;
pub mod names;
pub mod syntax;

// Core pipeline
pub mod analyzer;
pub mod collector;
pub mod content_model;
pub mod model;
pub mod reachability;
pub mod serializer;

// Event sources
pub mod source;

// Re-exports for convenience
pub use analyzer::{Analysis, AnalyzerOptions, DtdAnalyzer};
pub use collector::{
    collect, DeclarationCollector, DeclarationEvent, DeclarationHandler, EventStream, RawLog,
};
pub use content_model::{ContentModelNode, ContentSpec, Occurrence};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use error::{Error, Result};
pub use limits::Limits;
pub use model::{DeclarationGraph, DeclarationKey, ModelBuilder};
pub use reachability::{ReachabilityAnalyzer, ReachableSet};
pub use serializer::ModelSerializer;
pub use source::{DtdScanner, EntityResolver, EventSource, FileResolver};

/// Version of the dtdanalyzer library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
