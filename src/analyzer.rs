//! The analysis pipeline
//!
//! [`DtdAnalyzer`] wires the stages together: collect events from a source,
//! build the declaration graph, optionally compute the declarations
//! reachable from a set of roots, and hand the result to the serializer.

use std::io::Write;

use tracing::{debug, warn};

use crate::collector::{collect, RawLog};
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::limits::Limits;
use crate::model::{DeclarationGraph, ModelBuilder};
use crate::reachability::{ReachabilityAnalyzer, ReachableSet};
use crate::serializer::ModelSerializer;
use crate::source::EventSource;

/// Options of an analysis run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyzerOptions {
    /// Free-form title embedded in the output
    pub title: Option<String>,
    /// Root elements for reachability filtering; empty means no filtering
    pub roots: Vec<String>,
    /// Processing limits
    pub limits: Limits,
}

impl AnalyzerOptions {
    /// Default options: no title, no filtering, default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Add root elements. Each item may hold several whitespace-separated names.
    pub fn with_roots<I, S>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for root in roots {
            self.roots
                .extend(root.as_ref().split_whitespace().map(str::to_string));
        }
        self
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}

/// Result of an analysis run
#[derive(Debug, Clone)]
pub struct Analysis {
    /// The declaration graph
    pub graph: DeclarationGraph,
    /// Everything non-fatal that was found
    pub diagnostics: Diagnostics,
    /// Reachable declarations, when filtering was requested and succeeded
    pub reachable: Option<ReachableSet>,
    /// Output title
    pub title: Option<String>,
    /// The source stopped at the end of the DTD before the end of its input
    pub stopped_early: bool,
}

impl Analysis {
    /// A serializer configured with this analysis' title and filter
    pub fn serializer(&self) -> ModelSerializer<'_> {
        let mut serializer = ModelSerializer::new(&self.graph);
        if let Some(title) = &self.title {
            serializer = serializer.with_title(title);
        }
        if let Some(reachable) = &self.reachable {
            serializer = serializer.with_filter(reachable);
        }
        serializer
    }

    /// Stream the model as XML
    pub fn write_xml<W: Write>(&self, writer: W) -> Result<()> {
        self.serializer().write(writer)
    }

    /// Serialize the model as an XML string
    pub fn to_xml_string(&self) -> Result<String> {
        self.serializer().to_xml_string()
    }
}

/// Runs the collect, build and filter stages
#[derive(Debug, Clone, Default)]
pub struct DtdAnalyzer {
    options: AnalyzerOptions,
}

impl DtdAnalyzer {
    /// Create an analyzer
    pub fn new(options: AnalyzerOptions) -> Self {
        Self { options }
    }

    /// The options of this analyzer
    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    /// Run `source` and analyze what it reports.
    ///
    /// Fails only if the source fails; early termination with
    /// [`Error::EndOfDtd`](crate::Error::EndOfDtd) is normal completion.
    pub fn analyze(&self, source: &mut dyn EventSource) -> Result<Analysis> {
        let log = collect(source)?;
        Ok(self.analyze_log(&log))
    }

    /// Analyze an already collected event log
    pub fn analyze_log(&self, log: &RawLog) -> Analysis {
        let built = ModelBuilder::new()
            .with_limits(self.options.limits.clone())
            .build(log);
        let graph = built.graph;
        let mut diagnostics = built.diagnostics;

        let reachable = if self.options.roots.is_empty() {
            None
        } else {
            let analyzer = ReachabilityAnalyzer::new(&graph);
            match analyzer.analyze(self.options.roots.as_slice(), &mut diagnostics) {
                Ok(set) => Some(set),
                Err(err) => {
                    warn!("{}; writing unfiltered output", err);
                    None
                }
            }
        };

        debug!(
            diagnostics = diagnostics.len(),
            filtered = reachable.is_some(),
            "analysis finished"
        );

        Analysis {
            graph,
            diagnostics,
            reachable,
            title: self.options.title.clone(),
            stopped_early: log.stopped_early,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{DeclarationEvent, EventStream};
    use crate::diagnostics::DiagnosticKind;

    fn stream() -> EventStream {
        EventStream::new(vec![
            DeclarationEvent::Element {
                name: "book".into(),
                content_model: "(chapter+)".into(),
            },
            DeclarationEvent::Element {
                name: "chapter".into(),
                content_model: "(#PCDATA)".into(),
            },
            DeclarationEvent::Element {
                name: "footnote".into(),
                content_model: "(#PCDATA)".into(),
            },
        ])
    }

    #[test]
    fn test_roots_are_split_on_whitespace() {
        let options = AnalyzerOptions::new().with_roots(["book  article", "para"]);
        assert_eq!(options.roots, vec!["book", "article", "para"]);
    }

    #[test]
    fn test_unfiltered_analysis() {
        let analysis = DtdAnalyzer::new(AnalyzerOptions::new().with_title("Books"))
            .analyze(&mut stream())
            .unwrap();

        assert!(analysis.reachable.is_none());
        assert_eq!(analysis.graph.element_count(), 3);
        let xml = analysis.to_xml_string().unwrap();
        assert!(xml.contains("<title>Books</title>"));
        assert!(xml.contains("footnote"));
    }

    #[test]
    fn test_filtered_analysis() {
        let analysis = DtdAnalyzer::new(AnalyzerOptions::new().with_roots(["book"]))
            .analyze(&mut stream())
            .unwrap();

        let xml = analysis.to_xml_string().unwrap();
        assert!(xml.contains("<reachability roots=\"book\"/>"));
        assert!(xml.contains("<element name=\"chapter\""));
        assert!(!xml.contains("footnote"));
    }

    #[test]
    fn test_unresolvable_roots_fall_back_to_unfiltered() {
        let analysis = DtdAnalyzer::new(AnalyzerOptions::new().with_roots(["missing"]))
            .analyze(&mut stream())
            .unwrap();

        assert!(analysis.reachable.is_none());
        assert_eq!(
            analysis.diagnostics.of_kind(DiagnosticKind::DanglingRoot).count(),
            1
        );
        assert!(analysis.to_xml_string().unwrap().contains("footnote"));
    }

    #[test]
    fn test_early_stop_is_reported() {
        let analysis = DtdAnalyzer::default()
            .analyze(&mut stream().with_stop_after(1))
            .unwrap();

        assert!(analysis.stopped_early);
        assert_eq!(analysis.graph.element_count(), 1);
    }
}
