//! Reachability analysis
//!
//! Starting from a set of root elements, walk content models breadth-first
//! and collect every declaration the roots depend on: elements named in
//! content models, the attributes of every visited element, notations named
//! by NOTATION attributes, and general entities named by ENTITY/ENTITIES
//! defaults or referenced inside default values. Unparsed entities pull in
//! their notation, and internal entities pull in the entities their
//! replacement text references.
//!
//! The graph is never modified; the result is applied as a filter when the
//! model is serialized.

use std::collections::{BTreeSet, HashSet, VecDeque};

use tracing::debug;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::{Error, Result};
use crate::model::{
    AttributeDeclaration, AttributeType, DeclarationGraph, DeclarationKey, EntityKind,
    EntityScope,
};
use crate::syntax::entity_references;

/// The declarations reachable from a set of roots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReachableSet {
    roots: Vec<String>,
    keys: BTreeSet<DeclarationKey>,
}

impl ReachableSet {
    /// Create an empty set for the given roots
    pub fn new(roots: Vec<String>) -> Self {
        Self {
            roots,
            keys: BTreeSet::new(),
        }
    }

    /// A set containing every declaration of `graph`
    pub fn everything(graph: &DeclarationGraph) -> Self {
        let roots = graph.elements().map(|e| e.name.clone()).collect();
        Self {
            roots,
            keys: graph.keys().collect(),
        }
    }

    /// Root element names the set was computed from
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Add a key, returning `true` if it was not present
    pub fn insert(&mut self, key: DeclarationKey) -> bool {
        self.keys.insert(key)
    }

    /// Check if a declaration is reachable
    pub fn contains(&self, key: &DeclarationKey) -> bool {
        self.keys.contains(key)
    }

    /// Check if an element is reachable
    pub fn contains_element(&self, name: &str) -> bool {
        self.contains(&DeclarationKey::element(name))
    }

    /// Reachable keys in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &DeclarationKey> {
        self.keys.iter()
    }

    /// Number of reachable declarations
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if nothing is reachable
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<DeclarationKey> for ReachableSet {
    fn from_iter<I: IntoIterator<Item = DeclarationKey>>(iter: I) -> Self {
        Self {
            roots: Vec::new(),
            keys: iter.into_iter().collect(),
        }
    }
}

/// Computes [`ReachableSet`]s over a declaration graph
#[derive(Debug)]
pub struct ReachabilityAnalyzer<'a> {
    graph: &'a DeclarationGraph,
}

impl<'a> ReachabilityAnalyzer<'a> {
    /// Create an analyzer for `graph`
    pub fn new(graph: &'a DeclarationGraph) -> Self {
        Self { graph }
    }

    /// Compute everything reachable from `roots`.
    ///
    /// Roots that are not declared are reported as [`DiagnosticKind::DanglingRoot`]
    /// and skipped. Fails if `roots` is empty or none of them is declared.
    pub fn analyze<S: AsRef<str>>(
        &self,
        roots: &[S],
        diagnostics: &mut Diagnostics,
    ) -> Result<ReachableSet> {
        if roots.is_empty() {
            return Err(Error::Reachability("no root elements given".to_string()));
        }

        let mut set = ReachableSet::new(roots.iter().map(|r| r.as_ref().to_string()).collect());
        let mut queue: VecDeque<&'a str> = VecDeque::new();
        let mut visited: HashSet<&'a str> = HashSet::new();

        for root in roots {
            let root = root.as_ref();
            match self.graph.element(root) {
                Some(decl) => {
                    if visited.insert(decl.name.as_str()) {
                        queue.push_back(decl.name.as_str());
                    }
                }
                None => diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::DanglingRoot,
                        format!("root element '{}' is not declared", root),
                    )
                    .with_declaration(root),
                ),
            }
        }

        if queue.is_empty() {
            return Err(Error::Reachability(format!(
                "none of the root elements is declared: {}",
                set.roots.join(", ")
            )));
        }

        let mut entities: Vec<&'a str> = Vec::new();

        while let Some(name) = queue.pop_front() {
            let Some(element) = self.graph.element(name) else {
                // referenced from a content model but never declared
                continue;
            };
            set.insert(DeclarationKey::element(name));

            for child in element.content.element_names() {
                if let Some(child) = self.graph.element(child) {
                    if visited.insert(child.name.as_str()) {
                        queue.push_back(child.name.as_str());
                    }
                }
            }

            for attribute in self.graph.attributes_of(name) {
                set.insert(DeclarationKey::attribute(&attribute.element, &attribute.name));
                self.attribute_dependencies(attribute, &mut set, &mut entities);
            }
        }

        self.close_entities(entities, &mut set);

        debug!(
            roots = set.roots.len(),
            reachable = set.len(),
            "reachability analysis finished"
        );

        Ok(set)
    }

    fn attribute_dependencies(
        &self,
        attribute: &'a AttributeDeclaration,
        set: &mut ReachableSet,
        entities: &mut Vec<&'a str>,
    ) {
        if let AttributeType::Notation(names) = &attribute.attribute_type {
            for name in names {
                if self.graph.notation(name).is_some() {
                    set.insert(DeclarationKey::notation(name));
                }
            }
        }

        if matches!(
            attribute.attribute_type,
            AttributeType::Entity | AttributeType::Entities
        ) {
            if let Some(value) = attribute.default.value() {
                entities.extend(value.split_whitespace());
            }
        }

        entities.extend(attribute.referenced_entities.iter().map(String::as_str));
    }

    /// Mark general entities and whatever they reference in turn
    fn close_entities(&self, mut pending: Vec<&'a str>, set: &mut ReachableSet) {
        let mut seen: HashSet<&'a str> = HashSet::new();

        while let Some(name) = pending.pop() {
            if !seen.insert(name) {
                continue;
            }
            let Some(entity) = self.graph.entity(EntityScope::General, name) else {
                continue;
            };
            set.insert(DeclarationKey::general_entity(name));

            if let EntityKind::Internal(value) = &entity.kind {
                pending.extend(entity_references(value));
            }
            if let Some(notation) = entity.notation() {
                if self.graph.notation(notation).is_some() {
                    set.insert(DeclarationKey::notation(notation));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{DeclarationEvent, RawLog};
    use crate::model::ModelBuilder;

    fn graph(events: &[(&str, &str, &str)]) -> DeclarationGraph {
        let events = events
            .iter()
            .map(|&(kind, name, body)| match kind {
                "element" => DeclarationEvent::Element {
                    name: name.into(),
                    content_model: body.into(),
                },
                "attlist" => DeclarationEvent::AttributeList {
                    element: name.into(),
                    definitions: body.into(),
                },
                "entity" => DeclarationEvent::Entity {
                    name: name.into(),
                    scope: EntityScope::General,
                    definition: body.into(),
                },
                "pentity" => DeclarationEvent::Entity {
                    name: name.into(),
                    scope: EntityScope::Parameter,
                    definition: body.into(),
                },
                "notation" => DeclarationEvent::Notation {
                    name: name.into(),
                    external_id: body.into(),
                },
                other => panic!("unknown event kind {}", other),
            })
            .collect();
        ModelBuilder::new()
            .build(&RawLog {
                events,
                stopped_early: false,
            })
            .graph
    }

    fn book_graph() -> DeclarationGraph {
        graph(&[
            ("element", "book", "(chapter+)"),
            ("element", "chapter", "(para*)"),
            ("element", "para", "(#PCDATA|emph)*"),
            ("element", "footnote", "(#PCDATA)"),
            ("attlist", "chapter", "id ID #REQUIRED"),
            ("attlist", "footnote", "mark CDATA '*'"),
        ])
    }

    #[test]
    fn test_book_reachability() {
        let graph = book_graph();
        let mut diagnostics = Diagnostics::new();
        let set = ReachabilityAnalyzer::new(&graph)
            .analyze(&["book"], &mut diagnostics)
            .unwrap();

        assert!(set.contains_element("book"));
        assert!(set.contains_element("chapter"));
        assert!(set.contains_element("para"));
        assert!(!set.contains_element("footnote"));
        // undeclared children are never marked
        assert!(!set.contains_element("emph"));
        assert!(set.contains(&DeclarationKey::attribute("chapter", "id")));
        assert!(!set.contains(&DeclarationKey::attribute("footnote", "mark")));
        assert!(diagnostics.is_empty());
        assert_eq!(set.roots(), ["book".to_string()]);
    }

    #[test]
    fn test_recursive_model_terminates() {
        let graph = graph(&[("element", "subsection", "(title, subsection*)")]);
        let mut diagnostics = Diagnostics::new();
        let set = ReachabilityAnalyzer::new(&graph)
            .analyze(&["subsection"], &mut diagnostics)
            .unwrap();

        assert_eq!(set.len(), 1);
        assert!(set.contains_element("subsection"));
    }

    #[test]
    fn test_dangling_roots() {
        let graph = book_graph();
        let mut diagnostics = Diagnostics::new();
        let set = ReachabilityAnalyzer::new(&graph)
            .analyze(&["nope", "footnote"], &mut diagnostics)
            .unwrap();

        assert!(set.contains_element("footnote"));
        assert_eq!(diagnostics.of_kind(DiagnosticKind::DanglingRoot).count(), 1);

        let mut diagnostics = Diagnostics::new();
        let err = ReachabilityAnalyzer::new(&graph)
            .analyze(&["nope"], &mut diagnostics)
            .unwrap_err();
        assert!(matches!(err, Error::Reachability(_)));

        let empty: [&str; 0] = [];
        assert!(ReachabilityAnalyzer::new(&graph)
            .analyze(&empty, &mut diagnostics)
            .is_err());
    }

    #[test]
    fn test_entities_and_notations() {
        let graph = graph(&[
            ("notation", "gif", "SYSTEM 'image/gif'"),
            ("notation", "png", "SYSTEM 'image/png'"),
            ("notation", "tex", "SYSTEM 'tex'"),
            ("entity", "logo", "SYSTEM 'logo.gif' NDATA gif"),
            ("entity", "org", "'ACME'"),
            ("entity", "full", "'&org; Ltd'"),
            ("entity", "unused", "'x'"),
            ("pentity", "common", "'id ID #IMPLIED'"),
            ("element", "doc", "(figure)"),
            ("element", "figure", "EMPTY"),
            (
                "attlist",
                "figure",
                "src ENTITY 'logo' fmt NOTATION (png) #IMPLIED owner CDATA '&full;'",
            ),
        ]);

        let mut diagnostics = Diagnostics::new();
        let set = ReachabilityAnalyzer::new(&graph)
            .analyze(&["doc"], &mut diagnostics)
            .unwrap();

        assert!(set.contains(&DeclarationKey::general_entity("logo")));
        assert!(set.contains(&DeclarationKey::notation("gif")));
        assert!(set.contains(&DeclarationKey::notation("png")));
        assert!(!set.contains(&DeclarationKey::notation("tex")));
        assert!(set.contains(&DeclarationKey::general_entity("full")));
        assert!(set.contains(&DeclarationKey::general_entity("org")));
        assert!(!set.contains(&DeclarationKey::general_entity("unused")));
        assert!(!set.contains(&DeclarationKey::parameter_entity("common")));
    }

    #[test]
    fn test_entities_default_names_every_entity() {
        let graph = graph(&[
            ("notation", "jpeg", "SYSTEM 'image/jpeg'"),
            ("notation", "svg", "SYSTEM 'image/svg+xml'"),
            ("notation", "tiff", "SYSTEM 'image/tiff'"),
            ("entity", "front", "SYSTEM 'front.jpg' NDATA jpeg"),
            ("entity", "back", "SYSTEM 'back.svg' NDATA svg"),
            ("entity", "spare", "SYSTEM 'spare.tif' NDATA tiff"),
            ("element", "gallery", "EMPTY"),
            ("attlist", "gallery", "shots ENTITIES '  front\n back '"),
        ]);

        let mut diagnostics = Diagnostics::new();
        let set = ReachabilityAnalyzer::new(&graph)
            .analyze(&["gallery"], &mut diagnostics)
            .unwrap();

        assert!(set.contains(&DeclarationKey::attribute("gallery", "shots")));
        assert!(set.contains(&DeclarationKey::general_entity("front")));
        assert!(set.contains(&DeclarationKey::general_entity("back")));
        assert!(set.contains(&DeclarationKey::notation("jpeg")));
        assert!(set.contains(&DeclarationKey::notation("svg")));
        assert!(!set.contains(&DeclarationKey::general_entity("spare")));
        assert!(!set.contains(&DeclarationKey::notation("tiff")));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_everything_covers_all_keys() {
        let graph = book_graph();
        let set = ReachableSet::everything(&graph);
        assert_eq!(set.len(), graph.keys().count());
        assert!(set.contains_element("footnote"));
    }
}
