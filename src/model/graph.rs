//! The declaration graph
//!
//! Declarations are stored per kind in insertion-ordered maps, so lookups
//! are by name while iteration follows the order in which declarations were
//! first encountered. Relationships between declarations (content models
//! naming elements, attributes naming entities) are never stored as links;
//! they are resolved by name against these indices.

use std::collections::HashMap;

use indexmap::IndexMap;

use super::declarations::{
    AttributeDeclaration, Comment, ElementDeclaration, EntityDeclaration, EntityScope,
    NotationDeclaration, ProcessingInstruction,
};

/// Identity of a declaration for reachability and filtering
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeclarationKey {
    /// Element type
    Element(String),
    /// Attribute of an element type
    Attribute {
        /// Owning element
        element: String,
        /// Attribute name
        name: String,
    },
    /// General or parameter entity
    Entity {
        /// Entity scope
        scope: EntityScope,
        /// Entity name
        name: String,
    },
    /// Notation
    Notation(String),
}

impl DeclarationKey {
    /// Key of an element declaration
    pub fn element(name: impl Into<String>) -> Self {
        Self::Element(name.into())
    }

    /// Key of an attribute declaration
    pub fn attribute(element: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Attribute {
            element: element.into(),
            name: name.into(),
        }
    }

    /// Key of a general entity declaration
    pub fn general_entity(name: impl Into<String>) -> Self {
        Self::Entity {
            scope: EntityScope::General,
            name: name.into(),
        }
    }

    /// Key of a parameter entity declaration
    pub fn parameter_entity(name: impl Into<String>) -> Self {
        Self::Entity {
            scope: EntityScope::Parameter,
            name: name.into(),
        }
    }

    /// Key of a notation declaration
    pub fn notation(name: impl Into<String>) -> Self {
        Self::Notation(name.into())
    }
}

/// All declarations of a DTD, indexed by name and kept in encounter order
#[derive(Debug, Clone, Default)]
pub struct DeclarationGraph {
    elements: IndexMap<String, ElementDeclaration>,
    attributes: IndexMap<(String, String), AttributeDeclaration>,
    /// Positions in `attributes`, grouped by owning element
    attributes_by_element: HashMap<String, Vec<usize>>,
    general_entities: IndexMap<String, EntityDeclaration>,
    parameter_entities: IndexMap<String, EntityDeclaration>,
    notations: IndexMap<String, NotationDeclaration>,
    comments: Vec<Comment>,
    processing_instructions: Vec<ProcessingInstruction>,
}

impl DeclarationGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an element declaration.
    ///
    /// A redeclaration replaces the content model but keeps the position and
    /// `dtd_order` of the first declaration. Returns `true` if the name was new.
    pub fn insert_element(&mut self, mut decl: ElementDeclaration) -> bool {
        match self.elements.get_mut(&decl.name) {
            Some(existing) => {
                decl.dtd_order = existing.dtd_order;
                *existing = decl;
                false
            }
            None => {
                self.elements.insert(decl.name.clone(), decl);
                true
            }
        }
    }

    /// Insert an attribute declaration, last-seen wins at the original position
    pub fn insert_attribute(&mut self, mut decl: AttributeDeclaration) -> bool {
        let key = (decl.element.clone(), decl.name.clone());
        match self.attributes.get_mut(&key) {
            Some(existing) => {
                decl.dtd_order = existing.dtd_order;
                *existing = decl;
                false
            }
            None => {
                let (index, _) = self.attributes.insert_full(key, decl);
                let element = self.attributes[index].element.clone();
                self.attributes_by_element
                    .entry(element)
                    .or_default()
                    .push(index);
                true
            }
        }
    }

    /// Insert an entity declaration. The first declaration of a name is
    /// binding; returns `false` (and keeps the original) on redeclaration.
    pub fn insert_entity(&mut self, decl: EntityDeclaration) -> bool {
        let map = match decl.scope {
            EntityScope::General => &mut self.general_entities,
            EntityScope::Parameter => &mut self.parameter_entities,
        };
        if map.contains_key(&decl.name) {
            return false;
        }
        map.insert(decl.name.clone(), decl);
        true
    }

    /// Insert a notation declaration, last-seen wins at the original position
    pub fn insert_notation(&mut self, mut decl: NotationDeclaration) -> bool {
        match self.notations.get_mut(&decl.name) {
            Some(existing) => {
                decl.dtd_order = existing.dtd_order;
                *existing = decl;
                false
            }
            None => {
                self.notations.insert(decl.name.clone(), decl);
                true
            }
        }
    }

    /// Record a comment
    pub fn push_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
    }

    /// Record a processing instruction
    pub fn push_processing_instruction(&mut self, pi: ProcessingInstruction) {
        self.processing_instructions.push(pi);
    }

    /// Look up an element declaration
    pub fn element(&self, name: &str) -> Option<&ElementDeclaration> {
        self.elements.get(name)
    }

    /// Look up an attribute declaration
    pub fn attribute(&self, element: &str, name: &str) -> Option<&AttributeDeclaration> {
        self.attributes
            .get(&(element.to_string(), name.to_string()))
    }

    /// Attributes declared for `element`, in declaration order
    pub fn attributes_of<'a>(
        &'a self,
        element: &str,
    ) -> impl Iterator<Item = &'a AttributeDeclaration> + 'a {
        self.attributes_by_element
            .get(element)
            .into_iter()
            .flatten()
            .filter_map(move |&index| self.attributes.get_index(index).map(|(_, decl)| decl))
    }

    /// Look up an entity declaration
    pub fn entity(&self, scope: EntityScope, name: &str) -> Option<&EntityDeclaration> {
        match scope {
            EntityScope::General => self.general_entities.get(name),
            EntityScope::Parameter => self.parameter_entities.get(name),
        }
    }

    /// Look up a notation declaration
    pub fn notation(&self, name: &str) -> Option<&NotationDeclaration> {
        self.notations.get(name)
    }

    /// Element declarations in encounter order
    pub fn elements(&self) -> impl Iterator<Item = &ElementDeclaration> {
        self.elements.values()
    }

    /// Attribute declarations in encounter order
    pub fn attributes(&self) -> impl Iterator<Item = &AttributeDeclaration> {
        self.attributes.values()
    }

    /// Entity declarations of one scope in encounter order
    pub fn entities(&self, scope: EntityScope) -> impl Iterator<Item = &EntityDeclaration> {
        match scope {
            EntityScope::General => self.general_entities.values(),
            EntityScope::Parameter => self.parameter_entities.values(),
        }
    }

    /// Notation declarations in encounter order
    pub fn notations(&self) -> impl Iterator<Item = &NotationDeclaration> {
        self.notations.values()
    }

    /// Comments in encounter order
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// Processing instructions in encounter order
    pub fn processing_instructions(&self) -> &[ProcessingInstruction] {
        &self.processing_instructions
    }

    /// Number of element declarations
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Number of attribute declarations
    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Number of entity declarations of one scope
    pub fn entity_count(&self, scope: EntityScope) -> usize {
        match scope {
            EntityScope::General => self.general_entities.len(),
            EntityScope::Parameter => self.parameter_entities.len(),
        }
    }

    /// Number of notation declarations
    pub fn notation_count(&self) -> usize {
        self.notations.len()
    }

    /// Keys of every declaration in the graph
    pub fn keys(&self) -> impl Iterator<Item = DeclarationKey> + '_ {
        let elements = self.elements.keys().map(DeclarationKey::element);
        let attributes = self
            .attributes
            .keys()
            .map(|(element, name)| DeclarationKey::attribute(element, name));
        let general = self.general_entities.keys().map(DeclarationKey::general_entity);
        let parameter = self
            .parameter_entities
            .keys()
            .map(DeclarationKey::parameter_entity);
        let notations = self.notations.keys().map(DeclarationKey::notation);

        elements
            .chain(attributes)
            .chain(general)
            .chain(parameter)
            .chain(notations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_model::ContentSpec;
    use crate::model::declarations::{AttributeType, DefaultMode, EntityKind};

    fn attribute(element: &str, name: &str, order: usize) -> AttributeDeclaration {
        AttributeDeclaration {
            element: element.to_string(),
            name: name.to_string(),
            attribute_type: AttributeType::CData,
            default: DefaultMode::Implied,
            referenced_entities: Vec::new(),
            dtd_order: order,
        }
    }

    #[test]
    fn test_element_redeclaration_keeps_position() {
        let mut graph = DeclarationGraph::new();
        assert!(graph.insert_element(ElementDeclaration::new("x", ContentSpec::Empty, 1)));
        assert!(graph.insert_element(ElementDeclaration::new("y", ContentSpec::Empty, 2)));
        assert!(!graph.insert_element(ElementDeclaration::new("x", ContentSpec::Any, 3)));

        let names: Vec<_> = graph.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);

        let x = graph.element("x").unwrap();
        assert_eq!(x.content, ContentSpec::Any);
        assert_eq!(x.dtd_order, 1);
    }

    #[test]
    fn test_attributes_of_element() {
        let mut graph = DeclarationGraph::new();
        graph.insert_attribute(attribute("a", "id", 1));
        graph.insert_attribute(attribute("b", "id", 2));
        graph.insert_attribute(attribute("a", "class", 3));

        let names: Vec<_> = graph.attributes_of("a").map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["id", "class"]);
        assert_eq!(graph.attributes_of("missing").count(), 0);
        assert!(graph.attribute("b", "id").is_some());
    }

    #[test]
    fn test_attribute_redeclaration_last_seen_wins() {
        let mut graph = DeclarationGraph::new();
        graph.insert_attribute(attribute("a", "id", 1));
        let mut later = attribute("a", "id", 5);
        later.default = DefaultMode::Required;
        assert!(!graph.insert_attribute(later));

        assert_eq!(graph.attribute_count(), 1);
        assert_eq!(graph.attributes_of("a").count(), 1);
        let decl = graph.attribute("a", "id").unwrap();
        assert_eq!(decl.default, DefaultMode::Required);
        assert_eq!(decl.dtd_order, 1);
    }

    #[test]
    fn test_entity_scopes_are_independent() {
        let mut graph = DeclarationGraph::new();
        let general = EntityDeclaration {
            name: "x".into(),
            scope: EntityScope::General,
            kind: EntityKind::Internal("g".into()),
            dtd_order: 1,
        };
        let mut parameter = general.clone();
        parameter.scope = EntityScope::Parameter;
        parameter.kind = EntityKind::Internal("p".into());

        assert!(graph.insert_entity(general.clone()));
        assert!(graph.insert_entity(parameter));
        assert!(!graph.insert_entity(EntityDeclaration {
            kind: EntityKind::Internal("second".into()),
            ..general
        }));

        assert_eq!(
            graph.entity(EntityScope::General, "x").unwrap().kind,
            EntityKind::Internal("g".into())
        );
        assert_eq!(
            graph.entity(EntityScope::Parameter, "x").unwrap().kind,
            EntityKind::Internal("p".into())
        );
    }

    #[test]
    fn test_keys_cover_every_kind() {
        let mut graph = DeclarationGraph::new();
        graph.insert_element(ElementDeclaration::new("e", ContentSpec::Empty, 1));
        graph.insert_attribute(attribute("e", "a", 2));
        graph.insert_notation(NotationDeclaration {
            name: "n".into(),
            external_id: Default::default(),
            dtd_order: 3,
        });

        let keys: Vec<_> = graph.keys().collect();
        assert_eq!(
            keys,
            vec![
                DeclarationKey::element("e"),
                DeclarationKey::attribute("e", "a"),
                DeclarationKey::notation("n"),
            ]
        );
    }
}
