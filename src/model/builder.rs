//! Model building
//!
//! The builder runs in two phases over a complete [`RawLog`]. The first
//! phase parses element, entity and notation records and carries comments
//! and processing instructions over. Attribute lists are deferred to the
//! second phase so that default values can be normalized against every
//! general entity in the log, regardless of declaration order.
//!
//! A malformed record never aborts the build: it is reported as a
//! [`Diagnostic`] and left out of the graph (elements are kept with an
//! [`ContentSpec::Invalid`] marker instead).

use indexmap::IndexMap;
use tracing::debug;

use crate::collector::{DeclarationEvent, RawLog};
use crate::content_model::{ContentModelParser, ContentSpec};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::limits::Limits;
use crate::syntax::{expand_char_refs, parse_entity_definition, parse_notation_id, EntityDefinition};

use super::attributes::parse_attribute_definitions;
use super::declarations::{
    AttributeDeclaration, AttributeType, Comment, DefaultMode, ElementDeclaration,
    EntityDeclaration, EntityKind, EntityScope, NotationDeclaration, ProcessingInstruction,
};
use super::graph::DeclarationGraph;
use super::values::ValueNormalizer;

/// Result of a build: the graph plus everything that was wrong with the input
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    /// The assembled declaration graph
    pub graph: DeclarationGraph,
    /// Declaration-scoped problems found while building
    pub diagnostics: Diagnostics,
}

/// Builds a [`DeclarationGraph`] from collected declaration events
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    limits: Limits,
}

struct PendingAttributeList<'a> {
    dtd_order: usize,
    element: &'a str,
    definitions: &'a str,
}

impl ModelBuilder {
    /// Create a builder with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limits applied to content models and entity expansion
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Build the graph for `log`
    pub fn build(&self, log: &RawLog) -> BuildOutput {
        let mut output = BuildOutput::default();
        let mut pending = Vec::new();

        for (index, event) in log.events.iter().enumerate() {
            let dtd_order = index + 1;
            match event {
                DeclarationEvent::Element {
                    name,
                    content_model,
                } => self.add_element(&mut output, name, content_model, dtd_order),
                DeclarationEvent::AttributeList {
                    element,
                    definitions,
                } => pending.push(PendingAttributeList {
                    dtd_order,
                    element,
                    definitions,
                }),
                DeclarationEvent::Entity {
                    name,
                    scope,
                    definition,
                } => self.add_entity(&mut output, name, *scope, definition, dtd_order),
                DeclarationEvent::Notation { name, external_id } => {
                    self.add_notation(&mut output, name, external_id, dtd_order)
                }
                DeclarationEvent::Comment { text } => output.graph.push_comment(Comment {
                    text: text.clone(),
                    dtd_order,
                }),
                DeclarationEvent::ProcessingInstruction { target, data } => {
                    output
                        .graph
                        .push_processing_instruction(ProcessingInstruction {
                            target: target.clone(),
                            data: data.clone(),
                            dtd_order,
                        })
                }
            }
        }

        for attlist in pending {
            self.add_attribute_list(&mut output, attlist);
        }

        check_id_attributes(&mut output);

        debug!(
            elements = output.graph.element_count(),
            attributes = output.graph.attribute_count(),
            general_entities = output.graph.entity_count(EntityScope::General),
            parameter_entities = output.graph.entity_count(EntityScope::Parameter),
            notations = output.graph.notation_count(),
            diagnostics = output.diagnostics.len(),
            "declaration graph built"
        );

        output
    }

    fn add_element(&self, output: &mut BuildOutput, name: &str, raw: &str, dtd_order: usize) {
        let content = match ContentModelParser::new(name, raw)
            .with_max_depth(self.limits.max_content_model_depth)
            .parse()
        {
            Ok(content) => content,
            Err(err) => {
                output.diagnostics.push(
                    Diagnostic::new(DiagnosticKind::ContentModelSyntax, err.to_string())
                        .with_declaration(name),
                );
                ContentSpec::Invalid {
                    raw: raw.trim().to_string(),
                    message: err.message,
                }
            }
        };

        if !output
            .graph
            .insert_element(ElementDeclaration::new(name, content, dtd_order))
        {
            debug!(element = name, "element redeclared, keeping the later content model");
        }
    }

    fn add_entity(
        &self,
        output: &mut BuildOutput,
        name: &str,
        scope: EntityScope,
        raw: &str,
        dtd_order: usize,
    ) {
        let malformed = |message: String| {
            Diagnostic::new(
                DiagnosticKind::MalformedEntity,
                format!("{} entity '{}': {}", scope, name, message),
            )
            .with_declaration(name)
        };

        let kind = match parse_entity_definition(raw) {
            Ok(EntityDefinition::Internal(value)) => EntityKind::Internal(expand_char_refs(&value)),
            Ok(EntityDefinition::External {
                notation: Some(_), ..
            }) if scope == EntityScope::Parameter => {
                output
                    .diagnostics
                    .push(malformed("NDATA is not allowed on parameter entities".to_string()));
                return;
            }
            Ok(EntityDefinition::External {
                external_id,
                notation,
            }) => EntityKind::External {
                external_id,
                notation,
            },
            Err(err) => {
                output.diagnostics.push(malformed(err.to_string()));
                return;
            }
        };

        let inserted = output.graph.insert_entity(EntityDeclaration {
            name: name.to_string(),
            scope,
            kind,
            dtd_order,
        });
        if !inserted {
            debug!(entity = name, %scope, "entity redeclared, keeping the first declaration");
        }
    }

    fn add_notation(&self, output: &mut BuildOutput, name: &str, raw: &str, dtd_order: usize) {
        match parse_notation_id(raw) {
            Ok(external_id) => {
                output.graph.insert_notation(NotationDeclaration {
                    name: name.to_string(),
                    external_id,
                    dtd_order,
                });
            }
            Err(err) => output.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::MalformedNotation,
                    format!("notation '{}': {}", name, err),
                )
                .with_declaration(name),
            ),
        }
    }

    fn add_attribute_list(&self, output: &mut BuildOutput, attlist: PendingAttributeList<'_>) {
        let definitions = match parse_attribute_definitions(attlist.element, attlist.definitions) {
            Ok(definitions) => definitions,
            Err(err) => {
                output.diagnostics.push(
                    Diagnostic::new(DiagnosticKind::MalformedAttributeList, err.to_string())
                        .with_declaration(attlist.element),
                );
                return;
            }
        };

        let mut declarations = Vec::with_capacity(definitions.len());
        {
            let normalizer = ValueNormalizer::new(&output.graph, &self.limits);
            for definition in definitions {
                let tokenized = definition.attribute_type.is_tokenized();
                let normalized = definition
                    .default
                    .value()
                    .map(|raw| normalizer.normalize(raw, tokenized));

                let (default, referenced_entities) = match normalized {
                    None => (definition.default, Vec::new()),
                    Some(Ok(value)) => {
                        for entity in &value.undeclared_entities {
                            output.diagnostics.push(
                                Diagnostic::new(
                                    DiagnosticKind::UndeclaredEntity,
                                    format!(
                                        "default value of attribute '{}' on '{}' references undeclared entity '{}'",
                                        definition.name, attlist.element, entity
                                    ),
                                )
                                .with_declaration(entity.as_str()),
                            );
                        }
                        let default = match definition.default {
                            DefaultMode::Fixed(_) => DefaultMode::Fixed(value.value),
                            _ => DefaultMode::Default(value.value),
                        };
                        (default, value.referenced_entities)
                    }
                    Some(Err(err)) => {
                        output.diagnostics.push(
                            Diagnostic::new(
                                DiagnosticKind::MalformedAttributeList,
                                format!(
                                    "default value of attribute '{}' on '{}': {}",
                                    definition.name, attlist.element, err
                                ),
                            )
                            .with_declaration(attlist.element),
                        );
                        continue;
                    }
                };

                declarations.push(AttributeDeclaration {
                    element: attlist.element.to_string(),
                    name: definition.name,
                    attribute_type: definition.attribute_type,
                    default,
                    referenced_entities,
                    dtd_order: attlist.dtd_order,
                });
            }
        }

        for declaration in declarations {
            output.graph.insert_attribute(declaration);
        }
    }
}

/// Report elements declaring more than one ID attribute (XML 1.0 §3.3.1)
fn check_id_attributes(output: &mut BuildOutput) {
    let mut ids: IndexMap<&str, Vec<&str>> = IndexMap::new();
    for attribute in output.graph.attributes() {
        if attribute.attribute_type == AttributeType::Id {
            ids.entry(&attribute.element)
                .or_default()
                .push(&attribute.name);
        }
    }

    let mut found = Vec::new();
    for (element, names) in ids {
        if names.len() > 1 {
            found.push(
                Diagnostic::new(
                    DiagnosticKind::DuplicateIdAttribute,
                    format!(
                        "element '{}' declares more than one ID attribute: {}",
                        element,
                        names.join(", ")
                    ),
                )
                .with_declaration(element),
            );
        }
    }

    for diagnostic in found {
        output.diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_model::{ContentModelNode, Occurrence};
    use crate::model::ExternalId;

    fn element(name: &str, model: &str) -> DeclarationEvent {
        DeclarationEvent::Element {
            name: name.into(),
            content_model: model.into(),
        }
    }

    fn attlist(element: &str, definitions: &str) -> DeclarationEvent {
        DeclarationEvent::AttributeList {
            element: element.into(),
            definitions: definitions.into(),
        }
    }

    fn entity(name: &str, scope: EntityScope, definition: &str) -> DeclarationEvent {
        DeclarationEvent::Entity {
            name: name.into(),
            scope,
            definition: definition.into(),
        }
    }

    fn build(events: Vec<DeclarationEvent>) -> BuildOutput {
        ModelBuilder::new().build(&RawLog {
            events,
            stopped_early: false,
        })
    }

    #[test]
    fn test_elements_and_order() {
        let output = build(vec![
            element("book", "(title, chapter+)"),
            element("title", "(#PCDATA)"),
            element("chapter", "(title, para*)"),
        ]);

        assert!(output.diagnostics.is_empty());
        let names: Vec<_> = output.graph.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["book", "title", "chapter"]);
        assert_eq!(output.graph.element("chapter").unwrap().dtd_order, 3);
    }

    #[test]
    fn test_redeclared_element_keeps_first_position() {
        let output = build(vec![
            element("x", "(a)"),
            element("y", "EMPTY"),
            element("x", "(b|c)"),
        ]);

        let names: Vec<_> = output.graph.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);

        let x = output.graph.element("x").unwrap();
        assert_eq!(x.dtd_order, 1);
        assert_eq!(
            x.content,
            ContentSpec::Children(ContentModelNode::choice(
                vec![
                    ContentModelNode::name("b", Occurrence::Once),
                    ContentModelNode::name("c", Occurrence::Once),
                ],
                Occurrence::Once
            ))
        );
    }

    #[test]
    fn test_invalid_content_model_is_kept_with_marker() {
        let output = build(vec![element("bad", "(a,|b)"), element("good", "EMPTY")]);

        assert_eq!(output.diagnostics.len(), 1);
        let diagnostic = output.diagnostics.iter().next().unwrap();
        assert_eq!(diagnostic.kind, DiagnosticKind::ContentModelSyntax);
        assert_eq!(diagnostic.declaration.as_deref(), Some("bad"));

        match &output.graph.element("bad").unwrap().content {
            ContentSpec::Invalid { raw, .. } => assert_eq!(raw, "(a,|b)"),
            other => panic!("expected invalid marker, got {:?}", other),
        }
        assert_eq!(output.graph.element("good").unwrap().content, ContentSpec::Empty);
    }

    #[test]
    fn test_malformed_attlist_does_not_block_others() {
        let output = build(vec![
            element("p", "(#PCDATA)"),
            attlist("p", "align (left|right"),
            attlist("p", "id ID #IMPLIED"),
            element("q", "EMPTY"),
        ]);

        assert_eq!(output.diagnostics.of_kind(DiagnosticKind::MalformedAttributeList).count(), 1);
        assert!(output.graph.attribute("p", "id").is_some());
        assert!(output.graph.attribute("p", "align").is_none());
        assert_eq!(output.graph.element_count(), 2);
    }

    #[test]
    fn test_attribute_defaults_are_normalized() {
        let output = build(vec![
            attlist(
                "p",
                "class NMTOKENS '  a\tb  ' title CDATA 'by &author;' lang CDATA #FIXED '&#x65;n'",
            ),
            entity("author", EntityScope::General, "'Jane &amp; John'"),
        ]);

        assert!(output.diagnostics.is_empty());
        let class = output.graph.attribute("p", "class").unwrap();
        assert_eq!(class.default, DefaultMode::Default("a b".into()));

        let title = output.graph.attribute("p", "title").unwrap();
        assert_eq!(title.default, DefaultMode::Default("by Jane & John".into()));
        assert_eq!(title.referenced_entities, vec!["author"]);
        assert_eq!(title.dtd_order, 1);

        let lang = output.graph.attribute("p", "lang").unwrap();
        assert_eq!(lang.default, DefaultMode::Fixed("en".into()));
    }

    #[test]
    fn test_undeclared_entity_in_default() {
        let output = build(vec![attlist("p", "title CDATA '&missing;'")]);

        let diagnostics: Vec<_> = output
            .diagnostics
            .of_kind(DiagnosticKind::UndeclaredEntity)
            .collect();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].declaration.as_deref(), Some("missing"));
        assert_eq!(
            output.graph.attribute("p", "title").unwrap().default,
            DefaultMode::Default("&missing;".into())
        );
    }

    #[test]
    fn test_last_attribute_declaration_wins() {
        let output = build(vec![
            attlist("p", "align CDATA 'left'"),
            element("p", "EMPTY"),
            attlist("p", "align (left|right) 'right'"),
        ]);

        let align = output.graph.attribute("p", "align").unwrap();
        assert_eq!(align.default, DefaultMode::Default("right".into()));
        assert_eq!(align.dtd_order, 1);
        assert_eq!(output.graph.attribute_count(), 1);
    }

    #[test]
    fn test_duplicate_id_attribute() {
        let output = build(vec![attlist("p", "id ID #REQUIRED key ID #IMPLIED")]);

        assert_eq!(
            output.diagnostics.of_kind(DiagnosticKind::DuplicateIdAttribute).count(),
            1
        );
        assert_eq!(output.graph.attribute_count(), 2);
    }

    #[test]
    fn test_entities() {
        let output = build(vec![
            entity("copy", EntityScope::General, "'&#169; 2024'"),
            entity("copy", EntityScope::General, "'ignored'"),
            entity("copy", EntityScope::Parameter, "'(a|b)'"),
            entity("logo", EntityScope::General, "SYSTEM 'logo.gif' NDATA gif"),
            entity("bad", EntityScope::Parameter, "SYSTEM 'x.ent' NDATA gif"),
            entity("worse", EntityScope::General, "BOGUS"),
        ]);

        let copy = output.graph.entity(EntityScope::General, "copy").unwrap();
        assert_eq!(copy.kind, EntityKind::Internal("\u{a9} 2024".into()));
        assert_eq!(copy.dtd_order, 1);
        assert!(output.graph.entity(EntityScope::Parameter, "copy").is_some());

        let logo = output.graph.entity(EntityScope::General, "logo").unwrap();
        assert_eq!(
            logo.kind,
            EntityKind::External {
                external_id: ExternalId::system("logo.gif"),
                notation: Some("gif".into()),
            }
        );

        assert_eq!(output.diagnostics.of_kind(DiagnosticKind::MalformedEntity).count(), 2);
        assert!(output.graph.entity(EntityScope::Parameter, "bad").is_none());
        assert!(output.graph.entity(EntityScope::General, "worse").is_none());
    }

    #[test]
    fn test_notations_comments_and_pis() {
        let output = build(vec![
            DeclarationEvent::Comment {
                text: " images ".into(),
            },
            DeclarationEvent::Notation {
                name: "gif".into(),
                external_id: "PUBLIC '-//GIF//EN'".into(),
            },
            DeclarationEvent::Notation {
                name: "broken".into(),
                external_id: "gif".into(),
            },
            DeclarationEvent::ProcessingInstruction {
                target: "render".into(),
                data: "mode='fast'".into(),
            },
        ]);

        assert_eq!(output.graph.notation_count(), 1);
        assert_eq!(output.graph.notation("gif").unwrap().dtd_order, 2);
        assert_eq!(output.diagnostics.of_kind(DiagnosticKind::MalformedNotation).count(), 1);
        assert_eq!(output.graph.comments()[0].dtd_order, 1);
        assert_eq!(output.graph.processing_instructions()[0].dtd_order, 4);
    }
}
