//! XML serialization of the declaration model
//!
//! The output is a single `<declarations>` document with one block per
//! declaration kind. Within a block, declarations appear in encounter
//! order. When a [`ReachableSet`] filter is given, declarations whose key is
//! not in the set are left out entirely; comments and processing
//! instructions are always written.

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::content_model::{ContentModelNode, ContentSpec, Occurrence};
use crate::error::{Error, Result};
use crate::model::{
    AttributeDeclaration, DeclarationGraph, DeclarationKey, ElementDeclaration,
    EntityDeclaration, EntityKind, EntityScope, ExternalId, NotationDeclaration,
};
use crate::reachability::ReachableSet;

/// Writes a [`DeclarationGraph`] as XML
#[derive(Debug, Clone, Copy)]
pub struct ModelSerializer<'a> {
    graph: &'a DeclarationGraph,
    title: Option<&'a str>,
    filter: Option<&'a ReachableSet>,
}

enum Step<'n> {
    Open(&'n ContentModelNode),
    Close(&'static str),
}

impl<'a> ModelSerializer<'a> {
    /// Create a serializer writing every declaration of `graph`
    pub fn new(graph: &'a DeclarationGraph) -> Self {
        Self {
            graph,
            title: None,
            filter: None,
        }
    }

    /// Embed a `<title>` element
    pub fn with_title(mut self, title: &'a str) -> Self {
        self.title = Some(title);
        self
    }

    /// Only write declarations contained in `filter`
    pub fn with_filter(mut self, filter: &'a ReachableSet) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Serialize into a string
    pub fn to_xml_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::Xml(e.to_string()))
    }

    /// Stream the document into `output`
    pub fn write<W: Write>(&self, output: W) -> Result<()> {
        let mut writer = Writer::new_with_indent(output, b' ', 2);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new("declarations")))?;

        if let Some(title) = self.title {
            text_element(&mut writer, "title", &[], title)?;
        }

        if let Some(filter) = self.filter {
            let roots = filter.roots().join(" ");
            empty_element(&mut writer, "reachability", &[("roots", roots.as_str())])?;
        }

        self.write_elements(&mut writer)?;
        self.write_attributes(&mut writer)?;
        self.write_entities(&mut writer, EntityScope::Parameter, "parameterEntities")?;
        self.write_entities(&mut writer, EntityScope::General, "generalEntities")?;
        self.write_notations(&mut writer)?;
        self.write_comments(&mut writer)?;
        self.write_processing_instructions(&mut writer)?;

        writer.write_event(Event::End(BytesEnd::new("declarations")))?;
        writer.get_mut().write_all(b"\n")?;
        Ok(())
    }

    fn includes(&self, key: DeclarationKey) -> bool {
        self.filter.map_or(true, |filter| filter.contains(&key))
    }

    fn write_elements<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let elements: Vec<&ElementDeclaration> = self
            .graph
            .elements()
            .filter(|e| self.includes(DeclarationKey::element(&e.name)))
            .collect();

        if elements.is_empty() {
            return empty_element(writer, "elements", &[]);
        }

        start_element(writer, "elements", &[])?;
        for element in elements {
            let order = element.dtd_order.to_string();
            start_element(
                writer,
                "element",
                &[("name", element.name.as_str()), ("dtdOrder", order.as_str())],
            )?;
            write_content_spec(writer, &element.content)?;
            end_element(writer, "element")?;
        }
        end_element(writer, "elements")
    }

    fn write_attributes<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let attributes: Vec<&AttributeDeclaration> = self
            .graph
            .attributes()
            .filter(|a| self.includes(DeclarationKey::attribute(&a.element, &a.name)))
            .collect();

        if attributes.is_empty() {
            return empty_element(writer, "attributes", &[]);
        }

        start_element(writer, "attributes", &[])?;
        for attribute in attributes {
            write_attribute(writer, attribute)?;
        }
        end_element(writer, "attributes")
    }

    fn write_entities<W: Write>(
        &self,
        writer: &mut Writer<W>,
        scope: EntityScope,
        block: &str,
    ) -> Result<()> {
        let entities: Vec<&EntityDeclaration> = self
            .graph
            .entities(scope)
            .filter(|e| {
                self.includes(DeclarationKey::Entity {
                    scope,
                    name: e.name.clone(),
                })
            })
            .collect();

        if entities.is_empty() {
            return empty_element(writer, block, &[]);
        }

        start_element(writer, block, &[])?;
        for entity in entities {
            write_entity(writer, entity)?;
        }
        end_element(writer, block)
    }

    fn write_notations<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let notations: Vec<&NotationDeclaration> = self
            .graph
            .notations()
            .filter(|n| self.includes(DeclarationKey::notation(&n.name)))
            .collect();

        if notations.is_empty() {
            return empty_element(writer, "notations", &[]);
        }

        start_element(writer, "notations", &[])?;
        for notation in notations {
            let order = notation.dtd_order.to_string();
            let attrs = [("name", notation.name.as_str()), ("dtdOrder", order.as_str())];
            if notation.external_id == ExternalId::default() {
                empty_element(writer, "notation", &attrs)?;
                continue;
            }
            start_element(writer, "notation", &attrs)?;
            write_external_id(writer, &notation.external_id)?;
            end_element(writer, "notation")?;
        }
        end_element(writer, "notations")
    }

    fn write_comments<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let comments = self.graph.comments();
        if comments.is_empty() {
            return empty_element(writer, "comments", &[]);
        }

        start_element(writer, "comments", &[])?;
        for comment in comments {
            let order = comment.dtd_order.to_string();
            text_element(writer, "comment", &[("dtdOrder", order.as_str())], &comment.text)?;
        }
        end_element(writer, "comments")
    }

    fn write_processing_instructions<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let pis = self.graph.processing_instructions();
        if pis.is_empty() {
            return empty_element(writer, "processingInstructions", &[]);
        }

        start_element(writer, "processingInstructions", &[])?;
        for pi in pis {
            let order = pi.dtd_order.to_string();
            text_element(
                writer,
                "pi",
                &[("target", pi.target.as_str()), ("dtdOrder", order.as_str())],
                &pi.data,
            )?;
        }
        end_element(writer, "processingInstructions")
    }
}

fn write_content_spec<W: Write>(writer: &mut Writer<W>, content: &ContentSpec) -> Result<()> {
    match content {
        ContentSpec::Empty | ContentSpec::Any => {
            let minified = content.to_string();
            empty_element(
                writer,
                "content-model",
                &[("spec", content.kind()), ("minified", minified.as_str())],
            )
        }
        ContentSpec::Invalid { raw, message } => empty_element(
            writer,
            "content-model",
            &[
                ("spec", content.kind()),
                ("raw", raw.as_str()),
                ("error", message.as_str()),
            ],
        ),
        ContentSpec::Mixed(node) | ContentSpec::Children(node) => {
            let minified = node.to_string();
            start_element(
                writer,
                "content-model",
                &[("spec", content.kind()), ("minified", minified.as_str())],
            )?;
            write_model_tree(writer, node)?;
            end_element(writer, "content-model")
        }
    }
}

/// Write a content model tree as nested elements without recursing
fn write_model_tree<W: Write>(writer: &mut Writer<W>, root: &ContentModelNode) -> Result<()> {
    let mut stack = vec![Step::Open(root)];

    while let Some(step) = stack.pop() {
        let node = match step {
            Step::Close(tag) => {
                end_element(writer, tag)?;
                continue;
            }
            Step::Open(node) => node,
        };

        match node {
            ContentModelNode::PcData => empty_element(writer, "pcdata", &[])?,
            ContentModelNode::Name { name, occurrence } => {
                text_element(writer, "child", &occurrence_attrs(*occurrence), name)?
            }
            ContentModelNode::Sequence {
                children,
                occurrence,
            }
            | ContentModelNode::Choice {
                children,
                occurrence,
            } => {
                let tag = if matches!(node, ContentModelNode::Sequence { .. }) {
                    "seq"
                } else {
                    "choice"
                };
                start_element(writer, tag, &occurrence_attrs(*occurrence))?;
                stack.push(Step::Close(tag));
                stack.extend(children.iter().rev().map(Step::Open));
            }
        }
    }

    Ok(())
}

fn occurrence_attrs(occurrence: Occurrence) -> Vec<(&'static str, &'static str)> {
    match occurrence {
        Occurrence::Once => Vec::new(),
        other => vec![("q", other.as_str())],
    }
}

fn write_attribute<W: Write>(writer: &mut Writer<W>, attribute: &AttributeDeclaration) -> Result<()> {
    let type_label = attribute.attribute_type.to_string();
    let order = attribute.dtd_order.to_string();

    let mut attrs = vec![
        ("element", attribute.element.as_str()),
        ("name", attribute.name.as_str()),
        ("type", type_label.as_str()),
        ("mode", attribute.default.keyword()),
    ];
    if let Some(value) = attribute.default.value() {
        attrs.push(("defaultValue", value));
    }
    attrs.push(("dtdOrder", order.as_str()));

    let values = attribute.attribute_type.values();
    if values.is_empty() {
        return empty_element(writer, "attribute", &attrs);
    }

    start_element(writer, "attribute", &attrs)?;
    start_element(writer, "enumeration", &[])?;
    for value in values {
        text_element(writer, "value", &[], value)?;
    }
    end_element(writer, "enumeration")?;
    end_element(writer, "attribute")
}

fn write_entity<W: Write>(writer: &mut Writer<W>, entity: &EntityDeclaration) -> Result<()> {
    let order = entity.dtd_order.to_string();
    start_element(
        writer,
        "entity",
        &[
            ("name", entity.name.as_str()),
            ("type", entity.type_label()),
            ("dtdOrder", order.as_str()),
        ],
    )?;

    match &entity.kind {
        EntityKind::Internal(value) => text_element(writer, "value", &[], value)?,
        EntityKind::External {
            external_id,
            notation,
        } => {
            write_external_id(writer, external_id)?;
            if let Some(notation) = notation {
                text_element(writer, "notation", &[], notation)?;
            }
        }
    }

    end_element(writer, "entity")
}

fn write_external_id<W: Write>(writer: &mut Writer<W>, external_id: &ExternalId) -> Result<()> {
    if let Some(public_id) = &external_id.public_id {
        text_element(writer, "publicId", &[], public_id)?;
    }
    if let Some(system_id) = &external_id.system_id {
        text_element(writer, "systemId", &[], system_id)?;
    }
    Ok(())
}

fn start_tag<'t>(name: &'t str, attrs: &[(&str, &str)]) -> BytesStart<'t> {
    let mut tag = BytesStart::new(name);
    for &attr in attrs {
        tag.push_attribute(attr);
    }
    tag
}

fn start_element<W: Write>(writer: &mut Writer<W>, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    writer.write_event(Event::Start(start_tag(name, attrs)))?;
    Ok(())
}

fn empty_element<W: Write>(writer: &mut Writer<W>, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    writer.write_event(Event::Empty(start_tag(name, attrs)))?;
    Ok(())
}

fn end_element<W: Write>(writer: &mut Writer<W>, name: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    attrs: &[(&str, &str)],
    text: &str,
) -> Result<()> {
    start_element(writer, name, attrs)?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    end_element(writer, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{DeclarationEvent, RawLog};
    use crate::diagnostics::Diagnostics;
    use crate::model::ModelBuilder;
    use crate::reachability::ReachabilityAnalyzer;

    fn graph() -> DeclarationGraph {
        let events = vec![
            DeclarationEvent::Element {
                name: "book".into(),
                content_model: "(title, chapter+)".into(),
            },
            DeclarationEvent::Element {
                name: "title".into(),
                content_model: "(#PCDATA)".into(),
            },
            DeclarationEvent::Element {
                name: "chapter".into(),
                content_model: "(title, (para | note)*)".into(),
            },
            DeclarationEvent::Element {
                name: "para".into(),
                content_model: "(#PCDATA | em)*".into(),
            },
            DeclarationEvent::Element {
                name: "appendix".into(),
                content_model: "EMPTY".into(),
            },
            DeclarationEvent::AttributeList {
                element: "book".into(),
                definitions: "id ID #REQUIRED".into(),
            },
            DeclarationEvent::AttributeList {
                element: "para".into(),
                definitions: "align (left|right) 'left'".into(),
            },
            DeclarationEvent::Entity {
                name: "copy".into(),
                scope: EntityScope::General,
                definition: "'&#169;'".into(),
            },
            DeclarationEvent::Comment {
                text: " a <comment> ".into(),
            },
        ];
        ModelBuilder::new()
            .build(&RawLog {
                events,
                stopped_early: false,
            })
            .graph
    }

    #[test]
    fn test_content_model_markup() {
        let graph = graph();
        let xml = ModelSerializer::new(&graph).to_xml_string().unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(
            "<content-model spec=\"element\" minified=\"(title,chapter+)\">\n        <seq>\n          <child>title</child>\n          <child q=\"+\">chapter</child>\n        </seq>\n      </content-model>"
        ));
        assert!(xml.contains("<choice q=\"*\">"));
        assert!(xml.contains("<pcdata/>"));
        assert!(xml.contains("<content-model spec=\"empty\" minified=\"EMPTY\"/>"));
        assert!(xml.contains("<comment dtdOrder=\"9\"> a &lt;comment&gt; </comment>"));
        assert!(xml.contains("<processingInstructions/>"));
        assert!(!xml.contains("<reachability"));
    }

    #[test]
    fn test_attributes_and_entities() {
        let graph = graph();
        let xml = ModelSerializer::new(&graph)
            .with_title("Books")
            .to_xml_string()
            .unwrap();

        assert!(xml.contains("<title>Books</title>"));
        assert!(xml.contains(
            "<attribute element=\"book\" name=\"id\" type=\"ID\" mode=\"#REQUIRED\" dtdOrder=\"6\"/>"
        ));
        assert!(xml.contains(
            "<attribute element=\"para\" name=\"align\" type=\"(left|right)\" mode=\"#DEFAULT\" defaultValue=\"left\" dtdOrder=\"7\">"
        ));
        assert!(xml.contains("<value>right</value>"));
        assert!(xml.contains("<entity name=\"copy\" type=\"internal\" dtdOrder=\"8\">"));
        assert!(xml.contains("<value>\u{a9}</value>"));
        assert!(xml.contains("<parameterEntities/>"));
    }

    #[test]
    fn test_filtered_output() {
        let graph = graph();
        let mut diagnostics = Diagnostics::new();
        let set = ReachabilityAnalyzer::new(&graph)
            .analyze(&["para"], &mut diagnostics)
            .unwrap();
        let xml = ModelSerializer::new(&graph)
            .with_filter(&set)
            .to_xml_string()
            .unwrap();

        assert!(xml.contains("<reachability roots=\"para\"/>"));
        assert!(xml.contains("<element name=\"para\""));
        assert!(!xml.contains("<element name=\"book\""));
        assert!(!xml.contains("name=\"id\""));
        assert!(xml.contains("<generalEntities/>"));
        // comments are not subject to filtering
        assert!(xml.contains("<comment dtdOrder=\"9\">"));
    }

    #[test]
    fn test_full_filter_matches_unfiltered() {
        let graph = graph();
        let everything = ReachableSet::everything(&graph);
        let unfiltered = ModelSerializer::new(&graph).to_xml_string().unwrap();
        let filtered = ModelSerializer::new(&graph)
            .with_filter(&everything)
            .to_xml_string()
            .unwrap();

        let without_marker: String = filtered
            .lines()
            .filter(|line| !line.trim_start().starts_with("<reachability"))
            .map(|line| format!("{}\n", line))
            .collect();
        assert_eq!(without_marker, unfiltered);
    }
}
