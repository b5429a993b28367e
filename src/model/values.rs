//! Attribute default value normalization (XML 1.0 §3.3.3)
//!
//! Character references and references to predefined or internal general
//! entities are replaced, literal whitespace characters become spaces, and
//! values of tokenized types are trimmed with runs of spaces collapsed.

use tracing::debug;

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::names::is_valid_name;
use crate::syntax::decode_char_ref;

use super::declarations::{EntityKind, EntityScope};
use super::graph::DeclarationGraph;

/// A normalized default value and the entities it touched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedValue {
    /// The attribute-value-normalized text
    pub value: String,
    /// Declared general entities referenced (directly or through other entities)
    pub referenced_entities: Vec<String>,
    /// References left verbatim because no entity of that name is declared
    pub undeclared_entities: Vec<String>,
}

/// Normalizes attribute values against the general entities of a graph
#[derive(Debug)]
pub struct ValueNormalizer<'a> {
    graph: &'a DeclarationGraph,
    limits: &'a Limits,
}

struct Expansion {
    out: NormalizedValue,
    active: Vec<String>,
    expansions: usize,
}

impl<'a> ValueNormalizer<'a> {
    /// Create a normalizer resolving entities in `graph`
    pub fn new(graph: &'a DeclarationGraph, limits: &'a Limits) -> Self {
        Self { graph, limits }
    }

    /// Normalize `raw` as the value of an attribute, `tokenized` for every
    /// type other than CDATA.
    ///
    /// Fails on recursive entity references and when an expansion limit is
    /// exceeded.
    pub fn normalize(&self, raw: &str, tokenized: bool) -> Result<NormalizedValue> {
        let mut state = Expansion {
            out: NormalizedValue::default(),
            active: Vec::new(),
            expansions: 0,
        };
        self.append(raw, &mut state)?;

        if tokenized {
            state.out.value = state
                .out
                .value
                .split(' ')
                .filter(|token| !token.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
        }

        Ok(state.out)
    }

    fn append(&self, text: &str, state: &mut Expansion) -> Result<()> {
        let mut rest = text;

        while let Some(c) = rest.chars().next() {
            match c {
                '&' => {
                    let consumed = self.append_reference(rest, state)?;
                    rest = &rest[consumed..];
                    continue;
                }
                '\t' | '\n' | '\r' => state.out.value.push(' '),
                _ => state.out.value.push(c),
            }
            rest = &rest[c.len_utf8()..];
        }

        Ok(())
    }

    /// Handle the reference starting at `text[0] == '&'`, returning the
    /// number of bytes consumed
    fn append_reference(&self, text: &str, state: &mut Expansion) -> Result<usize> {
        let Some(end) = text.find(';') else {
            state.out.value.push('&');
            return Ok(1);
        };
        let body = &text[1..end];

        if body.starts_with('#') {
            match decode_char_ref(body) {
                Some(c) => state.out.value.push(c),
                None => state.out.value.push_str(&text[..=end]),
            }
            return Ok(end + 1);
        }

        if !is_valid_name(body) {
            state.out.value.push('&');
            return Ok(1);
        }

        if let Some(c) = predefined_entity(body) {
            state.out.value.push(c);
            return Ok(end + 1);
        }

        match self.graph.entity(EntityScope::General, body) {
            Some(entity) => {
                remember(&mut state.out.referenced_entities, body);
                match &entity.kind {
                    EntityKind::Internal(replacement) => {
                        self.expand(body, replacement, state)?;
                    }
                    EntityKind::External { .. } => {
                        debug!(entity = body, "external entity kept verbatim in attribute value");
                        state.out.value.push_str(&text[..=end]);
                    }
                }
            }
            None => {
                remember(&mut state.out.undeclared_entities, body);
                state.out.value.push_str(&text[..=end]);
            }
        }

        Ok(end + 1)
    }

    fn expand(&self, name: &str, replacement: &str, state: &mut Expansion) -> Result<()> {
        if state.active.iter().any(|active| active == name) {
            return Err(Error::Entity(format!(
                "recursive reference to entity '{}' ({} -> {})",
                name,
                state.active.join(" -> "),
                name
            )));
        }

        state.expansions += 1;
        self.limits.check_entity_expansions(state.expansions)?;
        self.limits.check_entity_depth(state.active.len() + 1)?;

        state.active.push(name.to_string());
        self.append(replacement, state)?;
        state.active.pop();

        self.limits.check_entity_expansion_size(state.out.value.len())
    }
}

fn predefined_entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => None,
    }
}

fn remember(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|existing| existing == name) {
        list.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::declarations::{EntityDeclaration, ExternalId};

    fn internal(name: &str, value: &str, order: usize) -> EntityDeclaration {
        EntityDeclaration {
            name: name.into(),
            scope: EntityScope::General,
            kind: EntityKind::Internal(value.into()),
            dtd_order: order,
        }
    }

    fn graph() -> DeclarationGraph {
        let mut graph = DeclarationGraph::new();
        graph.insert_entity(internal("org", "ACME  Corp", 1));
        graph.insert_entity(internal("full", "&org; Ltd", 2));
        graph.insert_entity(internal("loop", "&loop2;", 3));
        graph.insert_entity(internal("loop2", "x &loop;", 4));
        graph.insert_entity(EntityDeclaration {
            name: "chapter".into(),
            scope: EntityScope::General,
            kind: EntityKind::External {
                external_id: ExternalId::system("chapter.xml"),
                notation: None,
            },
            dtd_order: 5,
        });
        graph
    }

    #[test]
    fn test_char_refs_and_predefined_entities() {
        let graph = graph();
        let limits = Limits::default();
        let normalizer = ValueNormalizer::new(&graph, &limits);

        let value = normalizer.normalize("a&#x20;&lt;b&gt;&#65;&amp;", false).unwrap();
        assert_eq!(value.value, "a <b>A&");
        assert!(value.referenced_entities.is_empty());
    }

    #[test]
    fn test_whitespace_handling() {
        let graph = graph();
        let limits = Limits::default();
        let normalizer = ValueNormalizer::new(&graph, &limits);

        assert_eq!(normalizer.normalize(" a\tb\n", false).unwrap().value, " a b ");
        assert_eq!(normalizer.normalize("  a \t b  ", true).unwrap().value, "a b");
        // referenced characters are appended as-is
        assert_eq!(normalizer.normalize("a&#10;b", false).unwrap().value, "a\nb");
    }

    #[test]
    fn test_nested_internal_entities() {
        let graph = graph();
        let limits = Limits::default();
        let normalizer = ValueNormalizer::new(&graph, &limits);

        let value = normalizer.normalize("(c) &full;", false).unwrap();
        assert_eq!(value.value, "(c) ACME  Corp Ltd");
        assert_eq!(value.referenced_entities, vec!["full", "org"]);

        let value = normalizer.normalize("&full;", true).unwrap();
        assert_eq!(value.value, "ACME Corp Ltd");
    }

    #[test]
    fn test_unresolved_references_stay_verbatim() {
        let graph = graph();
        let limits = Limits::default();
        let normalizer = ValueNormalizer::new(&graph, &limits);

        let value = normalizer.normalize("see &chapter; and &nope; & more", false).unwrap();
        assert_eq!(value.value, "see &chapter; and &nope; & more");
        assert_eq!(value.referenced_entities, vec!["chapter"]);
        assert_eq!(value.undeclared_entities, vec!["nope"]);
    }

    #[test]
    fn test_recursive_entities_fail() {
        let graph = graph();
        let limits = Limits::default();
        let normalizer = ValueNormalizer::new(&graph, &limits);

        let err = normalizer.normalize("&loop;", false).unwrap_err();
        assert!(matches!(err, Error::Entity(msg) if msg.contains("loop")));
    }

    #[test]
    fn test_expansion_limit() {
        let mut graph = DeclarationGraph::new();
        graph.insert_entity(internal("a", "xxxxxxxxxx", 1));
        graph.insert_entity(internal("b", "&a;&a;&a;&a;&a;&a;&a;&a;&a;&a;", 2));
        graph.insert_entity(internal("c", "&b;&b;&b;&b;&b;&b;&b;&b;&b;&b;", 3));

        let limits = Limits {
            max_entity_expansions: 50,
            ..Limits::default()
        };
        let normalizer = ValueNormalizer::new(&graph, &limits);
        let err = normalizer.normalize("&c;", false).unwrap_err();
        assert!(matches!(err, Error::LimitExceeded(_)));
    }
}
