//! Low-level lexical helpers for DTD declaration bodies
//!
//! The model builder and the reference scanner both need to pick apart the
//! raw text of declarations (quoted literals, external identifiers, entity
//! definitions, character references). This module holds the shared pieces.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::ExternalId;
use crate::names::{is_name_char, is_name_start_char, is_xml_whitespace};

static CHAR_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(?:x([0-9A-Fa-f]+)|([0-9]+));").unwrap());

static ENTITY_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"&([^\s&;#%<>]+);").unwrap());

static TEXT_DECL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\x{FEFF}?<\?xml\s[^?]*\?>").unwrap());

/// Lexical error inside a declaration body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// What went wrong
    pub message: String,
    /// Byte offset into the scanned text
    pub position: usize,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at offset {})", self.message, self.position)
    }
}

impl std::error::Error for SyntaxError {}

/// Forward-only cursor over a declaration body
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Create a cursor at the start of `input`
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Current byte offset
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Move to an absolute byte offset
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.input.len());
    }

    /// Unconsumed input
    pub fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Check if all input was consumed
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Next character without consuming it
    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Skip XML whitespace, returning the number of bytes skipped
    pub fn skip_whitespace(&mut self) -> usize {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !is_xml_whitespace(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        self.pos - start
    }

    /// Require at least one whitespace character
    pub fn require_whitespace(&mut self, context: &str) -> Result<(), SyntaxError> {
        if self.skip_whitespace() == 0 && !self.is_at_end() {
            return Err(self.error(format!("whitespace required {}", context)));
        }
        Ok(())
    }

    /// Consume `literal` if the input continues with it
    pub fn eat(&mut self, literal: &str) -> bool {
        if self.rest().starts_with(literal) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    /// Consume a keyword that is not immediately followed by a name character
    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        let rest = self.rest();
        if rest.starts_with(keyword)
            && !rest[keyword.len()..].chars().next().map(is_name_char).unwrap_or(false)
        {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    /// Consume `expected` or fail
    pub fn expect_char(&mut self, expected: char) -> Result<(), SyntaxError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    /// Read an XML Name
    pub fn read_name(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, c)) if is_name_start_char(c) => {}
            _ => return None,
        }
        let end = chars
            .find(|(_, c)| !is_name_char(*c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        self.pos += end;
        Some(&rest[..end])
    }

    /// Read an Nmtoken
    pub fn read_nmtoken(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|(_, c)| !is_name_char(*c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        self.pos += end;
        Some(&rest[..end])
    }

    /// Read a single- or double-quoted literal, returning its contents
    pub fn read_quoted(&mut self) -> Result<&'a str, SyntaxError> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error("expected a quoted literal")),
        };
        let rest = &self.rest()[1..];
        match rest.find(quote) {
            Some(end) => {
                self.pos += end + 2;
                Ok(&rest[..end])
            }
            None => Err(self.error("unterminated literal")),
        }
    }

    /// Build an error at the current position
    pub fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            message: message.into(),
            position: self.pos,
        }
    }
}

/// Right-hand side of an `<!ENTITY>` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityDefinition {
    /// Literal replacement text, exactly as written between the quotes
    Internal(String),
    /// External entity, unparsed when a notation is given
    External {
        /// Locator
        external_id: ExternalId,
        /// `NDATA` notation name
        notation: Option<String>,
    },
}

/// ```text
/// [75] ExternalID ::= 'SYSTEM' S SystemLiteral
///                   | 'PUBLIC' S PubidLiteral S SystemLiteral
/// [83] PublicID   ::= 'PUBLIC' S PubidLiteral
/// ```
///
/// With `allow_public_only`, the `PublicID` form used by notations is accepted.
pub fn parse_external_id(
    cursor: &mut Cursor<'_>,
    allow_public_only: bool,
) -> Result<ExternalId, SyntaxError> {
    if cursor.eat_keyword("SYSTEM") {
        cursor.require_whitespace("after 'SYSTEM'")?;
        let system_id = cursor.read_quoted()?;
        return Ok(ExternalId::system(system_id));
    }

    if cursor.eat_keyword("PUBLIC") {
        cursor.require_whitespace("after 'PUBLIC'")?;
        let public_id = normalize_public_id(cursor.read_quoted()?);
        let before_ws = cursor.pos();
        let had_whitespace = cursor.skip_whitespace() > 0;

        if had_whitespace && matches!(cursor.peek(), Some('"' | '\'')) {
            let system_id = cursor.read_quoted()?;
            return Ok(ExternalId::public(public_id, Some(system_id.to_string())));
        }

        cursor.seek(before_ws);
        if allow_public_only {
            return Ok(ExternalId::public(public_id, None));
        }
        return Err(cursor.error("system literal required after public identifier"));
    }

    Err(cursor.error("expected 'SYSTEM' or 'PUBLIC'"))
}

/// Parse the text following the entity name in an `<!ENTITY>` declaration
pub fn parse_entity_definition(raw: &str) -> Result<EntityDefinition, SyntaxError> {
    let mut cursor = Cursor::new(raw);
    cursor.skip_whitespace();

    let definition = if matches!(cursor.peek(), Some('"' | '\'')) {
        EntityDefinition::Internal(cursor.read_quoted()?.to_string())
    } else {
        let external_id = parse_external_id(&mut cursor, false)?;
        let before_ws = cursor.pos();
        let had_whitespace = cursor.skip_whitespace() > 0;
        let notation = if had_whitespace && cursor.eat_keyword("NDATA") {
            cursor.require_whitespace("after 'NDATA'")?;
            let name = cursor
                .read_name()
                .ok_or_else(|| cursor.error("expected notation name after 'NDATA'"))?;
            Some(name.to_string())
        } else {
            cursor.seek(before_ws);
            None
        };
        EntityDefinition::External {
            external_id,
            notation,
        }
    };

    cursor.skip_whitespace();
    if !cursor.is_at_end() {
        return Err(cursor.error(format!("unexpected '{}'", cursor.rest())));
    }

    Ok(definition)
}

/// Parse the text following the notation name in a `<!NOTATION>` declaration
pub fn parse_notation_id(raw: &str) -> Result<ExternalId, SyntaxError> {
    let mut cursor = Cursor::new(raw);
    cursor.skip_whitespace();
    let external_id = parse_external_id(&mut cursor, true)?;
    cursor.skip_whitespace();
    if !cursor.is_at_end() {
        return Err(cursor.error(format!("unexpected '{}'", cursor.rest())));
    }
    Ok(external_id)
}

/// Collapse whitespace in a public identifier (XML 1.0 §4.2.2)
pub fn normalize_public_id(public_id: &str) -> String {
    public_id.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode a single character reference body (`#60`, `#x3C`)
pub fn decode_char_ref(body: &str) -> Option<char> {
    let code = if let Some(hex) = body.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        body.strip_prefix('#')?.parse::<u32>().ok()?
    };
    char::from_u32(code)
}

/// Replace character references with the characters they denote.
///
/// References to invalid code points are left untouched.
pub fn expand_char_refs(text: &str) -> String {
    CHAR_REF
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let code = match (caps.get(1), caps.get(2)) {
                (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
                (None, Some(dec)) => dec.as_str().parse::<u32>().ok(),
                _ => None,
            };
            match code.and_then(char::from_u32) {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Names of the general entities referenced as `&name;` in `text`
pub fn entity_references(text: &str) -> Vec<&str> {
    ENTITY_REF
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// Drop a leading `<?xml ...?>` text declaration from an external entity
pub fn strip_text_declaration(text: &str) -> &str {
    match TEXT_DECL.find(text) {
        Some(m) => &text[m.end()..],
        None => text.strip_prefix('\u{FEFF}').unwrap_or(text),
    }
}
