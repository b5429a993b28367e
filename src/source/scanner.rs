//! A small DTD scanner
//!
//! Recognizes markup declarations, comments, processing instructions,
//! conditional sections and parameter-entity references, and reports raw
//! declarations to a handler. It does not validate declaration bodies; that
//! is the model builder's job.
//!
//! Parameter entities are expanded as they are encountered:
//!
//! - between declarations, the replacement text is scanned as markup;
//! - inside a declaration, outside literals, the replacement text is
//!   inserted padded with one space on each side (XML 1.0 §4.4.8);
//! - inside the literal of an entity declaration, it is inserted as is.
//!
//! A declaration must be complete within one entity.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::collector::DeclarationHandler;
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::locations::Location;
use crate::model::{EntityScope, ExternalId};
use crate::names::is_xml_whitespace;
use crate::syntax::{
    expand_char_refs, parse_entity_definition, parse_external_id, strip_text_declaration, Cursor,
    EntityDefinition,
};

use super::resolver::{EntityResolver, FileResolver};
use super::{normalize_line_endings, EventSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Dtd,
    Document,
}

/// Event source for DTD text or an XML document with a DOCTYPE
pub struct DtdScanner {
    text: String,
    mode: Mode,
    location: Option<Location>,
    /// Custom resolver; a `FileResolver` sharing `limits` otherwise
    resolver: Option<Box<dyn EntityResolver>>,
    limits: Limits,
}

impl fmt::Debug for DtdScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DtdScanner")
            .field("mode", &self.mode)
            .field("location", &self.location)
            .field("len", &self.text.len())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl DtdScanner {
    fn new(text: &str, mode: Mode) -> Self {
        Self {
            text: normalize_line_endings(text),
            mode,
            location: None,
            resolver: None,
            limits: Limits::default(),
        }
    }

    /// Scan DTD text (an external subset)
    pub fn from_dtd_str(text: &str) -> Self {
        Self::new(text, Mode::Dtd)
    }

    /// Scan a DTD file; relative system identifiers resolve against its path
    pub fn from_dtd_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self::from_dtd_str(&read_file(path)?).with_location(Location::from(path)))
    }

    /// Scan the DOCTYPE of an XML document
    pub fn from_document_str(text: &str) -> Self {
        Self::new(text, Mode::Document)
    }

    /// Scan the DOCTYPE of an XML document file
    pub fn from_document_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self::from_document_str(&read_file(path)?).with_location(Location::from(path)))
    }

    /// Set the location used as base for relative system identifiers
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Replace the resolver used for external subsets and parameter entities
    pub fn with_resolver<R: EntityResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Set the limits applied to the input size and parameter entity expansion
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    fn label(&self) -> String {
        match (&self.location, self.mode) {
            (Some(location), _) => location.to_string(),
            (None, Mode::Dtd) => "<dtd>".to_string(),
            (None, Mode::Document) => "<document>".to_string(),
        }
    }
}

impl EventSource for DtdScanner {
    fn run(&mut self, handler: &mut dyn DeclarationHandler) -> Result<()> {
        self.limits.check_dtd_size(self.text.len())?;

        let context = Context {
            label: self.label(),
            location: self.location.clone(),
        };
        let mut file_resolver;
        let resolver: &mut dyn EntityResolver = match self.resolver.as_mut() {
            Some(resolver) => resolver.as_mut(),
            None => {
                file_resolver = FileResolver::new().with_limits(self.limits.clone());
                &mut file_resolver
            }
        };

        let mut scan = Scan {
            handler,
            resolver,
            limits: &self.limits,
            parameter_entities: HashMap::new(),
            active: Vec::new(),
            expansions: 0,
        };

        match self.mode {
            Mode::Dtd => scan.dtd(&self.text, &context),
            Mode::Document => scan.document(&self.text, &context),
        }
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::Resource(format!("failed to read '{}': {}", path.display(), e)))
}

/// Where the text being scanned came from
#[derive(Debug, Clone)]
struct Context {
    label: String,
    location: Option<Location>,
}

impl Context {
    fn at(location: Location) -> Self {
        Self {
            label: location.to_string(),
            location: Some(location),
        }
    }

    fn error(&self, text: &str, pos: usize, message: impl fmt::Display) -> Error {
        let end = pos.min(text.len());
        let line = text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1;
        Error::EventSource(format!("{}, line {}: {}", self.label, line, message))
    }
}

#[derive(Debug, Clone)]
enum ParameterEntity {
    /// Replacement text with character references expanded
    Internal(String),
    External {
        external_id: ExternalId,
        base: Option<Location>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    /// End of the entity text
    End,
    /// `]` closing an internal subset
    Subset,
    /// `]]>` closing an INCLUDE section
    Conditional,
}

struct Scan<'s> {
    handler: &'s mut dyn DeclarationHandler,
    resolver: &'s mut dyn EntityResolver,
    limits: &'s Limits,
    parameter_entities: HashMap<String, ParameterEntity>,
    active: Vec<String>,
    expansions: usize,
}

impl Scan<'_> {
    fn dtd(&mut self, text: &str, ctx: &Context) -> Result<()> {
        let text = strip_text_declaration(text);
        self.scan_markup(text, 0, Terminator::End, ctx)?;
        self.handler.end_dtd()
    }

    fn document(&mut self, text: &str, ctx: &Context) -> Result<()> {
        let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
        let start = skip_misc(text, 0, ctx)?;
        if !text[start..].starts_with("<!DOCTYPE") {
            return Err(ctx.error(text, start, "document has no DOCTYPE declaration"));
        }

        let offset = start + "<!DOCTYPE".len();
        let mut cursor = Cursor::new(&text[offset..]);
        if cursor.skip_whitespace() == 0 {
            return Err(ctx.error(text, offset, "whitespace required after '<!DOCTYPE'"));
        }
        let root = cursor
            .read_name()
            .ok_or_else(|| ctx.error(text, offset, "expected the document element name"))?;
        debug!(root, "found document type declaration");

        let before = cursor.pos();
        let had_whitespace = cursor.skip_whitespace() > 0;
        let external_id = if had_whitespace
            && (cursor.rest().starts_with("SYSTEM") || cursor.rest().starts_with("PUBLIC"))
        {
            let id = parse_external_id(&mut cursor, false)
                .map_err(|e| ctx.error(text, offset + e.position, e.message))?;
            Some(id)
        } else {
            cursor.seek(before);
            None
        };
        cursor.skip_whitespace();

        let mut pos = offset + cursor.pos();
        if text[pos..].starts_with('[') {
            pos = self.scan_markup(text, pos + 1, Terminator::Subset, ctx)?;
            pos = skip_whitespace(text, pos + 1);
        }
        if !text[pos..].starts_with('>') {
            return Err(ctx.error(text, pos, "expected '>' to close the DOCTYPE declaration"));
        }
        pos += 1;

        // the internal subset is processed before the external subset
        if let Some(external_id) = external_id {
            let entity = self.resolver.resolve(ctx.location.as_ref(), &external_id)?;
            let inner = Context::at(entity.location.clone());
            self.scan_markup(&entity.text, 0, Terminator::End, &inner)?;
        }

        self.handler.end_dtd()?;

        let pos = skip_misc(text, pos, ctx)?;
        if pos < text.len() {
            debug!("document content follows the DTD, stopping");
            return Err(Error::EndOfDtd);
        }
        Ok(())
    }

    /// Scan markup starting at `pos`, returning the position after `until`
    fn scan_markup(
        &mut self,
        text: &str,
        mut pos: usize,
        until: Terminator,
        ctx: &Context,
    ) -> Result<usize> {
        loop {
            pos = skip_whitespace(text, pos);
            let rest = &text[pos..];

            let Some(next) = rest.chars().next() else {
                return match until {
                    Terminator::End => Ok(pos),
                    Terminator::Subset => Err(ctx.error(text, pos, "unterminated internal subset")),
                    Terminator::Conditional => {
                        Err(ctx.error(text, pos, "unterminated conditional section"))
                    }
                };
            };

            match until {
                Terminator::Subset if next == ']' => return Ok(pos),
                Terminator::Conditional if rest.starts_with("]]>") => return Ok(pos + 3),
                _ => {}
            }

            pos = if let Some(body) = rest.strip_prefix("<!--") {
                let end = body
                    .find("-->")
                    .ok_or_else(|| ctx.error(text, pos, "unterminated comment"))?;
                self.handler.comment(&body[..end])?;
                pos + 4 + end + 3
            } else if rest.starts_with("<?") {
                self.processing_instruction(text, pos, ctx)?
            } else if rest.starts_with("<![") {
                self.conditional_section(text, pos, ctx)?
            } else if rest.starts_with("<!") {
                self.declaration(text, pos, ctx)?
            } else if next == '%' {
                self.top_level_reference(text, pos, ctx)?
            } else {
                return Err(ctx.error(text, pos, format!("unexpected character '{}'", next)));
            };
        }
    }

    fn processing_instruction(&mut self, text: &str, pos: usize, ctx: &Context) -> Result<usize> {
        let rest = &text[pos..];
        let end = rest[2..]
            .find("?>")
            .map(|end| end + 2)
            .ok_or_else(|| ctx.error(text, pos, "unterminated processing instruction"))?;

        let mut cursor = Cursor::new(&rest[2..end]);
        let target = cursor
            .read_name()
            .ok_or_else(|| ctx.error(text, pos, "processing instruction without a target"))?;
        cursor.skip_whitespace();

        if target.eq_ignore_ascii_case("xml") {
            debug!("skipping text declaration");
        } else {
            self.handler.processing_instruction(target, cursor.rest())?;
        }
        Ok(pos + end + 2)
    }

    fn conditional_section(&mut self, text: &str, pos: usize, ctx: &Context) -> Result<usize> {
        let start = skip_whitespace(text, pos + 3);

        let (keyword, after) = if text[start..].starts_with('%') {
            let (name, after) = reference_at(text, start)
                .ok_or_else(|| ctx.error(text, start, "malformed parameter entity reference"))?;
            let replacement = self
                .parameter_replacement(name, false, (text, start), ctx)?
                .ok_or_else(|| {
                    ctx.error(text, start, format!("undeclared parameter entity '%{};'", name))
                })?;
            (replacement.trim().to_string(), after)
        } else {
            let mut cursor = Cursor::new(&text[start..]);
            let keyword = cursor.read_name().unwrap_or_default();
            (keyword.to_string(), start + cursor.pos())
        };

        let open = skip_whitespace(text, after);
        if !text[open..].starts_with('[') {
            return Err(ctx.error(text, open, "expected '[' after the conditional section keyword"));
        }

        match keyword.as_str() {
            "INCLUDE" => self.scan_markup(text, open + 1, Terminator::Conditional, ctx),
            "IGNORE" => skip_ignored(text, open + 1)
                .ok_or_else(|| ctx.error(text, pos, "unterminated conditional section")),
            other => Err(ctx.error(
                text,
                start,
                format!("expected INCLUDE or IGNORE, found '{}'", other),
            )),
        }
    }

    fn declaration(&mut self, text: &str, pos: usize, ctx: &Context) -> Result<usize> {
        let end = declaration_end(text, pos)
            .ok_or_else(|| ctx.error(text, pos, "unterminated markup declaration"))?;
        let mut cursor = Cursor::new(&text[pos + 2..end]);
        let keyword = cursor.read_name().unwrap_or_default();
        let body = cursor.rest();

        match keyword {
            "ELEMENT" => {
                let body = self.expand_references(body, false, (text, pos), ctx)?;
                let (name, content_model) = split_name(&body)
                    .ok_or_else(|| ctx.error(text, pos, "element declaration without a name"))?;
                self.handler.element_decl(name, content_model)?;
            }
            "ATTLIST" => {
                let body = self.expand_references(body, false, (text, pos), ctx)?;
                let (element, definitions) = split_name(&body).ok_or_else(|| {
                    ctx.error(text, pos, "attribute-list declaration without an element name")
                })?;
                self.handler.attlist_decl(element, definitions)?;
            }
            "NOTATION" => {
                let body = self.expand_references(body, false, (text, pos), ctx)?;
                let (name, external_id) = split_name(&body)
                    .ok_or_else(|| ctx.error(text, pos, "notation declaration without a name"))?;
                self.handler.notation_decl(name, external_id)?;
            }
            "ENTITY" => self.entity_declaration(body, text, pos, ctx)?,
            "" => return Err(ctx.error(text, pos, "expected a declaration keyword after '<!'")),
            other => {
                return Err(ctx.error(text, pos, format!("unknown declaration '<!{}'", other)))
            }
        }

        Ok(end + 1)
    }

    fn entity_declaration(&mut self, body: &str, text: &str, pos: usize, ctx: &Context) -> Result<()> {
        let body = self.expand_references(body, true, (text, pos), ctx)?;
        let mut cursor = Cursor::new(&body);
        cursor.skip_whitespace();

        let scope = if cursor.eat("%") {
            if cursor.skip_whitespace() == 0 {
                return Err(ctx.error(text, pos, "whitespace required after '%'"));
            }
            EntityScope::Parameter
        } else {
            EntityScope::General
        };

        let name = cursor
            .read_name()
            .ok_or_else(|| ctx.error(text, pos, "entity declaration without a name"))?;
        let definition = cursor.rest().trim();

        self.handler.entity_decl(name, scope, definition)?;
        if scope == EntityScope::Parameter {
            self.define_parameter_entity(name, definition, ctx);
        }
        Ok(())
    }

    fn define_parameter_entity(&mut self, name: &str, definition: &str, ctx: &Context) {
        if self.parameter_entities.contains_key(name) {
            debug!(entity = name, "parameter entity redeclared, keeping the first declaration");
            return;
        }

        let entity = match parse_entity_definition(definition) {
            Ok(EntityDefinition::Internal(value)) => {
                ParameterEntity::Internal(expand_char_refs(&value))
            }
            Ok(EntityDefinition::External {
                external_id,
                notation: None,
            }) => ParameterEntity::External {
                external_id,
                base: ctx.location.clone(),
            },
            // reported by the model builder
            Ok(EntityDefinition::External { .. }) | Err(_) => return,
        };
        self.parameter_entities.insert(name.to_string(), entity);
    }

    fn top_level_reference(&mut self, text: &str, pos: usize, ctx: &Context) -> Result<usize> {
        let (name, after) = reference_at(text, pos)
            .ok_or_else(|| ctx.error(text, pos, "malformed parameter entity reference"))?;

        match self.parameter_entities.get(name).cloned() {
            None => warn!(entity = name, "skipping reference to undeclared parameter entity"),
            Some(ParameterEntity::Internal(value)) => {
                self.enter(name, text, pos, ctx)?;
                let inner = Context {
                    label: format!("{} (%{};)", ctx.label, name),
                    location: ctx.location.clone(),
                };
                self.scan_markup(&value, 0, Terminator::End, &inner)?;
                self.active.pop();
            }
            Some(ParameterEntity::External { external_id, base }) => {
                self.enter(name, text, pos, ctx)?;
                let entity = self.resolver.resolve(base.as_ref(), &external_id)?;
                self.limits.check_entity_expansion_size(entity.text.len())?;
                let inner = Context::at(entity.location.clone());
                self.scan_markup(&entity.text, 0, Terminator::End, &inner)?;
                self.active.pop();
            }
        }

        Ok(after)
    }

    /// Expand parameter entity references in a declaration body
    ///
    /// `site` is the enclosing text and the position of the declaration,
    /// used to report errors in nested replacement text.
    fn expand_references(
        &mut self,
        text: &str,
        in_literals: bool,
        site: (&str, usize),
        ctx: &Context,
    ) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut quote: Option<char> = None;
        let mut pos = 0;

        while let Some(c) = text[pos..].chars().next() {
            match c {
                '"' | '\'' => {
                    match quote {
                        None => quote = Some(c),
                        Some(q) if q == c => quote = None,
                        Some(_) => {}
                    }
                    out.push(c);
                    pos += 1;
                }
                '%' if quote.is_none() || in_literals => match reference_at(text, pos) {
                    Some((name, after)) => {
                        match self.parameter_replacement(name, in_literals, site, ctx)? {
                            Some(replacement) if quote.is_none() => {
                                out.push(' ');
                                out.push_str(&replacement);
                                out.push(' ');
                            }
                            Some(replacement) => out.push_str(&replacement),
                            None => {
                                warn!(entity = name, "undeclared parameter entity left unexpanded");
                                out.push_str(&text[pos..after]);
                            }
                        }
                        pos = after;
                    }
                    None => {
                        out.push('%');
                        pos += 1;
                    }
                },
                _ => {
                    out.push(c);
                    pos += c.len_utf8();
                }
            }
        }

        self.limits.check_entity_expansion_size(out.len())?;
        Ok(out)
    }

    /// Fully expanded replacement text of a parameter entity, `None` if undeclared
    fn parameter_replacement(
        &mut self,
        name: &str,
        in_literals: bool,
        site: (&str, usize),
        ctx: &Context,
    ) -> Result<Option<String>> {
        let Some(entity) = self.parameter_entities.get(name).cloned() else {
            return Ok(None);
        };

        let (site_text, site_pos) = site;
        self.enter(name, site_text, site_pos, ctx)?;
        let expanded = match entity {
            ParameterEntity::Internal(value) => {
                self.expand_references(&value, in_literals, site, ctx)?
            }
            ParameterEntity::External { external_id, base } => {
                let entity = self.resolver.resolve(base.as_ref(), &external_id)?;
                self.expand_references(&entity.text, in_literals, site, ctx)?
            }
        };
        self.active.pop();

        self.limits.check_entity_expansion_size(expanded.len())?;
        Ok(Some(expanded))
    }

    fn enter(&mut self, name: &str, text: &str, pos: usize, ctx: &Context) -> Result<()> {
        if self.active.iter().any(|active| active == name) {
            return Err(ctx.error(
                text,
                pos,
                format!(
                    "recursive reference to parameter entity '%{};' ({} -> {})",
                    name,
                    self.active.join(" -> "),
                    name
                ),
            ));
        }

        self.expansions += 1;
        self.limits.check_entity_expansions(self.expansions)?;
        self.limits.check_entity_depth(self.active.len() + 1)?;
        self.active.push(name.to_string());
        Ok(())
    }
}

fn skip_whitespace(text: &str, pos: usize) -> usize {
    text[pos..]
        .char_indices()
        .find(|&(_, c)| !is_xml_whitespace(c))
        .map(|(i, _)| pos + i)
        .unwrap_or(text.len())
}

/// Skip whitespace, comments and processing instructions outside the DTD
fn skip_misc(text: &str, mut pos: usize, ctx: &Context) -> Result<usize> {
    loop {
        pos = skip_whitespace(text, pos);
        let rest = &text[pos..];
        let (open, close) = if rest.starts_with("<!--") {
            ("<!--", "-->")
        } else if rest.starts_with("<?") {
            ("<?", "?>")
        } else {
            return Ok(pos);
        };
        let end = rest[open.len()..]
            .find(close)
            .ok_or_else(|| ctx.error(text, pos, format!("missing '{}'", close)))?;
        pos += open.len() + end + close.len();
    }
}

/// Parse `%name;` at `pos`, returning the name and the position after `;`
fn reference_at(text: &str, pos: usize) -> Option<(&str, usize)> {
    let start = pos + 1;
    let mut cursor = Cursor::new(text.get(start..)?);
    let name = cursor.read_name()?;
    if !cursor.eat(";") {
        return None;
    }
    Some((name, start + cursor.pos()))
}

/// Position of the `>` closing the declaration at `pos`, skipping literals
fn declaration_end(text: &str, pos: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in text[pos..].char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if q == c => quote = None,
            (None, '>') => return Some(pos + i),
            _ => {}
        }
    }
    None
}

/// Position after the `]]>` closing an IGNORE section opened before `pos`
fn skip_ignored(text: &str, mut pos: usize) -> Option<usize> {
    let mut depth = 1;
    while depth > 0 {
        let rest = &text[pos..];
        let close = rest.find("]]>")?;
        match rest.find("<![") {
            Some(open) if open < close => {
                depth += 1;
                pos += open + 3;
            }
            _ => {
                depth -= 1;
                pos += close + 3;
            }
        }
    }
    Some(pos)
}

/// Split a declaration body into its leading name and the trimmed remainder
fn split_name(body: &str) -> Option<(&str, &str)> {
    let mut cursor = Cursor::new(body);
    cursor.skip_whitespace();
    let name = cursor.read_name()?;
    Some((name, cursor.rest().trim()))
}
