//! DTD element content models
//!
//! This module parses the content specification of an `<!ELEMENT>`
//! declaration into a typed grammar tree:
//!
//! ```text
//! [46] contentspec ::= 'EMPTY' | 'ANY' | Mixed | children
//! [47] children    ::= (choice | seq) ('?' | '*' | '+')?
//! [48] cp          ::= (Name | choice | seq) ('?' | '*' | '+')?
//! [49] choice      ::= '(' S? cp ( S? '|' S? cp )+ S? ')'
//! [50] seq         ::= '(' S? cp ( S? ',' S? cp )* S? ')'
//! [51] Mixed       ::= '(' S? '#PCDATA' (S? '|' S? Name)* S? ')*'
//!                    | '(' S? '#PCDATA' S? ')'
//! ```
//!
//! Reference: https://www.w3.org/TR/xml/#sec-element-content

use std::fmt;

use crate::error::ContentModelError;
use crate::names::{is_name_char, is_name_start_char, is_xml_whitespace};

/// Default bound on group nesting, see [`crate::limits::Limits`]
const DEFAULT_MAX_DEPTH: usize = 256;

/// Occurrence indicator attached to a content particle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Occurrence {
    /// Exactly once (no indicator)
    #[default]
    Once,
    /// `?`
    Optional,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

impl Occurrence {
    /// Parse an occurrence indicator character
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '?' => Some(Self::Optional),
            '*' => Some(Self::ZeroOrMore),
            '+' => Some(Self::OneOrMore),
            _ => None,
        }
    }

    /// The indicator as written in DTD syntax (empty for [`Occurrence::Once`])
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Once => "",
            Self::Optional => "?",
            Self::ZeroOrMore => "*",
            Self::OneOrMore => "+",
        }
    }
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of a parsed content model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentModelNode {
    /// Reference to an element type by name
    Name {
        /// Referenced element name
        name: String,
        /// Occurrence indicator
        occurrence: Occurrence,
    },
    /// `#PCDATA`, only ever the first child of a mixed-content choice
    PcData,
    /// `(a, b, c)`
    Sequence {
        /// Particles in order
        children: Vec<ContentModelNode>,
        /// Occurrence indicator
        occurrence: Occurrence,
    },
    /// `(a | b | c)`
    Choice {
        /// Alternatives in order
        children: Vec<ContentModelNode>,
        /// Occurrence indicator
        occurrence: Occurrence,
    },
}

impl ContentModelNode {
    /// Create a name particle
    pub fn name(name: impl Into<String>, occurrence: Occurrence) -> Self {
        Self::Name {
            name: name.into(),
            occurrence,
        }
    }

    /// Create a sequence group
    pub fn sequence(children: Vec<ContentModelNode>, occurrence: Occurrence) -> Self {
        Self::Sequence {
            children,
            occurrence,
        }
    }

    /// Create a choice group
    pub fn choice(children: Vec<ContentModelNode>, occurrence: Occurrence) -> Self {
        Self::Choice {
            children,
            occurrence,
        }
    }

    /// Occurrence indicator of this node ([`Occurrence::Once`] for `#PCDATA`)
    pub fn occurrence(&self) -> Occurrence {
        match self {
            Self::Name { occurrence, .. }
            | Self::Sequence { occurrence, .. }
            | Self::Choice { occurrence, .. } => *occurrence,
            Self::PcData => Occurrence::Once,
        }
    }

    /// Child particles of a group (empty for leaves)
    pub fn children(&self) -> &[ContentModelNode] {
        match self {
            Self::Sequence { children, .. } | Self::Choice { children, .. } => children,
            Self::Name { .. } | Self::PcData => &[],
        }
    }

    /// Every element name referenced anywhere in the tree, in document order.
    ///
    /// Names appear once per reference, so duplicates are possible.
    pub fn element_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut stack = vec![self];

        while let Some(node) = stack.pop() {
            match node {
                Self::Name { name, .. } => names.push(name.as_str()),
                Self::PcData => {}
                Self::Sequence { children, .. } | Self::Choice { children, .. } => {
                    stack.extend(children.iter().rev());
                }
            }
        }

        names
    }
}

impl fmt::Display for ContentModelNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name { name, occurrence } => write!(f, "{}{}", name, occurrence),
            Self::PcData => f.write_str("#PCDATA"),
            Self::Sequence {
                children,
                occurrence,
            } => write_group(f, children, ',', *occurrence),
            Self::Choice {
                children,
                occurrence,
            } => write_group(f, children, '|', *occurrence),
        }
    }
}

fn write_group(
    f: &mut fmt::Formatter<'_>,
    children: &[ContentModelNode],
    separator: char,
    occurrence: Occurrence,
) -> fmt::Result {
    f.write_str("(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", separator)?;
        }
        write!(f, "{}", child)?;
    }
    write!(f, "){}", occurrence)
}

/// Content specification of an element declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSpec {
    /// `EMPTY`
    Empty,
    /// `ANY`
    Any,
    /// `(#PCDATA | a | b)*`, always a choice headed by [`ContentModelNode::PcData`]
    Mixed(ContentModelNode),
    /// Element content, a single top-level sequence or choice
    Children(ContentModelNode),
    /// The content model could not be parsed
    Invalid {
        /// Raw content model string
        raw: String,
        /// Parser message
        message: String,
    },
}

impl ContentSpec {
    /// Kind label used in serialized output
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Any => "any",
            Self::Mixed(_) => "mixed",
            Self::Children(_) => "element",
            Self::Invalid { .. } => "invalid",
        }
    }

    /// The grammar tree for mixed and element content
    pub fn model(&self) -> Option<&ContentModelNode> {
        match self {
            Self::Mixed(node) | Self::Children(node) => Some(node),
            _ => None,
        }
    }

    /// Element names referenced by the content model
    pub fn element_names(&self) -> Vec<&str> {
        self.model()
            .map(ContentModelNode::element_names)
            .unwrap_or_default()
    }
}

impl fmt::Display for ContentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("EMPTY"),
            Self::Any => f.write_str("ANY"),
            Self::Mixed(node) | Self::Children(node) => write!(f, "{}", node),
            Self::Invalid { raw, .. } => f.write_str(raw),
        }
    }
}

/// Parse a raw content specification for the named element.
///
/// This is a shortcut for [`ContentModelParser::new`] with default limits.
pub fn parse_content_spec(element: &str, raw: &str) -> Result<ContentSpec, ContentModelError> {
    ContentModelParser::new(element, raw).parse()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Pipe,
    Comma,
    Occurs(Occurrence),
    PcData,
    Name(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Open => "'('".to_string(),
            Token::Close => "')'".to_string(),
            Token::Pipe => "'|'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Occurs(occ) => format!("'{}'", occ),
            Token::PcData => "'#PCDATA'".to_string(),
            Token::Name(name) => format!("name '{}'", name),
        }
    }
}

/// Recursive-descent parser for one content specification
#[derive(Debug)]
pub struct ContentModelParser<'a> {
    element: &'a str,
    raw: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
    max_depth: usize,
}

impl<'a> ContentModelParser<'a> {
    /// Create a parser for the content model of `element`
    pub fn new(element: &'a str, raw: &'a str) -> Self {
        Self {
            element,
            raw,
            tokens: Vec::new(),
            pos: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Bound the nesting depth of groups
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Parse the content specification
    pub fn parse(mut self) -> Result<ContentSpec, ContentModelError> {
        match self.raw.trim_matches(is_xml_whitespace) {
            "EMPTY" => return Ok(ContentSpec::Empty),
            "ANY" => return Ok(ContentSpec::Any),
            "" => return Err(self.error("empty content model", None)),
            _ => {}
        }

        self.tokens = self.tokenize(self.raw)?;

        if !matches!(self.peek(), Some(Token::Open)) {
            return Err(self.error(
                "content model must be EMPTY, ANY or a parenthesized group",
                Some(0),
            ));
        }

        let spec = if matches!(self.tokens.get(1), Some((_, Token::PcData))) {
            ContentSpec::Mixed(self.parse_mixed()?)
        } else {
            ContentSpec::Children(self.parse_group(1)?)
        };

        if let Some((offset, token)) = self.tokens.get(self.pos) {
            return Err(self.error(
                format!("unexpected {} after the content model", token.describe()),
                Some(*offset),
            ));
        }

        Ok(spec)
    }

    fn tokenize(&self, input: &str) -> Result<Vec<(usize, Token)>, ContentModelError> {
        let mut tokens = Vec::new();
        let mut chars = input.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            let token = match c {
                c if is_xml_whitespace(c) => continue,
                '(' => Token::Open,
                ')' => Token::Close,
                '|' => Token::Pipe,
                ',' => Token::Comma,
                '?' | '*' | '+' => Token::Occurs(Occurrence::from_char(c).unwrap_or_default()),
                '#' => {
                    let rest = &input[offset..];
                    let keyword_len = "#PCDATA".len();
                    let is_keyword = rest.starts_with("#PCDATA")
                        && !rest[keyword_len..].chars().next().map(is_name_char).unwrap_or(false);
                    if !is_keyword {
                        return Err(self.error("unknown keyword, expected '#PCDATA'", Some(offset)));
                    }
                    for _ in 1..keyword_len {
                        chars.next();
                    }
                    Token::PcData
                }
                c if is_name_start_char(c) => {
                    let mut name = String::from(c);
                    while let Some(&(_, next)) = chars.peek() {
                        if !is_name_char(next) {
                            break;
                        }
                        name.push(next);
                        chars.next();
                    }
                    Token::Name(name)
                }
                c => {
                    return Err(self.error(format!("unexpected character '{}'", c), Some(offset)));
                }
            };
            tokens.push((offset, token));
        }

        Ok(tokens)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(offset, _)| *offset)
            .unwrap_or_else(|| self.tokens.last().map(|(o, _)| o + 1).unwrap_or(0))
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, token)| token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_occurrence(&mut self) -> Occurrence {
        if let Some(Token::Occurs(occ)) = self.peek() {
            let occ = *occ;
            self.pos += 1;
            occ
        } else {
            Occurrence::Once
        }
    }

    /// `'(' cp (sep cp)* ')' occurrence?` where every separator in the group must agree
    fn parse_group(&mut self, depth: usize) -> Result<ContentModelNode, ContentModelError> {
        if depth > self.max_depth {
            return Err(self.error(
                format!("groups nested deeper than {}", self.max_depth),
                Some(self.offset()),
            ));
        }

        // The caller has already peeked the opening parenthesis
        self.next();

        let mut children = vec![self.parse_cp(depth)?];
        let mut separator: Option<Token> = None;

        loop {
            let offset = self.offset();
            match self.next() {
                Some(Token::Close) => break,
                Some(sep @ (Token::Pipe | Token::Comma)) => {
                    match &separator {
                        Some(existing) if *existing != sep => {
                            return Err(self.error(
                                "cannot mix ',' and '|' in the same group",
                                Some(offset),
                            ));
                        }
                        _ => separator = Some(sep),
                    }
                    children.push(self.parse_cp(depth)?);
                }
                Some(token) => {
                    return Err(self.error(
                        format!("unexpected {}, expected ',', '|' or ')'", token.describe()),
                        Some(offset),
                    ));
                }
                None => return Err(self.error("unterminated group", Some(offset))),
            }
        }

        let occurrence = self.parse_occurrence();
        Ok(match separator {
            Some(Token::Pipe) => ContentModelNode::choice(children, occurrence),
            _ => ContentModelNode::sequence(children, occurrence),
        })
    }

    fn parse_cp(&mut self, depth: usize) -> Result<ContentModelNode, ContentModelError> {
        let offset = self.offset();
        match self.peek() {
            Some(Token::Name(name)) => {
                let name = name.clone();
                self.pos += 1;
                let occurrence = self.parse_occurrence();
                Ok(ContentModelNode::name(name, occurrence))
            }
            Some(Token::Open) => self.parse_group(depth + 1),
            Some(Token::PcData) => Err(self.error(
                "'#PCDATA' is only allowed first in the outermost group",
                Some(offset),
            )),
            Some(token) => {
                let message = format!("unexpected {}, expected a name or '('", token.describe());
                Err(self.error(message, Some(offset)))
            }
            None => Err(self.error("unexpected end of content model", Some(offset))),
        }
    }

    /// `'(' '#PCDATA' ('|' Name)* ')' '*'?`
    fn parse_mixed(&mut self) -> Result<ContentModelNode, ContentModelError> {
        // '(' and '#PCDATA' were peeked by the caller
        self.next();
        self.next();

        let mut children = vec![ContentModelNode::PcData];

        loop {
            let offset = self.offset();
            match self.next() {
                Some(Token::Close) => break,
                Some(Token::Pipe) => {
                    let offset = self.offset();
                    match self.next() {
                        Some(Token::Name(name)) => {
                            if let Some(Token::Occurs(_)) = self.peek() {
                                return Err(self.error(
                                    "occurrence indicators are not allowed on names in mixed content",
                                    Some(self.offset()),
                                ));
                            }
                            children.push(ContentModelNode::name(name, Occurrence::Once));
                        }
                        Some(Token::Open) => {
                            return Err(self.error(
                                "nested groups are not allowed in mixed content",
                                Some(offset),
                            ));
                        }
                        Some(token) => {
                            return Err(self.error(
                                format!("unexpected {} in mixed content", token.describe()),
                                Some(offset),
                            ));
                        }
                        None => return Err(self.error("unterminated group", Some(offset))),
                    }
                }
                Some(Token::Comma) => {
                    return Err(self.error("mixed content must use '|' separators", Some(offset)));
                }
                Some(token) => {
                    return Err(self.error(
                        format!("unexpected {} in mixed content", token.describe()),
                        Some(offset),
                    ));
                }
                None => return Err(self.error("unterminated group", Some(offset))),
            }
        }

        let offset = self.offset();
        let occurrence = self.parse_occurrence();
        match occurrence {
            Occurrence::ZeroOrMore => {}
            Occurrence::Once if children.len() == 1 => {}
            Occurrence::Once => {
                return Err(self.error(
                    "mixed content with element names must end in ')*'",
                    Some(offset),
                ));
            }
            other => {
                return Err(self.error(
                    format!("mixed content cannot carry '{}'", other),
                    Some(offset),
                ));
            }
        }

        Ok(ContentModelNode::choice(children, occurrence))
    }

    fn error(&self, message: impl Into<String>, position: Option<usize>) -> ContentModelError {
        let err = ContentModelError::new(self.element, self.raw, message);
        match position {
            Some(pos) => err.with_position(pos),
            None => err,
        }
    }
}
