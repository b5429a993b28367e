//! Declaration types of the DTD model
//!
//! Reference: https://www.w3.org/TR/xml/#dt-markupdecl

use std::fmt;

use crate::content_model::ContentSpec;

/// `<!ELEMENT name contentspec>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDeclaration {
    /// Element type name
    pub name: String,
    /// Parsed content specification, [`ContentSpec::Invalid`] when unparseable
    pub content: ContentSpec,
    /// Position of the first declaration in the event stream (1-based)
    pub dtd_order: usize,
}

impl ElementDeclaration {
    /// Create a new element declaration
    pub fn new(name: impl Into<String>, content: ContentSpec, dtd_order: usize) -> Self {
        Self {
            name: name.into(),
            content,
            dtd_order,
        }
    }
}

/// Declared type of an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeType {
    /// `CDATA`
    CData,
    /// `ID`
    Id,
    /// `IDREF`
    IdRef,
    /// `IDREFS`
    IdRefs,
    /// `ENTITY`
    Entity,
    /// `ENTITIES`
    Entities,
    /// `NMTOKEN`
    NmToken,
    /// `NMTOKENS`
    NmTokens,
    /// `(a | b | c)`
    Enumeration(Vec<String>),
    /// `NOTATION (a | b)`
    Notation(Vec<String>),
}

impl AttributeType {
    /// Parse a keyword type (enumerations are handled by the attribute-list parser)
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "CDATA" => Some(Self::CData),
            "ID" => Some(Self::Id),
            "IDREF" => Some(Self::IdRef),
            "IDREFS" => Some(Self::IdRefs),
            "ENTITY" => Some(Self::Entity),
            "ENTITIES" => Some(Self::Entities),
            "NMTOKEN" => Some(Self::NmToken),
            "NMTOKENS" => Some(Self::NmTokens),
            _ => None,
        }
    }

    /// Check if values of this type are tokenized (everything but CDATA)
    pub fn is_tokenized(&self) -> bool {
        !matches!(self, Self::CData)
    }

    /// Allowed values of an enumerated or notation type
    pub fn values(&self) -> &[String] {
        match self {
            Self::Enumeration(values) | Self::Notation(values) => values,
            _ => &[],
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CData => f.write_str("CDATA"),
            Self::Id => f.write_str("ID"),
            Self::IdRef => f.write_str("IDREF"),
            Self::IdRefs => f.write_str("IDREFS"),
            Self::Entity => f.write_str("ENTITY"),
            Self::Entities => f.write_str("ENTITIES"),
            Self::NmToken => f.write_str("NMTOKEN"),
            Self::NmTokens => f.write_str("NMTOKENS"),
            Self::Enumeration(values) => write!(f, "({})", values.join("|")),
            Self::Notation(values) => write!(f, "NOTATION ({})", values.join("|")),
        }
    }
}

/// Default declaration of an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultMode {
    /// `#REQUIRED`
    Required,
    /// `#IMPLIED`
    Implied,
    /// `#FIXED "value"`
    Fixed(String),
    /// `"value"`
    Default(String),
}

impl DefaultMode {
    /// Mode label used in serialized output
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Required => "#REQUIRED",
            Self::Implied => "#IMPLIED",
            Self::Fixed(_) => "#FIXED",
            Self::Default(_) => "#DEFAULT",
        }
    }

    /// The default value, if one is declared
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Fixed(value) | Self::Default(value) => Some(value),
            Self::Required | Self::Implied => None,
        }
    }
}

/// One attribute definition from an `<!ATTLIST>` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDeclaration {
    /// Element the attribute belongs to
    pub element: String,
    /// Attribute name
    pub name: String,
    /// Declared type
    pub attribute_type: AttributeType,
    /// Default declaration, with the value normalized
    pub default: DefaultMode,
    /// General entities expanded while normalizing the default value
    pub referenced_entities: Vec<String>,
    /// Position of the declaring attribute-list record (1-based)
    pub dtd_order: usize,
}

/// Whether an entity is a general (`&name;`) or parameter (`%name;`) entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityScope {
    /// Referenced from document content
    General,
    /// Referenced from DTD syntax
    Parameter,
}

impl fmt::Display for EntityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::General => f.write_str("general"),
            Self::Parameter => f.write_str("parameter"),
        }
    }
}

/// Public and/or system identifier of an external resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalId {
    /// Public identifier, whitespace-normalized
    pub public_id: Option<String>,
    /// System identifier (URI reference)
    pub system_id: Option<String>,
}

impl ExternalId {
    /// `SYSTEM "system_id"`
    pub fn system(system_id: impl Into<String>) -> Self {
        Self {
            public_id: None,
            system_id: Some(system_id.into()),
        }
    }

    /// `PUBLIC "public_id" ["system_id"]`
    pub fn public(public_id: impl Into<String>, system_id: Option<String>) -> Self {
        Self {
            public_id: Some(public_id.into()),
            system_id,
        }
    }
}

/// Replacement text or locator of an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    /// Literal value with character references expanded
    Internal(String),
    /// External entity; `notation` is set only for unparsed general entities
    External {
        /// Locator
        external_id: ExternalId,
        /// `NDATA` notation
        notation: Option<String>,
    },
}

/// `<!ENTITY [%] name ...>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDeclaration {
    /// Entity name
    pub name: String,
    /// General or parameter
    pub scope: EntityScope,
    /// Value or locator
    pub kind: EntityKind,
    /// Position of the declaration in the event stream (1-based)
    pub dtd_order: usize,
}

impl EntityDeclaration {
    /// Kind label used in serialized output
    pub fn type_label(&self) -> &'static str {
        match &self.kind {
            EntityKind::Internal(_) => "internal",
            EntityKind::External { notation: None, .. } => "external",
            EntityKind::External {
                notation: Some(_), ..
            } => "unparsed",
        }
    }

    /// Notation of an unparsed entity
    pub fn notation(&self) -> Option<&str> {
        match &self.kind {
            EntityKind::External { notation, .. } => notation.as_deref(),
            EntityKind::Internal(_) => None,
        }
    }
}

/// `<!NOTATION name ExternalID | PublicID>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotationDeclaration {
    /// Notation name
    pub name: String,
    /// Locator
    pub external_id: ExternalId,
    /// Position of the first declaration in the event stream (1-based)
    pub dtd_order: usize,
}

/// A comment found between declarations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Comment text without the delimiters
    pub text: String,
    /// Position in the event stream (1-based)
    pub dtd_order: usize,
}

/// A processing instruction found between declarations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingInstruction {
    /// PI target
    pub target: String,
    /// PI data
    pub data: String,
    /// Position in the event stream (1-based)
    pub dtd_order: usize,
}
