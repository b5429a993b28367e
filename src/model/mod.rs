//! The structured DTD model
//!
//! This module contains the declaration types, the [`DeclarationGraph`]
//! holding them in encounter order, and the [`ModelBuilder`] that turns a
//! collected [`RawLog`](crate::collector::RawLog) into a graph.

pub mod attributes;
pub mod builder;
pub mod declarations;
pub mod graph;
pub mod values;

pub use attributes::{parse_attribute_definitions, AttributeDefinition};
pub use builder::{BuildOutput, ModelBuilder};
pub use declarations::{
    AttributeDeclaration, AttributeType, Comment, DefaultMode, ElementDeclaration,
    EntityDeclaration, EntityKind, EntityScope, ExternalId, NotationDeclaration,
    ProcessingInstruction,
};
pub use graph::{DeclarationGraph, DeclarationKey};
pub use values::{NormalizedValue, ValueNormalizer};
