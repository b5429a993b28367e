//! External entity resolution
//!
//! The scanner asks an [`EntityResolver`] for the text of external subsets
//! and external parameter entities. [`FileResolver`] reads local files;
//! remote locations are rejected.

use std::fs;

use tracing::debug;

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::locations::Location;
use crate::model::ExternalId;
use crate::syntax::strip_text_declaration;

use super::normalize_line_endings;

/// The loaded text of an external entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntity {
    /// Where the text was loaded from, used as base for nested references
    pub location: Location,
    /// Entity text with the text declaration removed and line endings normalized
    pub text: String,
}

/// Loads external entities referenced from a DTD
pub trait EntityResolver {
    /// Load the entity identified by `external_id`, relative to `base`
    fn resolve(&mut self, base: Option<&Location>, external_id: &ExternalId) -> Result<ResolvedEntity>;
}

/// Resolver for local files
#[derive(Debug, Clone, Default)]
pub struct FileResolver {
    /// Resource limits
    limits: Limits,
}

impl FileResolver {
    /// Create a new resolver with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Read a location into a string
    pub fn load(&self, location: &Location) -> Result<String> {
        let Some(path) = location.as_path() else {
            return Err(Error::Resource(format!(
                "remote resources are not supported: {}",
                location
            )));
        };

        let content = fs::read_to_string(path)
            .map_err(|e| Error::Resource(format!("failed to read '{}': {}", path.display(), e)))?;
        self.limits.check_dtd_size(content.len())?;
        Ok(content)
    }
}

impl EntityResolver for FileResolver {
    fn resolve(&mut self, base: Option<&Location>, external_id: &ExternalId) -> Result<ResolvedEntity> {
        let system_id = external_id.system_id.as_deref().ok_or_else(|| {
            Error::Resource(format!(
                "cannot resolve public identifier '{}' without a system identifier",
                external_id.public_id.as_deref().unwrap_or_default()
            ))
        })?;

        let location = match base {
            Some(base) => base.resolve(system_id)?,
            None => Location::parse(system_id)?,
        };
        debug!(%location, "loading external entity");

        let text = self.load(&location)?;
        let text = normalize_line_endings(strip_text_declaration(&text));
        Ok(ResolvedEntity { location, text })
    }
}
