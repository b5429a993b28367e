//! Limits and constraints for DTD processing
//!
//! This module defines limits that keep recursive grammars and entity
//! expansion bounded (deeply nested content models, billion laughs style
//! parameter entities).

use crate::error::{Error, Result};

/// Global limits configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum nesting depth of groups inside one content model
    pub max_content_model_depth: usize,

    /// Maximum number of entity expansions per run
    pub max_entity_expansions: usize,

    /// Maximum size of a single entity expansion in bytes
    pub max_entity_expansion_size: usize,

    /// Maximum nesting depth of entity references
    pub max_entity_depth: usize,

    /// Maximum size of a DTD (or document) source in bytes
    pub max_dtd_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_content_model_depth: 256,
            max_entity_expansions: 10000,
            max_entity_expansion_size: 10 * 1024 * 1024, // 10 MB
            max_entity_depth: 64,
            max_dtd_size: 100 * 1024 * 1024, // 100 MB
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_content_model_depth: 32,
            max_entity_expansions: 1000,
            max_entity_expansion_size: 1024 * 1024, // 1 MB
            max_entity_depth: 16,
            max_dtd_size: 10 * 1024 * 1024, // 10 MB
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_content_model_depth: 4096,
            max_entity_expansions: 1000000,
            max_entity_expansion_size: 100 * 1024 * 1024, // 100 MB
            max_entity_depth: 1024,
            max_dtd_size: 1024 * 1024 * 1024, // 1 GB
        }
    }

    /// Check if entity expansions are within limits
    pub fn check_entity_expansions(&self, count: usize) -> Result<()> {
        if count > self.max_entity_expansions {
            Err(Error::LimitExceeded(format!(
                "entity expansions {} exceeds maximum {}",
                count, self.max_entity_expansions
            )))
        } else {
            Ok(())
        }
    }

    /// Check if entity expansion size is within limits
    pub fn check_entity_expansion_size(&self, size: usize) -> Result<()> {
        if size > self.max_entity_expansion_size {
            Err(Error::LimitExceeded(format!(
                "entity expansion size {} bytes exceeds maximum {} bytes",
                size, self.max_entity_expansion_size
            )))
        } else {
            Ok(())
        }
    }

    /// Check if entity reference nesting is within limits
    pub fn check_entity_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_entity_depth {
            Err(Error::LimitExceeded(format!(
                "entity nesting depth {} exceeds maximum {}",
                depth, self.max_entity_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if a DTD source size is within limits
    pub fn check_dtd_size(&self, size: usize) -> Result<()> {
        if size > self.max_dtd_size {
            Err(Error::LimitExceeded(format!(
                "DTD size {} bytes exceeds maximum {} bytes",
                size, self.max_dtd_size
            )))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_content_model_depth, 256);
        assert_eq!(limits.max_entity_expansions, 10000);
    }

    #[test]
    fn test_strict_is_tighter() {
        let strict = Limits::strict();
        let default = Limits::default();
        assert!(strict.max_entity_expansions < default.max_entity_expansions);
        assert!(strict.max_content_model_depth < default.max_content_model_depth);
    }

    #[test]
    fn test_check_entity_depth() {
        let limits = Limits::strict();
        assert!(limits.check_entity_depth(16).is_ok());
        assert!(matches!(
            limits.check_entity_depth(17),
            Err(Error::LimitExceeded(_))
        ));
    }

    #[test]
    fn test_check_entity_expansions() {
        let limits = Limits::default();
        assert!(limits.check_entity_expansions(100).is_ok());
        assert!(limits.check_entity_expansions(10001).is_err());
    }

    #[test]
    fn test_check_dtd_size() {
        let limits = Limits::strict();
        assert!(limits.check_dtd_size(1024).is_ok());
        assert!(limits.check_dtd_size(11 * 1024 * 1024).is_err());
    }
}
