//! Resource location resolution
//!
//! System identifiers in a DTD are URI references, usually relative to the
//! entity that contains them. A [`Location`] is either a local path or a
//! URL; `file:` URLs are turned into paths so they can be read directly.

use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{Error, Result};

/// Resource location - a file path or a (non-file) URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// File system path
    Path(PathBuf),
    /// URL (http, https, ftp, etc.)
    Url(Url),
}

impl Location {
    /// Classify a system identifier
    pub fn parse(s: &str) -> Result<Self> {
        match Url::parse(s) {
            // single-letter schemes are Windows drive letters
            Ok(url) if url.scheme().len() > 1 => Self::from_url(url),
            _ => Ok(Location::Path(PathBuf::from(s))),
        }
    }

    fn from_url(url: Url) -> Result<Self> {
        if url.scheme() != "file" {
            return Ok(Location::Url(url));
        }
        url.to_file_path()
            .map(Location::Path)
            .map_err(|_| Error::Resource(format!("cannot convert '{}' to a local path", url)))
    }

    /// Resolve a system identifier relative to this location
    pub fn resolve(&self, reference: &str) -> Result<Self> {
        if let Ok(url) = Url::parse(reference) {
            if url.scheme().len() > 1 {
                return Self::from_url(url);
            }
        }

        match self {
            Location::Path(path) => {
                let reference = Path::new(reference);
                if reference.is_absolute() {
                    return Ok(Location::Path(reference.to_path_buf()));
                }
                let base = path.parent().unwrap_or_else(|| Path::new(""));
                Ok(Location::Path(base.join(reference)))
            }
            Location::Url(url) => Self::from_url(url.join(reference)?),
        }
    }

    /// Local path, if this is a file location
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Location::Path(path) => Some(path),
            Location::Url(_) => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Path(path) => write!(f, "{}", path.display()),
            Location::Url(url) => write!(f, "{}", url),
        }
    }
}

impl From<PathBuf> for Location {
    fn from(path: PathBuf) -> Self {
        Location::Path(path)
    }
}

impl From<&Path> for Location {
    fn from(path: &Path) -> Self {
        Location::Path(path.to_path_buf())
    }
}
