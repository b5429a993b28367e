//! Event sources
//!
//! An [`EventSource`] tokenizes DTD syntax and reports raw declarations to a
//! [`DeclarationHandler`](crate::collector::DeclarationHandler). The analysis
//! pipeline only depends on the trait; [`DtdScanner`] is the reference
//! implementation for DTD files and XML documents with a DOCTYPE.

mod resolver;
mod scanner;

pub use resolver::{EntityResolver, FileResolver, ResolvedEntity};
pub use scanner::DtdScanner;

use crate::collector::DeclarationHandler;
use crate::error::Result;

/// Producer of declaration events
pub trait EventSource {
    /// Report every declaration to `handler`.
    ///
    /// Returning [`Error::EndOfDtd`](crate::Error::EndOfDtd) means the source
    /// stopped on purpose before the end of its input.
    fn run(&mut self, handler: &mut dyn DeclarationHandler) -> Result<()>;
}

/// Normalize `\r\n` and lone `\r` to `\n` (XML 1.0 §2.11)
pub(crate) fn normalize_line_endings(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\n"), "a\nb\nc\n");
        assert_eq!(normalize_line_endings("plain"), "plain");
    }
}
