//! XML namespace handling
//!
//! The live prefix-binding stack mirrors the document's in-scope
//! declarations: a flat array of (prefix, uri) pairs with a running length.
//! Resolution scans backward so the most recent declaration wins, then falls
//! back to an externally supplied [`NamespaceContext`], then to the implicit
//! default binding `"" -> ""`.

use std::collections::HashMap;

use crate::names::{XMLNS_URI, XML_URI};

/// Namespace context supplied by the caller as a resolution fallback.
///
/// Needed when the underlying parser resolves some prefixes outside the
/// visible event stream (entity expansions, external DTD defaults).
#[derive(Debug, Clone, Default)]
pub struct NamespaceContext {
    prefixes: HashMap<String, String>,
}

impl NamespaceContext {
    /// Create an empty namespace context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a prefix binding
    pub fn with_prefix(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.prefixes.insert(prefix.into(), uri.into());
        self
    }

    /// Resolve a prefix to a URI
    pub fn uri_for(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }
}

/// The live prefix-binding stack owned by one unmarshalling context
#[derive(Debug, Default)]
pub struct NamespaceStack {
    /// (prefix, uri) pairs in declaration order
    bindings: Vec<(String, String)>,
    /// External fallback consulted when the stack has no binding
    fallback: Option<NamespaceContext>,
}

impl NamespaceStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to the empty state, installing an optional fallback context
    pub fn reset(&mut self, fallback: Option<NamespaceContext>) {
        self.bindings.clear();
        self.fallback = fallback;
    }

    /// Number of bindings currently in scope
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no bindings are in scope
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Push one prefix binding
    pub fn push_binding(&mut self, prefix: &str, uri: &str) {
        self.bindings.push((prefix.to_string(), uri.to_string()));
    }

    /// Pop the most recent binding for the given prefix.
    ///
    /// Well-formed event streams end mappings in reverse declaration order,
    /// but a backward scan tolerates out-of-order ends from lenient parsers.
    pub fn pop_binding(&mut self, prefix: &str) {
        if let Some(pos) = self.bindings.iter().rposition(|(p, _)| p == prefix) {
            self.bindings.remove(pos);
        }
    }

    /// Truncate the stack to a recorded length (used when a State pops)
    pub fn truncate(&mut self, len: usize) {
        debug_assert!(len <= self.bindings.len());
        self.bindings.truncate(len);
    }

    /// Resolve a prefix to a namespace URI.
    ///
    /// The reserved `xml` and `xmlns` prefixes are fixed by the XML
    /// recommendation and resolve regardless of declarations.
    pub fn uri_for(&self, prefix: &str) -> Option<&str> {
        match prefix {
            "xml" => return Some(XML_URI),
            "xmlns" => return Some(XMLNS_URI),
            _ => {}
        }
        if let Some((_, uri)) = self.bindings.iter().rev().find(|(p, _)| p == prefix) {
            return Some(uri.as_str());
        }
        if let Some(ctx) = &self.fallback {
            if let Some(uri) = ctx.uri_for(prefix) {
                return Some(uri);
            }
        }
        if prefix.is_empty() {
            // Implicit default binding
            return Some("");
        }
        None
    }

    /// All prefixes currently bound to the given URI, most recent first.
    ///
    /// A prefix shadowed by a later rebinding is excluded.
    pub fn prefixes_for(&self, uri: &str) -> Vec<&str> {
        match uri {
            XML_URI => return vec!["xml"],
            XMLNS_URI => return vec!["xmlns"],
            _ => {}
        }
        let mut out = Vec::new();
        for (i, (prefix, bound)) in self.bindings.iter().enumerate().rev() {
            if bound != uri {
                continue;
            }
            let shadowed = self.bindings[i + 1..].iter().any(|(p, _)| p == prefix);
            if !shadowed && !out.contains(&prefix.as_str()) {
                out.push(prefix.as_str());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_recent_wins() {
        let mut stack = NamespaceStack::new();
        stack.push_binding("p", "urn:a");
        stack.push_binding("p", "urn:b");
        assert_eq!(stack.uri_for("p"), Some("urn:b"));
        stack.pop_binding("p");
        assert_eq!(stack.uri_for("p"), Some("urn:a"));
    }

    #[test]
    fn test_reserved_prefixes() {
        let stack = NamespaceStack::new();
        assert_eq!(stack.uri_for("xml"), Some(XML_URI));
        assert_eq!(stack.uri_for("xmlns"), Some(XMLNS_URI));
        assert_eq!(stack.prefixes_for(XML_URI), vec!["xml"]);
    }

    #[test]
    fn test_fallback_context() {
        let mut stack = NamespaceStack::new();
        stack.reset(Some(NamespaceContext::new().with_prefix("ext", "urn:ext")));
        assert_eq!(stack.uri_for("ext"), Some("urn:ext"));
        // Live bindings shadow the fallback
        stack.push_binding("ext", "urn:live");
        assert_eq!(stack.uri_for("ext"), Some("urn:live"));
    }

    #[test]
    fn test_implicit_default() {
        let stack = NamespaceStack::new();
        assert_eq!(stack.uri_for(""), Some(""));
        assert_eq!(stack.uri_for("undeclared"), None);
    }

    #[test]
    fn test_prefixes_for_excludes_shadowed() {
        let mut stack = NamespaceStack::new();
        stack.push_binding("a", "urn:x");
        stack.push_binding("b", "urn:x");
        stack.push_binding("a", "urn:y");
        let prefixes = stack.prefixes_for("urn:x");
        assert_eq!(prefixes, vec!["b"]);
    }

    #[test]
    fn test_truncate_restores_scope() {
        let mut stack = NamespaceStack::new();
        stack.push_binding("p", "urn:a");
        let mark = stack.len();
        stack.push_binding("q", "urn:b");
        stack.truncate(mark);
        assert_eq!(stack.uri_for("q"), None);
        assert_eq!(stack.uri_for("p"), Some("urn:a"));
    }
}
