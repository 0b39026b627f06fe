//! XML names, the per-callback tag view, and string interning
//!
//! [`TagName`] is a lightweight view over one element's qualified name and
//! attribute list. It is only valid for the duration of a single start-tag
//! callback; anything kept beyond that must be converted to an owned
//! [`ExpandedName`].

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// The XML Schema instance namespace (`xsi:` by convention)
pub const XSI_URI: &str = "http://www.w3.org/2001/XMLSchema-instance";
/// The reserved `xml` prefix namespace
pub const XML_URI: &str = "http://www.w3.org/XML/1998/namespace";
/// The reserved `xmlns` prefix namespace
pub const XMLNS_URI: &str = "http://www.w3.org/2000/xmlns/";

/// An owned, interned (namespace URI, local name) pair.
///
/// Used as the key type in binding registries and as the element name stored
/// on wrapper values. Equality and hashing are by content, so interning is a
/// speed optimization rather than a correctness requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpandedName {
    /// Namespace URI (empty string for no namespace)
    pub uri: Rc<str>,
    /// Local name
    pub local: Rc<str>,
}

impl ExpandedName {
    /// Create a new expanded name
    pub fn new(uri: impl Into<Rc<str>>, local: impl Into<Rc<str>>) -> Self {
        Self {
            uri: uri.into(),
            local: local.into(),
        }
    }

    /// Create a name with no namespace
    pub fn local(local: impl Into<Rc<str>>) -> Self {
        Self::new("", local)
    }

    /// Whether this name matches the given (uri, local) pair
    pub fn matches(&self, uri: &str, local: &str) -> bool {
        self.uri.as_ref() == uri && self.local.as_ref() == local
    }
}

impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.uri.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{{{}}}{}", self.uri, self.local)
        }
    }
}

/// One attribute as seen on a start tag
#[derive(Debug, Clone, Default)]
pub struct Attribute {
    /// Namespace URI (empty for unqualified attributes)
    pub uri: String,
    /// Local name
    pub local: String,
    /// Qualified name as written in the document
    pub qname: String,
    /// Attribute value, entity-decoded
    pub value: String,
}

/// Reusable attribute list; cleared and refilled for every start tag
#[derive(Debug, Clone, Default)]
pub struct AttributeSet {
    attrs: Vec<Attribute>,
}

impl AttributeSet {
    /// Create an empty attribute set
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all attributes, keeping the allocation
    pub fn clear(&mut self) {
        self.attrs.clear();
    }

    /// Append an attribute
    pub fn push(&mut self, attr: Attribute) {
        self.attrs.push(attr);
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Positional access
    pub fn get(&self, index: usize) -> Option<&Attribute> {
        self.attrs.get(index)
    }

    /// Iterate over the attributes in document order
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attrs.iter()
    }

    /// Look up an attribute value by (uri, local)
    pub fn value_of(&self, uri: &str, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.uri == uri && a.local == local)
            .map(|a| a.value.as_str())
    }

    /// The `xsi:type` attribute value, if present
    pub fn xsi_type(&self) -> Option<&str> {
        self.value_of(XSI_URI, "type")
    }

    /// Whether `xsi:nil` is present and true
    pub fn xsi_nil(&self) -> bool {
        matches!(self.value_of(XSI_URI, "nil"), Some("true") | Some("1"))
    }

    /// Whether any attribute outside the xsi namespace is present
    pub fn has_non_xsi(&self) -> bool {
        self.attrs.iter().any(|a| a.uri != XSI_URI)
    }
}

/// A view over one element's name and attributes, valid for a single
/// start-tag or end-tag callback.
#[derive(Debug, Clone, Copy)]
pub struct TagName<'a> {
    /// Namespace URI (empty for no namespace)
    pub uri: &'a str,
    /// Local name
    pub local: &'a str,
    /// Qualified name as written (may equal `local`)
    pub qname: &'a str,
    /// Attribute list for this start tag (empty on end tags)
    pub attributes: &'a AttributeSet,
}

impl<'a> TagName<'a> {
    /// Whether this tag matches the given (uri, local) pair
    pub fn matches(&self, uri: &str, local: &str) -> bool {
        self.uri == uri && self.local == local
    }

    /// Convert to an owned name, interning through the given pool
    pub fn to_expanded(&self, pool: &mut StringPool) -> ExpandedName {
        ExpandedName {
            uri: pool.intern(self.uri),
            local: pool.intern(self.local),
        }
    }
}

impl fmt::Display for TagName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.uri.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{{{}}}{}", self.uri, self.local)
        }
    }
}

/// Interning pool for namespace URIs and local names.
///
/// Sources that do not guarantee pre-interned identifiers are routed through
/// this pool so repeated names share one allocation.
#[derive(Debug, Default)]
pub struct StringPool {
    strings: HashSet<Rc<str>>,
}

impl StringPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning the shared copy
    pub fn intern(&mut self, s: &str) -> Rc<str> {
        if let Some(found) = self.strings.get(s) {
            return Rc::clone(found);
        }
        let rc: Rc<str> = Rc::from(s);
        self.strings.insert(Rc::clone(&rc));
        rc
    }

    /// Number of distinct interned strings
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// Split a qualified name into (prefix, local). The prefix is empty when the
/// name carries no colon.
pub fn split_qname(qname: &str) -> (&str, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", qname),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expanded_name_display() {
        assert_eq!(ExpandedName::local("a").to_string(), "a");
        assert_eq!(
            ExpandedName::new("urn:x", "a").to_string(),
            "{urn:x}a"
        );
    }

    #[test]
    fn test_attribute_lookup() {
        let mut attrs = AttributeSet::new();
        attrs.push(Attribute {
            uri: "urn:x".into(),
            local: "id".into(),
            qname: "p:id".into(),
            value: "i1".into(),
        });
        assert_eq!(attrs.value_of("urn:x", "id"), Some("i1"));
        assert_eq!(attrs.value_of("urn:x", "other"), None);
        assert!(attrs.has_non_xsi());
    }

    #[test]
    fn test_xsi_probes() {
        let mut attrs = AttributeSet::new();
        attrs.push(Attribute {
            uri: XSI_URI.into(),
            local: "nil".into(),
            qname: "xsi:nil".into(),
            value: "true".into(),
        });
        attrs.push(Attribute {
            uri: XSI_URI.into(),
            local: "type".into(),
            qname: "xsi:type".into(),
            value: "p:Widget".into(),
        });
        assert!(attrs.xsi_nil());
        assert_eq!(attrs.xsi_type(), Some("p:Widget"));
        assert!(!attrs.has_non_xsi());
    }

    #[test]
    fn test_string_pool_shares() {
        let mut pool = StringPool::new();
        let a = pool.intern("element");
        let b = pool.intern("element");
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_split_qname() {
        assert_eq!(split_qname("p:local"), ("p", "local"));
        assert_eq!(split_qname("local"), ("", "local"));
    }
}
