//! Push-parser adapter
//!
//! [`SaxConnector`] is the handler a push-style upstream parser calls into:
//! the parser drives it with document, prefix-mapping, element and character
//! callbacks, and it forwards the normalized sequence to the visitor. The
//! coalescing and whitespace rules match the pull adapter, so downstream
//! behavior is identical regardless of which adapter fed it.

use super::{derive_name_fallbacks, flush_text, RawAttribute, TextPredictor, XmlVisitor};
use crate::error::Result;
use crate::events::Locator;
use crate::names::{Attribute, AttributeSet, TagName};
use crate::namespaces::NamespaceContext;
use crate::text::TextBuffer;

/// Push adapter: upstream calls these methods, the visitor receives the
/// uniform sequence.
pub struct SaxConnector<'v, V> {
    visitor: &'v mut V,
    fallback_ns: Option<NamespaceContext>,
    buffer: TextBuffer,
    attrs: AttributeSet,
    end_attrs: AttributeSet,
}

impl<'v, V: XmlVisitor + TextPredictor> SaxConnector<'v, V> {
    /// Wrap a visitor for push-style driving
    pub fn new(visitor: &'v mut V) -> Self {
        Self {
            visitor,
            fallback_ns: None,
            buffer: TextBuffer::new(),
            attrs: AttributeSet::new(),
            end_attrs: AttributeSet::new(),
        }
    }

    /// Install a fallback context for prefixes the parser resolves out of
    /// band
    pub fn with_namespace_context(mut self, ctx: NamespaceContext) -> Self {
        self.fallback_ns = Some(ctx);
        self
    }

    /// Source-position update from the parser
    pub fn set_document_locator(&mut self, locator: Locator) {
        self.visitor.set_locator(locator);
    }

    /// Document begins
    pub fn start_document(&mut self) -> Result<()> {
        self.visitor.start_document(self.fallback_ns.clone())
    }

    /// Document ends
    pub fn end_document(&mut self) -> Result<()> {
        self.visitor.end_document()
    }

    /// A prefix binding comes into scope
    pub fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> Result<()> {
        self.visitor.start_prefix_mapping(prefix, uri)
    }

    /// A prefix binding goes out of scope
    pub fn end_prefix_mapping(&mut self, prefix: &str) -> Result<()> {
        self.visitor.end_prefix_mapping(prefix)
    }

    /// A start tag.
    ///
    /// Push parsers report namespace-resolved names; missing parts are
    /// repaired with the usual qname/local fallbacks.
    pub fn start_element(
        &mut self,
        uri: &str,
        local: &str,
        qname: &str,
        attributes: &[RawAttribute],
    ) -> Result<()> {
        flush_text(self.visitor, &mut self.buffer, false)?;
        let mut local = local.to_string();
        let mut qname = qname.to_string();
        derive_name_fallbacks(&mut local, &mut qname);

        self.attrs.clear();
        for attr in attributes {
            let mut a_local = attr.local.clone();
            let mut a_qname = attr.qname.clone();
            derive_name_fallbacks(&mut a_local, &mut a_qname);
            self.attrs.push(Attribute {
                uri: attr.uri.clone(),
                local: a_local,
                qname: a_qname,
                value: attr.value.clone(),
            });
        }

        let tag = TagName {
            uri,
            local: &local,
            qname: &qname,
            attributes: &self.attrs,
        };
        self.visitor.start_element(&tag)
    }

    /// Character data; adjacent calls coalesce into one downstream run
    pub fn characters(&mut self, data: &str) -> Result<()> {
        if self.visitor.expect_text()
            || !self.buffer.is_empty()
            || !data.chars().all(char::is_whitespace)
        {
            self.buffer.push_str(data);
        }
        Ok(())
    }

    /// Whitespace the parser already classified as ignorable
    pub fn ignorable_whitespace(&mut self, data: &str) -> Result<()> {
        if self.visitor.expect_text() {
            self.buffer.push_str(data);
        }
        Ok(())
    }

    /// An end tag
    pub fn end_element(&mut self, uri: &str, local: &str, qname: &str) -> Result<()> {
        flush_text(self.visitor, &mut self.buffer, true)?;
        let mut local = local.to_string();
        let mut qname = qname.to_string();
        derive_name_fallbacks(&mut local, &mut qname);
        let tag = TagName {
            uri,
            local: &local,
            qname: &qname,
            attributes: &self.end_attrs,
        };
        self.visitor.end_element(&tag)
    }
}
