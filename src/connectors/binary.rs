//! Binary-XML adapter
//!
//! Binary encodings carry octet runs natively, so re-encoding them to
//! base64 characters just for the object layer to decode again would be
//! wasted work. [`BinaryConnector`] keeps those runs as binary chunks of
//! the buffered text sequence, preserving document order against character
//! runs, and the lazy base64 view materializes only if something actually
//! reads the data as characters.

use super::{derive_name_fallbacks, flush_text, RawAttribute, TextPredictor, XmlVisitor};
use crate::error::Result;
use crate::events::Locator;
use crate::names::{Attribute, AttributeSet, TagName};
use crate::namespaces::NamespaceContext;
use crate::text::{Base64Text, TextBuffer};

/// One token from a binary-XML reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryToken {
    /// Document start
    StartDocument,
    /// Element start; names, attributes and declarations readable until
    /// the next token
    StartElement,
    /// Character run; readable via [`BinaryXmlReader::text`]
    Text,
    /// Octet run; readable via [`BinaryXmlReader::binary`]
    Binary,
    /// Element end; names readable until the next token
    EndElement,
    /// Document end
    EndDocument,
}

/// The pull shape of a binary-XML decoder.
///
/// Accessor validity follows the current token: name accessors are
/// meaningful after `StartElement`/`EndElement`, `text` after `Text`,
/// `binary` after `Binary`.
pub trait BinaryXmlReader {
    /// Advance to the next token
    fn next_token(&mut self) -> Result<BinaryToken>;

    /// Namespace URI of the current element
    fn uri(&self) -> &str;

    /// Local name of the current element
    fn local(&self) -> &str;

    /// Qualified name of the current element (may equal the local name)
    fn qname(&self) -> &str;

    /// Attributes of the current start tag, declarations excluded
    fn attributes(&self) -> &[RawAttribute];

    /// (prefix, uri) declarations on the current start tag
    fn prefix_declarations(&self) -> &[(String, String)];

    /// Character data of the current `Text` token
    fn text(&self) -> &str;

    /// Octet run of the current `Binary` token, as a lazy base64 view
    fn binary(&mut self) -> Base64Text;

    /// Current source position
    fn locator(&self) -> Locator {
        Locator::unknown()
    }
}

/// Adapter from a [`BinaryXmlReader`] to the visitor call sequence
pub struct BinaryConnector<'r> {
    reader: &'r mut dyn BinaryXmlReader,
    buffer: TextBuffer,
    decl_stack: Vec<Vec<String>>,
    attrs: AttributeSet,
    end_attrs: AttributeSet,
}

impl<'r> BinaryConnector<'r> {
    /// Create a connector over the given reader
    pub fn new(reader: &'r mut dyn BinaryXmlReader) -> Self {
        Self {
            reader,
            buffer: TextBuffer::new(),
            decl_stack: Vec::new(),
            attrs: AttributeSet::new(),
            end_attrs: AttributeSet::new(),
        }
    }

    /// Pump the reader to completion, forwarding to the visitor
    pub fn drive<V: XmlVisitor + TextPredictor>(
        &mut self,
        visitor: &mut V,
        fallback_ns: Option<NamespaceContext>,
    ) -> Result<()> {
        self.decl_stack.clear();
        loop {
            let token = self.reader.next_token()?;
            visitor.set_locator(self.reader.locator());
            match token {
                BinaryToken::StartDocument => {
                    visitor.start_document(fallback_ns.clone())?;
                }
                BinaryToken::StartElement => {
                    flush_text(visitor, &mut self.buffer, false)?;
                    self.start_element(visitor)?;
                }
                BinaryToken::Text => {
                    let data = self.reader.text();
                    if visitor.expect_text()
                        || !self.buffer.is_empty()
                        || !data.chars().all(char::is_whitespace)
                    {
                        self.buffer.push_str(data);
                    }
                }
                BinaryToken::Binary => {
                    // Octet runs interleave with character runs in document
                    // order; never expanded here.
                    let data = self.reader.binary();
                    self.buffer.push_binary(data);
                }
                BinaryToken::EndElement => {
                    flush_text(visitor, &mut self.buffer, true)?;
                    self.end_element(visitor)?;
                }
                BinaryToken::EndDocument => {
                    visitor.end_document()?;
                    return Ok(());
                }
            }
        }
    }

    fn start_element<V: XmlVisitor + TextPredictor>(&mut self, visitor: &mut V) -> Result<()> {
        let decls = self.reader.prefix_declarations().to_vec();
        let mut declared = Vec::with_capacity(decls.len());
        for (prefix, uri) in decls {
            visitor.start_prefix_mapping(&prefix, &uri)?;
            declared.push(prefix);
        }
        self.decl_stack.push(declared);

        let uri = self.reader.uri().to_string();
        let mut local = self.reader.local().to_string();
        let mut qname = self.reader.qname().to_string();
        derive_name_fallbacks(&mut local, &mut qname);

        self.attrs.clear();
        for attr in self.reader.attributes() {
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
            uri: &uri,
            local: &local,
            qname: &qname,
            attributes: &self.attrs,
        };
        visitor.start_element(&tag)
    }

    fn end_element<V: XmlVisitor + TextPredictor>(&mut self, visitor: &mut V) -> Result<()> {
        let uri = self.reader.uri().to_string();
        let mut local = self.reader.local().to_string();
        let mut qname = self.reader.qname().to_string();
        derive_name_fallbacks(&mut local, &mut qname);
        let tag = TagName {
            uri: &uri,
            local: &local,
            qname: &qname,
            attributes: &self.end_attrs,
        };
        visitor.end_element(&tag)?;

        if let Some(declared) = self.decl_stack.pop() {
            for prefix in declared.iter().rev() {
                visitor.end_prefix_mapping(prefix)?;
            }
        }
        Ok(())
    }
}
