//! Generic pull-parser adapter
//!
//! [`PullConnector`] drives any [`PullReader`] and translates its events
//! into visitor calls: qnames are resolved against a live prefix stack,
//! `xmlns` declarations become prefix-mapping brackets around their owning
//! element, and character runs are coalesced so the visitor sees at most
//! one `text()` call between structural events. [`QuickXmlReader`] is the
//! bundled [`PullReader`] over a `quick_xml` event stream.

use std::rc::Rc;

use quick_xml::events::Event;
use quick_xml::Reader;

use super::{
    derive_name_fallbacks, flush_text, PullEvent, PullReader, RawAttribute, TextPredictor,
    XmlVisitor,
};
use crate::error::{Error, Result};
use crate::events::Locator;
use crate::names::{split_qname, Attribute, AttributeSet, StringPool, TagName};
use crate::namespaces::{NamespaceContext, NamespaceStack};
use crate::text::TextBuffer;

/// Adapter from a [`PullReader`] to the visitor call sequence
pub struct PullConnector<'r> {
    reader: &'r mut dyn PullReader,
    interning: bool,
    pool: StringPool,
    namespaces: NamespaceStack,
    buffer: TextBuffer,
    /// Prefixes declared on each open element, for the closing brackets
    decl_stack: Vec<Vec<String>>,
    attrs: AttributeSet,
    end_attrs: AttributeSet,
}

impl<'r> PullConnector<'r> {
    /// Create a connector over the given reader
    pub fn new(reader: &'r mut dyn PullReader) -> Self {
        Self {
            reader,
            interning: true,
            pool: StringPool::new(),
            namespaces: NamespaceStack::new(),
            buffer: TextBuffer::new(),
            decl_stack: Vec::new(),
            attrs: AttributeSet::new(),
            end_attrs: AttributeSet::new(),
        }
    }

    /// Enable or disable the interning filter.
    ///
    /// Sources that guarantee pre-interned identifiers can turn this off
    /// to skip the pooling pass.
    pub fn with_interning(mut self, interning: bool) -> Self {
        self.interning = interning;
        self
    }

    /// Pump the reader to completion, forwarding to the visitor
    pub fn drive<V: XmlVisitor + TextPredictor>(
        &mut self,
        visitor: &mut V,
        fallback_ns: Option<NamespaceContext>,
    ) -> Result<()> {
        self.namespaces.reset(fallback_ns.clone());
        self.decl_stack.clear();
        loop {
            let event = self.reader.next_event()?;
            visitor.set_locator(self.reader.locator());
            match event {
                PullEvent::StartDocument => {
                    visitor.start_document(fallback_ns.clone())?;
                }
                PullEvent::StartElement {
                    uri,
                    local,
                    qname,
                    attributes,
                    ns_decls,
                } => {
                    flush_text(visitor, &mut self.buffer, false)?;
                    self.start_element(visitor, uri, local, qname, attributes, ns_decls)?;
                }
                PullEvent::Text(data) => {
                    // Leading ignorable whitespace is dropped eagerly; the
                    // rest of the policy lives in the flush.
                    if visitor.expect_text()
                        || !self.buffer.is_empty()
                        || !data.chars().all(char::is_whitespace)
                    {
                        self.buffer.push_str(&data);
                    }
                }
                PullEvent::EndElement { uri, local, qname } => {
                    flush_text(visitor, &mut self.buffer, true)?;
                    self.end_element(visitor, uri, local, qname)?;
                }
                PullEvent::EndDocument => {
                    visitor.end_document()?;
                    return Ok(());
                }
            }
        }
    }

    fn start_element<V: XmlVisitor + TextPredictor>(
        &mut self,
        visitor: &mut V,
        uri: String,
        local: String,
        qname: String,
        attributes: Vec<RawAttribute>,
        ns_decls: Vec<(String, String)>,
    ) -> Result<()> {
        // Lenient readers may leave declarations mixed into the attribute
        // list; split them out before opening the prefix brackets.
        let mut decls = ns_decls;
        let mut plain = Vec::with_capacity(attributes.len());
        for attr in attributes {
            if attr.qname == "xmlns" {
                decls.push((String::new(), attr.value));
            } else if let Some(prefix) = attr.qname.strip_prefix("xmlns:") {
                decls.push((prefix.to_string(), attr.value));
            } else {
                plain.push(attr);
            }
        }

        let mut declared = Vec::with_capacity(decls.len());
        for (prefix, decl_uri) in decls {
            visitor.start_prefix_mapping(&prefix, &decl_uri)?;
            self.namespaces.push_binding(&prefix, &decl_uri);
            declared.push(prefix);
        }
        self.decl_stack.push(declared);

        let (uri, local, qname) = self.resolve_element_name(uri, local, qname);

        self.attrs.clear();
        for attr in plain {
            let normalized = self.resolve_attribute(attr);
            self.attrs.push(normalized);
        }

        let tag = TagName {
            uri: &uri,
            local: &local,
            qname: &qname,
            attributes: &self.attrs,
        };
        visitor.start_element(&tag)
    }

    fn end_element<V: XmlVisitor + TextPredictor>(
        &mut self,
        visitor: &mut V,
        uri: String,
        local: String,
        qname: String,
    ) -> Result<()> {
        let (uri, local, qname) = self.resolve_element_name(uri, local, qname);
        let tag = TagName {
            uri: &uri,
            local: &local,
            qname: &qname,
            attributes: &self.end_attrs,
        };
        visitor.end_element(&tag)?;

        // Close prefix brackets in reverse declaration order, after the
        // end tag they belong to.
        if let Some(declared) = self.decl_stack.pop() {
            for prefix in declared.iter().rev() {
                visitor.end_prefix_mapping(prefix)?;
                self.namespaces.pop_binding(prefix);
            }
        }
        Ok(())
    }

    /// Fill in missing name parts and resolve the prefix when the source
    /// did not report a URI itself.
    fn resolve_element_name(
        &mut self,
        uri: String,
        mut local: String,
        mut qname: String,
    ) -> (Rc<str>, Rc<str>, String) {
        derive_name_fallbacks(&mut local, &mut qname);
        let uri = if uri.is_empty() {
            let (prefix, _) = split_qname(&qname);
            // An undeclared prefix degrades to no-namespace; the loader
            // layer reports the element as unexpected if it matters.
            self.namespaces.uri_for(prefix).unwrap_or("").to_string()
        } else {
            uri
        };
        (self.filter(uri), self.filter(local), qname)
    }

    /// Unprefixed attributes are in no namespace regardless of the default
    /// declaration, per the namespaces recommendation.
    fn resolve_attribute(&mut self, attr: RawAttribute) -> Attribute {
        let mut local = attr.local;
        let mut qname = attr.qname;
        derive_name_fallbacks(&mut local, &mut qname);
        let uri = if !attr.uri.is_empty() {
            attr.uri
        } else {
            let (prefix, _) = split_qname(&qname);
            if prefix.is_empty() {
                String::new()
            } else {
                self.namespaces.uri_for(prefix).unwrap_or("").to_string()
            }
        };
        Attribute {
            uri,
            local,
            qname,
            value: attr.value,
        }
    }

    fn filter(&mut self, s: String) -> Rc<str> {
        if self.interning {
            self.pool.intern(&s)
        } else {
            Rc::from(s)
        }
    }
}

/// [`PullReader`] over a `quick_xml` event stream.
///
/// Reports qnames as written and leaves URI resolution to the connector;
/// self-closing tags are expanded into a start/end pair.
pub struct QuickXmlReader<'a> {
    reader: Reader<&'a [u8]>,
    buf: Vec<u8>,
    started: bool,
    pending_end: Option<String>,
}

impl<'a> QuickXmlReader<'a> {
    /// Create a reader over an in-memory document
    pub fn from_str(xml: &'a str) -> Self {
        Self::from_bytes(xml.as_bytes())
    }

    /// Create a reader over raw document bytes
    pub fn from_bytes(xml: &'a [u8]) -> Self {
        Self {
            reader: Reader::from_reader(xml),
            buf: Vec::new(),
            started: false,
            pending_end: None,
        }
    }

    fn start_event(
        &mut self,
        e: &quick_xml::events::BytesStart<'_>,
        self_closing: bool,
    ) -> Result<PullEvent> {
        let qname = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        let mut ns_decls = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|e| Error::Xml(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            if key == "xmlns" {
                ns_decls.push((String::new(), value));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                ns_decls.push((prefix.to_string(), value));
            } else {
                attributes.push(RawAttribute {
                    uri: String::new(),
                    local: String::new(),
                    qname: key,
                    value,
                });
            }
        }
        if self_closing {
            self.pending_end = Some(qname.clone());
        }
        Ok(PullEvent::StartElement {
            uri: String::new(),
            local: String::new(),
            qname,
            attributes,
            ns_decls,
        })
    }
}

impl PullReader for QuickXmlReader<'_> {
    fn next_event(&mut self) -> Result<PullEvent> {
        if !self.started {
            self.started = true;
            return Ok(PullEvent::StartDocument);
        }
        if let Some(qname) = self.pending_end.take() {
            return Ok(PullEvent::EndElement {
                uri: String::new(),
                local: String::new(),
                qname,
            });
        }
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    let e = e.into_owned();
                    return self.start_event(&e, false);
                }
                Event::Empty(e) => {
                    let e = e.into_owned();
                    return self.start_event(&e, true);
                }
                Event::End(e) => {
                    return Ok(PullEvent::EndElement {
                        uri: String::new(),
                        local: String::new(),
                        qname: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    });
                }
                Event::Text(t) => {
                    return Ok(PullEvent::Text(t.unescape()?.into_owned()));
                }
                Event::CData(c) => {
                    return Ok(PullEvent::Text(
                        String::from_utf8_lossy(&c.into_inner()).into_owned(),
                    ));
                }
                Event::Eof => return Ok(PullEvent::EndDocument),
                // Declarations, comments, PIs and doctypes carry nothing
                // the object model needs.
                _ => continue,
            }
        }
    }

    fn locator(&self) -> Locator {
        Locator::at_offset(self.reader.buffer_position())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(xml: &str) -> Vec<String> {
        let mut reader = QuickXmlReader::from_str(xml);
        let mut out = Vec::new();
        loop {
            match reader.next_event().unwrap() {
                PullEvent::StartDocument => out.push("start-doc".to_string()),
                PullEvent::StartElement { qname, .. } => out.push(format!("<{}>", qname)),
                PullEvent::Text(t) => out.push(format!("\"{}\"", t)),
                PullEvent::EndElement { qname, .. } => out.push(format!("</{}>", qname)),
                PullEvent::EndDocument => {
                    out.push("end-doc".to_string());
                    return out;
                }
            }
        }
    }

    #[test]
    fn test_self_closing_expands() {
        let events = collect("<a><b/></a>");
        assert_eq!(
            events,
            vec!["start-doc", "<a>", "<b>", "</b>", "</a>", "end-doc"]
        );
    }

    #[test]
    fn test_xmlns_split_from_attributes() {
        let mut reader = QuickXmlReader::from_str(r#"<p:a xmlns:p="urn:x" id="1"/>"#);
        reader.next_event().unwrap();
        match reader.next_event().unwrap() {
            PullEvent::StartElement {
                qname,
                attributes,
                ns_decls,
                ..
            } => {
                assert_eq!(qname, "p:a");
                assert_eq!(ns_decls, vec![("p".to_string(), "urn:x".to_string())]);
                assert_eq!(attributes.len(), 1);
                assert_eq!(attributes[0].qname, "id");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_entity_decoding() {
        let events = collect("<a>x &amp; y</a>");
        assert!(events.contains(&"\"x & y\"".to_string()));
    }
}
