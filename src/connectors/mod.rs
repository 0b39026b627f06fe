//! Connector adapters
//!
//! A connector normalizes one native event model — generic pull parser,
//! push-style handler, or binary-XML pull reader — into the uniform
//! [`XmlVisitor`] call sequence consumed by the unmarshalling context.
//! All adapters share the same guarantees: adjacent character runs coalesce
//! into exactly one `text()` call, whitespace-only runs are dropped when the
//! active loader does not expect text, and missing/empty identifiers are
//! repaired with sane fallbacks so downstream never sees null names.

mod binary;
mod pull;
mod push;

pub use binary::{BinaryConnector, BinaryToken, BinaryXmlReader};
pub use pull::{PullConnector, QuickXmlReader};
pub use push::SaxConnector;

use crate::error::Result;
use crate::events::Locator;
use crate::names::{split_qname, TagName};
use crate::namespaces::NamespaceContext;
use crate::text::Text;

/// The uniform visitor driven by every connector
pub trait XmlVisitor {
    /// Document begins; the fallback context resolves prefixes the event
    /// stream itself never declares
    fn start_document(&mut self, fallback_ns: Option<NamespaceContext>) -> Result<()>;
    /// Document ends
    fn end_document(&mut self) -> Result<()>;
    /// A prefix binding comes into scope (before its owning start tag)
    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> Result<()>;
    /// A prefix binding goes out of scope (after its owning end tag)
    fn end_prefix_mapping(&mut self, prefix: &str) -> Result<()>;
    /// A start tag, with its attributes
    fn start_element(&mut self, tag: &TagName<'_>) -> Result<()>;
    /// One coalesced run of character data
    fn text(&mut self, data: Text) -> Result<()>;
    /// An end tag
    fn end_element(&mut self, tag: &TagName<'_>) -> Result<()>;
    /// Source-position update for diagnostics
    fn set_locator(&mut self, locator: Locator);
}

/// Predicts whether the active loader will consume a text callback,
/// letting connectors skip buffering overhead for ignorable whitespace.
pub trait TextPredictor {
    /// Whether text is expected at the current depth
    fn expect_text(&self) -> bool;
}

/// One attribute as reported by a native source, before normalization
#[derive(Debug, Clone, Default)]
pub struct RawAttribute {
    /// Namespace URI if the source resolved it (often empty)
    pub uri: String,
    /// Local name if the source split it (often empty)
    pub local: String,
    /// Qualified name as written
    pub qname: String,
    /// Entity-decoded value
    pub value: String,
}

/// One normalized event from a pull-style source
#[derive(Debug)]
pub enum PullEvent {
    /// Document start
    StartDocument,
    /// Element start with attributes and the prefix declarations carried
    /// on this tag
    StartElement {
        /// Namespace URI if the source resolved it (often empty)
        uri: String,
        /// Local name if the source split it (often empty)
        local: String,
        /// Qualified name as written
        qname: String,
        /// Attributes, namespace declarations excluded
        attributes: Vec<RawAttribute>,
        /// (prefix, uri) declarations on this tag
        ns_decls: Vec<(String, String)>,
    },
    /// Character data
    Text(String),
    /// Element end
    EndElement {
        /// Namespace URI if resolved
        uri: String,
        /// Local name if split
        local: String,
        /// Qualified name as written
        qname: String,
    },
    /// Document end
    EndDocument,
}

/// The pull-parser shape every generic upstream source exposes
pub trait PullReader {
    /// Advance and return the next event
    fn next_event(&mut self) -> Result<PullEvent>;

    /// Current source position
    fn locator(&self) -> Locator {
        Locator::unknown()
    }
}

/// An upstream source with optional fast-path capabilities
pub trait XmlSource {
    /// Structural capability probe: a source backed by a binary-XML reader
    /// exposes it here for the specialized connector
    fn as_binary(&mut self) -> Option<&mut dyn BinaryXmlReader> {
        None
    }

    /// The generic pull view of this source
    fn as_pull(&mut self) -> &mut dyn PullReader;

    /// Whether the source guarantees pre-interned identifiers
    fn pre_interned(&self) -> bool {
        false
    }
}

/// Connector selection: prefer the binary fast path when the capability
/// probe finds one, else drive the generic pull adapter, routing names
/// through the interning filter when the source does not pre-intern.
pub fn drive_source<V: XmlVisitor + TextPredictor>(
    source: &mut dyn XmlSource,
    visitor: &mut V,
    fallback_ns: Option<NamespaceContext>,
) -> Result<()> {
    if let Some(reader) = source.as_binary() {
        return BinaryConnector::new(reader).drive(visitor, fallback_ns);
    }
    let interning = !source.pre_interned();
    PullConnector::new(source.as_pull())
        .with_interning(interning)
        .drive(visitor, fallback_ns)
}

/// Repair missing identifiers: copy qname to local and local to qname so
/// downstream never sees empty names from lenient parsers.
pub(crate) fn derive_name_fallbacks(local: &mut String, qname: &mut String) {
    if local.is_empty() && !qname.is_empty() {
        let (_, derived) = split_qname(qname);
        *local = derived.to_string();
    }
    if qname.is_empty() && !local.is_empty() {
        *qname = local.clone();
    }
}

/// Flush one buffered text run to the visitor under the predictor policy:
/// loaders that expect text always get a run (even an empty one, realizing
/// default-value semantics), others only see non-whitespace content.
pub(crate) fn flush_text<V: XmlVisitor + TextPredictor>(
    visitor: &mut V,
    buffer: &mut crate::text::TextBuffer,
    at_element_end: bool,
) -> Result<()> {
    if visitor.expect_text() {
        if at_element_end || !buffer.is_empty() {
            return visitor.text(buffer.take());
        }
        return Ok(());
    }
    if buffer.is_empty() {
        return Ok(());
    }
    let run = buffer.take();
    if run.is_whitespace() {
        // Ignorable whitespace for a loader that never consumes text
        return Ok(());
    }
    visitor.text(run)
}
