//! High-level unmarshalling entry point
//!
//! [`Unmarshaller`] wires a binding registry, a context and a connector
//! together behind a small façade: feed it a document, get the root value
//! back, inspect recoverable diagnostics afterwards.

use std::cell::RefCell;
use std::rc::Rc;

use crate::bindings::{BindingRegistry, TypeToken, Value};
use crate::connectors::{
    drive_source, BinaryConnector, BinaryXmlReader, PullConnector, QuickXmlReader, XmlSource,
};
use crate::context::{NilPolicy, RootMode, UnmarshallingContext};
use crate::error::Result;
use crate::events::{CollectingSink, EventSink, ValidationEvent};
use crate::idref::IdResolver;
use crate::namespaces::NamespaceContext;

/// Reusable document-to-object converter.
///
/// One instance holds the registry-derived configuration and can unmarshal
/// any number of documents in sequence; per-document state is reset at each
/// document start.
pub struct Unmarshaller {
    context: UnmarshallingContext,
    collected: Option<Rc<RefCell<CollectingSink>>>,
    fallback_ns: Option<NamespaceContext>,
}

impl Unmarshaller {
    /// Create an unmarshaller over the given registry.
    ///
    /// Recoverable diagnostics are collected internally by default;
    /// retrieve them with [`events`](Self::events) after a run.
    pub fn new(registry: Rc<BindingRegistry>) -> Self {
        let collected = Rc::new(RefCell::new(CollectingSink::new()));
        let context = UnmarshallingContext::new(registry)
            .with_event_sink(Box::new(Rc::clone(&collected)));
        Self {
            context,
            collected: Some(collected),
            fallback_ns: None,
        }
    }

    /// Unmarshal the root as the given type regardless of its tag name
    pub fn with_expected_type(mut self, token: TypeToken) -> Self {
        self.context = self.context.with_root_mode(RootMode::Expected(token));
        self
    }

    /// Replace the internal collecting sink with a caller-supplied one.
    ///
    /// [`events`](Self::events) returns nothing afterwards; the caller's
    /// sink sees everything instead.
    pub fn with_event_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.context = self.context.with_event_sink(sink);
        self.collected = None;
        self
    }

    /// Install a custom ID/IDREF resolver
    pub fn with_id_resolver(mut self, resolver: Box<dyn IdResolver>) -> Self {
        self.context = self.context.with_id_resolver(resolver);
        self
    }

    /// Install a policy deciding which nil elements keep a wrapper object
    pub fn with_nil_policy(mut self, policy: NilPolicy) -> Self {
        self.context = self.context.with_nil_policy(policy);
        self
    }

    /// Namespace fallback for prefixes the source never declares
    pub fn with_namespace_context(mut self, ctx: NamespaceContext) -> Self {
        self.fallback_ns = Some(ctx);
        self
    }

    /// Unmarshal an in-memory XML document
    pub fn unmarshal_str(&mut self, xml: &str) -> Result<Value> {
        self.unmarshal_bytes(xml.as_bytes())
    }

    /// Unmarshal raw XML document bytes
    pub fn unmarshal_bytes(&mut self, xml: &[u8]) -> Result<Value> {
        let mut reader = QuickXmlReader::from_bytes(xml);
        PullConnector::new(&mut reader).drive(&mut self.context, self.fallback_ns.clone())?;
        self.context.take_result()
    }

    /// Unmarshal from a binary-XML reader
    pub fn unmarshal_binary(&mut self, reader: &mut dyn BinaryXmlReader) -> Result<Value> {
        BinaryConnector::new(reader).drive(&mut self.context, self.fallback_ns.clone())?;
        self.context.take_result()
    }

    /// Unmarshal from any source, letting the capability probe pick the
    /// connector
    pub fn unmarshal_source(&mut self, source: &mut dyn XmlSource) -> Result<Value> {
        drive_source(source, &mut self.context, self.fallback_ns.clone())?;
        self.context.take_result()
    }

    /// The context, for push-style driving via [`SaxConnector`]
    ///
    /// [`SaxConnector`]: crate::connectors::SaxConnector
    pub fn context_mut(&mut self) -> &mut UnmarshallingContext {
        &mut self.context
    }

    /// Take the result accumulated by push-style driving
    pub fn take_result(&mut self) -> Result<Value> {
        self.context.take_result()
    }

    /// Diagnostics recorded by the internal sink during the last run.
    ///
    /// Empty when a caller-supplied sink is installed.
    pub fn events(&mut self) -> Vec<ValidationEvent> {
        match &self.collected {
            Some(sink) => sink.borrow_mut().take_events(),
            None => Vec::new(),
        }
    }

    /// Whether the last document produced recoverable diagnostics
    pub fn is_degraded(&self) -> bool {
        self.context.diagnostic_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::{CompositeBinding, LeafKind, PropertyBinding};
    use crate::names::ExpandedName;
    use pretty_assertions::assert_eq;

    fn registry() -> Rc<BindingRegistry> {
        let mut reg = BindingRegistry::new();
        let t_int = reg.register_leaf("int", LeafKind::Int);
        let item = CompositeBinding::new(TypeToken::new("Item")).with_element(
            ExpandedName::local("value"),
            PropertyBinding::typed("value", t_int),
        );
        let t_item = reg.register_composite(item);
        reg.register_root(ExpandedName::local("item"), t_item);
        Rc::new(reg)
    }

    #[test]
    fn test_unmarshal_simple_document() {
        let mut u = Unmarshaller::new(registry());
        let value = u.unmarshal_str("<item><value>41</value></item>").unwrap();
        let obj = value.as_object().unwrap().borrow();
        assert_eq!(obj.get("value"), Some(&Value::Int(41)));
        assert!(!u.is_degraded());
    }

    #[test]
    fn test_events_collected_and_drained() {
        let mut u = Unmarshaller::new(registry());
        let value = u
            .unmarshal_str("<item><bogus>x</bogus><value>7</value></item>")
            .unwrap();
        let obj = value.as_object().unwrap().borrow();
        assert_eq!(obj.get("value"), Some(&Value::Int(7)));
        assert!(u.is_degraded());
        let events = u.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].message().contains("bogus"));
        // Drained
        assert!(u.events().is_empty());
    }

    #[test]
    fn test_reuse_across_documents() {
        let mut u = Unmarshaller::new(registry());
        let first = u.unmarshal_str("<item><value>1</value></item>").unwrap();
        let second = u.unmarshal_str("<item><value>2</value></item>").unwrap();
        assert_eq!(
            first.as_object().unwrap().borrow().get("value"),
            Some(&Value::Int(1))
        );
        assert_eq!(
            second.as_object().unwrap().borrow().get("value"),
            Some(&Value::Int(2))
        );
    }
}
