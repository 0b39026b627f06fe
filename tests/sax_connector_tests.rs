//! Push-adapter tests: an upstream parser is simulated by calling the
//! handler methods directly.

use std::rc::Rc;

use pretty_assertions::assert_eq;

use xmlbind::bindings::{
    BindingRegistry, CompositeBinding, LeafKind, PropertyBinding, TypeToken, Value,
};
use xmlbind::connectors::{RawAttribute, SaxConnector};
use xmlbind::events::Locator;
use xmlbind::names::{ExpandedName, XSI_URI};
use xmlbind::namespaces::NamespaceContext;
use xmlbind::Unmarshaller;

fn registry() -> Rc<BindingRegistry> {
    let mut reg = BindingRegistry::new();
    let t_int = reg.register_leaf("int", LeafKind::Int);
    let t_str = reg.register_leaf("string", LeafKind::String);
    reg.register_type_name(ExpandedName::new("urn:types", "string"), t_str);
    let item = CompositeBinding::new(TypeToken::new("Item"))
        .with_element(
            ExpandedName::local("value"),
            PropertyBinding::typed("value", t_int.clone()),
        )
        .with_attribute(
            ExpandedName::local("rank"),
            PropertyBinding::typed("rank", t_int),
        );
    let t_item = reg.register_composite(item);
    reg.register_root(ExpandedName::local("item"), t_item);
    Rc::new(reg)
}

#[test]
fn test_push_driving_coalesces_character_calls() {
    let mut u = Unmarshaller::new(registry());
    {
        let mut sax = SaxConnector::new(u.context_mut());
        sax.start_document().unwrap();
        sax.start_element("", "item", "item", &[]).unwrap();
        sax.start_element("", "value", "value", &[]).unwrap();
        // Split across two callbacks; downstream must see one run
        sax.characters("4").unwrap();
        sax.characters("1").unwrap();
        sax.end_element("", "value", "value").unwrap();
        sax.end_element("", "item", "item").unwrap();
        sax.end_document().unwrap();
    }
    let value = u.take_result().unwrap();
    let item = value.as_object().unwrap().borrow();
    assert_eq!(item.get("value"), Some(&Value::Int(41)));
}

#[test]
fn test_push_name_fallbacks_and_attributes() {
    let mut u = Unmarshaller::new(registry());
    {
        let mut sax = SaxConnector::new(u.context_mut());
        sax.start_document().unwrap();
        // A lenient parser reporting only qnames
        let attrs = [RawAttribute {
            uri: String::new(),
            local: String::new(),
            qname: "rank".to_string(),
            value: "7".to_string(),
        }];
        sax.start_element("", "", "item", &attrs).unwrap();
        sax.end_element("", "", "item").unwrap();
        sax.end_document().unwrap();
    }
    let value = u.take_result().unwrap();
    let item = value.as_object().unwrap().borrow();
    assert_eq!(item.get("rank"), Some(&Value::Int(7)));
}

#[test]
fn test_push_fallback_context_resolves_out_of_band_prefixes() {
    let mut u = Unmarshaller::new(registry());
    {
        let mut sax = SaxConnector::new(u.context_mut())
            .with_namespace_context(NamespaceContext::new().with_prefix("t", "urn:types"));
        sax.set_document_locator(Locator::at_position(3, 9));
        sax.start_document().unwrap();
        sax.start_element("", "item", "item", &[]).unwrap();
        // Inter-element whitespace the parser already classified
        sax.ignorable_whitespace("\n  ").unwrap();
        // The parser never declared "t"; the fallback context supplies it
        let attrs = [RawAttribute {
            uri: XSI_URI.to_string(),
            local: "type".to_string(),
            qname: "xsi:type".to_string(),
            value: "t:string".to_string(),
        }];
        sax.start_element("", "value", "value", &attrs).unwrap();
        sax.characters("42").unwrap();
        sax.end_element("", "value", "value").unwrap();
        sax.end_element("", "item", "item").unwrap();
        sax.end_document().unwrap();
    }
    assert!(!u.is_degraded());
    let value = u.take_result().unwrap();
    let item = value.as_object().unwrap().borrow();
    // Overridden to string: digits stay text
    assert_eq!(item.get("value"), Some(&Value::Str("42".into())));
}
