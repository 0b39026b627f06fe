//! Property tests over the full pipeline

use std::rc::Rc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use proptest::prelude::*;

use xmlbind::bindings::{
    BindingRegistry, CompositeBinding, LeafKind, PropertyBinding, TypeToken, Value,
};
use xmlbind::names::ExpandedName;
use xmlbind::Unmarshaller;

fn registry() -> Rc<BindingRegistry> {
    let mut reg = BindingRegistry::new();
    let t_int = reg.register_leaf("int", LeafKind::Int);
    let t_bytes = reg.register_leaf("bytes", LeafKind::Bytes);
    let item = CompositeBinding::new(TypeToken::new("Item"))
        .with_element(
            ExpandedName::local("n"),
            PropertyBinding::typed("n", t_int),
        )
        .with_element(
            ExpandedName::local("blob"),
            PropertyBinding::typed("blob", t_bytes),
        );
    let t_item = reg.register_composite(item);
    reg.register_root(ExpandedName::local("item"), t_item);
    Rc::new(reg)
}

proptest! {
    #[test]
    fn prop_integer_leaves_survive_whitespace(n in any::<i64>(), pad in "[ \t\n]{0,4}") {
        let mut u = Unmarshaller::new(registry());
        let xml = format!("<item><n>{pad}{n}{pad}</n></item>");
        let value = u.unmarshal_str(&xml).unwrap();
        let item = value.as_object().unwrap().borrow();
        prop_assert_eq!(item.get("n"), Some(&Value::Int(n)));
        prop_assert!(!u.is_degraded());
    }

    #[test]
    fn prop_base64_content_decodes_to_original(data in proptest::collection::vec(any::<u8>(), 0..64)) {
        let mut u = Unmarshaller::new(registry());
        let xml = format!("<item><blob>{}</blob></item>", STANDARD.encode(&data));
        let value = u.unmarshal_str(&xml).unwrap();
        let item = value.as_object().unwrap().borrow();
        prop_assert_eq!(item.get("blob"), Some(&Value::Bytes(data.clone())));
    }
}
