//! Composite (bean) loading: instance creation, attribute properties,
//! child-element selection, and packing-scope bracketing.

use std::rc::Rc;

use crate::bindings::{
    BindingKind, CompositeBinding, LeafKind, ObjectRef, PropertyBinding, PropertyKind, Value,
};
use crate::context::{Receiver, UnmarshallingContext};
use crate::error::Result;
use crate::events::{sanitize_for_display, Severity, ValidationEvent};
use crate::loaders::{unexpected_child, DomLoader, Loader};
use crate::names::{TagName, XSI_URI};
use crate::text::Text;

/// Start a composite element: create the target instance, bracket the
/// packing frames, and apply attribute properties.
pub(crate) fn start(
    binding: &Rc<CompositeBinding>,
    ctx: &mut UnmarshallingContext,
    tag: &TagName<'_>,
) -> Result<()> {
    let created = ctx.create_instance(&binding.token)?;
    let base = ctx.start_scope(binding.frame_count);
    let state = ctx.current_state_mut();
    state.scope_base = base;
    state.target = created;

    let Some(bean) = current_bean(ctx) else {
        // Creation failed recoverably (or a factory produced a non-object):
        // the element is still walked, but nothing receives its content.
        return Ok(());
    };
    apply_attributes(binding, ctx, tag, &bean)
}

fn current_bean(ctx: &UnmarshallingContext) -> Option<ObjectRef> {
    match &ctx.current_state().target {
        Some(Value::Object(obj)) => Some(Rc::clone(obj)),
        _ => None,
    }
}

fn apply_attributes(
    binding: &Rc<CompositeBinding>,
    ctx: &mut UnmarshallingContext,
    tag: &TagName<'_>,
    bean: &ObjectRef,
) -> Result<()> {
    for i in 0..tag.attributes.len() {
        let Some(attr) = tag.attributes.get(i) else {
            break;
        };
        if attr.uri == XSI_URI {
            continue;
        }
        let name = ctx.expand_parts(&attr.uri, &attr.local);
        let Some(prop) = binding.attributes.get(&name).cloned() else {
            // Unknown attributes are ignored; only unknown elements are
            // diagnosed.
            continue;
        };
        let value = attr.value.clone();
        match &prop.kind {
            PropertyKind::Typed(token) => {
                let leaf = match ctx.registry().binding(token).map(|b| b.kind.clone()) {
                    Some(BindingKind::Leaf(kind)) => Some(kind),
                    _ => None,
                };
                match leaf {
                    Some(kind) => match kind.parse_str(&value) {
                        Ok(parsed) => bean.borrow_mut().set(&prop.field, parsed),
                        Err(reason) => {
                            let shown = sanitize_for_display(&reason);
                            let subject = name.to_string();
                            ctx.report(true, move |loc| {
                                ValidationEvent::new(Severity::Error, shown)
                                    .with_subject(subject)
                                    .with_locator(loc)
                            })?;
                        }
                    },
                    None => {
                        let subject = name.to_string();
                        ctx.report(true, move |loc| {
                            ValidationEvent::new(
                                Severity::Error,
                                format!("attribute {} is not leaf-typed", subject),
                            )
                            .with_locator(loc)
                        })?;
                    }
                }
            }
            PropertyKind::Id => {
                bean.borrow_mut().set(&prop.field, Value::Str(value.clone()));
                ctx.bind_id(&value, Value::Object(Rc::clone(bean)));
            }
            PropertyKind::IdRef => {
                let bean = Rc::clone(bean);
                let prop = Rc::clone(&prop);
                ctx.add_patcher(Box::new(move |ctx| match ctx.resolve_id(&value) {
                    Some(resolved) => bean.borrow_mut().set(&prop.field, resolved),
                    None => {
                        let _ = ctx.report_error(
                            format!("unresolved ID reference '{}'", value),
                            prop.field.to_string(),
                        );
                    }
                }));
            }
            // No attribute form for island or any-content properties
            PropertyKind::Wildcard | PropertyKind::Dom => {}
        }
    }
    Ok(())
}

/// Select the child loader for a nested start tag and register the receiver
/// that will deliver the finished child back to this bean.
pub(crate) fn child(
    binding: &Rc<CompositeBinding>,
    ctx: &mut UnmarshallingContext,
    tag: &TagName<'_>,
) -> Result<()> {
    let name = ctx.expand(tag);
    let prop = match binding.elements.get(&name) {
        Some(prop) => Rc::clone(prop),
        // Undeclared children fall through to the wildcard slot when one
        // is bound.
        None => match binding.wildcard_prop.as_ref() {
            Some(prop) => Rc::clone(prop),
            None => return unexpected_child(ctx, tag),
        },
    };

    let loader = match &prop.kind {
        PropertyKind::Typed(token) => ctx.wrapped_loader_for(token)?,
        PropertyKind::Id | PropertyKind::IdRef => Loader::Leaf(LeafKind::String),
        PropertyKind::Wildcard => Loader::Wildcard,
        PropertyKind::Dom => Loader::DomCapture(DomLoader::new()),
    };
    let receiver = receiver_for(&prop);
    let state = ctx.current_state_mut();
    state.loader = Some(loader);
    state.receiver = receiver;
    state.element_default = prop.default_value.clone();
    Ok(())
}

fn receiver_for(prop: &Rc<PropertyBinding>) -> Receiver {
    match &prop.kind {
        PropertyKind::IdRef => Receiver::IdRefProperty(Rc::clone(prop)),
        PropertyKind::Id => Receiver::IdProperty(Rc::clone(prop)),
        _ if prop.repeated => Receiver::ScopeItem(Rc::clone(prop)),
        _ => Receiver::Property(Rc::clone(prop)),
    }
}

/// Character content inside a composite: appended to the text property when
/// one is bound, otherwise an unexpected-text diagnostic.
pub(crate) fn text(
    binding: &Rc<CompositeBinding>,
    ctx: &mut UnmarshallingContext,
    data: Text,
) -> Result<()> {
    let Some(prop) = binding.text_prop.as_ref().map(Rc::clone) else {
        if data.is_whitespace() {
            return Ok(());
        }
        let shown = sanitize_for_display(&data.to_text());
        return ctx.report(true, move |loc| {
            ValidationEvent::new(Severity::Error, format!("unexpected text '{}'", shown))
                .with_locator(loc)
        });
    };
    let Some(bean) = current_bean(ctx) else {
        return Ok(());
    };
    let chunk = data.to_text();
    let mut bean = bean.borrow_mut();
    let updated = match bean.get(&prop.field) {
        Some(Value::Str(existing)) => {
            let mut combined = existing.clone();
            combined.push_str(&chunk);
            combined
        }
        _ => chunk,
    };
    bean.set(&prop.field, Value::Str(updated));
    Ok(())
}

/// Leave a composite element: close its packing-frame region, storing every
/// started pack on the bean.
pub(crate) fn leave(
    binding: &Rc<CompositeBinding>,
    ctx: &mut UnmarshallingContext,
) -> Result<()> {
    let base = ctx.current_state().scope_base;
    ctx.end_scope(binding.frame_count, base);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::{BindingRegistry, CompositeBinding, TypeToken};
    use crate::names::{Attribute, AttributeSet, ExpandedName};

    fn registry() -> Rc<BindingRegistry> {
        let mut reg = BindingRegistry::new();
        let t_int = reg.register_leaf("int", LeafKind::Int);
        let t_str = reg.register_leaf("string", LeafKind::String);
        let root = CompositeBinding::new(TypeToken::new("Root"))
            .with_element(
                ExpandedName::local("a"),
                PropertyBinding::typed("a", t_int.clone()).repeated(),
            )
            .with_element(ExpandedName::local("b"), PropertyBinding::typed("b", t_int))
            .with_attribute(
                ExpandedName::local("label"),
                PropertyBinding::typed("label", t_str),
            );
        let t_root = reg.register_composite(root);
        reg.register_root(ExpandedName::local("root"), t_root);
        Rc::new(reg)
    }

    fn tag<'a>(local: &'a str, attrs: &'a AttributeSet) -> TagName<'a> {
        TagName {
            uri: "",
            local,
            qname: local,
            attributes: attrs,
        }
    }

    #[test]
    fn test_repeated_children_pack_in_order() {
        let mut ctx = UnmarshallingContext::new(registry());
        ctx.start_document(None).unwrap();
        let empty = AttributeSet::new();
        ctx.start_element(&tag("root", &empty)).unwrap();
        for v in ["5", "7"] {
            ctx.start_element(&tag("a", &empty)).unwrap();
            ctx.text(Text::from_str(v)).unwrap();
            ctx.end_element(&tag("a", &empty)).unwrap();
        }
        ctx.end_element(&tag("root", &empty)).unwrap();
        ctx.end_document().unwrap();

        let result = ctx.take_result().unwrap();
        let obj = result.as_object().expect("composite root").borrow();
        assert_eq!(
            obj.get("a"),
            Some(&Value::List(vec![Value::Int(5), Value::Int(7)]))
        );
        assert_eq!(ctx.diagnostic_count(), 0);
    }

    #[test]
    fn test_attribute_property() {
        let mut ctx = UnmarshallingContext::new(registry());
        ctx.start_document(None).unwrap();
        let mut attrs = AttributeSet::new();
        attrs.push(Attribute {
            uri: String::new(),
            local: "label".into(),
            qname: "label".into(),
            value: "hello".into(),
        });
        ctx.start_element(&tag("root", &attrs)).unwrap();
        let empty = AttributeSet::new();
        ctx.end_element(&tag("root", &empty)).unwrap();
        ctx.end_document().unwrap();

        let result = ctx.take_result().unwrap();
        let obj = result.as_object().expect("composite root").borrow();
        assert_eq!(obj.get("label"), Some(&Value::Str("hello".into())));
    }

    #[test]
    fn test_unexpected_child_recovers_and_continues() {
        let mut ctx = UnmarshallingContext::new(registry())
            .with_event_sink(Box::new(crate::events::CollectingSink::new()));
        ctx.start_document(None).unwrap();
        let empty = AttributeSet::new();
        ctx.start_element(&tag("root", &empty)).unwrap();

        // Unknown subtree: one diagnostic, contents discarded
        ctx.start_element(&tag("junk", &empty)).unwrap();
        ctx.start_element(&tag("deeper", &empty)).unwrap();
        ctx.end_element(&tag("deeper", &empty)).unwrap();
        ctx.end_element(&tag("junk", &empty)).unwrap();

        // Sibling elements still process
        ctx.start_element(&tag("b", &empty)).unwrap();
        ctx.text(Text::from_str("3")).unwrap();
        ctx.end_element(&tag("b", &empty)).unwrap();

        ctx.end_element(&tag("root", &empty)).unwrap();
        ctx.end_document().unwrap();

        assert_eq!(ctx.diagnostic_count(), 1);
        let result = ctx.take_result().unwrap();
        let obj = result.as_object().expect("composite root").borrow();
        assert_eq!(obj.get("b"), Some(&Value::Int(3)));
    }
}
