//! The per-element-type state machine
//!
//! Every element depth has exactly one active [`Loader`]: the single
//! dispatch target for the events at that depth. Loaders are immutable
//! values dispatched through one match in the context hot path; any
//! per-invocation state lives in the [`State`](crate::context::State) frame
//! or in a shared side object, never in the loader itself.
//!
//! A loader may re-delegate during its own start-element hook by replacing
//! the frame's loader and forwarding the event to the replacement
//! (chain-of-responsibility, not simple indirection).

mod dom;
mod structure;
mod xsi;

pub use dom::{DomLoader, FragmentBuilder};

use std::rc::Rc;

use crate::bindings::{CompositeBinding, LeafKind, TypeToken};
use crate::context::{Intercepter, Receiver, UnmarshallingContext};
use crate::error::Result;
use crate::events::{sanitize_for_display, Severity, ValidationEvent};
use crate::names::TagName;
use crate::text::Text;

/// The closed set of loader variants
#[derive(Debug, Clone)]
pub enum Loader {
    /// Scalar leaf: consumes one text run
    Leaf(LeafKind),
    /// Composite bean with element/attribute/text properties
    Structure(Rc<CompositeBinding>),
    /// Any-content: known elements unmarshal, unknown ones are captured
    Wildcard,
    /// Captures the subtree as an XML island
    DomCapture(DomLoader),
    /// Nil check, wrapping the type-dispatch layer
    XsiNil(Box<Loader>),
    /// xsi:type dispatch, wrapping the default binding
    XsiType {
        /// Loader for the statically expected type
        default: Box<Loader>,
        /// The statically expected type (override equal to this skips
        /// re-dispatch entirely)
        expected: TypeToken,
    },
    /// Root proxy: selects the root loader from the tag name
    RootByName,
    /// Root proxy: unconditional element-value wrapping of a fixed type
    RootValue(TypeToken),
    /// Consumes and drops an entire subtree
    Discard,
}

impl Loader {
    /// Whether this loader wants a text callback for its element.
    ///
    /// Connectors consult this to skip buffering whitespace-only runs; the
    /// answer must never change observable structure for loaders that do
    /// expect text.
    pub fn expect_text(&self) -> bool {
        match self {
            Loader::Leaf(_) => true,
            Loader::Structure(binding) => binding.text_prop.is_some(),
            Loader::Wildcard => true,
            Loader::DomCapture(_) => true,
            Loader::XsiNil(inner) => inner.expect_text(),
            Loader::XsiType { default, .. } => default.expect_text(),
            Loader::RootByName | Loader::RootValue(_) | Loader::Discard => false,
        }
    }

    /// Called once when this loader becomes active for its own start tag
    pub fn start_element(
        &self,
        ctx: &mut UnmarshallingContext,
        tag: &TagName<'_>,
    ) -> Result<()> {
        match self {
            Loader::Leaf(_) => Ok(()),
            Loader::Structure(binding) => structure::start(binding, ctx, tag),
            Loader::Wildcard => wildcard_start(ctx, tag),
            Loader::DomCapture(dom) => dom.start(ctx, tag),
            Loader::XsiNil(inner) => xsi::nil_start(inner, ctx, tag),
            Loader::XsiType { default, expected } => {
                xsi::type_start(default, expected, ctx, tag)
            }
            Loader::RootByName | Loader::RootValue(_) => {
                debug_assert!(false, "root proxy received start-element directly");
                Ok(())
            }
            Loader::Discard => Ok(()),
        }
    }

    /// Called on the parent's loader when a nested start tag appears.
    /// Responsible for installing the child frame's loader and receiver.
    pub fn child_element(
        &self,
        ctx: &mut UnmarshallingContext,
        tag: &TagName<'_>,
    ) -> Result<()> {
        match self {
            Loader::Structure(binding) => structure::child(binding, ctx, tag),
            Loader::DomCapture(dom) => {
                ctx.set_loader(Loader::DomCapture(dom.nested()));
                Ok(())
            }
            Loader::Discard => {
                ctx.set_loader(Loader::Discard);
                Ok(())
            }
            Loader::RootByName => root_by_name(ctx, tag),
            Loader::RootValue(token) => root_value(token, ctx, tag),
            Loader::Wildcard | Loader::XsiNil(_) | Loader::XsiType { .. } => {
                // These re-delegate on start-element and are never the
                // active loader once children arrive.
                debug_assert!(false, "delegating loader received child-element");
                unexpected_child(ctx, tag)
            }
            Loader::Leaf(_) => unexpected_child(ctx, tag),
        }
    }

    /// Called with one coalesced run of character data
    pub fn text(&self, ctx: &mut UnmarshallingContext, data: Text) -> Result<()> {
        match self {
            Loader::Leaf(kind) => leaf_text(*kind, ctx, data),
            Loader::Structure(binding) => structure::text(binding, ctx, data),
            Loader::DomCapture(dom) => {
                dom.text(data);
                Ok(())
            }
            Loader::Discard => Ok(()),
            _ => unexpected_text(ctx, data),
        }
    }

    /// Called on the end tag; finalizes the frame's target
    pub fn leave_element(
        &self,
        ctx: &mut UnmarshallingContext,
        tag: &TagName<'_>,
    ) -> Result<()> {
        match self {
            Loader::Structure(binding) => structure::leave(binding, ctx),
            Loader::DomCapture(dom) => dom.leave(ctx, tag),
            _ => Ok(()),
        }
    }
}

/// Default unhandled-nested-element behavior: one recoverable diagnostic,
/// then the whole unexpected subtree is discarded.
pub(crate) fn unexpected_child(
    ctx: &mut UnmarshallingContext,
    tag: &TagName<'_>,
) -> Result<()> {
    let uri = tag.uri.to_string();
    let local = tag.local.to_string();
    ctx.report(true, move |loc| {
        let name = if uri.is_empty() {
            local.clone()
        } else {
            format!("{{{}}}{}", uri, local)
        };
        ValidationEvent::new(Severity::Error, format!("unexpected element {}", name))
            .with_subject(name)
            .with_locator(loc)
    })?;
    ctx.set_loader(Loader::Discard);
    Ok(())
}

/// Default behavior for loaders that do not expect text
fn unexpected_text(ctx: &mut UnmarshallingContext, data: Text) -> Result<()> {
    if data.is_whitespace() {
        return Ok(());
    }
    let shown = sanitize_for_display(&data.to_text());
    ctx.report(true, move |loc| {
        ValidationEvent::new(Severity::Error, format!("unexpected text '{}'", shown))
            .with_locator(loc)
    })
}

fn leaf_text(kind: LeafKind, ctx: &mut UnmarshallingContext, data: Text) -> Result<()> {
    match kind.parse(data) {
        Ok(value) => {
            ctx.current_state_mut().target = Some(value);
            Ok(())
        }
        Err(reason) => {
            let shown = sanitize_for_display(&reason);
            ctx.report(true, move |loc| {
                ValidationEvent::new(Severity::Error, shown).with_locator(loc)
            })
        }
    }
}

/// Wildcard/any content: a known element unmarshals through its binding,
/// anything else is captured as a fragment.
fn wildcard_start(ctx: &mut UnmarshallingContext, tag: &TagName<'_>) -> Result<()> {
    let name = ctx.expand(tag);
    let token = ctx.registry().root_for(&name).cloned();
    let loader = match token {
        Some(token) => ctx.wrapped_loader_for(&token)?,
        None => Loader::DomCapture(DomLoader::new()),
    };
    ctx.set_loader(loader.clone());
    loader.start_element(ctx, tag)
}

/// Root selection by tag name, with an xsi:type probe as the second level
/// and an unrecoverable diagnostic as the last resort.
fn root_by_name(ctx: &mut UnmarshallingContext, tag: &TagName<'_>) -> Result<()> {
    let name = ctx.expand(tag);
    let mut token = ctx.registry().root_for(&name).cloned();
    if token.is_none() {
        token = xsi::probe_type(ctx, tag);
    }
    match token {
        Some(token) => {
            let loader = ctx.wrapped_loader_for(&token)?;
            ctx.set_loader(loader);
            ctx.current_state_mut().receiver = Receiver::Root;
            Ok(())
        }
        None => {
            let shown = name.to_string();
            ctx.report(false, move |loc| {
                ValidationEvent::new(
                    Severity::Fatal,
                    format!("unknown root element {}", shown),
                )
                .with_locator(loc)
            })
        }
    }
}

/// Expected-type root mode: ignore the tag name for type selection but keep
/// it as the wrapper's element name.
fn root_value(
    token: &TypeToken,
    ctx: &mut UnmarshallingContext,
    tag: &TagName<'_>,
) -> Result<()> {
    let name = ctx.expand(tag);
    let loader = ctx.wrapped_loader_for(token)?;
    ctx.set_loader(loader);
    let state = ctx.current_state_mut();
    state.receiver = Receiver::Root;
    state.intercepter = Intercepter::WrapElement(name);
    Ok(())
}
