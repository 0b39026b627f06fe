//! xsi:nil and xsi:type handling
//!
//! Layering is fixed: the nil check wraps type dispatch, which wraps the
//! default binding, evaluated outermost-first. Both layers re-delegate by
//! replacing the frame's loader and forwarding the start tag.

use crate::bindings::{TypeToken, Value};
use crate::context::UnmarshallingContext;
use crate::error::Result;
use crate::events::{Severity, ValidationEvent};
use crate::loaders::Loader;
use crate::names::{split_qname, TagName};

/// Outermost layer: check `xsi:nil="true"` before any type dispatch.
pub(crate) fn nil_start(
    inner: &Loader,
    ctx: &mut UnmarshallingContext,
    tag: &TagName<'_>,
) -> Result<()> {
    if !tag.attributes.xsi_nil() {
        ctx.set_loader(inner.clone());
        return inner.start_element(ctx, tag);
    }

    ctx.current_state_mut().nil = true;
    let preserve = (ctx.nil_policy())(tag) && tag.attributes.has_non_xsi();
    if preserve {
        // Build the wrapper object so its attributes survive, then drop
        // the element content.
        inner.start_element(ctx, tag)?;
        close_open_scopes(ctx);
        ctx.set_loader(Loader::Discard);
    } else {
        // Plain nil: the bound accessor receives an explicit null and no
        // child object is ever constructed.
        ctx.current_state_mut().target = Some(Value::Null);
        ctx.set_loader(Loader::Discard);
    }
    Ok(())
}

/// Close the packing region the just-started composite opened; the frame
/// switches to [`Loader::Discard`], so its own leave hook never runs.
fn close_open_scopes(ctx: &mut UnmarshallingContext) {
    let frames = match ctx.current_state().loader.as_ref() {
        Some(Loader::Structure(binding)) => binding.frame_count,
        _ => 0,
    };
    if frames > 0 {
        let base = ctx.current_state().scope_base;
        ctx.end_scope(frames, base);
    }
}

/// Middle layer: honor an `xsi:type` override when it resolves to a known
/// type, falling back to the statically expected binding otherwise.
pub(crate) fn type_start(
    default: &Loader,
    expected: &TypeToken,
    ctx: &mut UnmarshallingContext,
    tag: &TagName<'_>,
) -> Result<()> {
    if let Some(raw) = tag.attributes.xsi_type() {
        let raw = raw.trim().to_string();
        let (prefix, local) = split_qname(&raw);
        match ctx.resolve_prefix(prefix).map(str::to_string) {
            None => {
                let shown = raw.clone();
                ctx.report(true, move |loc| {
                    ValidationEvent::new(
                        Severity::Error,
                        format!("xsi:type '{}' uses an undeclared prefix", shown),
                    )
                    .with_locator(loc)
                })?;
            }
            Some(uri) => {
                let name = ctx.expand_parts(&uri, local);
                match ctx.registry().type_for_name(&name).cloned() {
                    // Override equal to the expected type: skip re-dispatch
                    // entirely so values convert exactly once.
                    Some(token) if &token == expected => {}
                    Some(token) => {
                        let loader = ctx.loader_for_type(&token)?;
                        ctx.set_loader(loader.clone());
                        return loader.start_element(ctx, tag);
                    }
                    None => {
                        let shown = name.to_string();
                        ctx.report(true, move |loc| {
                            ValidationEvent::new(
                                Severity::Error,
                                format!("unknown xsi:type {}", shown),
                            )
                            .with_locator(loc)
                        })?;
                    }
                }
            }
        }
    }
    ctx.set_loader(default.clone());
    default.start_element(ctx, tag)
}

/// Silent xsi:type probe used during root selection: resolve if possible,
/// report nothing here (the caller decides how hard to fail).
pub(crate) fn probe_type(
    ctx: &mut UnmarshallingContext,
    tag: &TagName<'_>,
) -> Option<TypeToken> {
    let raw = tag.attributes.xsi_type()?.trim().to_string();
    let (prefix, local) = split_qname(&raw);
    let uri = ctx.resolve_prefix(prefix).map(str::to_string)?;
    let name = ctx.expand_parts(&uri, local);
    ctx.registry().type_for_name(&name).cloned()
}
