//! Packing scopes for repeated child elements
//!
//! A [`Scope`] accumulates the items of one repeated property while its
//! siblings are still being visited. The owning composite brackets a region
//! of frames on the context's scope stack; each repeated property owns one
//! frame at a fixed offset within that region.

use std::rc::Rc;

use crate::bindings::{ObjectRef, PropertyBinding, Value};

/// One packing frame: a repeated property caught mid-accumulation
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// The bean owning the property; `None` until the first item arrives
    bean: Option<ObjectRef>,
    /// The property being packed
    prop: Option<Rc<PropertyBinding>>,
    /// Items accumulated so far
    pack: Vec<Value>,
}

impl Scope {
    /// Create a clean frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether packing has started (a bean is attached)
    pub fn has_started(&self) -> bool {
        self.bean.is_some()
    }

    /// Begin packing for the given bean/property pair.
    ///
    /// A no-op if the frame has already started; the first caller wins.
    pub fn start(&mut self, bean: ObjectRef, prop: Rc<PropertyBinding>) {
        if self.bean.is_none() {
            self.bean = Some(bean);
            self.prop = Some(prop);
        }
    }

    /// Append one item to the pack
    pub fn add(&mut self, item: Value) {
        debug_assert!(self.has_started(), "scope add before start");
        self.pack.push(item);
    }

    /// Number of items accumulated so far
    pub fn len(&self) -> usize {
        self.pack.len()
    }

    /// Whether nothing has been accumulated
    pub fn is_empty(&self) -> bool {
        self.pack.is_empty()
    }

    /// Store the packed list on the bean and reset to the clean state.
    ///
    /// A frame that never started resets without touching any bean.
    pub fn finish(&mut self) {
        if let (Some(bean), Some(prop)) = (self.bean.take(), self.prop.take()) {
            let items = std::mem::take(&mut self.pack);
            bean.borrow_mut().set(&prop.field, Value::List(items));
        }
        self.reset();
    }

    /// Restore the all-clean state, dropping any partial pack
    pub fn reset(&mut self) {
        self.bean = None;
        self.prop = None;
        self.pack.clear();
    }
}
