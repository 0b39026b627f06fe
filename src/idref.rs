//! ID/IDREF resolution
//!
//! IDs are bound as they are seen; references are resolved by deferred
//! patchers once the whole tree is known. Redefining an ID is deliberately
//! permissive: the last binding wins, matching the lenient behavior most
//! consumers expect from hand-authored documents.

use std::collections::HashMap;

use crate::bindings::Value;

/// ID resolution collaborator
pub trait IdResolver {
    /// Called when a new document begins
    fn start_document(&mut self);

    /// Bind an ID to an object (last-write-wins on redefinition)
    fn bind(&mut self, id: &str, value: Value);

    /// Resolve an ID; `None` when the ID was never bound
    fn resolve(&self, id: &str) -> Option<Value>;

    /// Called after all patchers have run
    fn end_document(&mut self);
}

/// Default in-memory resolver
#[derive(Debug, Default)]
pub struct DefaultIdResolver {
    ids: HashMap<String, Value>,
}

impl DefaultIdResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdResolver for DefaultIdResolver {
    fn start_document(&mut self) {
        self.ids.clear();
    }

    fn bind(&mut self, id: &str, value: Value) {
        self.ids.insert(id.to_string(), value);
    }

    fn resolve(&self, id: &str) -> Option<Value> {
        self.ids.get(id).cloned()
    }

    fn end_document(&mut self) {
        self.ids.clear();
    }
}
