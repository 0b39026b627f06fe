//! # xmlbind
//!
//! A streaming XML unmarshalling engine: event streams from pluggable
//! sources are bound to objects described by a runtime binding registry.
//!
//! ## Features
//!
//! - Pull, push and binary-XML sources behind uniform connector adapters
//! - Per-element loaders: leaves, composites, wildcards, DOM capture
//! - `xsi:type` dispatch and `xsi:nil` handling layered over any binding
//! - ID/IDREF resolution deferred to document end
//! - Lazy base64 views over binary payloads
//! - Recoverable diagnostics through a pluggable event sink
//!
//! ## Example
//!
//! ```rust,ignore
//! use xmlbind::{BindingRegistry, Unmarshaller};
//!
//! let registry = build_registry();
//! let mut unmarshaller = Unmarshaller::new(registry);
//! let value = unmarshaller.unmarshal_str("<item><value>41</value></item>")?;
//! for event in unmarshaller.events() {
//!     eprintln!("recovered: {}", event);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;

pub mod events;
pub mod names;
pub mod namespaces;
pub mod text;

pub mod bindings;
pub mod idref;
pub mod scope;

pub mod connectors;
pub mod context;
pub mod loaders;

pub mod unmarshaller;

// Re-exports for convenience
pub use bindings::{BindingRegistry, CompositeBinding, PropertyBinding, TypeToken, Value};
pub use error::{Error, Result};
pub use events::{CollectingSink, EventSink, ValidationEvent};
pub use unmarshaller::Unmarshaller;

/// Version of the xmlbind library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
