//! The unmarshalling context
//!
//! The context is the single coordinator of a document in flight: it owns the
//! per-depth [`State`] arena, dispatches every event to the active
//! [`Loader`], tracks namespace bindings, queues ID/IDREF patchers, and
//! yields the root object on completion.
//!
//! A context processes one document at a time and is reusable across
//! documents via a fresh `start_document`. Concurrent reuse is ruled out by
//! the `&mut self` receivers; there is no hidden thread-local state.

use std::rc::Rc;

use crate::bindings::{
    BindingKind, BindingRegistry, ElementValue, ObjectRef, PropertyBinding, TypeToken, Value,
};
use crate::connectors::{TextPredictor, XmlVisitor};
use crate::error::{Error, Result};
use crate::events::{EventSink, Locator, Severity, ValidationEvent};
use crate::idref::{DefaultIdResolver, IdResolver};
use crate::loaders::Loader;
use crate::names::{ExpandedName, StringPool, TagName};
use crate::namespaces::{NamespaceContext, NamespaceStack};
use crate::scope::Scope;
use crate::text::Text;

/// How many fresh State slots the arena grows by when exhausted
const STATE_BATCH: usize = 8;

/// Callback delivering a finished child result to its parent
#[derive(Debug, Clone, Default)]
pub enum Receiver {
    /// Nothing to deliver (discarded subtrees)
    #[default]
    None,
    /// Set a property on the parent object
    Property(Rc<PropertyBinding>),
    /// Append to the packing frame of a repeated property
    ScopeItem(Rc<PropertyBinding>),
    /// The child's text is this bean's document-wide ID: set the property
    /// and bind the bean into the ID resolver
    IdProperty(Rc<PropertyBinding>),
    /// The child's text is an ID reference; queue a patcher
    IdRefProperty(Rc<PropertyBinding>),
    /// Store the document result
    Root,
}

/// Optional transform applied to a finished result before delivery
#[derive(Debug, Clone, Default)]
pub enum Intercepter {
    /// No transform
    #[default]
    None,
    /// Wrap the value with its element name (expected-type root mode)
    WrapElement(ExpandedName),
}

/// One per-depth frame of the unmarshalling state machine.
///
/// Frames live in a growable arena indexed by depth; push advances the
/// index, pop clears the slot and retreats.
#[derive(Debug, Default)]
pub struct State {
    /// The active loader for this depth; set by the parent's child-element
    /// hook and never absent while events are dispatched
    pub loader: Option<Loader>,
    /// Delivery callback invoked when this element finishes
    pub receiver: Receiver,
    /// Transform applied before delivery
    pub intercepter: Intercepter,
    /// The object under construction
    pub target: Option<Value>,
    /// Element default value substituted for empty text
    pub element_default: Option<String>,
    /// Namespace-stack length when this frame was pushed
    pub ns_count: usize,
    /// Base of this frame's packing-scope region
    pub scope_base: usize,
    /// Whether this element carried `xsi:nil="true"`
    pub nil: bool,
}

impl State {
    fn clear(&mut self) {
        self.loader = None;
        self.receiver = Receiver::None;
        self.intercepter = Intercepter::None;
        self.target = None;
        self.element_default = None;
        self.ns_count = 0;
        self.scope_base = 0;
        self.nil = false;
    }
}

/// Deferred action run once at document end (ID/IDREF resolution)
pub type Patcher = Box<dyn FnOnce(&mut UnmarshallingContext)>;

/// How the root loader is selected
#[derive(Debug, Clone, Default)]
pub enum RootMode {
    /// Look the root element up in the registry's root table, falling back
    /// to an `xsi:type` probe
    #[default]
    ByName,
    /// Unmarshal the root as the given type regardless of its tag name,
    /// wrapping the result in an [`ElementValue`]
    Expected(TypeToken),
}

/// Policy hook deciding whether a nil element's attributes must be
/// preserved on a wrapper object instead of discarding the element outright
pub type NilPolicy = Rc<dyn Fn(&TagName<'_>) -> bool>;

/// The central event-dispatch coordinator
pub struct UnmarshallingContext {
    registry: Rc<BindingRegistry>,
    /// State arena indexed by depth; `current` is the top of the stack
    states: Vec<State>,
    current: usize,
    namespaces: NamespaceStack,
    /// Prefix bindings declared for the start tag currently being processed
    fresh_decls: Vec<(String, String)>,
    scopes: Vec<Scope>,
    patchers: Vec<Patcher>,
    pool: StringPool,
    sink: Option<Box<dyn EventSink>>,
    resolver: Box<dyn IdResolver>,
    root_mode: RootMode,
    nil_policy: NilPolicy,
    locator: Locator,
    result: Option<Value>,
    aborted: Option<ValidationEvent>,
    diagnostic_count: usize,
    in_document: bool,
}

impl std::fmt::Debug for UnmarshallingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnmarshallingContext")
            .field("depth", &self.current)
            .field("in_document", &self.in_document)
            .field("diagnostics", &self.diagnostic_count)
            .finish()
    }
}

impl UnmarshallingContext {
    /// Create a context over the given registry
    pub fn new(registry: Rc<BindingRegistry>) -> Self {
        let mut states = Vec::with_capacity(STATE_BATCH);
        states.resize_with(STATE_BATCH, State::default);
        Self {
            registry,
            states,
            current: 0,
            namespaces: NamespaceStack::new(),
            fresh_decls: Vec::new(),
            scopes: Vec::new(),
            patchers: Vec::new(),
            pool: StringPool::new(),
            sink: None,
            resolver: Box::new(DefaultIdResolver::new()),
            root_mode: RootMode::ByName,
            nil_policy: Rc::new(|_| false),
            locator: Locator::unknown(),
            result: None,
            aborted: None,
            diagnostic_count: 0,
            in_document: false,
        }
    }

    /// Install a diagnostic sink
    pub fn with_event_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Install an ID resolver
    pub fn with_id_resolver(mut self, resolver: Box<dyn IdResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Set the root-loader selection mode
    pub fn with_root_mode(mut self, mode: RootMode) -> Self {
        self.root_mode = mode;
        self
    }

    /// Set the nil attribute-preservation policy
    pub fn with_nil_policy(mut self, policy: NilPolicy) -> Self {
        self.nil_policy = policy;
        self
    }

    // ---- accessors used by the loader layer ----

    /// The binding registry
    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    /// The current (deepest) state frame
    pub fn current_state(&self) -> &State {
        &self.states[self.current]
    }

    /// Mutable access to the current state frame
    pub fn current_state_mut(&mut self) -> &mut State {
        &mut self.states[self.current]
    }

    /// Replace the current state's loader (chain-of-responsibility step)
    pub fn set_loader(&mut self, loader: Loader) {
        self.states[self.current].loader = Some(loader);
    }

    /// Intern a tag name into an owned expanded name
    pub fn expand(&mut self, tag: &TagName<'_>) -> ExpandedName {
        tag.to_expanded(&mut self.pool)
    }

    /// Intern an arbitrary (uri, local) pair
    pub fn expand_parts(&mut self, uri: &str, local: &str) -> ExpandedName {
        ExpandedName {
            uri: self.pool.intern(uri),
            local: self.pool.intern(local),
        }
    }

    /// Resolve a prefix against the live binding stack (plus fallback)
    pub fn resolve_prefix(&self, prefix: &str) -> Option<&str> {
        self.namespaces.uri_for(prefix)
    }

    /// All prefixes bound to a URI, most recent first
    pub fn prefixes_for(&self, uri: &str) -> Vec<&str> {
        self.namespaces.prefixes_for(uri)
    }

    /// Prefix bindings declared on the start tag currently being processed
    pub fn fresh_decls(&self) -> &[(String, String)] {
        &self.fresh_decls
    }

    /// The position most recently reported by the connector
    pub fn locator(&self) -> Locator {
        self.locator
    }

    /// Update the source position (called by connectors)
    pub fn set_locator(&mut self, locator: Locator) {
        self.locator = locator;
    }

    /// Number of recoverable diagnostics reported for the current document
    pub fn diagnostic_count(&self) -> usize {
        self.diagnostic_count
    }

    /// Whether a sink verdict marked the document aborted
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    // ---- diagnostics ----

    /// Report an anomaly. The event is constructed lazily so callers can
    /// skip the expensive message build when no sink is registered.
    ///
    /// Honors the sink verdict: continue → keep processing; stop on a
    /// recoverable anomaly → mark aborted and keep unwinding normally; any
    /// non-recoverable anomaly that is not waved through → fatal error.
    pub fn report(
        &mut self,
        can_recover: bool,
        make: impl FnOnce(Locator) -> ValidationEvent,
    ) -> Result<()> {
        if can_recover {
            self.diagnostic_count += 1;
        }
        let locator = self.locator;
        match self.sink.as_mut() {
            None => {
                if can_recover {
                    Ok(())
                } else {
                    Err(Error::Fatal(make(locator)))
                }
            }
            Some(sink) => {
                let event = make(locator);
                let proceed = sink.handle(&event);
                if !can_recover {
                    return Err(Error::Fatal(event));
                }
                if proceed {
                    Ok(())
                } else {
                    if self.aborted.is_none() {
                        self.aborted = Some(event);
                    }
                    Ok(())
                }
            }
        }
    }

    /// Shorthand for a recoverable error diagnostic
    pub fn report_error(&mut self, message: impl Into<String>, subject: String) -> Result<()> {
        self.report(true, move |loc| {
            ValidationEvent::new(Severity::Error, message)
                .with_subject(subject)
                .with_locator(loc)
        })
    }

    // ---- object creation ----

    /// Create an instance of a bound type, consulting the factory table
    /// before the default instantiation path.
    ///
    /// Returns `Ok(None)` when creation failed recoverably; the caller must
    /// treat the missing object as "skip this node".
    pub fn create_instance(&mut self, token: &TypeToken) -> Result<Option<Value>> {
        let registry = Rc::clone(&self.registry);
        if let Some(factory) = registry.factory(token) {
            return match factory() {
                Ok(value) => Ok(Some(value)),
                Err(reason) => {
                    self.report_error(
                        format!("could not create instance of {}: {}", token, reason),
                        token.to_string(),
                    )?;
                    Ok(None)
                }
            };
        }
        match self.registry.binding(token).map(|b| b.kind.clone()) {
            Some(BindingKind::Composite(comp)) => {
                Ok(Some(Value::Object(crate::bindings::ObjectData::new(
                    comp.token.clone(),
                ))))
            }
            Some(BindingKind::Leaf(_)) => Ok(Some(Value::Null)),
            None => {
                self.report_error(
                    format!("no binding registered for type {}", token),
                    token.to_string(),
                )?;
                Ok(None)
            }
        }
    }

    /// Build the unwrapped loader for a bound type
    pub fn loader_for_type(&self, token: &TypeToken) -> Result<Loader> {
        match self.registry.binding(token) {
            Some(binding) => Ok(match &binding.kind {
                BindingKind::Leaf(kind) => Loader::Leaf(*kind),
                BindingKind::Composite(comp) => Loader::Structure(Rc::clone(comp)),
            }),
            None => Err(Error::Binding(format!(
                "no binding registered for type {}",
                token
            ))),
        }
    }

    /// Build the fully layered loader for a bound type: nil-check wraps
    /// type-dispatch wraps the default binding.
    pub fn wrapped_loader_for(&self, token: &TypeToken) -> Result<Loader> {
        let default = self.loader_for_type(token)?;
        Ok(Loader::XsiNil(Box::new(Loader::XsiType {
            default: Box::new(default),
            expected: token.clone(),
        })))
    }

    /// The configured nil attribute-preservation policy
    pub fn nil_policy(&self) -> NilPolicy {
        Rc::clone(&self.nil_policy)
    }

    // ---- ID/IDREF ----

    /// Bind an ID to a value (last-write-wins)
    pub fn bind_id(&mut self, id: &str, value: Value) {
        self.resolver.bind(id, value);
    }

    /// Resolve a previously bound ID
    pub fn resolve_id(&self, id: &str) -> Option<Value> {
        self.resolver.resolve(id)
    }

    /// Queue a patcher to run once at document end, in submission order
    pub fn add_patcher(&mut self, patcher: Patcher) {
        self.patchers.push(patcher);
    }

    // ---- packing scopes ----

    /// Open `n` packing frames and return the region base
    pub fn start_scope(&mut self, n: usize) -> usize {
        let base = self.scopes.len();
        self.scopes.resize_with(base + n, Scope::new);
        base
    }

    /// Close the `n` most recent packing frames, finishing any that started.
    ///
    /// Calls must bracket the exact region opened by the matching
    /// `start_scope`; unbalanced calls corrupt subsequent scope indexing.
    pub fn end_scope(&mut self, n: usize, base: usize) {
        debug_assert_eq!(
            self.scopes.len(),
            base + n,
            "unbalanced scope brackets"
        );
        for scope in &mut self.scopes[base..] {
            scope.finish();
        }
        self.scopes.truncate(base);
    }

    /// Access the packing frame at `base + offset`
    pub fn scope_mut(&mut self, base: usize, offset: usize) -> &mut Scope {
        &mut self.scopes[base + offset]
    }

    // ---- event dispatch ----

    /// Begin a new document, resetting all transient state
    pub fn start_document(&mut self, fallback_ns: Option<NamespaceContext>) -> Result<()> {
        debug_assert!(!self.in_document, "document already in flight");
        for state in &mut self.states {
            state.clear();
        }
        self.current = 0;
        self.namespaces.reset(fallback_ns);
        self.fresh_decls.clear();
        self.scopes.clear();
        self.patchers.clear();
        self.result = None;
        self.aborted = None;
        self.diagnostic_count = 0;
        self.in_document = true;
        self.states[0].loader = Some(match &self.root_mode {
            RootMode::ByName => Loader::RootByName,
            RootMode::Expected(token) => Loader::RootValue(token.clone()),
        });
        self.resolver.start_document();
        Ok(())
    }

    /// A prefix mapping comes into scope (before the owning start tag)
    pub fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> Result<()> {
        self.namespaces.push_binding(prefix, uri);
        self.fresh_decls.push((prefix.to_string(), uri.to_string()));
        Ok(())
    }

    /// A prefix mapping goes out of scope (after the owning end tag)
    pub fn end_prefix_mapping(&mut self, prefix: &str) -> Result<()> {
        self.namespaces.pop_binding(prefix);
        Ok(())
    }

    /// Dispatch a start tag: push a frame, let the parent's loader choose
    /// the child loader, then start it.
    pub fn start_element(&mut self, tag: &TagName<'_>) -> Result<()> {
        self.push_state();
        let parent_loader = self.states[self.current - 1]
            .loader
            .clone()
            .ok_or_else(|| Error::Other("parent state has no loader".into()))?;
        parent_loader.child_element(self, tag)?;
        debug_assert!(
            self.states[self.current].loader.is_some(),
            "child-element hook left no loader installed"
        );
        let loader = match self.states[self.current].loader.clone() {
            Some(loader) => loader,
            None => Loader::Discard,
        };
        loader.start_element(self, tag)?;
        self.fresh_decls.clear();
        Ok(())
    }

    /// Dispatch one coalesced text run, substituting the element default
    /// for empty actual text.
    pub fn text(&mut self, data: Text) -> Result<()> {
        let data = match (&self.states[self.current].element_default, data.is_empty()) {
            (Some(default), true) => Text::from_str(default.clone()),
            _ => data,
        };
        let loader = self.states[self.current]
            .loader
            .clone()
            .ok_or_else(|| Error::Other("no active loader for text".into()))?;
        loader.text(self, data)
    }

    /// Dispatch an end tag: finish the child, pop its frame, then deliver
    /// the result to the parent. The pop happens before delivery so the
    /// receiver always observes the parent as current.
    pub fn end_element(&mut self, tag: &TagName<'_>) -> Result<()> {
        let loader = self.states[self.current]
            .loader
            .clone()
            .ok_or_else(|| Error::Other("no active loader for end tag".into()))?;
        loader.leave_element(self, tag)?;

        let state = &mut self.states[self.current];
        let mut target = state.target.take();
        let receiver = std::mem::take(&mut state.receiver);
        let intercepter = std::mem::take(&mut state.intercepter);
        self.pop_state();

        if let Intercepter::WrapElement(name) = intercepter {
            target = Some(Value::Element(Rc::new(ElementValue {
                name,
                value: target.unwrap_or_default(),
            })));
        }

        self.deliver(receiver, target)
    }

    /// Finish the document: run queued patchers exactly once each in
    /// submission order, then close the ID resolver.
    pub fn end_document(&mut self) -> Result<()> {
        let patchers = std::mem::take(&mut self.patchers);
        for patcher in patchers {
            patcher(self);
        }
        self.resolver.end_document();
        debug_assert_eq!(self.current, 0, "unbalanced element nesting");
        self.in_document = false;
        Ok(())
    }

    /// Retrieve the document result.
    ///
    /// Fails distinctly for an aborted document versus a document that never
    /// produced a result; a successful-but-degraded document still yields
    /// its value (consult [`diagnostic_count`](Self::diagnostic_count)).
    pub fn take_result(&mut self) -> Result<Value> {
        if let Some(event) = self.aborted.take() {
            return Err(Error::Aborted(event));
        }
        match self.result.take() {
            Some(value) => Ok(value),
            None => Err(Error::NoResult(
                "document did not complete or produced no root object".into(),
            )),
        }
    }

    /// Whether the active loader expects a text callback at this depth
    pub fn expect_text(&self) -> bool {
        self.states[self.current]
            .loader
            .as_ref()
            .map(|l| l.expect_text())
            .unwrap_or(false)
    }

    // ---- internals ----

    fn push_state(&mut self) {
        self.current += 1;
        if self.current == self.states.len() {
            self.states.resize_with(self.states.len() + STATE_BATCH, State::default);
        }
        let ns_count = self.namespaces.len();
        let state = &mut self.states[self.current];
        state.clear();
        state.ns_count = ns_count;
    }

    fn pop_state(&mut self) {
        debug_assert!(self.current > 0, "root state never pops below itself");
        let ns_count = self.states[self.current].ns_count;
        self.states[self.current].clear();
        if self.namespaces.len() > ns_count {
            // Connectors pop prefixes via end-prefix-mapping events; this
            // only reclaims bindings a lenient source failed to end.
            self.namespaces.truncate(ns_count);
        }
        self.current -= 1;
    }

    fn deliver(&mut self, receiver: Receiver, target: Option<Value>) -> Result<()> {
        match receiver {
            Receiver::None => Ok(()),
            Receiver::Root => {
                self.result = Some(target.unwrap_or_default());
                Ok(())
            }
            Receiver::Property(prop) => {
                if let (Some(value), Some(bean)) = (target, self.current_bean()) {
                    bean.borrow_mut().set(&prop.field, value);
                }
                Ok(())
            }
            Receiver::ScopeItem(prop) => {
                if let (Some(value), Some(bean)) = (target, self.current_bean()) {
                    let base = self.states[self.current].scope_base;
                    let scope = self.scope_mut(base, prop.scope_offset);
                    scope.start(bean, Rc::clone(&prop));
                    scope.add(value);
                }
                Ok(())
            }
            Receiver::IdProperty(prop) => {
                if let (Some(Value::Str(id)), Some(bean)) = (target, self.current_bean()) {
                    bean.borrow_mut().set(&prop.field, Value::Str(id.clone()));
                    self.bind_id(&id, Value::Object(bean));
                }
                Ok(())
            }
            Receiver::IdRefProperty(prop) => {
                let id = match target {
                    Some(Value::Str(id)) => id,
                    _ => return Ok(()),
                };
                if let Some(bean) = self.current_bean() {
                    self.add_patcher(Box::new(move |ctx| {
                        match ctx.resolve_id(&id) {
                            Some(resolved) => bean.borrow_mut().set(&prop.field, resolved),
                            None => {
                                // Unresolved reference degrades to an
                                // explicit null
                                bean.borrow_mut().set(&prop.field, Value::Null);
                                let _ = ctx.report_error(
                                    format!("unresolved ID reference '{}'", id),
                                    prop.field.to_string(),
                                );
                            }
                        }
                    }));
                }
                Ok(())
            }
        }
    }

    fn current_bean(&self) -> Option<ObjectRef> {
        match &self.states[self.current].target {
            Some(Value::Object(obj)) => Some(Rc::clone(obj)),
            _ => None,
        }
    }
}

impl XmlVisitor for UnmarshallingContext {
    fn start_document(&mut self, fallback_ns: Option<NamespaceContext>) -> Result<()> {
        UnmarshallingContext::start_document(self, fallback_ns)
    }

    fn end_document(&mut self) -> Result<()> {
        UnmarshallingContext::end_document(self)
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> Result<()> {
        UnmarshallingContext::start_prefix_mapping(self, prefix, uri)
    }

    fn end_prefix_mapping(&mut self, prefix: &str) -> Result<()> {
        UnmarshallingContext::end_prefix_mapping(self, prefix)
    }

    fn start_element(&mut self, tag: &TagName<'_>) -> Result<()> {
        UnmarshallingContext::start_element(self, tag)
    }

    fn text(&mut self, data: Text) -> Result<()> {
        UnmarshallingContext::text(self, data)
    }

    fn end_element(&mut self, tag: &TagName<'_>) -> Result<()> {
        UnmarshallingContext::end_element(self, tag)
    }

    fn set_locator(&mut self, locator: Locator) {
        UnmarshallingContext::set_locator(self, locator)
    }
}

impl TextPredictor for UnmarshallingContext {
    fn expect_text(&self) -> bool {
        UnmarshallingContext::expect_text(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::LeafKind;
    use crate::names::AttributeSet;

    fn tag<'a>(local: &'a str, attrs: &'a AttributeSet) -> TagName<'a> {
        TagName {
            uri: "",
            local,
            qname: local,
            attributes: attrs,
        }
    }

    fn int_registry() -> Rc<BindingRegistry> {
        let mut reg = BindingRegistry::new();
        let t_int = reg.register_leaf("int", LeafKind::Int);
        reg.register_root(ExpandedName::local("n"), t_int);
        Rc::new(reg)
    }

    #[test]
    fn test_push_pop_symmetry() {
        let mut ctx = UnmarshallingContext::new(int_registry());
        let attrs = AttributeSet::new();
        ctx.start_document(None).unwrap();
        ctx.start_element(&tag("n", &attrs)).unwrap();
        ctx.text(Text::from_str("5")).unwrap();
        ctx.end_element(&tag("n", &attrs)).unwrap();
        ctx.end_document().unwrap();
        assert_eq!(ctx.current, 0);
        assert_eq!(ctx.take_result().unwrap(), Value::Int(5));
    }

    #[test]
    fn test_result_unavailable_before_completion() {
        let mut ctx = UnmarshallingContext::new(int_registry());
        ctx.start_document(None).unwrap();
        assert!(matches!(ctx.take_result(), Err(Error::NoResult(_))));
    }

    #[test]
    fn test_patchers_run_in_submission_order() {
        let order = Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut ctx = UnmarshallingContext::new(int_registry());
        ctx.start_document(None).unwrap();
        for i in 0..5 {
            let order = Rc::clone(&order);
            ctx.add_patcher(Box::new(move |_| order.borrow_mut().push(i)));
        }
        ctx.end_document().unwrap();
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4]);
        // Re-finishing must not run them again
        ctx.start_document(None).unwrap();
        ctx.end_document().unwrap();
        assert_eq!(order.borrow().len(), 5);
    }

    #[test]
    fn test_state_arena_grows_in_batches() {
        let mut ctx = UnmarshallingContext::new(int_registry());
        ctx.start_document(None).unwrap();
        for _ in 0..20 {
            ctx.push_state();
            ctx.set_loader(Loader::Discard);
        }
        assert!(ctx.states.len() > 20);
        for _ in 0..20 {
            ctx.pop_state();
        }
        assert_eq!(ctx.current, 0);
    }

    #[test]
    fn test_default_value_substitution() {
        let mut ctx = UnmarshallingContext::new(int_registry());
        ctx.start_document(None).unwrap();
        let attrs = AttributeSet::new();
        ctx.start_element(&tag("n", &attrs)).unwrap();
        ctx.current_state_mut().element_default = Some("9".into());
        ctx.text(Text::empty()).unwrap();
        ctx.end_element(&tag("n", &attrs)).unwrap();
        ctx.end_document().unwrap();
        assert_eq!(ctx.take_result().unwrap(), Value::Int(9));
    }

    #[test]
    fn test_unknown_root_is_fatal() {
        let mut ctx = UnmarshallingContext::new(int_registry());
        ctx.start_document(None).unwrap();
        let attrs = AttributeSet::new();
        let err = ctx.start_element(&tag("mystery", &attrs)).unwrap_err();
        assert!(matches!(err, Error::Fatal(_)));
    }
}
