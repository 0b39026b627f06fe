//! Target-object model and the binding registry
//!
//! The runtime builds a tree of dynamic [`Value`]s driven by caller-supplied
//! bindings. A binding describes one element type: either a leaf scalar or a
//! composite with element, attribute and text properties. The registry also
//! carries the root-element table, the xsi:type lookup table and the
//! per-type factory overrides consulted before default instantiation.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::names::ExpandedName;

/// Interned identifier for a bound type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeToken(Rc<str>);

impl TypeToken {
    /// Create a token from a type name
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Self(name.into())
    }

    /// The type name
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared handle to an object under construction.
///
/// Single-threaded shared mutability; ID/IDREF patchers mutate objects that
/// are already placed in the tree.
pub type ObjectRef = Rc<RefCell<ObjectData>>;

/// One composite object: a type token plus an ordered field map
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectData {
    /// The bound type this object was built from
    pub type_token: TypeToken,
    /// Field values in first-set order
    pub fields: IndexMap<Rc<str>, Value>,
}

impl ObjectData {
    /// Create an empty object of the given type
    pub fn new(type_token: TypeToken) -> ObjectRef {
        Rc::new(RefCell::new(Self {
            type_token,
            fields: IndexMap::new(),
        }))
    }

    /// Set a field value
    pub fn set(&mut self, field: &Rc<str>, value: Value) {
        self.fields.insert(Rc::clone(field), value);
    }

    /// Get a field value
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// A root value wrapped with its element name (expected-type root mode)
#[derive(Debug, Clone, PartialEq)]
pub struct ElementValue {
    /// The root element's expanded name
    pub name: ExpandedName,
    /// The unmarshalled content
    pub value: Value,
}

/// A captured XML island: the subtree below a DOM-capture property,
/// bracketed by a synthetic document start/end.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragment {
    /// Top-level nodes of the captured subtree (normally one element)
    pub children: Vec<FragmentNode>,
}

/// One node inside a captured fragment
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentNode {
    /// A nested element
    Element(FragmentElement),
    /// A text run
    Text(String),
}

/// One element inside a captured fragment
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentElement {
    /// Expanded element name
    pub name: ExpandedName,
    /// Qualified name as written in the document
    pub qname: String,
    /// Attributes in document order
    pub attributes: Vec<(ExpandedName, String)>,
    /// Prefix bindings declared on this element
    pub namespaces: Vec<(String, String)>,
    /// Child nodes in document order
    pub children: Vec<FragmentNode>,
}

/// A dynamic tree node produced by unmarshalling
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Explicit null (`xsi:nil="true"` or an unresolved reference)
    #[default]
    Null,
    /// String scalar
    Str(String),
    /// Integer scalar
    Int(i64),
    /// Floating-point scalar
    Double(f64),
    /// Boolean scalar
    Bool(bool),
    /// Binary scalar (decoded from base64 content)
    Bytes(Vec<u8>),
    /// Composite object
    Object(ObjectRef),
    /// Repeated property packed into a list
    List(Vec<Value>),
    /// Captured XML island
    Fragment(Rc<Fragment>),
    /// Root value wrapped with its element name
    Element(Rc<ElementValue>),
}

impl Value {
    /// Whether this is the explicit null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow as an object reference, if this is a composite
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Borrow as a list, if this is a packed collection
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

/// The scalar kinds a leaf binding can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    /// `xs:string`-like content, taken verbatim
    String,
    /// Whitespace-trimmed integer content
    Int,
    /// Whitespace-trimmed floating-point content
    Double,
    /// `true`/`false`/`1`/`0` content
    Bool,
    /// Base64 binary content
    Bytes,
}

impl LeafKind {
    /// Parse one coalesced text run into a scalar value.
    ///
    /// Returns the parse-failure reason as the error; leaf parse failures
    /// are recoverable diagnostics, not fatal errors.
    pub fn parse(&self, text: crate::text::Text) -> std::result::Result<Value, String> {
        match self {
            LeafKind::String => Ok(Value::Str(text.to_text())),
            LeafKind::Int => {
                let s = text.to_text();
                s.trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|e| format!("invalid integer '{}': {}", s.trim(), e))
            }
            LeafKind::Double => {
                let s = text.to_text();
                s.trim()
                    .parse::<f64>()
                    .map(Value::Double)
                    .map_err(|e| format!("invalid double '{}': {}", s.trim(), e))
            }
            LeafKind::Bool => {
                let s = text.to_text();
                match s.trim() {
                    "true" | "1" => Ok(Value::Bool(true)),
                    "false" | "0" => Ok(Value::Bool(false)),
                    other => Err(format!("invalid boolean '{}'", other)),
                }
            }
            LeafKind::Bytes => {
                use crate::text::TextChunk;
                // Fast path: a lone binary chunk needs no decode round trip
                let binary_only = text.chunks().len() == 1
                    && matches!(text.chunks()[0], TextChunk::Binary(_));
                if binary_only {
                    return Ok(Value::Bytes(text.into_bytes().unwrap_or_default()));
                }
                use base64::engine::general_purpose::STANDARD;
                use base64::Engine as _;
                let s = text.to_text();
                STANDARD
                    .decode(s.trim())
                    .map(Value::Bytes)
                    .map_err(|e| format!("invalid base64 content: {}", e))
            }
        }
    }

    /// Parse already-materialized text (attributes, defaults)
    pub fn parse_str(&self, s: &str) -> std::result::Result<Value, String> {
        self.parse(crate::text::Text::from_str(s))
    }
}

/// How a property's value is produced
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    /// Bound to a registered type (leaf or composite)
    Typed(TypeToken),
    /// The value is this object's document-wide ID (bound into the resolver)
    Id,
    /// The element content is an ID reference, resolved at document end
    IdRef,
    /// Any-content: known elements unmarshal to objects, unknown ones are
    /// captured as fragments
    Wildcard,
    /// The whole subtree is captured as an XML island
    Dom,
}

/// One element, attribute or text property of a composite binding
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyBinding {
    /// Target field name on the object
    pub field: Rc<str>,
    /// Value production strategy
    pub kind: PropertyKind,
    /// Whether repeated occurrences pack into a list
    pub repeated: bool,
    /// Schema default substituted when the element's text is empty
    pub default_value: Option<String>,
    /// Offset of this property's packing frame within the owning
    /// composite's scope region; assigned at registration
    pub(crate) scope_offset: usize,
}

impl PropertyBinding {
    /// Create a property binding
    pub fn new(field: impl Into<Rc<str>>, kind: PropertyKind) -> Self {
        Self {
            field: field.into(),
            kind,
            repeated: false,
            default_value: None,
            scope_offset: 0,
        }
    }

    /// Shorthand for a type-bound property
    pub fn typed(field: impl Into<Rc<str>>, token: TypeToken) -> Self {
        Self::new(field, PropertyKind::Typed(token))
    }

    /// Mark the property as repeated (packed into a list)
    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    /// Set the element default value
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default_value = Some(default.into());
        self
    }
}

/// Binding for one composite (bean-like) type
#[derive(Debug, Clone)]
pub struct CompositeBinding {
    /// The bound type
    pub token: TypeToken,
    /// Child-element properties keyed by element name
    pub elements: IndexMap<ExpandedName, Rc<PropertyBinding>>,
    /// Attribute properties keyed by attribute name
    pub attributes: IndexMap<ExpandedName, Rc<PropertyBinding>>,
    /// Character-content property for mixed/simple content
    pub text_prop: Option<Rc<PropertyBinding>>,
    /// Catch-all property receiving child elements not declared above
    pub wildcard_prop: Option<Rc<PropertyBinding>>,
    /// Number of packing frames this type brackets (repeated properties)
    pub frame_count: usize,
}

impl CompositeBinding {
    /// Create an empty composite binding
    pub fn new(token: TypeToken) -> Self {
        Self {
            token,
            elements: IndexMap::new(),
            attributes: IndexMap::new(),
            text_prop: None,
            wildcard_prop: None,
            frame_count: 0,
        }
    }

    /// Add a child-element property
    pub fn with_element(mut self, name: ExpandedName, prop: PropertyBinding) -> Self {
        self.elements.insert(name, Rc::new(prop));
        self
    }

    /// Add an attribute property
    pub fn with_attribute(mut self, name: ExpandedName, prop: PropertyBinding) -> Self {
        self.attributes.insert(name, Rc::new(prop));
        self
    }

    /// Set the character-content property
    pub fn with_text(mut self, prop: PropertyBinding) -> Self {
        self.text_prop = Some(Rc::new(prop));
        self
    }

    /// Set the catch-all property for undeclared child elements
    pub fn with_wildcard(mut self, prop: PropertyBinding) -> Self {
        self.wildcard_prop = Some(Rc::new(prop));
        self
    }
}

/// The two shapes a bound type can take
#[derive(Debug, Clone)]
pub enum BindingKind {
    /// Scalar leaf
    Leaf(LeafKind),
    /// Composite with properties
    Composite(Rc<CompositeBinding>),
}

/// One registered type
#[derive(Debug, Clone)]
pub struct TypeBinding {
    /// The type's token
    pub token: TypeToken,
    /// Leaf or composite shape
    pub kind: BindingKind,
}

/// Factory override: `createInstance` replacement for one type
pub type Factory = Box<dyn Fn() -> std::result::Result<Value, String>>;

/// The registry of bound types, root elements and factories.
///
/// Populated by the caller before unmarshalling begins; immutable while a
/// document is in flight.
#[derive(Default)]
pub struct BindingRegistry {
    types: IndexMap<TypeToken, TypeBinding>,
    type_names: IndexMap<ExpandedName, TypeToken>,
    roots: IndexMap<ExpandedName, TypeToken>,
    factories: IndexMap<TypeToken, Factory>,
}

impl fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingRegistry")
            .field("types", &self.types.len())
            .field("roots", &self.roots.len())
            .field("factories", &self.factories.len())
            .finish()
    }
}

impl BindingRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a leaf type and return its token
    pub fn register_leaf(&mut self, name: impl Into<Rc<str>>, kind: LeafKind) -> TypeToken {
        let token = TypeToken::new(name);
        self.types.insert(
            token.clone(),
            TypeBinding {
                token: token.clone(),
                kind: BindingKind::Leaf(kind),
            },
        );
        token
    }

    /// Register a composite type, assigning packing-frame offsets to its
    /// repeated element properties, and return its token.
    pub fn register_composite(&mut self, mut binding: CompositeBinding) -> TypeToken {
        let mut offset = 0;
        for (_, prop) in binding.elements.iter_mut() {
            if prop.repeated {
                Rc::make_mut(prop).scope_offset = offset;
                offset += 1;
            }
        }
        if let Some(prop) = binding.wildcard_prop.as_mut() {
            if prop.repeated {
                Rc::make_mut(prop).scope_offset = offset;
                offset += 1;
            }
        }
        binding.frame_count = offset;
        let token = binding.token.clone();
        self.types.insert(
            token.clone(),
            TypeBinding {
                token: token.clone(),
                kind: BindingKind::Composite(Rc::new(binding)),
            },
        );
        token
    }

    /// Map a root element name to a type
    pub fn register_root(&mut self, name: ExpandedName, token: TypeToken) {
        self.roots.insert(name, token);
    }

    /// Map a schema type name (as used by `xsi:type`) to a type
    pub fn register_type_name(&mut self, name: ExpandedName, token: TypeToken) {
        self.type_names.insert(name, token);
    }

    /// Register a factory override consulted before default instantiation
    pub fn register_factory(
        &mut self,
        token: TypeToken,
        factory: impl Fn() -> std::result::Result<Value, String> + 'static,
    ) {
        self.factories.insert(token, Box::new(factory));
    }

    /// Look up a registered type
    pub fn binding(&self, token: &TypeToken) -> Option<&TypeBinding> {
        self.types.get(token)
    }

    /// Resolve a root element name to its type
    pub fn root_for(&self, name: &ExpandedName) -> Option<&TypeToken> {
        self.roots.get(name)
    }

    /// Resolve an `xsi:type` name to its type
    pub fn type_for_name(&self, name: &ExpandedName) -> Option<&TypeToken> {
        self.type_names.get(name)
    }

    /// Factory override for a type, if registered
    pub fn factory(&self, token: &TypeToken) -> Option<&Factory> {
        self.factories.get(token)
    }
}
