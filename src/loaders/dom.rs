//! DOM-capture: bridging one subtree into a fragment tree
//!
//! The capture root opens a synthetic document around the fragment, and
//! every nested element shares the same builder through a side object. The
//! builder tracks its own nesting depth, distinct from the context's depth,
//! so it knows when the captured subtree's own end tag occurs.

use std::cell::RefCell;
use std::rc::Rc;

use crate::bindings::{Fragment, FragmentElement, FragmentNode, Value};
use crate::context::UnmarshallingContext;
use crate::error::Result;
use crate::names::{ExpandedName, TagName};
use crate::text::Text;

/// Loader for one captured XML island.
///
/// The loader value itself is immutable; per-invocation state lives in the
/// shared [`FragmentBuilder`].
#[derive(Debug, Clone)]
pub struct DomLoader {
    builder: Rc<RefCell<FragmentBuilder>>,
    /// Whether this loader sits at the capture root
    root: bool,
}

impl DomLoader {
    /// Create a capture-root loader with a fresh builder
    pub fn new() -> Self {
        Self {
            builder: Rc::new(RefCell::new(FragmentBuilder::new())),
            root: true,
        }
    }

    /// A nested loader sharing this capture's builder
    pub(crate) fn nested(&self) -> Self {
        Self {
            builder: Rc::clone(&self.builder),
            root: false,
        }
    }

    pub(crate) fn start(&self, ctx: &mut UnmarshallingContext, tag: &TagName<'_>) -> Result<()> {
        let name = ctx.expand(tag);
        let mut attributes = Vec::with_capacity(tag.attributes.len());
        for attr in tag.attributes.iter() {
            let attr_name = ctx.expand_parts(&attr.uri, &attr.local);
            attributes.push((attr_name, attr.value.clone()));
        }
        let namespaces = ctx.fresh_decls().to_vec();

        let mut builder = self.builder.borrow_mut();
        if self.root {
            builder.start_document();
        }
        builder.start_element(name, tag.qname.to_string(), attributes, namespaces);
        Ok(())
    }

    pub(crate) fn text(&self, data: Text) {
        self.builder.borrow_mut().text(data.to_text());
    }

    pub(crate) fn leave(&self, ctx: &mut UnmarshallingContext, _tag: &TagName<'_>) -> Result<()> {
        let mut builder = self.builder.borrow_mut();
        builder.end_element();
        if self.root {
            builder.end_document();
            let fragment = builder.take();
            drop(builder);
            ctx.current_state_mut().target = Some(Value::Fragment(Rc::new(fragment)));
        }
        Ok(())
    }
}

impl Default for DomLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Generic tree-builder sink receiving the captured subtree's events
#[derive(Debug, Default)]
pub struct FragmentBuilder {
    fragment: Fragment,
    stack: Vec<FragmentElement>,
    /// Local nesting depth within the captured subtree
    depth: usize,
    in_document: bool,
}

impl FragmentBuilder {
    /// Create an idle builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the synthetic document around the fragment
    pub fn start_document(&mut self) {
        debug_assert!(!self.in_document, "capture already in progress");
        self.fragment = Fragment::default();
        self.stack.clear();
        self.depth = 0;
        self.in_document = true;
    }

    /// Open one element of the captured subtree
    pub fn start_element(
        &mut self,
        name: ExpandedName,
        qname: String,
        attributes: Vec<(ExpandedName, String)>,
        namespaces: Vec<(String, String)>,
    ) {
        self.depth += 1;
        self.stack.push(FragmentElement {
            name,
            qname,
            attributes,
            namespaces,
            children: Vec::new(),
        });
    }

    /// Append character data to the innermost open element
    pub fn text(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        match self.stack.last_mut() {
            Some(open) => open.children.push(FragmentNode::Text(text)),
            None => self.fragment.children.push(FragmentNode::Text(text)),
        }
    }

    /// Close the innermost open element
    pub fn end_element(&mut self) {
        debug_assert!(self.depth > 0, "end-element without open element");
        self.depth -= 1;
        if let Some(done) = self.stack.pop() {
            match self.stack.last_mut() {
                Some(parent) => parent.children.push(FragmentNode::Element(done)),
                None => self.fragment.children.push(FragmentNode::Element(done)),
            }
        }
    }

    /// Close the synthetic document
    pub fn end_document(&mut self) {
        debug_assert_eq!(self.depth, 0, "capture ended mid-element");
        self.in_document = false;
    }

    /// Hand over the finished fragment, resetting the builder
    pub fn take(&mut self) -> Fragment {
        std::mem::take(&mut self.fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_capture() {
        let mut builder = FragmentBuilder::new();
        builder.start_document();
        builder.start_element(
            ExpandedName::local("outer"),
            "outer".into(),
            vec![(ExpandedName::local("k"), "v".into())],
            vec![],
        );
        builder.text("head".into());
        builder.start_element(ExpandedName::local("inner"), "inner".into(), vec![], vec![]);
        builder.text("body".into());
        builder.end_element();
        builder.end_element();
        builder.end_document();

        let fragment = builder.take();
        assert_eq!(fragment.children.len(), 1);
        let FragmentNode::Element(outer) = &fragment.children[0] else {
            panic!("expected element");
        };
        assert_eq!(outer.name, ExpandedName::local("outer"));
        assert_eq!(outer.attributes[0].1, "v");
        assert_eq!(outer.children.len(), 2);
        let FragmentNode::Element(inner) = &outer.children[1] else {
            panic!("expected nested element");
        };
        assert_eq!(inner.children, vec![FragmentNode::Text("body".into())]);
    }

    #[test]
    fn test_builder_resets_between_captures() {
        let mut builder = FragmentBuilder::new();
        builder.start_document();
        builder.start_element(ExpandedName::local("a"), "a".into(), vec![], vec![]);
        builder.end_element();
        builder.end_document();
        let first = builder.take();
        assert_eq!(first.children.len(), 1);

        builder.start_document();
        builder.end_document();
        assert!(builder.take().children.is_empty());
    }
}
