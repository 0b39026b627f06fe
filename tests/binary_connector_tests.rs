//! Binary-XML connector tests driven by a scripted reader
//!
//! The scripted reader stands in for a real binary-XML decoder and replays
//! a fixed token sequence, including native octet runs, so the adapter's
//! buffering and ordering rules can be checked end to end.

use std::rc::Rc;

use pretty_assertions::assert_eq;

use xmlbind::bindings::{
    BindingRegistry, CompositeBinding, LeafKind, PropertyBinding, TypeToken, Value,
};
use xmlbind::connectors::{BinaryToken, BinaryXmlReader, PullReader, RawAttribute, XmlSource};
use xmlbind::names::ExpandedName;
use xmlbind::text::Base64Text;
use xmlbind::{Result, Unmarshaller};

enum Step {
    StartDoc,
    Start(&'static str, Vec<RawAttribute>),
    Text(&'static str),
    Binary(Vec<u8>),
    End(&'static str),
    EndDoc,
}

/// Replays a fixed token sequence through the `BinaryXmlReader` accessors
struct ScriptedReader {
    steps: std::vec::IntoIter<Step>,
    name: String,
    attrs: Vec<RawAttribute>,
    text: String,
    binary: Vec<u8>,
}

impl ScriptedReader {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into_iter(),
            name: String::new(),
            attrs: Vec::new(),
            text: String::new(),
            binary: Vec::new(),
        }
    }
}

impl BinaryXmlReader for ScriptedReader {
    fn next_token(&mut self) -> Result<BinaryToken> {
        match self.steps.next().expect("script exhausted") {
            Step::StartDoc => Ok(BinaryToken::StartDocument),
            Step::Start(name, attrs) => {
                self.name = name.to_string();
                self.attrs = attrs;
                Ok(BinaryToken::StartElement)
            }
            Step::Text(data) => {
                self.text = data.to_string();
                Ok(BinaryToken::Text)
            }
            Step::Binary(data) => {
                self.binary = data;
                Ok(BinaryToken::Binary)
            }
            Step::End(name) => {
                self.name = name.to_string();
                Ok(BinaryToken::EndElement)
            }
            Step::EndDoc => Ok(BinaryToken::EndDocument),
        }
    }

    fn uri(&self) -> &str {
        ""
    }

    fn local(&self) -> &str {
        &self.name
    }

    fn qname(&self) -> &str {
        &self.name
    }

    fn attributes(&self) -> &[RawAttribute] {
        &self.attrs
    }

    fn prefix_declarations(&self) -> &[(String, String)] {
        &[]
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn binary(&mut self) -> Base64Text {
        Base64Text::from_bytes(self.binary.clone())
    }
}

fn registry() -> Rc<BindingRegistry> {
    let mut reg = BindingRegistry::new();
    let t_bytes = reg.register_leaf("bytes", LeafKind::Bytes);
    let t_str = reg.register_leaf("string", LeafKind::String);
    let item = CompositeBinding::new(TypeToken::new("Item"))
        .with_element(
            ExpandedName::local("data"),
            PropertyBinding::typed("data", t_bytes),
        )
        .with_element(
            ExpandedName::local("note"),
            PropertyBinding::typed("note", t_str),
        );
    let t_item = reg.register_composite(item);
    reg.register_root(ExpandedName::local("item"), t_item);
    Rc::new(reg)
}

#[test]
fn test_octet_run_reaches_bytes_leaf_undecoded() {
    let mut reader = ScriptedReader::new(vec![
        Step::StartDoc,
        Step::Start("item", Vec::new()),
        Step::Start("data", Vec::new()),
        Step::Binary(vec![0, 1, 2, 3, 4]),
        Step::End("data"),
        Step::End("item"),
        Step::EndDoc,
    ]);
    let mut u = Unmarshaller::new(registry());
    let value = u.unmarshal_binary(&mut reader).unwrap();
    let item = value.as_object().unwrap().borrow();
    assert_eq!(item.get("data"), Some(&Value::Bytes(vec![0, 1, 2, 3, 4])));
}

#[test]
fn test_mixed_runs_keep_document_order() {
    // A character leaf forces the octet run through the base64 view; the
    // chunks must interleave exactly as the document ordered them.
    let mut reader = ScriptedReader::new(vec![
        Step::StartDoc,
        Step::Start("item", Vec::new()),
        Step::Start("note", Vec::new()),
        Step::Text("pre"),
        Step::Binary(vec![0, 1, 2]),
        Step::Text("post"),
        Step::End("note"),
        Step::End("item"),
        Step::EndDoc,
    ]);
    let mut u = Unmarshaller::new(registry());
    let value = u.unmarshal_binary(&mut reader).unwrap();
    let item = value.as_object().unwrap().borrow();
    assert_eq!(item.get("note"), Some(&Value::Str("preAAECpost".into())));
}

#[test]
fn test_capability_probe_selects_binary_connector() {
    struct Source {
        reader: ScriptedReader,
    }

    impl XmlSource for Source {
        fn as_binary(&mut self) -> Option<&mut dyn BinaryXmlReader> {
            Some(&mut self.reader)
        }

        fn as_pull(&mut self) -> &mut dyn PullReader {
            unreachable!("binary-capable source must not fall back to pull")
        }
    }

    let mut source = Source {
        reader: ScriptedReader::new(vec![
            Step::StartDoc,
            Step::Start("item", Vec::new()),
            Step::Start("data", Vec::new()),
            Step::Binary(vec![9, 8, 7]),
            Step::End("data"),
            Step::End("item"),
            Step::EndDoc,
        ]),
    };
    let mut u = Unmarshaller::new(registry());
    let value = u.unmarshal_source(&mut source).unwrap();
    let item = value.as_object().unwrap().borrow();
    assert_eq!(item.get("data"), Some(&Value::Bytes(vec![9, 8, 7])));
}
