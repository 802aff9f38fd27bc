//! In-memory `XdmNode` implementation used by hosts without their own tree
//! and throughout the tests.
//!
//! Trees are assembled bottom-up with a builder; a node's parent link is set
//! once, when the enclosing builder is finished.
//!
//! ```
//! use xquery_core::model::simple::{attr, elem, text};
//! use xquery_core::XdmNode;
//!
//! // <root id="r"><child>Hello</child></root>
//! let root = elem("root")
//!     .attr(attr("id", "r"))
//!     .child(elem("child").child(text("Hello")))
//!     .build();
//! assert_eq!(root.string_value(), "Hello");
//! assert_eq!(root.attributes().len(), 1);
//! ```
//!
//! Reference nodes stand in for another node and resolve to it:
//! ```
//! use xquery_core::model::simple::{elem, reference, text};
//! use xquery_core::XdmNode;
//!
//! let target = elem("a").child(text("x")).build();
//! let proxy = reference(&target);
//! assert!(proxy.dereference() == target);
//! assert_eq!(proxy.string_value(), "x");
//! ```
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::model::{NodeKind, QName, XdmNode};

struct Inner {
    kind: NodeKind,
    name: Option<QName>,
    value: Option<String>,
    target: Option<SimpleNode>,
    parent: OnceLock<Weak<Inner>>,
    attributes: Vec<SimpleNode>,
    namespaces: Vec<SimpleNode>,
    children: Vec<SimpleNode>,
    cached_text: OnceLock<String>,
}

/// Arc-backed node; equality is node identity.
#[derive(Clone)]
pub struct SimpleNode(Arc<Inner>);

impl PartialEq for SimpleNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for SimpleNode {}

impl std::hash::Hash for SimpleNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for SimpleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("SimpleNode");
        d.field("kind", &self.0.kind).field("name", &self.0.name);
        if let Some(v) = &self.0.value {
            d.field("value", v);
        }
        if self.0.target.is_some() {
            d.field("reference", &true);
        }
        d.finish()
    }
}

fn qname(prefix: Option<&str>, local: &str, ns_uri: Option<&str>) -> QName {
    QName {
        prefix: prefix.map(str::to_string),
        local: local.to_string(),
        ns_uri: ns_uri.filter(|u| !u.is_empty()).map(str::to_string),
    }
}

impl SimpleNode {
    fn leaf(kind: NodeKind, name: Option<QName>, value: Option<String>) -> Self {
        SimpleNode(Arc::new(Inner {
            kind,
            name,
            value,
            target: None,
            parent: OnceLock::new(),
            attributes: Vec::new(),
            namespaces: Vec::new(),
            children: Vec::new(),
            cached_text: OnceLock::new(),
        }))
    }

    pub fn document() -> SimpleNodeBuilder {
        SimpleNodeBuilder::new(NodeKind::Document, None)
    }

    pub fn element(name: &str) -> SimpleNodeBuilder {
        SimpleNodeBuilder::new(NodeKind::Element, Some(qname(None, name, None)))
    }

    /// Element in a namespace; `prefix` is kept for display only.
    pub fn element_ns(ns_uri: &str, prefix: Option<&str>, local: &str) -> SimpleNodeBuilder {
        SimpleNodeBuilder::new(NodeKind::Element, Some(qname(prefix, local, Some(ns_uri))))
    }

    pub fn attribute(name: &str, value: &str) -> SimpleNode {
        Self::leaf(NodeKind::Attribute, Some(qname(None, name, None)), Some(value.to_string()))
    }

    pub fn attribute_ns(ns_uri: &str, prefix: Option<&str>, local: &str, value: &str) -> SimpleNode {
        Self::leaf(
            NodeKind::Attribute,
            Some(qname(prefix, local, Some(ns_uri))),
            Some(value.to_string()),
        )
    }

    pub fn text(value: &str) -> SimpleNode {
        Self::leaf(NodeKind::Text, None, Some(value.to_string()))
    }

    pub fn comment(value: &str) -> SimpleNode {
        Self::leaf(NodeKind::Comment, None, Some(value.to_string()))
    }

    pub fn pi(target: &str, data: &str) -> SimpleNode {
        Self::leaf(
            NodeKind::ProcessingInstruction,
            Some(qname(None, target, None)),
            Some(data.to_string()),
        )
    }

    pub fn namespace(prefix: &str, uri: &str) -> SimpleNode {
        Self::leaf(
            NodeKind::Namespace,
            Some(qname(Some(prefix), prefix, None)),
            Some(uri.to_string()),
        )
    }

    /// A proxy node that resolves to `target`.
    pub fn reference(target: &SimpleNode) -> SimpleNode {
        SimpleNode(Arc::new(Inner {
            kind: target.kind(),
            name: target.name(),
            value: None,
            target: Some(target.dereference()),
            parent: OnceLock::new(),
            attributes: Vec::new(),
            namespaces: Vec::new(),
            children: Vec::new(),
            cached_text: OnceLock::new(),
        }))
    }

    pub fn is_reference(&self) -> bool {
        self.0.target.is_some()
    }

    /// Resolve a namespace prefix by walking the ancestor chain (self included).
    pub fn lookup_namespace_uri(&self, prefix: &str) -> Option<String> {
        let mut cur = Some(self.clone());
        while let Some(n) = cur {
            for ns in n.namespaces() {
                if ns.name().is_some_and(|q| q.prefix.as_deref() == Some(prefix)) {
                    return Some(ns.string_value());
                }
            }
            cur = n.parent();
        }
        None
    }
}

pub struct SimpleNodeBuilder {
    kind: NodeKind,
    name: Option<QName>,
    children: Vec<SimpleNode>,
    attributes: Vec<SimpleNode>,
    namespaces: Vec<SimpleNode>,
}

impl SimpleNodeBuilder {
    fn new(kind: NodeKind, name: Option<QName>) -> Self {
        Self {
            kind,
            name,
            children: Vec::new(),
            attributes: Vec::new(),
            namespaces: Vec::new(),
        }
    }

    #[must_use]
    pub fn child(mut self, child: impl Into<SimpleNodeOrBuilder>) -> Self {
        self.children.push(child.into().into_node());
        self
    }

    #[must_use]
    pub fn children<I, C>(mut self, it: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<SimpleNodeOrBuilder>,
    {
        self.children.extend(it.into_iter().map(|c| c.into().into_node()));
        self
    }

    #[must_use]
    pub fn attr(mut self, attr: SimpleNode) -> Self {
        debug_assert!(attr.kind() == NodeKind::Attribute);
        self.attributes.push(attr);
        self
    }

    #[must_use]
    pub fn namespace(mut self, ns: SimpleNode) -> Self {
        debug_assert!(ns.kind() == NodeKind::Namespace);
        self.namespaces.push(ns);
        self
    }

    /// Finish the node. Nodes already attached to another parent keep their
    /// first parent link.
    pub fn build(self) -> SimpleNode {
        let node = SimpleNode(Arc::new(Inner {
            kind: self.kind,
            name: self.name,
            value: None,
            target: None,
            parent: OnceLock::new(),
            attributes: self.attributes,
            namespaces: self.namespaces,
            children: self.children,
            cached_text: OnceLock::new(),
        }));
        let weak = Arc::downgrade(&node.0);
        for n in node.0.attributes.iter().chain(&node.0.namespaces).chain(&node.0.children) {
            let _ = n.0.parent.set(weak.clone());
        }
        node
    }
}

pub enum SimpleNodeOrBuilder {
    Built(SimpleNode),
    Builder(SimpleNodeBuilder),
}

impl SimpleNodeOrBuilder {
    fn into_node(self) -> SimpleNode {
        match self {
            SimpleNodeOrBuilder::Built(n) => n,
            SimpleNodeOrBuilder::Builder(b) => b.build(),
        }
    }
}

impl From<SimpleNode> for SimpleNodeOrBuilder {
    fn from(n: SimpleNode) -> Self {
        SimpleNodeOrBuilder::Built(n)
    }
}
impl From<SimpleNodeBuilder> for SimpleNodeOrBuilder {
    fn from(b: SimpleNodeBuilder) -> Self {
        SimpleNodeOrBuilder::Builder(b)
    }
}

pub fn doc() -> SimpleNodeBuilder {
    SimpleNode::document()
}
pub fn elem(name: &str) -> SimpleNodeBuilder {
    SimpleNode::element(name)
}
pub fn elem_ns(ns_uri: &str, prefix: &str, local: &str) -> SimpleNodeBuilder {
    SimpleNode::element_ns(ns_uri, Some(prefix), local)
}
pub fn text(v: &str) -> SimpleNode {
    SimpleNode::text(v)
}
pub fn attr(name: &str, v: &str) -> SimpleNode {
    SimpleNode::attribute(name, v)
}
pub fn attr_ns(ns_uri: &str, prefix: &str, local: &str, v: &str) -> SimpleNode {
    SimpleNode::attribute_ns(ns_uri, Some(prefix), local, v)
}
pub fn comment(v: &str) -> SimpleNode {
    SimpleNode::comment(v)
}
pub fn pi(target: &str, data: &str) -> SimpleNode {
    SimpleNode::pi(target, data)
}
pub fn ns(prefix: &str, uri: &str) -> SimpleNode {
    SimpleNode::namespace(prefix, uri)
}
pub fn reference(target: &SimpleNode) -> SimpleNode {
    SimpleNode::reference(target)
}

impl XdmNode for SimpleNode {
    fn kind(&self) -> NodeKind {
        self.0.kind
    }

    fn name(&self) -> Option<QName> {
        self.0.name.clone()
    }

    fn string_value(&self) -> String {
        if let Some(t) = &self.0.target {
            return t.string_value();
        }
        match self.0.kind {
            NodeKind::Text
            | NodeKind::Attribute
            | NodeKind::Comment
            | NodeKind::ProcessingInstruction
            | NodeKind::Namespace => self.0.value.clone().unwrap_or_default(),
            NodeKind::Element | NodeKind::Document => self
                .0
                .cached_text
                .get_or_init(|| {
                    fn collect(n: &SimpleNode, out: &mut String) {
                        let n = n.dereference();
                        match n.kind() {
                            NodeKind::Text => out.push_str(n.0.value.as_deref().unwrap_or("")),
                            NodeKind::Element | NodeKind::Document => {
                                for c in &n.0.children {
                                    collect(c, out);
                                }
                            }
                            _ => {}
                        }
                    }
                    let mut out = String::new();
                    collect(self, &mut out);
                    out
                })
                .clone(),
        }
    }

    fn parent(&self) -> Option<Self> {
        self.0.parent.get().and_then(Weak::upgrade).map(SimpleNode)
    }

    fn children(&self) -> Vec<Self> {
        match &self.0.target {
            Some(t) => t.children(),
            None => self.0.children.clone(),
        }
    }

    fn attributes(&self) -> Vec<Self> {
        match &self.0.target {
            Some(t) => t.attributes(),
            None => self.0.attributes.clone(),
        }
    }

    fn namespaces(&self) -> Vec<Self> {
        match &self.0.target {
            Some(t) => t.namespaces(),
            None => self.0.namespaces.clone(),
        }
    }

    fn dereference(&self) -> Self {
        match &self.0.target {
            Some(t) => t.clone(),
            None => self.clone(),
        }
    }
}
