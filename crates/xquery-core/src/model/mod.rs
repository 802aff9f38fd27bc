pub mod simple;

use crate::error::{Error, ErrorCode};
use crate::xdm::{ExpandedName, XdmItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
    Namespace,
}

/// Node name as seen by the adapter. The prefix is informational only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
}

impl QName {
    pub fn expanded(&self) -> ExpandedName {
        ExpandedName::new(self.ns_uri.clone(), self.local.clone())
    }
}

/// Read access to a node tree.
///
/// Adapters that store proxies (references into persisted documents) return
/// the concrete node from [`XdmNode::dereference`]; every value-level
/// algorithm resolves through it before inspecting a node.
pub trait XdmNode: Clone + Eq + core::fmt::Debug + Send + Sync + 'static {
    fn kind(&self) -> NodeKind;
    fn name(&self) -> Option<QName>;
    fn string_value(&self) -> String;

    fn parent(&self) -> Option<Self>;
    fn children(&self) -> Vec<Self>;
    fn attributes(&self) -> Vec<Self>;
    fn namespaces(&self) -> Vec<Self>;

    /// Resolve a reference node to the node it stands for.
    fn dereference(&self) -> Self {
        self.clone()
    }

    /// Node identity, independent of any reference indirection.
    fn is_same_node(&self, other: &Self) -> bool {
        self.dereference() == other.dereference()
    }
}

/// Nodes of a sequence used as the context of a path step, each resolved
/// through [`XdmNode::dereference`]. Any atomic item fails with `XPTY0019`.
pub fn step_context<N: XdmNode>(items: &[XdmItem<N>]) -> Result<Vec<N>, Error> {
    items
        .iter()
        .map(|item| match item {
            XdmItem::Node(n) => Ok(n.dereference()),
            XdmItem::Atomic(a) => Err(Error::from_code(
                ErrorCode::XPTY0019,
                format!("path step applied to atomic value {} of type {}", a, a.atomic_type()),
            )),
        })
        .collect()
}
