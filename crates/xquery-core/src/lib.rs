//! Semantic core of an XQuery processor.
//!
//! The crate covers the parts of static and dynamic semantics that sit between
//! a parsed query and its evaluation:
//!
//! - [`module`]: resolution of `import module` declarations into an immutable
//!   [`module::BindingTable`], including collision diagnostics.
//! - [`types`] and [`cast`]: the atomic type lattice, `cast as`, the `numeric`
//!   pseudo-cast and effective boolean value.
//! - [`compare`]: `fn:deep-equal` over atomic values, nodes and sequences.
//! - [`window`]: tumbling and sliding `window` clause partitioning.
//!
//! Nodes are accessed through the [`model::XdmNode`] trait; an in-memory
//! implementation lives in [`model::simple`].

pub mod cast;
pub mod compare;
pub mod consts;
pub mod error;
pub mod model;
pub mod module;
pub mod types;
pub mod window;
pub mod xdm;

pub use cast::{cast, cast_numeric, castable, effective_boolean_value};
pub use compare::deep_equal;
pub use error::{Error, ErrorCode, ErrorKind};
pub use model::simple::{SimpleNode, SimpleNodeBuilder};
pub use model::{NodeKind, QName, XdmNode};
pub use module::{
    BindingTable, CompiledModule, CyclePolicy, FsLoader, Location, MemoryLoader, ModuleResolver,
    ResolverConfig, SourceLoader,
};
pub use types::AtomicType;
pub use window::{WindowClause, WindowCondition, WindowKind};
pub use xdm::{ExpandedName, XdmAtomicValue, XdmItem, XdmSequence};
