//! Module import resolution.
//!
//! [`ModuleResolver`] reads the prolog of a main or library module, loads
//! every imported library through a [`SourceLoader`] and produces an
//! immutable [`BindingTable`]. Static errors raised here:
//!
//! | code       | condition                                                  |
//! |------------|------------------------------------------------------------|
//! | `XQST0033` | prefix bound twice to different namespaces                 |
//! | `XQST0034` | function name and arity declared twice                     |
//! | `XQST0047` | target namespace imported twice under different prefixes   |
//! | `XQST0049` | variable declared twice                                    |
//! | `XQST0059` | no loadable library source for an import                   |
//! | `XQST0070` | `xml` or `xmlns` used as a prefix                          |
//! | `XQST0088` | empty target namespace                                     |
//! | `XQST0093` | cyclic import (with [`CyclePolicy::Reject`])                |

mod cache;
mod config;
mod context;
mod loader;
mod location;
mod names;
pub mod prolog;
mod resolver;
mod table;

pub use config::{
    CyclePolicy, DEFAULT_CACHE_CAPACITY, DEFAULT_MAX_IMPORT_DEPTH, ResolverConfig,
    ResolverConfigBuilder,
};
pub use context::{CompiledModule, EvaluationContext};
pub use loader::{FsLoader, LoadedSource, MemoryLoader, SourceLoader};
pub use location::Location;
pub use resolver::ModuleResolver;
pub use table::{
    BindingTable, FunctionSignature, ImportedModule, LibraryModule, ParamSignature,
    VariableSignature,
};
