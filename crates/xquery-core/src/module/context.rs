use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Error;
use crate::model::XdmNode;
use crate::xdm::{ExpandedName, XdmItem, XdmSequence};

use super::location::Location;
use super::table::BindingTable;

/// Output of [`super::ModuleResolver::compile`].
#[derive(Debug, Clone)]
pub struct CompiledModule {
    table: Arc<BindingTable>,
    location: Option<Location>,
    body: Option<String>,
}

impl CompiledModule {
    pub(crate) fn new(table: BindingTable, location: Option<Location>, body: Option<String>) -> Self {
        Self { table: Arc::new(table), location, body }
    }

    pub fn table(&self) -> &BindingTable {
        &self.table
    }

    pub fn shared_table(&self) -> Arc<BindingTable> {
        Arc::clone(&self.table)
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// Query body text of a main module.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Fresh per-evaluation state over the shared binding table.
    pub fn new_context<N: XdmNode>(&self) -> EvaluationContext<N> {
        EvaluationContext { table: self.shared_table(), externals: HashMap::new() }
    }
}

/// Dynamic context of one evaluation: the compiled bindings plus the values
/// the host supplies for external variables.
#[derive(Debug, Clone)]
pub struct EvaluationContext<N> {
    table: Arc<BindingTable>,
    externals: HashMap<ExpandedName, XdmSequence<N>>,
}

impl<N: XdmNode> EvaluationContext<N> {
    pub fn table(&self) -> &BindingTable {
        &self.table
    }

    pub fn bind_external(&mut self, name: ExpandedName, value: XdmSequence<N>) -> &mut Self {
        self.externals.insert(name, value);
        self
    }

    pub fn with_external(mut self, name: ExpandedName, value: XdmSequence<N>) -> Self {
        self.bind_external(name, value);
        self
    }

    pub fn external(&self, name: &ExpandedName) -> Option<&[XdmItem<N>]> {
        self.externals.get(name).map(Vec::as_slice)
    }

    /// Fails with `XPDY0002` for the first external variable that has neither
    /// a default nor a supplied value.
    pub fn check_externals(&self) -> Result<(), Error> {
        match self
            .table
            .required_externals()
            .find(|v| !self.externals.contains_key(&v.name))
        {
            Some(missing) => Err(Error::unbound_external(&missing.name)),
            None => Ok(()),
        }
    }
}
