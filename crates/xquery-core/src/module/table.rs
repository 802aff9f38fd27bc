use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Error;
use crate::xdm::ExpandedName;

use super::location::Location;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSignature {
    pub name: ExpandedName,
    pub type_decl: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: ExpandedName,
    pub params: Vec<ParamSignature>,
    pub return_type: Option<String>,
    pub private: bool,
    pub external: bool,
}

impl FunctionSignature {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSignature {
    pub name: ExpandedName,
    pub type_decl: Option<String>,
    pub private: bool,
    pub external: bool,
    /// Initializer or external default, as source text.
    pub value: Option<String>,
}

impl VariableSignature {
    /// External without a default: the host has to supply a value.
    pub fn requires_value(&self) -> bool {
        self.external && self.value.is_none()
    }
}

/// One library module source after static analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryModule {
    pub namespace: String,
    pub prefix: String,
    pub location: Location,
    pub functions: Vec<FunctionSignature>,
    pub variables: Vec<VariableSignature>,
    /// Target namespaces this module imports itself.
    pub imports: Vec<String>,
}

impl LibraryModule {
    pub fn exported_functions(&self) -> impl Iterator<Item = &FunctionSignature> {
        self.functions.iter().filter(|f| !f.private)
    }

    pub fn exported_variables(&self) -> impl Iterator<Item = &VariableSignature> {
        self.variables.iter().filter(|v| !v.private)
    }
}

/// All sources imported for one target namespace under one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedModule {
    pub namespace: String,
    pub prefix: Option<String>,
    pub sources: Vec<Arc<LibraryModule>>,
}

impl ImportedModule {
    pub fn locations(&self) -> impl Iterator<Item = &Location> {
        self.sources.iter().map(|m| &m.location)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionSignature> {
        self.sources.iter().flat_map(|m| m.exported_functions())
    }

    pub fn variables(&self) -> impl Iterator<Item = &VariableSignature> {
        self.sources.iter().flat_map(|m| m.exported_variables())
    }

    pub fn function(&self, name: &ExpandedName, arity: usize) -> Option<&FunctionSignature> {
        self.functions().find(|f| &f.name == name && f.arity() == arity)
    }

    pub fn variable(&self, name: &ExpandedName) -> Option<&VariableSignature> {
        self.variables().find(|v| &v.name == name)
    }
}

/// Immutable result of resolving one compilation unit.
///
/// Holds the statically known namespaces, the module's own declarations and
/// every module it imports. Shared read-only between evaluations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingTable {
    pub(crate) namespaces: BTreeMap<String, String>,
    pub(crate) default_function_namespace: Option<String>,
    pub(crate) module_namespace: Option<(String, String)>,
    pub(crate) imports: BTreeMap<String, ImportedModule>,
    pub(crate) functions: Vec<FunctionSignature>,
    pub(crate) variables: Vec<VariableSignature>,
    /// Every library loaded while resolving, transitive imports included,
    /// in load order.
    pub(crate) libraries: Vec<Arc<LibraryModule>>,
}

impl BindingTable {
    pub fn namespace_uri(&self, prefix: &str) -> Option<&str> {
        self.namespaces.get(prefix).map(String::as_str)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = (&str, &str)> {
        self.namespaces.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    pub fn default_function_namespace(&self) -> Option<&str> {
        self.default_function_namespace.as_deref()
    }

    /// `(prefix, uri)` of a library module's own declaration.
    pub fn module_namespace(&self) -> Option<(&str, &str)> {
        self.module_namespace.as_ref().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    pub fn is_library(&self) -> bool {
        self.module_namespace.is_some()
    }

    pub fn imported(&self, namespace: &str) -> Option<&ImportedModule> {
        self.imports.get(namespace)
    }

    pub fn imports(&self) -> impl Iterator<Item = &ImportedModule> {
        self.imports.values()
    }

    /// Declarations of the compiled module itself.
    pub fn declared_functions(&self) -> &[FunctionSignature] {
        &self.functions
    }

    pub fn declared_variables(&self) -> &[VariableSignature] {
        &self.variables
    }

    pub fn libraries(&self) -> &[Arc<LibraryModule>] {
        &self.libraries
    }

    /// Function visible to the module body: its own or an imported one.
    pub fn function(&self, name: &ExpandedName, arity: usize) -> Option<&FunctionSignature> {
        self.functions
            .iter()
            .find(|f| &f.name == name && f.arity() == arity)
            .or_else(|| {
                let ns = name.ns_uri.as_deref()?;
                self.imports.get(ns)?.function(name, arity)
            })
    }

    pub fn variable(&self, name: &ExpandedName) -> Option<&VariableSignature> {
        self.variables.iter().find(|v| &v.name == name).or_else(|| {
            let ns = name.ns_uri.as_deref()?;
            self.imports.get(ns)?.variable(name)
        })
    }

    /// External variables without default, across this module and every
    /// loaded library.
    pub fn required_externals(&self) -> impl Iterator<Item = &VariableSignature> {
        self.variables
            .iter()
            .chain(self.libraries.iter().flat_map(|l| l.variables.iter()))
            .filter(|v| v.requires_value())
    }

    /// Resolve `prefix:local`, `Q{uri}local` or an unprefixed name (no
    /// namespace) against the statically known namespaces.
    pub fn resolve_qname(&self, lexical: &str) -> Result<ExpandedName, Error> {
        super::names::resolve_lexical(lexical, None, |p| self.namespace_uri(p).map(str::to_string))
    }
}
