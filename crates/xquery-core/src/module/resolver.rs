use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::consts::{ANNOTATIONS_NS, FNS, PREDECLARED, RESERVED_FUNCTION_NAMESPACES, XML_URI, XMLNS_URI};
use crate::error::{Error, ErrorCode};
use crate::xdm::ExpandedName;

use super::cache::PrologCache;
use super::config::{CyclePolicy, ResolverConfig};
use super::context::CompiledModule;
use super::loader::SourceLoader;
use super::location::Location;
use super::names::{prefix_of, resolve_lexical};
use super::prolog::{Annotation, ImportDecl, Prolog, parse_prolog};
use super::table::{
    BindingTable, FunctionSignature, ImportedModule, LibraryModule, ParamSignature, VariableSignature,
};

/// Resolves `import module` declarations into a [`BindingTable`].
///
/// The resolver itself is immutable during compilation and may be shared;
/// every call to [`ModuleResolver::compile`] runs in its own session. Parsed
/// library prologs are cached across compilations.
pub struct ModuleResolver {
    loader: Arc<dyn SourceLoader>,
    config: ResolverConfig,
    cache: PrologCache,
    registered: BTreeMap<String, Vec<Location>>,
}

impl ModuleResolver {
    pub fn new(loader: impl SourceLoader + 'static) -> Self {
        Self::with_config(loader, ResolverConfig::default())
    }

    pub fn with_config(loader: impl SourceLoader + 'static, config: ResolverConfig) -> Self {
        Self {
            loader: Arc::new(loader),
            cache: PrologCache::new(config.cache_capacity),
            config,
            registered: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Make `namespace` resolvable without location hints.
    pub fn register_module(&mut self, namespace: &str, location: &str) -> Result<(), Error> {
        let loc = Location::resolve(location, None)?;
        tracing::debug!(namespace, location = %loc, "module registered");
        let entry = self.registered.entry(namespace.to_string()).or_default();
        if !entry.contains(&loc) {
            entry.push(loc);
        }
        Ok(())
    }

    /// Compile a main or library module given as text. `location` is the
    /// base for relative location hints.
    pub fn compile(&self, source: &str, location: Option<Location>) -> Result<CompiledModule, Error> {
        let prolog = match &location {
            Some(loc) => self.cache.get_or_parse(loc, source)?,
            None => Arc::new(parse_prolog(source)?),
        };
        let mut session = Session::new(self);
        if let Some(loc) = &location {
            session.stack.push(loc.clone());
        }
        let analysis = session.analyze(&prolog, location.as_ref(), 0)?;
        let table = BindingTable {
            namespaces: analysis.namespaces,
            default_function_namespace: prolog.default_function_namespace.clone(),
            module_namespace: prolog.module.as_ref().map(|m| (m.prefix.clone(), m.uri.clone())),
            imports: analysis.imports,
            functions: analysis.functions,
            variables: analysis.variables,
            libraries: session.order,
        };
        tracing::debug!(
            location = ?location,
            imports = table.imports.len(),
            libraries = table.libraries.len(),
            "module compiled"
        );
        Ok(CompiledModule::new(table, location, prolog.body.clone()))
    }

    /// Load a module through the loader and compile it.
    pub fn compile_location(&self, hint: &str) -> Result<CompiledModule, Error> {
        let Some(source) = self.loader.resolve(hint, None)? else {
            return Err(Error::from_code(ErrorCode::XQST0059, format!("no module found at '{hint}'")));
        };
        let text = decode(&source.location, &source.content)?;
        self.compile(text, Some(source.location))
    }

    pub fn cached_modules(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

fn decode<'a>(location: &Location, bytes: &'a [u8]) -> Result<&'a str, Error> {
    let text = std::str::from_utf8(bytes).map_err(|e| {
        Error::syntax(format!("{location}: module source is not valid UTF-8: {e}"))
    })?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Predeclared,
    Declared,
}

/// Statically known namespaces of the module being analysed.
struct Scope {
    prefixes: BTreeMap<String, (String, Origin)>,
    strict: bool,
}

impl Scope {
    fn new(config: &ResolverConfig) -> Self {
        let mut prefixes: BTreeMap<String, (String, Origin)> = PREDECLARED
            .iter()
            .map(|(p, u)| ((*p).to_string(), ((*u).to_string(), Origin::Predeclared)))
            .collect();
        for (p, u) in &config.namespaces {
            prefixes.insert(p.clone(), (u.clone(), Origin::Predeclared));
        }
        Self { prefixes, strict: config.strict_prefix_bindings }
    }

    fn bind(&mut self, prefix: &str, uri: &str) -> Result<(), Error> {
        check_declarable(prefix, uri)?;
        match self.prefixes.get(prefix) {
            Some((bound, Origin::Declared)) if bound != uri => {
                return Err(Error::prefix_conflict(prefix, bound, uri));
            }
            Some((_, Origin::Declared)) if self.strict => {
                return Err(Error::from_code(
                    ErrorCode::XQST0033,
                    format!("prefix '{prefix}' is declared more than once"),
                ));
            }
            _ => {}
        }
        self.prefixes.insert(prefix.to_string(), (uri.to_string(), Origin::Declared));
        Ok(())
    }

    /// `declare namespace p = ""` removes a binding.
    fn unbind(&mut self, prefix: &str) -> Result<(), Error> {
        if prefix == "xml" || prefix == "xmlns" {
            return Err(Error::invalid_prefix(prefix));
        }
        self.prefixes.remove(prefix);
        Ok(())
    }

    fn lookup(&self, prefix: &str) -> Option<String> {
        self.prefixes.get(prefix).map(|(u, _)| u.clone())
    }

    fn into_map(self) -> BTreeMap<String, String> {
        self.prefixes.into_iter().map(|(p, (u, _))| (p, u)).collect()
    }
}

fn check_declarable(prefix: &str, uri: &str) -> Result<(), Error> {
    if prefix == "xml" || prefix == "xmlns" {
        return Err(Error::invalid_prefix(prefix));
    }
    if uri == XML_URI || uri == XMLNS_URI {
        return Err(Error::from_code(
            ErrorCode::XQST0070,
            format!("namespace '{uri}' cannot be bound to prefix '{prefix}'"),
        ));
    }
    Ok(())
}

struct Analysis {
    namespaces: BTreeMap<String, String>,
    imports: BTreeMap<String, ImportedModule>,
    functions: Vec<FunctionSignature>,
    variables: Vec<VariableSignature>,
}

enum Loaded {
    Module(Arc<LibraryModule>),
    /// Cyclic import tolerated by [`CyclePolicy::Allow`].
    InProgress,
    Missing(String),
}

/// Mutable state of one compilation.
struct Session<'r> {
    resolver: &'r ModuleResolver,
    loaded: HashMap<Location, Arc<LibraryModule>>,
    order: Vec<Arc<LibraryModule>>,
    /// Locations under analysis, outermost first.
    stack: Vec<Location>,
    functions: HashMap<(ExpandedName, usize), Location>,
    variables: HashMap<ExpandedName, Location>,
}

impl<'r> Session<'r> {
    fn new(resolver: &'r ModuleResolver) -> Self {
        Self {
            resolver,
            loaded: HashMap::new(),
            order: Vec::new(),
            stack: Vec::new(),
            functions: HashMap::new(),
            variables: HashMap::new(),
        }
    }

    fn analyze(&mut self, prolog: &Prolog, location: Option<&Location>, depth: usize) -> Result<Analysis, Error> {
        let config = &self.resolver.config;
        let mut scope = Scope::new(config);
        if let Some(m) = &prolog.module {
            if m.uri.is_empty() {
                return Err(Error::empty_namespace(&m.prefix));
            }
            scope.bind(&m.prefix, &m.uri)?;
        }
        for ns in &prolog.namespaces {
            if ns.uri.is_empty() {
                scope.unbind(&ns.prefix)?;
            } else {
                scope.bind(&ns.prefix, &ns.uri)?;
            }
        }

        // prefix and namespace checks come before any source is loaded
        for import in &prolog.imports {
            if let Some(p) = import.prefix.as_deref() {
                if p == "xml" || p == "xmlns" {
                    return Err(Error::invalid_prefix(p));
                }
            }
            if import.uri.is_empty() {
                return Err(Error::empty_namespace(import.prefix.as_deref().unwrap_or("")));
            }
        }

        let mut imports: BTreeMap<String, ImportedModule> = BTreeMap::new();
        for import in &prolog.imports {
            self.import(&mut scope, &mut imports, import, location, depth)?;
        }

        let module_ns = prolog.module.as_ref().map(|m| m.uri.as_str());
        let default_fn_ns = prolog.default_function_namespace.as_deref().unwrap_or(FNS);
        let lookup = |p: &str| scope.lookup(p);

        let mut functions: Vec<FunctionSignature> = Vec::new();
        for decl in &prolog.functions {
            let name = resolve_lexical(&decl.name, Some(default_fn_ns), lookup)?;
            let ns = name.ns_uri.as_deref();
            if ns.is_some_and(|ns| RESERVED_FUNCTION_NAMESPACES.contains(&ns)) {
                return Err(Error::from_code(
                    ErrorCode::XQST0045,
                    format!("function {name} is declared in a reserved namespace"),
                ));
            }
            if let Some(module_ns) = module_ns {
                if ns != Some(module_ns) {
                    return Err(outside_module_namespace("function", &name, module_ns));
                }
            }
            let arity = decl.arity();
            if functions.iter().any(|f| f.name == name && f.arity() == arity)
                || imports.values().any(|m| m.function(&name, arity).is_some())
            {
                return Err(Error::duplicate_function(&name, arity));
            }
            let params = decl
                .params
                .iter()
                .map(|p| {
                    Ok(ParamSignature {
                        name: resolve_lexical(&p.name, None, lookup)?,
                        type_decl: p.type_decl.clone(),
                    })
                })
                .collect::<Result<Vec<_>, Error>>()?;
            functions.push(FunctionSignature {
                private: is_private(&decl.annotations, lookup)?,
                name,
                params,
                return_type: decl.return_type.clone(),
                external: decl.external,
            });
        }

        let mut variables: Vec<VariableSignature> = Vec::new();
        for decl in &prolog.variables {
            let name = resolve_lexical(&decl.name, None, lookup)?;
            if let Some(module_ns) = module_ns {
                if name.ns_uri.as_deref() != Some(module_ns) {
                    return Err(outside_module_namespace("variable", &name, module_ns));
                }
            }
            if variables.iter().any(|v| v.name == name)
                || imports.values().any(|m| m.variable(&name).is_some())
            {
                return Err(Error::duplicate_variable(&name));
            }
            variables.push(VariableSignature {
                private: is_private(&decl.annotations, lookup)?,
                name,
                type_decl: decl.type_decl.clone(),
                external: decl.external,
                value: decl.value.clone(),
            });
        }

        Ok(Analysis { namespaces: scope.into_map(), imports, functions, variables })
    }

    fn import(
        &mut self,
        scope: &mut Scope,
        imports: &mut BTreeMap<String, ImportedModule>,
        import: &ImportDecl,
        base: Option<&Location>,
        depth: usize,
    ) -> Result<(), Error> {
        let uri = import.uri.as_str();
        match import.prefix.as_deref() {
            Some(prefix) => scope.bind(prefix, uri)?,
            None if uri == XML_URI || uri == XMLNS_URI => {
                return Err(Error::from_code(ErrorCode::XQST0070, format!("namespace '{uri}' cannot be imported")));
            }
            None => {}
        }
        if let Some(existing) = imports.get(uri) {
            if existing.prefix != import.prefix {
                return Err(Error::namespace_conflict(
                    uri,
                    existing.prefix.as_deref().unwrap_or(""),
                    import.prefix.as_deref().unwrap_or(""),
                ));
            }
        }

        let locations = if import.hints.is_empty() {
            let known = self.known_locations(uri);
            if known.is_empty() {
                return Err(Error::module_not_found(uri, "no location hint and no known module"));
            }
            known
        } else {
            import
                .hints
                .iter()
                .filter_map(|hint| match Location::resolve(hint, base) {
                    Ok(loc) => {
                        tracing::debug!(hint = %hint, location = %loc, "location hint resolved");
                        Some(loc)
                    }
                    Err(error) => {
                        tracing::warn!(hint = %hint, %error, "skipping unresolvable location hint");
                        None
                    }
                })
                .collect()
        };

        let mut sources: Vec<Arc<LibraryModule>> = Vec::new();
        let mut in_progress = false;
        for loc in locations {
            match self.load_library(&loc, uri, depth + 1)? {
                Loaded::Module(m) => {
                    if !sources.iter().any(|s| s.location == m.location) {
                        sources.push(m);
                    }
                }
                Loaded::InProgress => in_progress = true,
                Loaded::Missing(reason) => {
                    tracing::warn!(namespace = uri, location = %loc, reason = %reason, "skipping module source that could not be loaded");
                }
            }
        }
        if sources.is_empty() && !in_progress {
            return Err(Error::module_not_found(uri, "none of the location hints could be loaded"));
        }

        let entry = imports.entry(uri.to_string()).or_insert_with(|| ImportedModule {
            namespace: uri.to_string(),
            prefix: import.prefix.clone(),
            sources: Vec::new(),
        });
        for m in sources {
            if !entry.sources.iter().any(|s| s.location == m.location) {
                entry.sources.push(m);
            }
        }
        Ok(())
    }

    fn known_locations(&self, uri: &str) -> Vec<Location> {
        let mut out: Vec<Location> = Vec::new();
        let mut push = |loc: Location| {
            if !out.contains(&loc) {
                out.push(loc);
            }
        };
        for loc in self.resolver.registered.get(uri).into_iter().flatten() {
            push(loc.clone());
        }
        for hint in self.resolver.config.known_modules.get(uri).into_iter().flatten() {
            match Location::resolve(hint, None) {
                Ok(loc) => push(loc),
                Err(error) => tracing::warn!(namespace = uri, hint = %hint, %error, "ignoring configured module location"),
            }
        }
        for m in self.order.iter().filter(|m| m.namespace == uri) {
            push(m.location.clone());
        }
        out
    }

    fn load_library(&mut self, loc: &Location, namespace: &str, depth: usize) -> Result<Loaded, Error> {
        if let Some(m) = self.loaded.get(loc) {
            tracing::debug!(location = %loc, "module already loaded in this compilation");
            return Ok(Loaded::Module(Arc::clone(m)));
        }
        if let Some(pos) = self.stack.iter().position(|l| l == loc) {
            return match self.resolver.config.cycle_policy {
                CyclePolicy::Reject => {
                    let chain: Vec<String> = self.stack[pos..]
                        .iter()
                        .chain(std::iter::once(loc))
                        .map(ToString::to_string)
                        .collect();
                    Err(Error::cyclic_import(&chain))
                }
                CyclePolicy::Allow => {
                    tracing::debug!(location = %loc, "cyclic import reuses module under construction");
                    Ok(Loaded::InProgress)
                }
            };
        }
        let max = self.resolver.config.max_import_depth;
        if depth > max {
            return Err(Error::module_not_found(
                namespace,
                format!("import depth exceeds {max} at {loc}"),
            ));
        }

        let content = match self.resolver.loader.fetch(loc) {
            Ok(Some(content)) => content,
            Ok(None) => return Ok(Loaded::Missing("not found".to_string())),
            Err(e) => return Ok(Loaded::Missing(e.to_string())),
        };
        let text = decode(loc, &content)?;
        let prolog = self.resolver.cache.get_or_parse(loc, text).map_err(|e| {
            Error::syntax(format!("{loc}: {}", e.message))
                .with_source(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>)
        })?;
        let Some(decl) = &prolog.module else {
            return Err(Error::module_not_found(namespace, format!("{loc} is not a library module")));
        };
        if decl.uri != namespace {
            return Err(Error::module_not_found(
                namespace,
                format!("{loc} declares target namespace '{}'", decl.uri),
            ));
        }

        self.stack.push(loc.clone());
        let analysis = self.analyze(&prolog, Some(loc), depth);
        self.stack.pop();
        let analysis = analysis?;

        let module = Arc::new(LibraryModule {
            namespace: decl.uri.clone(),
            prefix: decl.prefix.clone(),
            location: loc.clone(),
            imports: analysis.imports.keys().cloned().collect(),
            functions: analysis.functions,
            variables: analysis.variables,
        });
        self.register_exports(&module)?;
        self.loaded.insert(loc.clone(), Arc::clone(&module));
        self.order.push(Arc::clone(&module));
        tracing::debug!(
            location = %loc,
            namespace,
            functions = module.functions.len(),
            variables = module.variables.len(),
            "library module loaded"
        );
        Ok(Loaded::Module(module))
    }

    /// Exported symbols are unique across all sources of a compilation.
    fn register_exports(&mut self, module: &LibraryModule) -> Result<(), Error> {
        for f in module.exported_functions() {
            let key = (f.name.clone(), f.arity());
            match self.functions.get(&key) {
                Some(other) if other != &module.location => {
                    return Err(Error::duplicate_function(&f.name, f.arity()));
                }
                _ => {
                    self.functions.insert(key, module.location.clone());
                }
            }
        }
        for v in module.exported_variables() {
            match self.variables.get(&v.name) {
                Some(other) if other != &module.location => {
                    return Err(Error::duplicate_variable(&v.name));
                }
                _ => {
                    self.variables.insert(v.name.clone(), module.location.clone());
                }
            }
        }
        Ok(())
    }
}

fn outside_module_namespace(what: &str, name: &ExpandedName, module_ns: &str) -> Error {
    Error::from_code(
        ErrorCode::XQST0048,
        format!("{what} {name} is not in the module namespace '{module_ns}'"),
    )
}

fn is_private(annotations: &[Annotation], lookup: impl Fn(&str) -> Option<String>) -> Result<bool, Error> {
    for a in annotations {
        let name = if prefix_of(&a.name).is_some() || a.name.starts_with("Q{") {
            resolve_lexical(&a.name, None, &lookup)?
        } else {
            ExpandedName::ns(ANNOTATIONS_NS, &a.name)
        };
        if name.ns_uri.as_deref() == Some(ANNOTATIONS_NS) && name.local == "private" {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::MemoryLoader;
    use rstest::rstest;

    fn loader(sources: &[(&str, &str)]) -> MemoryLoader {
        let mut loader = MemoryLoader::new();
        for (loc, text) in sources {
            loader.insert(loc, text).unwrap();
        }
        loader
    }

    const A: &str = r#"module namespace a = "urn:a";
        import module namespace b = "urn:b" at "b.xqm";
        declare function a:f() { 1 };"#;
    const B: &str = r#"module namespace b = "urn:b";
        import module namespace a = "urn:a" at "a.xqm";
        declare function b:g() { 2 };"#;
    const MAIN: &str = r#"import module namespace a = "urn:a" at "xmldb:exist:///db/a.xqm"; a:f()"#;

    #[rstest]
    fn allowed_cycle_binds_both_namespaces() {
        let config = ResolverConfig::builder().with_cycle_policy(CyclePolicy::Allow).build();
        let resolver = ModuleResolver::with_config(
            loader(&[("xmldb:exist:///db/a.xqm", A), ("xmldb:exist:///db/b.xqm", B)]),
            config,
        );
        let compiled = resolver.compile(MAIN, None).unwrap();
        let table = compiled.table();
        assert_eq!(table.libraries().len(), 2);
        let b = table.libraries().iter().find(|l| l.namespace == "urn:b").unwrap();
        assert_eq!(b.imports, vec!["urn:a".to_string()]);
        assert!(table.function(&ExpandedName::ns("urn:a", "f"), 0).is_some());
    }

    #[rstest]
    fn rejected_cycle_reports_chain() {
        let resolver = ModuleResolver::new(loader(&[
            ("xmldb:exist:///db/a.xqm", A),
            ("xmldb:exist:///db/b.xqm", B),
        ]));
        let err = resolver.compile(MAIN, None).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XQST0093);
        assert!(err.message.contains("/db/a.xqm -> xmldb:exist:///db/b.xqm -> xmldb:exist:///db/a.xqm"));
    }

    #[rstest]
    fn import_depth_is_bounded() {
        let config = ResolverConfig::builder().with_max_import_depth(1).build();
        let resolver = ModuleResolver::with_config(
            loader(&[
                ("xmldb:exist:///db/a.xqm", r#"module namespace a = "urn:a"; import module namespace c = "urn:c" at "c.xqm";"#),
                ("xmldb:exist:///db/c.xqm", r#"module namespace c = "urn:c";"#),
            ]),
            config,
        );
        let err = resolver.compile(MAIN, None).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XQST0059);
        assert!(err.message.contains("import depth"));
    }

    #[rstest]
    fn private_declarations_are_not_exported() {
        let resolver = ModuleResolver::new(loader(&[(
            "xmldb:exist:///db/a.xqm",
            r#"module namespace a = "urn:a";
               declare %private function a:hidden() { 0 };
               declare %private variable $a:secret := 1;
               declare function a:f() { 1 };"#,
        )]));
        let table = resolver.compile(MAIN, None).unwrap().table().clone();
        let imported = table.imported("urn:a").unwrap();
        assert!(imported.function(&ExpandedName::ns("urn:a", "hidden"), 0).is_none());
        assert!(imported.variable(&ExpandedName::ns("urn:a", "secret")).is_none());
        assert!(imported.function(&ExpandedName::ns("urn:a", "f"), 0).is_some());
    }

    #[rstest]
    fn parsed_libraries_are_cached_across_compilations() {
        let resolver = ModuleResolver::new(loader(&[(
            "xmldb:exist:///db/a.xqm",
            r#"module namespace a = "urn:a"; declare function a:f() { 1 };"#,
        )]));
        resolver.compile(MAIN, None).unwrap();
        resolver.compile(MAIN, None).unwrap();
        assert_eq!(resolver.cached_modules(), 1);
        resolver.clear_cache();
        assert_eq!(resolver.cached_modules(), 0);
    }
}
