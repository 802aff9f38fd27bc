use rstest::rstest;
use xquery_core::consts::LOCAL;
use xquery_core::module::{EvaluationContext, ResolverConfig};
use xquery_core::xdm::XdmAtomicValue as A;
use xquery_core::{
    CyclePolicy, Error, ErrorCode, ErrorKind, ExpandedName, Location, MemoryLoader, ModuleResolver, SimpleNode,
    XdmItem,
};

const IMPL: &str = "http://example.com/impl";

const IMPL1: &str = r#"xquery version "1.0";
module namespace impl = "http://example.com/impl";
declare function impl:f1($a as xs:string) as xs:string {
    $a
};
"#;

const IMPL2: &str = r#"xquery version "1.0";
module namespace impl = "http://example.com/impl";
declare function impl:f1($a as xs:string, $b as xs:string) as xs:string {
    fn:concat($a, ' ', $b)
};
"#;

const IMPL1_SAME_F1: &str = r#"xquery version "1.0";
module namespace impl = "http://example.com/impl";
declare function impl:f1($a as xs:string) as xs:string {
    <second>{$a}</second>
};
"#;

fn db(sources: &[(&str, &str)]) -> MemoryLoader {
    let mut loader = MemoryLoader::new();
    for (name, text) in sources {
        loader.insert(&format!("xmldb:exist:///db/{name}"), text).unwrap();
    }
    loader
}

fn compile(sources: &[(&str, &str)], query: &str) -> Result<xquery_core::CompiledModule, Error> {
    ModuleResolver::new(db(sources)).compile(query, None)
}

fn code(result: Result<xquery_core::CompiledModule, Error>) -> ErrorCode {
    result.map(|_| ()).unwrap_err().code_enum()
}

#[rstest]
#[case("xml")]
#[case("xmlns")]
fn reserved_import_prefix(#[case] prefix: &str) {
    let query = format!(
        r#"import module namespace {prefix} = "{IMPL}" at "xmldb:exist:///db/missing.xqm";
        <result>{{{prefix}:f1("x")}}</result>"#
    );
    // the referenced module does not exist: the prefix check comes first
    let err = compile(&[], &query).map(|_| ()).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XQST0070);
    assert_eq!(err.kind, ErrorKind::InvalidPrefix);
}

#[rstest]
fn prefix_bound_to_other_import() {
    let query = r#"
        import module namespace impl = "http://example.com/impl" at "xmldb:exist:///db/impl1.xqm";
        import module namespace impl = "http://example.com/other" at "xmldb:exist:///db/other.xqm";
        1"#;
    assert_eq!(code(compile(&[("impl1.xqm", IMPL1)], query)), ErrorCode::XQST0033);
}

#[rstest]
fn prefix_bound_by_namespace_declaration() {
    let query = r#"
        declare namespace impl = "http://example.com/other";
        import module namespace impl = "http://example.com/impl" at "xmldb:exist:///db/impl1.xqm";
        1"#;
    assert_eq!(code(compile(&[("impl1.xqm", IMPL1)], query)), ErrorCode::XQST0033);
}

#[rstest]
fn same_prefix_and_uri_twice_is_a_composite() {
    let query = r#"
        import module namespace impl = "http://example.com/impl" at "xmldb:exist:///db/impl1.xqm";
        import module namespace impl = "http://example.com/impl" at "xmldb:exist:///db/impl2.xqm";
        <result>{impl:f1("to impl1")}</result>"#;
    let compiled = compile(&[("impl1.xqm", IMPL1), ("impl2.xqm", IMPL2)], query).unwrap();
    let imported = compiled.table().imported(IMPL).unwrap();
    assert_eq!(imported.sources.len(), 2);
    assert!(imported.function(&ExpandedName::ns(IMPL, "f1"), 1).is_some());
    assert!(imported.function(&ExpandedName::ns(IMPL, "f1"), 2).is_some());
}

#[rstest]
fn strict_prefix_bindings_reject_redeclaration() {
    let query = r#"
        declare namespace impl = "http://example.com/impl";
        import module namespace impl = "http://example.com/impl" at "xmldb:exist:///db/impl1.xqm";
        1"#;
    let config = ResolverConfig::builder().with_strict_prefix_bindings(true).build();
    let strict = ModuleResolver::with_config(db(&[("impl1.xqm", IMPL1)]), config);
    assert_eq!(code(strict.compile(query, None)), ErrorCode::XQST0033);
    assert!(compile(&[("impl1.xqm", IMPL1)], query).is_ok());
}

#[rstest]
fn library_importing_its_own_namespace() {
    let module1 = r#"module namespace impl = "http://example.com/impl";
        import module namespace impl = "http://example.com/impl" at "xmldb:exist:///db/impl2.xqm";
        declare function impl:f1($a as xs:string) as xs:string { $a };"#;
    let query = r#"import module namespace impl = "http://example.com/impl" at "xmldb:exist:///db/impl1.xqm";
        impl:f1("x")"#;
    let sources = [("impl1.xqm", module1), ("impl2.xqm", IMPL2)];
    assert!(compile(&sources, query).is_ok());

    let config = ResolverConfig::builder().with_strict_prefix_bindings(true).build();
    let strict = ModuleResolver::with_config(db(&sources), config);
    assert_eq!(code(strict.compile(query, None)), ErrorCode::XQST0033);
}

#[rstest]
fn empty_target_namespace() {
    let query = r#"import module namespace impl = "" at "xmldb:exist:///db/impl1.xqm"; 1"#;
    assert_eq!(code(compile(&[("impl1.xqm", IMPL1)], query)), ErrorCode::XQST0088);
}

#[rstest]
fn namespace_imported_under_two_prefixes() {
    let query = r#"
        import module namespace impl1 = "http://example.com/impl" at "xmldb:exist:///db/impl1.xqm";
        import module namespace impl2 = "http://example.com/impl" at "xmldb:exist:///db/impl2.xqm";
        1"#;
    let result = compile(&[("impl1.xqm", IMPL1), ("impl2.xqm", IMPL2)], query);
    assert_eq!(code(result), ErrorCode::XQST0047);
}

#[rstest]
#[case(r#"import module namespace impl = "http://example.com/impl" at "xmldb:exist:///db/impl1.xqm"; 1"#)]
#[case(r#"import module namespace impl = "http://example.com/impl"; 1"#)]
fn missing_module(#[case] query: &str) {
    let err = compile(&[], query).map(|_| ()).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XQST0059);
    assert_eq!(err.kind, ErrorKind::ModuleNotFound);
}

#[rstest]
fn registered_module_needs_no_hint() {
    let mut resolver = ModuleResolver::new(db(&[("impl1.xqm", IMPL1)]));
    resolver.register_module(IMPL, "xmldb:exist:///db/impl1.xqm").unwrap();
    let compiled = resolver
        .compile(r#"import module namespace impl = "http://example.com/impl"; impl:f1("a")"#, None)
        .unwrap();
    assert!(compiled.table().function(&ExpandedName::ns(IMPL, "f1"), 1).is_some());
}

#[rstest]
fn unloadable_hints_are_skipped() {
    let query = r#"import module namespace impl = "http://example.com/impl"
            at "xmldb:exist:///db/missing.xqm", "xmldb:exist:///db/impl1.xqm";
        impl:f1("a")"#;
    let compiled = compile(&[("impl1.xqm", IMPL1)], query).unwrap();
    let locations: Vec<_> = compiled.table().imported(IMPL).unwrap().locations().cloned().collect();
    assert_eq!(locations, vec![Location::Db("/db/impl1.xqm".into())]);
}

#[rstest]
fn wrong_target_namespace() {
    let query = r#"import module namespace x = "http://example.com/x" at "xmldb:exist:///db/impl1.xqm"; 1"#;
    let err = compile(&[("impl1.xqm", IMPL1)], query).map(|_| ()).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XQST0059);
    assert!(err.message.contains("http://example.com/impl"));
}

#[rstest]
fn main_module_as_import_target() {
    let query = r#"import module namespace x = "http://example.com/x" at "xmldb:exist:///db/main.xq"; 1"#;
    assert_eq!(code(compile(&[("main.xq", "1 + 1")], query)), ErrorCode::XQST0059);
}

#[rstest]
fn malformed_library_is_a_syntax_error() {
    let query = r#"import module namespace impl = "http://example.com/impl" at "xmldb:exist:///db/bad.xqm"; 1"#;
    let broken = r#"module namespace impl = "http://example.com/impl"; declare function impl:f1( { 1 };"#;
    let err = compile(&[("bad.xqm", broken)], query).map(|_| ()).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPST0003);
    assert!(err.message.starts_with("xmldb:exist:///db/bad.xqm"));
}

#[rstest]
fn function_in_two_hinted_sources() {
    let query = r#"import module namespace impl = "http://example.com/impl"
            at "xmldb:exist:///db/impl1.xqm", "xmldb:exist:///db/impl2.xqm";
        impl:f1("a")"#;
    let err = compile(&[("impl1.xqm", IMPL1), ("impl2.xqm", IMPL1_SAME_F1)], query)
        .map(|_| ())
        .unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XQST0034);
    assert!(err.message.contains("{http://example.com/impl}f1#1"), "{}", err.message);
}

#[rstest]
fn composite_exposes_union_under_one_prefix() {
    let query = r#"import module namespace impl = "http://example.com/impl"
            at "xmldb:exist:///db/impl1.xqm", "xmldb:exist:///db/impl2.xqm";
        impl:f1("a")"#;
    let compiled = compile(&[("impl1.xqm", IMPL1), ("impl2.xqm", IMPL2)], query).unwrap();
    let table = compiled.table();
    let imported = table.imported(IMPL).unwrap();
    assert_eq!(imported.prefix.as_deref(), Some("impl"));
    let mut arities: Vec<_> = imported.functions().map(|f| f.arity()).collect();
    arities.sort_unstable();
    assert_eq!(arities, vec![1, 2]);
    assert_eq!(table.namespace_uri("impl"), Some(IMPL));
}

#[rstest]
fn composite_with_differing_library_prefixes() {
    let other_prefix = r#"module namespace i2 = "http://example.com/impl";
        declare function i2:f2() { 2 };"#;
    let query = r#"import module namespace impl = "http://example.com/impl"
            at "xmldb:exist:///db/impl1.xqm", "xmldb:exist:///db/impl2.xqm";
        impl:f2()"#;
    let compiled = compile(&[("impl1.xqm", IMPL1), ("impl2.xqm", other_prefix)], query).unwrap();
    assert!(compiled.table().function(&ExpandedName::ns(IMPL, "f2"), 0).is_some());
}

#[rstest]
fn duplicate_function_in_main_module() {
    let query = r#"
        declare function local:f1($a as xs:string) as xs:string { <first>{$a}</first> };
        declare function local:f1($a as xs:string) as xs:string { <second>{$a}</second> };
        local:f1("x")"#;
    let err = compile(&[], query).map(|_| ()).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XQST0034);
    assert!(err.message.contains(&format!("{{{LOCAL}}}f1#1")));
}

#[rstest]
fn duplicate_detection_uses_resolved_names() {
    let query = r#"
        declare namespace ns1 = 'http://ns1';
        declare namespace ns12 = 'http://ns1';
        declare function ns1:f1($a as xs:string) as xs:string { $a };
        declare function ns12:f1($a as xs:string) as xs:string { $a };
        1"#;
    let err = compile(&[], query).map(|_| ()).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XQST0034);
    assert!(err.message.contains("{http://ns1}f1#1"));
}

#[rstest]
fn main_module_redeclares_imported_function() {
    let query = r#"
        import module namespace impl = "http://example.com/impl" at "xmldb:exist:///db/impl1.xqm";
        declare namespace other = "http://example.com/impl";
        declare function other:f1($a as xs:string) as xs:string { $a };
        1"#;
    let err = compile(&[("impl1.xqm", IMPL1)], query).map(|_| ()).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XQST0034);
    assert!(err.message.contains("{http://example.com/impl}f1#1"));
}

#[rstest]
fn variable_in_two_modules() {
    let v1 = r#"module namespace impl = "http://example.com/impl"; declare variable $impl:v := 1;"#;
    let v2 = r#"module namespace impl = "http://example.com/impl"; declare variable $impl:v := 2;"#;
    let query = r#"import module namespace impl = "http://example.com/impl"
            at "xmldb:exist:///db/v1.xqm", "xmldb:exist:///db/v2.xqm";
        $impl:v"#;
    let err = compile(&[("v1.xqm", v1), ("v2.xqm", v2)], query).map(|_| ()).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XQST0049);
    assert!(err.message.contains("{http://example.com/impl}v"));
}

#[rstest]
fn main_module_redeclares_imported_variable() {
    let v1 = r#"module namespace impl = "http://example.com/impl"; declare variable $impl:v := 1;"#;
    let query = r#"import module namespace impl = "http://example.com/impl" at "xmldb:exist:///db/v1.xqm";
        declare variable $impl:v := 2;
        $impl:v"#;
    assert_eq!(code(compile(&[("v1.xqm", v1)], query)), ErrorCode::XQST0049);
}

#[rstest]
fn variables_between_modules() {
    let mod1 = r#"xquery version "1.0";
        module namespace mod1 = "http://example.com/mod1";
        declare variable $mod1:var1 := "mod1 var1";
        declare function mod1:test() {
            <function name="mod1:test"><variable name="mod1:var1">{$mod1:var1}</variable></function>
        };"#;
    let mod2 = r#"xquery version "1.0";
        module namespace mod2 = "http://example.com/mod2";
        declare variable $mod2:var1 := "mod2 var1";
        import module namespace mod1 = "http://example.com/mod1" at "xmldb:exist:///db/mod1.xqm";
        declare function mod2:test() {
            <function name="mod2:test">{ mod1:test() }</function>
        };"#;
    let query = r#"xquery version "1.0";
        import module namespace mod2 = 'http://example.com/mod2' at 'xmldb:exist:///db/mod2.xqm';
        <result>{mod2:test()}</result>"#;
    let compiled = compile(&[("mod1.xqm", mod1), ("mod2.xqm", mod2)], query).unwrap();
    let table = compiled.table();
    assert_eq!(table.libraries().len(), 2);
    // mod1 is only visible through mod2
    assert!(table.imported("http://example.com/mod1").is_none());
    let mod2 = table.imported("http://example.com/mod2").unwrap();
    assert_eq!(mod2.sources[0].imports, vec!["http://example.com/mod1".to_string()]);
    assert_eq!(compiled.body().map(str::trim), Some("<result>{mod2:test()}</result>"));
}

#[rstest]
fn diamond_imports_load_once() {
    let a = r#"module namespace a = "urn:a";
        import module namespace c = "urn:c" at "c.xqm";
        declare function a:f() { 1 };"#;
    let b = r#"module namespace b = "urn:b";
        import module namespace c = "urn:c" at "/db/c.xqm";
        declare function b:f() { 1 };"#;
    let c = r#"module namespace c = "urn:c"; declare function c:f() { 1 };"#;
    let query = r#"import module namespace a = "urn:a" at "xmldb:exist:///db/a.xqm";
        import module namespace b = "urn:b" at "xmldb:exist:///db/b.xqm";
        1"#;
    let compiled = compile(&[("a.xqm", a), ("b.xqm", b), ("c.xqm", c)], query).unwrap();
    assert_eq!(compiled.table().libraries().len(), 3);
}

const CYCLE1: &str = r#"module namespace impl1 = "http://example.com/impl1";
    import module namespace impl2 = "http://example.com/impl2" at "xmldb:exist:///db/impl2.xqm";
    declare function impl1:f1($a as xs:string) as xs:string { $a };"#;
const CYCLE2: &str = r#"module namespace impl2 = "http://example.com/impl2";
    import module namespace impl1 = "http://example.com/impl1" at "xmldb:exist:///db/impl1.xqm";
    declare function impl2:f1($a as xs:string) as xs:string { $a };"#;
const CYCLE_MAIN: &str = r#"import module namespace impl1 = "http://example.com/impl1" at "xmldb:exist:///db/impl1.xqm";
    impl1:f1("x")"#;

#[rstest]
fn cyclic_imports_are_rejected() {
    let err = compile(&[("impl1.xqm", CYCLE1), ("impl2.xqm", CYCLE2)], CYCLE_MAIN)
        .map(|_| ())
        .unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XQST0093);
    assert_eq!(err.kind, ErrorKind::CyclicImport);
}

#[rstest]
fn longer_cycle_through_three_modules() {
    let m3 = r#"module namespace impl3 = "http://example.com/impl3";
        import module namespace impl1 = "http://example.com/impl1" at "xmldb:exist:///db/impl1.xqm";
        declare function impl3:f() { 3 };"#;
    let m2 = r#"module namespace impl2 = "http://example.com/impl2";
        import module namespace impl3 = "http://example.com/impl3" at "xmldb:exist:///db/impl3.xqm";
        declare function impl2:f() { 2 };"#;
    let result = compile(&[("impl1.xqm", CYCLE1), ("impl2.xqm", m2), ("impl3.xqm", m3)], CYCLE_MAIN);
    assert_eq!(code(result), ErrorCode::XQST0093);
}

#[rstest]
fn cycles_can_be_allowed() {
    let config = ResolverConfig::builder().with_cycle_policy(CyclePolicy::Allow).build();
    let resolver = ModuleResolver::with_config(db(&[("impl1.xqm", CYCLE1), ("impl2.xqm", CYCLE2)]), config);
    let compiled = resolver.compile(CYCLE_MAIN, None).unwrap();
    assert_eq!(compiled.table().libraries().len(), 2);
}

#[rstest]
fn library_symbols_must_use_the_module_namespace() {
    let bad = r#"module namespace impl = "http://example.com/impl"; declare function local:f() { 1 };"#;
    let query = r#"import module namespace impl = "http://example.com/impl" at "xmldb:exist:///db/bad.xqm"; 1"#;
    assert_eq!(code(compile(&[("bad.xqm", bad)], query)), ErrorCode::XQST0048);
}

#[rstest]
fn functions_in_reserved_namespaces() {
    assert_eq!(code(compile(&[], "declare function fn:f() { 1 }; 1")), ErrorCode::XQST0045);
    assert_eq!(code(compile(&[], "declare function nope:f() { 1 }; 1")), ErrorCode::XPST0081);
}

#[rstest]
fn external_variables_must_be_supplied() {
    let lib = r#"module namespace cfg = "urn:cfg";
        declare variable $cfg:mode external;
        declare variable $cfg:level external := 1;"#;
    let query = r#"import module namespace cfg = "urn:cfg" at "xmldb:exist:///db/cfg.xqm";
        declare variable $user external;
        ($cfg:mode, $user)"#;
    let compiled = compile(&[("cfg.xqm", lib)], query).unwrap();
    let required: Vec<_> = compiled.table().required_externals().map(|v| v.name.clone()).collect();
    assert_eq!(required.len(), 2);

    let ctx: EvaluationContext<SimpleNode> = compiled.new_context();
    let err = ctx.check_externals().unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPDY0002);
    assert_eq!(err.kind, ErrorKind::UnboundExternalVariable);

    let value = vec![XdmItem::Atomic(A::String("fast".into()))];
    let ctx = compiled
        .new_context::<SimpleNode>()
        .with_external(ExpandedName::ns("urn:cfg", "mode"), value.clone())
        .with_external(ExpandedName::local("user"), vec![]);
    assert!(ctx.check_externals().is_ok());
    assert_eq!(ctx.external(&ExpandedName::ns("urn:cfg", "mode")), Some(value.as_slice()));
}

#[rstest]
fn contexts_share_one_table() {
    let compiled = compile(&[("impl1.xqm", IMPL1)], r#"import module namespace impl = "http://example.com/impl" at "xmldb:exist:///db/impl1.xqm"; 1"#)
        .unwrap();
    let a: EvaluationContext<SimpleNode> = compiled.new_context();
    let b: EvaluationContext<SimpleNode> = compiled.new_context();
    assert!(std::ptr::eq(a.table(), b.table()));
}

#[rstest]
fn relative_hints_resolve_against_the_importing_module() {
    let util = r#"module namespace u = "urn:util"; declare function u:f() { 1 };"#;
    let lib = r#"module namespace l = "urn:lib";
        import module namespace u = "urn:util" at "../util/u.xqm";
        declare function l:f() { 1 };"#;
    let query = r#"import module namespace l = "urn:lib" at "lib/l.xqm"; 1"#;
    let mut loader = MemoryLoader::new();
    loader.insert("xmldb:exist:///db/app/util/u.xqm", util).unwrap();
    loader.insert("xmldb:exist:///db/app/lib/l.xqm", lib).unwrap();
    let resolver = ModuleResolver::new(loader);
    let compiled = resolver.compile(query, Some(Location::Db("/db/app/main.xq".into()))).unwrap();
    let locations: Vec<_> = compiled.table().libraries().iter().map(|l| l.location.to_string()).collect();
    assert_eq!(
        locations,
        vec!["xmldb:exist:///db/app/util/u.xqm".to_string(), "xmldb:exist:///db/app/lib/l.xqm".to_string()]
    );
}
