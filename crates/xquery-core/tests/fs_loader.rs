use std::fs;

use rstest::rstest;
use tempfile::TempDir;
use xquery_core::{ErrorCode, ExpandedName, FsLoader, Location, ModuleResolver};

fn write(dir: &TempDir, rel: &str, text: &str) -> std::path::PathBuf {
    let path = dir.path().join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, text).unwrap();
    path
}

#[rstest]
fn relative_hints_follow_the_importing_file() {
    let dir = TempDir::new().unwrap();
    write(&dir, "lib/util.xqm", r#"module namespace u = "urn:util"; declare function u:f() { 1 };"#);
    write(
        &dir,
        "lib/api.xqm",
        r#"module namespace api = "urn:api";
           import module namespace u = "urn:util" at "./util.xqm";
           declare function api:g() { u:f() };"#,
    );
    let main = write(
        &dir,
        "app/main.xq",
        r#"import module namespace api = "urn:api" at "../lib/api.xqm"; api:g()"#,
    );

    let resolver = ModuleResolver::new(FsLoader::new());
    let compiled = resolver.compile_location(main.to_str().unwrap()).unwrap();
    assert_eq!(compiled.location(), Some(&Location::File(main.clone())));
    let table = compiled.table();
    assert_eq!(table.libraries().len(), 2);
    assert!(table.function(&ExpandedName::ns("urn:api", "g"), 0).is_some());
    assert!(table.function(&ExpandedName::ns("urn:util", "f"), 0).is_none());
}

#[rstest]
fn database_paths_map_onto_the_db_root() {
    let dir = TempDir::new().unwrap();
    write(&dir, "db/modules/m.xqm", r#"module namespace m = "urn:m"; declare variable $m:v := 1;"#);
    let resolver = ModuleResolver::new(FsLoader::new().with_db_root(dir.path()));
    let compiled = resolver
        .compile(r#"import module namespace m = "urn:m" at "xmldb:exist:///db/modules/m.xqm"; $m:v"#, None)
        .unwrap();
    assert!(compiled.table().variable(&ExpandedName::ns("urn:m", "v")).is_some());
}

#[rstest]
fn missing_file_is_module_not_found() {
    let dir = TempDir::new().unwrap();
    let main = write(&dir, "main.xq", r#"import module namespace m = "urn:m" at "nope.xqm"; 1"#);
    let err = ModuleResolver::new(FsLoader::new())
        .compile_location(main.to_str().unwrap())
        .map(|_| ())
        .unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XQST0059);
}

#[rstest]
fn byte_order_mark_is_ignored() {
    let dir = TempDir::new().unwrap();
    let main = write(&dir, "main.xq", "\u{feff}xquery version \"3.1\"; 1");
    let compiled = ModuleResolver::new(FsLoader::new())
        .compile_location(main.to_str().unwrap())
        .unwrap();
    assert_eq!(compiled.body().map(str::trim), Some("1"));
}
