use clap::Parser;
use rstest::rstest;
use std::fs;
use tempfile::TempDir;
use xquery_cli::{Cli, execute};

fn run(args: &[&str]) -> anyhow::Result<String> {
    let cli = Cli::try_parse_from(std::iter::once("xqcore").chain(args.iter().copied()))?;
    execute(&cli.command)
}

fn database() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let modules = dir.path().join("db/modules");
    fs::create_dir_all(&modules).unwrap();
    fs::write(
        modules.join("a.xqm"),
        r#"module namespace a = "urn:a";
           import module namespace b = "urn:b" at "b.xqm";
           declare function a:f() { b:g() };"#,
    )
    .unwrap();
    fs::write(
        modules.join("b.xqm"),
        r#"module namespace b = "urn:b";
           declare function b:g() { 1 };"#,
    )
    .unwrap();
    dir
}

#[rstest]
fn check_resolves_database_hints_under_db_root() {
    let dir = database();
    let main = dir.path().join("main.xq");
    fs::write(&main, r#"import module namespace a = "urn:a" at "xmldb:exist:///db/modules/a.xqm"; a:f()"#)
        .unwrap();
    let output = run(&[
        "check",
        main.to_str().unwrap(),
        "--db-root",
        dir.path().to_str().unwrap(),
    ])
    .unwrap();
    assert!(output.contains("a = urn:a"), "{output}");
    assert!(output.contains("at xmldb:exist:///db/modules/a.xqm"), "{output}");
    assert!(output.contains("Libraries loaded: 2"), "{output}");
}

#[rstest]
fn check_uses_known_modules_from_config() {
    let dir = database();
    let config = dir.path().join("resolver.json");
    fs::write(
        &config,
        r#"{ "known-modules": { "urn:b": ["xmldb:exist:///db/modules/b.xqm"] } }"#,
    )
    .unwrap();
    let main = dir.path().join("main.xq");
    fs::write(&main, r#"import module namespace b = "urn:b"; b:g()"#).unwrap();
    let output = run(&[
        "check",
        main.to_str().unwrap(),
        "--db-root",
        dir.path().to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
        "--format",
        "json",
    ])
    .unwrap();
    let json: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(json["imports"][0]["functions"][0], "{urn:b}g#0");
}

#[rstest]
fn check_reports_cycles() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("x.xqm"),
        r#"module namespace x = "urn:x"; import module namespace y = "urn:y" at "y.xqm";"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("y.xqm"),
        r#"module namespace y = "urn:y"; import module namespace x = "urn:x" at "x.xqm";"#,
    )
    .unwrap();
    let main = dir.path().join("main.xq");
    fs::write(&main, r#"import module namespace x = "urn:x" at "x.xqm"; 1"#).unwrap();
    let err = run(&["check", main.to_str().unwrap()]).unwrap_err();
    assert!(err.to_string().contains("XQST0093"), "{err}");

    let config = dir.path().join("allow.json");
    fs::write(&config, r#"{ "cycle-policy": "allow" }"#).unwrap();
    assert!(run(&["check", main.to_str().unwrap(), "--config", config.to_str().unwrap()]).is_ok());
}

#[rstest]
#[case(&["cast", "0012", "xs:unsignedByte"], "12 (xs:unsignedByte)")]
#[case(&["cast", "abc", "xs:integer", "--castable"], "\"abc\" castable as xs:integer: no")]
fn cast_commands(#[case] args: &[&str], #[case] expected: &str) {
    assert_eq!(run(args).unwrap(), expected);
}
