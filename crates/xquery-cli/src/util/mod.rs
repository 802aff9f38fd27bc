use std::error::Error;
use std::fs;
use std::path::Path;

use xquery_core::ResolverConfig;

pub type CliResult<T> = Result<T, Box<dyn Error>>;

/// Reads a resolver configuration from a JSON file; `None` yields the defaults.
pub fn load_config(path: Option<&Path>) -> CliResult<ResolverConfig> {
    let Some(path) = path else {
        return Ok(ResolverConfig::default());
    };
    let text = fs::read_to_string(path)
        .map_err(|err| format!("cannot read config {}: {err}", path.display()))?;
    let config = serde_json::from_str(&text)
        .map_err(|err| format!("invalid config {}: {err}", path.display()))?;
    Ok(config)
}

pub fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use xquery_core::CyclePolicy;

    #[rstest]
    fn missing_path_gives_defaults() {
        assert_eq!(load_config(None).unwrap(), ResolverConfig::default());
    }

    #[rstest]
    fn kebab_case_keys_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resolver.json");
        fs::write(
            &path,
            r#"{ "cycle-policy": "allow", "max-import-depth": 4, "known-modules": { "urn:a": ["a.xqm"] } }"#,
        )
        .unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.cycle_policy, CyclePolicy::Allow);
        assert_eq!(config.max_import_depth, 4);
        assert_eq!(config.known_modules["urn:a"], vec!["a.xqm".to_string()]);
        assert!(!config.strict_prefix_bindings);
    }

    #[rstest]
    fn malformed_config_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ nope").unwrap();
        let err = load_config(Some(&path)).unwrap_err().to_string();
        assert!(err.starts_with("invalid config"), "{err}");
    }

    #[rstest]
    #[case(true, "yes")]
    #[case(false, "no")]
    fn yes_no_renders(#[case] value: bool, #[case] expected: &str) {
        assert_eq!(yes_no(value), expected);
    }
}
