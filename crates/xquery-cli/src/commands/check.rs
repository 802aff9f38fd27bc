use crate::OutputFormat;
use crate::util::{CliResult, load_config, yes_no};
use clap::Args;
use serde::Serialize;
use std::fmt::Write;
use std::path::PathBuf;
use xquery_core::module::{FunctionSignature, VariableSignature};
use xquery_core::{BindingTable, CompiledModule, FsLoader, ModuleResolver};

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Main or library module to resolve.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
    /// JSON resolver configuration.
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Directory that `xmldb:exist:///db/...` hints map onto.
    #[arg(long = "db-root", value_name = "DIR")]
    pub db_root: Option<PathBuf>,
    /// Reject a prefix declared twice even for the same namespace.
    #[arg(long = "strict-prefixes")]
    pub strict_prefixes: bool,
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    namespace: String,
    prefix: Option<String>,
    locations: Vec<String>,
    functions: Vec<String>,
    variables: Vec<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CheckSummary {
    location: String,
    library: bool,
    module_namespace: Option<String>,
    imports: Vec<ImportSummary>,
    libraries: Vec<String>,
    functions: Vec<String>,
    variables: Vec<String>,
    required_externals: Vec<String>,
}

pub fn run(args: &CheckArgs) -> CliResult<String> {
    let mut config = load_config(args.config.as_deref())?;
    if args.strict_prefixes {
        config.strict_prefix_bindings = true;
    }
    let mut loader = FsLoader::new();
    if let Some(root) = &args.db_root {
        loader = loader.with_db_root(root);
    }
    let resolver = ModuleResolver::with_config(loader, config);

    let hint = args
        .file
        .to_str()
        .ok_or_else(|| format!("path is not valid UTF-8: {}", args.file.display()))?;
    let compiled = resolver.compile_location(hint)?;
    let summary = summarize(&compiled);
    tracing::debug!(
        imports = summary.imports.len(),
        libraries = summary.libraries.len(),
        "module resolved"
    );

    let output = match args.format {
        OutputFormat::Text => render_check_text(&summary),
        OutputFormat::Json => render_check_json(&summary)?,
    };
    Ok(output)
}

pub(crate) fn summarize(compiled: &CompiledModule) -> CheckSummary {
    let table: &BindingTable = compiled.table();
    CheckSummary {
        location: compiled.location().map(ToString::to_string).unwrap_or_default(),
        library: table.is_library(),
        module_namespace: table.module_namespace().map(|(_, uri)| uri.to_owned()),
        imports: table
            .imports()
            .map(|import| ImportSummary {
                namespace: import.namespace.clone(),
                prefix: import.prefix.clone(),
                locations: import.locations().map(ToString::to_string).collect(),
                functions: import.functions().map(function_label).collect(),
                variables: import.variables().map(variable_label).collect(),
            })
            .collect(),
        libraries: table.libraries().iter().map(|lib| lib.location.to_string()).collect(),
        functions: table.declared_functions().iter().map(function_label).collect(),
        variables: table.declared_variables().iter().map(variable_label).collect(),
        required_externals: table.required_externals().map(variable_label).collect(),
    }
}

fn function_label(function: &FunctionSignature) -> String {
    format!("{}#{}", function.name, function.arity())
}

fn variable_label(variable: &VariableSignature) -> String {
    format!("${}", variable.name)
}

pub(crate) fn render_check_text(summary: &CheckSummary) -> String {
    let mut output = String::new();
    let _ = writeln!(&mut output, "Module: {}", summary.location);
    let _ = writeln!(&mut output, "  Library: {}", yes_no(summary.library));
    if let Some(ns) = &summary.module_namespace {
        let _ = writeln!(&mut output, "  Namespace: {ns}");
    }

    if summary.imports.is_empty() {
        let _ = writeln!(&mut output, "  Imports: none");
    } else {
        let _ = writeln!(&mut output, "  Imports:");
        for import in &summary.imports {
            let prefix = import.prefix.as_deref().unwrap_or("-");
            let _ = writeln!(&mut output, "    {prefix} = {}", import.namespace);
            for location in &import.locations {
                let _ = writeln!(&mut output, "      at {location}");
            }
            for name in import.functions.iter().chain(&import.variables) {
                let _ = writeln!(&mut output, "      {name}");
            }
        }
    }

    let _ = writeln!(&mut output, "  Libraries loaded: {}", summary.libraries.len());
    write_list(&mut output, "Functions", &summary.functions);
    write_list(&mut output, "Variables", &summary.variables);
    write_list(&mut output, "Required externals", &summary.required_externals);

    output.trim_end().to_owned()
}

fn write_list(output: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(output, "  {label}: {}", items.join(", "));
}

pub(crate) fn render_check_json(summary: &CheckSummary) -> CliResult<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}
