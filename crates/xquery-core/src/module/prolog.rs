//! Declarations extracted from a module prolog.
use std::sync::Arc;

use pest::Parser;
use pest::error::LineColLocation;
use pest::iterators::Pair;

use crate::error::Error;

#[derive(pest_derive::Parser)]
#[grammar = "module/prolog.pest"]
struct PrologParser;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDecl {
    pub prefix: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub prefix: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub prefix: Option<String>,
    pub uri: String,
    pub hints: Vec<String>,
}

/// `%name` or `%name(literal, ...)`, name still in lexical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDecl {
    pub name: String,
    pub annotations: Vec<Annotation>,
    pub type_decl: Option<String>,
    pub external: bool,
    /// Initializer, or default value of an external variable.
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub type_decl: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: String,
    pub annotations: Vec<Annotation>,
    pub params: Vec<Param>,
    pub return_type: Option<String>,
    pub external: bool,
    pub body: Option<String>,
}

impl FunctionDecl {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prolog {
    pub version: Option<String>,
    pub encoding: Option<String>,
    pub module: Option<ModuleDecl>,
    pub namespaces: Vec<NamespaceDecl>,
    pub default_element_namespace: Option<String>,
    pub default_function_namespace: Option<String>,
    pub imports: Vec<ImportDecl>,
    pub variables: Vec<VariableDecl>,
    pub functions: Vec<FunctionDecl>,
    /// Query body of a main module.
    pub body: Option<String>,
}

impl Prolog {
    pub fn is_library(&self) -> bool {
        self.module.is_some()
    }
}

/// Scan a module's prolog. Fails with `XPST0003` when the text is not a
/// well-formed main or library module.
pub fn parse_prolog(text: &str) -> Result<Prolog, Error> {
    let mut pairs = PrologParser::parse(Rule::module, text).map_err(|e| {
        let (line, col) = match e.line_col {
            LineColLocation::Pos(p) | LineColLocation::Span(p, _) => p,
        };
        Error::syntax(format!(
            "syntax error at line {line}, column {col}: {}",
            e.variant.message()
        ))
        .with_source(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>)
    })?;
    let mut prolog = Prolog::default();
    let Some(module) = pairs.next() else {
        return Ok(prolog);
    };
    for pair in module.into_inner() {
        match pair.as_rule() {
            Rule::version_decl => read_version(pair, &mut prolog)?,
            Rule::library_module | Rule::main_module => {
                for part in pair.into_inner() {
                    match part.as_rule() {
                        Rule::module_decl => prolog.module = Some(read_module_decl(part)?),
                        Rule::prolog => read_decls(part, &mut prolog)?,
                        Rule::query_body => {
                            let body = part.as_str().trim();
                            if !body.is_empty() {
                                prolog.body = Some(body.to_string());
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    Ok(prolog)
}

fn read_version(pair: Pair<'_, Rule>, prolog: &mut Prolog) -> Result<(), Error> {
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::string_literal => prolog.version = Some(string_value(p)?),
            Rule::encoding => {
                if let Some(lit) = p.into_inner().find(|i| i.as_rule() == Rule::string_literal) {
                    prolog.encoding = Some(string_value(lit)?);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn read_module_decl(pair: Pair<'_, Rule>) -> Result<ModuleDecl, Error> {
    let mut prefix = String::new();
    let mut uri = String::new();
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ncname => prefix = p.as_str().to_string(),
            Rule::string_literal => uri = string_value(p)?,
            _ => {}
        }
    }
    Ok(ModuleDecl { prefix, uri })
}

fn read_decls(pair: Pair<'_, Rule>, prolog: &mut Prolog) -> Result<(), Error> {
    for decl in pair.into_inner() {
        match decl.as_rule() {
            Rule::import_module => prolog.imports.push(read_import(decl)?),
            Rule::namespace_decl => {
                let (prefix, uri) = read_binding(decl)?;
                prolog.namespaces.push(NamespaceDecl { prefix, uri });
            }
            Rule::default_namespace_decl => {
                let mut is_function = false;
                let mut uri = String::new();
                for p in decl.into_inner() {
                    match p.as_rule() {
                        Rule::default_ns_kind => is_function = p.as_str().trim() == "function",
                        Rule::string_literal => uri = string_value(p)?,
                        _ => {}
                    }
                }
                if is_function {
                    prolog.default_function_namespace = Some(uri);
                } else {
                    prolog.default_element_namespace = Some(uri);
                }
            }
            Rule::variable_decl => prolog.variables.push(read_variable(decl)?),
            Rule::function_decl => prolog.functions.push(read_function(decl)?),
            Rule::import_schema | Rule::other_decl => {
                tracing::trace!(decl = decl.as_str(), "prolog declaration skipped");
            }
            _ => {}
        }
    }
    Ok(())
}

fn read_binding(pair: Pair<'_, Rule>) -> Result<(String, String), Error> {
    let mut prefix = String::new();
    let mut uri = String::new();
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ncname => prefix = p.as_str().to_string(),
            Rule::string_literal => uri = string_value(p)?,
            _ => {}
        }
    }
    Ok((prefix, uri))
}

fn read_import(pair: Pair<'_, Rule>) -> Result<ImportDecl, Error> {
    let mut import = ImportDecl { prefix: None, uri: String::new(), hints: Vec::new() };
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ncname => import.prefix = Some(p.as_str().to_string()),
            Rule::string_literal => import.uri = string_value(p)?,
            Rule::at_hints => {
                for hint in p.into_inner().filter(|h| h.as_rule() == Rule::string_literal) {
                    import.hints.push(string_value(hint)?);
                }
            }
            _ => {}
        }
    }
    Ok(import)
}

fn read_annotation(pair: Pair<'_, Rule>) -> Result<Annotation, Error> {
    let mut annotation = Annotation { name: String::new(), args: Vec::new() };
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::qname => annotation.name = p.as_str().to_string(),
            Rule::annotation_args => {
                for lit in p.into_inner().flat_map(Pair::into_inner) {
                    annotation.args.push(match lit.as_rule() {
                        Rule::string_literal => string_value(lit)?,
                        _ => lit.as_str().to_string(),
                    });
                }
            }
            _ => {}
        }
    }
    Ok(annotation)
}

fn type_text(pair: Pair<'_, Rule>) -> Option<String> {
    pair.into_inner()
        .find(|p| p.as_rule() == Rule::sequence_type)
        .map(|p| p.as_str().trim().to_string())
}

fn read_variable(pair: Pair<'_, Rule>) -> Result<VariableDecl, Error> {
    let mut var = VariableDecl {
        name: String::new(),
        annotations: Vec::new(),
        type_decl: None,
        external: false,
        value: None,
    };
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::annotation => var.annotations.push(read_annotation(p)?),
            Rule::qname => var.name = p.as_str().to_string(),
            Rule::type_decl => var.type_decl = type_text(p),
            Rule::var_value | Rule::var_external => {
                var.external = p.as_rule() == Rule::var_external;
                var.value = p
                    .into_inner()
                    .find(|i| i.as_rule() == Rule::expr_text)
                    .map(|i| i.as_str().trim().to_string());
            }
            _ => {}
        }
    }
    Ok(var)
}

fn read_function(pair: Pair<'_, Rule>) -> Result<FunctionDecl, Error> {
    let mut func = FunctionDecl {
        name: String::new(),
        annotations: Vec::new(),
        params: Vec::new(),
        return_type: None,
        external: false,
        body: None,
    };
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::annotation => func.annotations.push(read_annotation(p)?),
            Rule::qname => func.name = p.as_str().to_string(),
            Rule::param_list => {
                for param in p.into_inner() {
                    let mut name = String::new();
                    let mut type_decl = None;
                    for part in param.into_inner() {
                        match part.as_rule() {
                            Rule::qname => name = part.as_str().to_string(),
                            Rule::type_decl => type_decl = type_text(part),
                            _ => {}
                        }
                    }
                    func.params.push(Param { name, type_decl });
                }
            }
            Rule::type_decl => func.return_type = type_text(p),
            Rule::function_body => {
                func.body = p
                    .into_inner()
                    .find(|i| i.as_rule() == Rule::body_text)
                    .map(|i| i.as_str().trim().to_string());
            }
            Rule::function_external => func.external = true,
            _ => {}
        }
    }
    Ok(func)
}

fn string_value(pair: Pair<'_, Rule>) -> Result<String, Error> {
    match pair.into_inner().next() {
        Some(p) if p.as_rule() == Rule::dq_content => unescape(p.as_str(), '"'),
        Some(p) => unescape(p.as_str(), '\''),
        None => Ok(String::new()),
    }
}

/// Undo doubled delimiters and expand predefined entity and character
/// references.
fn unescape(raw: &str, quote: char) -> Result<String, Error> {
    let doubled: String = [quote, quote].iter().collect();
    let text = raw.replace(&doubled, &quote.to_string());
    if !text.contains('&') {
        return Ok(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let Some(semi) = tail.find(';') else {
            return Err(Error::syntax(format!("unterminated entity reference in string literal \"{raw}\"")));
        };
        let entity = &tail[..semi];
        let ch = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .map(|hex| u32::from_str_radix(hex, 16))
                .or_else(|| entity.strip_prefix('#').map(str::parse::<u32>))
                .and_then(Result::ok)
                .and_then(char::from_u32),
        };
        let Some(ch) = ch else {
            return Err(Error::syntax(format!("unknown entity reference '&{entity};'")));
        };
        out.push(ch);
        rest = &tail[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use rstest::rstest;

    const LIBRARY: &str = r#"xquery version "3.1";
module namespace impl = "http://example.com/impl";

import module namespace other = "http://example.com/other" at "other.xqm", "more.xqm";
declare namespace h = 'http://www.w3.org/1999/xhtml';

(: comment with ; and { braces :)
declare %private variable $impl:secret as xs:string := "a;b";
declare variable $impl:ext external;
declare variable $impl:ext-default as xs:integer external := 42;

declare function impl:f1($a as xs:string, $b as element(x, xs:untyped)?) as xs:string {
    <p class="{ $a }">don't {{ panic }}</p>, $b
};
declare %private %rest:path("/x") function impl:helper() external;
"#;

    #[rstest]
    fn library_prolog_is_scanned() {
        let p = parse_prolog(LIBRARY).unwrap();
        assert_eq!(p.version.as_deref(), Some("3.1"));
        let module = p.module.as_ref().unwrap();
        assert_eq!((module.prefix.as_str(), module.uri.as_str()), ("impl", "http://example.com/impl"));
        assert_eq!(p.imports.len(), 1);
        assert_eq!(p.imports[0].hints, vec!["other.xqm", "more.xqm"]);
        assert_eq!(p.namespaces[0].prefix, "h");

        assert_eq!(p.variables.len(), 3);
        assert_eq!(p.variables[0].annotations[0].name, "private");
        assert_eq!(p.variables[0].value.as_deref(), Some("\"a;b\""));
        assert!(p.variables[1].external && p.variables[1].value.is_none());
        assert_eq!(p.variables[2].value.as_deref(), Some("42"));

        let f1 = &p.functions[0];
        assert_eq!(f1.name, "impl:f1");
        assert_eq!(f1.arity(), 2);
        assert_eq!(f1.params[1].type_decl.as_deref(), Some("element(x, xs:untyped)?"));
        assert_eq!(f1.return_type.as_deref(), Some("xs:string"));
        assert!(f1.body.as_deref().unwrap().ends_with("$b"));

        let helper = &p.functions[1];
        assert!(helper.external);
        assert_eq!(helper.annotations[1].name, "rest:path");
        assert_eq!(helper.annotations[1].args, vec!["/x"]);
    }

    #[rstest]
    fn main_module_keeps_its_body() {
        let p = parse_prolog(
            "declare function local:f1($a) { $a };\nimport module namespace m = 'urn:m';\n<r>{ local:f1(1) }</r>",
        )
        .unwrap();
        assert!(!p.is_library());
        assert_eq!(p.imports[0].prefix.as_deref(), Some("m"));
        assert!(p.imports[0].hints.is_empty());
        assert_eq!(p.body.as_deref(), Some("<r>{ local:f1(1) }</r>"));
    }

    #[rstest]
    #[case("\"a\"\"b\"", "a\"b")]
    #[case("'&lt;&#65;&#x42;'", "<AB")]
    fn literals_are_unescaped(#[case] lit: &str, #[case] expected: &str) {
        let src = format!("declare namespace p = {lit}; 1");
        let p = parse_prolog(&src).unwrap();
        assert_eq!(p.namespaces[0].uri, expected);
    }

    #[rstest]
    #[case("module namespace m = 'urn:m'; declare function m:f( { 1 };")]
    #[case("module namespace m = 'urn:m'; 1 + 1")]
    #[case("declare variable $x := 1")]
    fn malformed_prologs_are_syntax_errors(#[case] src: &str) {
        assert_eq!(parse_prolog(src).unwrap_err().code_enum(), ErrorCode::XPST0003);
    }

    #[rstest]
    fn unknown_entity_is_rejected() {
        assert!(parse_prolog("declare namespace p = '&nbsp;'; 1").is_err());
    }
}
