use crate::OutputFormat;
use crate::util::{CliResult, yes_no};
use clap::Args;
use serde::Serialize;
use std::fmt::Write;
use xquery_core::{AtomicType, XdmAtomicValue, cast, castable};

#[derive(Args, Debug, Clone)]
pub struct CastArgs {
    /// Lexical value, cast as `xs:untypedAtomic`.
    #[arg(value_name = "VALUE")]
    pub value: String,
    /// Target type such as `xs:integer`, `positiveInteger` or `xs:numeric`.
    #[arg(value_name = "TYPE")]
    pub target: String,
    /// Report whether the cast would succeed instead of failing.
    #[arg(long = "castable")]
    pub castable: bool,
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CastSummary {
    input: String,
    target: String,
    castable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_type: Option<String>,
}

pub fn run(args: &CastArgs) -> CliResult<String> {
    let target: AtomicType = args.target.parse()?;
    let input = XdmAtomicValue::UntypedAtomic(args.value.clone());

    let summary = if args.castable {
        CastSummary {
            input: args.value.clone(),
            target: target.to_string(),
            castable: castable(&input, target),
            value: None,
            value_type: None,
        }
    } else {
        let result = cast(&input, target)?;
        CastSummary {
            input: args.value.clone(),
            target: target.to_string(),
            castable: true,
            value: Some(result.to_string()),
            value_type: Some(result.atomic_type().to_string()),
        }
    };

    let output = match args.format {
        OutputFormat::Text => render_cast_text(&summary),
        OutputFormat::Json => render_cast_json(&summary)?,
    };
    Ok(output)
}

pub(crate) fn render_cast_text(summary: &CastSummary) -> String {
    let mut output = String::new();
    match (&summary.value, &summary.value_type) {
        (Some(value), Some(value_type)) => {
            let _ = writeln!(&mut output, "{value} ({value_type})");
        }
        _ => {
            let _ = writeln!(
                &mut output,
                "\"{}\" castable as {}: {}",
                summary.input,
                summary.target,
                yes_no(summary.castable)
            );
        }
    }
    output.trim_end().to_owned()
}

pub(crate) fn render_cast_json(summary: &CastSummary) -> CliResult<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn args(value: &str, target: &str) -> CastArgs {
        CastArgs {
            value: value.to_owned(),
            target: target.to_owned(),
            castable: false,
            format: OutputFormat::Text,
        }
    }

    #[rstest]
    #[case("42", "xs:integer", "42 (xs:integer)")]
    #[case(" 7 ", "xs:numeric", "7 (xs:double)")]
    #[case("1", "boolean", "true (xs:boolean)")]
    #[case("INF", "xs:double", "INF (xs:double)")]
    fn text_shows_value_and_type(#[case] value: &str, #[case] target: &str, #[case] expected: &str) {
        assert_eq!(run(&args(value, target)).unwrap(), expected);
    }

    #[rstest]
    fn failing_cast_reports_the_code() {
        let err = run(&args("abc", "xs:integer")).unwrap_err().to_string();
        assert!(err.contains("FORG0001"), "{err}");
    }

    #[rstest]
    fn unknown_type_is_rejected() {
        let err = run(&args("1", "xs:nope")).unwrap_err().to_string();
        assert!(err.contains("XPST0081"), "{err}");
    }

    #[rstest]
    #[case("5", true)]
    #[case("-5", false)]
    fn castable_flag_does_not_fail(#[case] value: &str, #[case] expected: bool) {
        let mut a = args(value, "xs:positiveInteger");
        a.castable = true;
        a.format = OutputFormat::Json;
        let json: serde_json::Value = serde_json::from_str(&run(&a).unwrap()).unwrap();
        assert_eq!(json["castable"], expected);
        assert_eq!(json["target"], "xs:positiveInteger");
        assert!(json.get("value").is_none());
    }
}
