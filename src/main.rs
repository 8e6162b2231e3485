use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use hclparse::parser::{Parsed, parse_config, parse_expression, parse_template};
use hclparse::printer::render;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `HCLPARSE_LOG=debug`
const LOG_ENV: &str = "HCLPARSE_LOG";

const USAGE_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "hclparse",
    version,
    about = "Dump the syntax tree of an HCL document, expression or template"
)]
struct Cli {
    /// File to parse (`-` reads standard input)
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    file: Option<PathBuf>,
    /// Expression to parse
    #[arg(short = 'e', long = "expr", value_name = "EXPR")]
    expr: Option<String>,
    /// Template to parse
    #[arg(short = 't', long = "template", value_name = "TEMPLATE")]
    template: Option<String>,
    /// File to parse, same as --file
    #[arg(value_name = "FILE")]
    path: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    File(PathBuf),
    Stdin,
    Expression(String),
    Template(String),
}

impl Cli {
    /// The input to parse. A file wins over an expression, which wins over a
    /// template; empty values count as absent.
    fn input(self) -> Option<Input> {
        let file = self
            .file
            .into_iter()
            .chain(self.path)
            .find(|path| !path.as_os_str().is_empty());
        if let Some(path) = file {
            return Some(if path.as_os_str() == "-" {
                Input::Stdin
            } else {
                Input::File(path)
            });
        }
        if let Some(expr) = self.expr.filter(|expr| !expr.is_empty()) {
            return Some(Input::Expression(expr));
        }
        self.template
            .filter(|template| !template.is_empty())
            .map(Input::Template)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env(LOG_ENV))
        .with_writer(io::stderr)
        .init();

    let Some(input) = Cli::parse().input() else {
        eprintln!("{}", Cli::command().render_help());
        return ExitCode::from(USAGE_ERROR);
    };

    match run(input) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(input: Input) -> Result<()> {
    debug!(?input, "selected input");
    let parsed = parse_input(input)?;

    let mut out = io::BufWriter::new(io::stdout().lock());
    render(&parsed.root, &parsed.source, &mut out)?;
    out.flush()?;
    Ok(())
}

fn parse_input(input: Input) -> Result<Parsed> {
    match input {
        Input::File(path) => {
            let source = fs::read(&path)
                .with_context(|| format!("error reading file {}", path.display()))?;
            let origin = path.display().to_string();
            parse_config(source, &origin).context("error parsing file")
        }
        Input::Stdin => {
            let mut source = Vec::new();
            io::stdin()
                .read_to_end(&mut source)
                .context("error reading standard input")?;
            parse_config(source, "<stdin>").context("error parsing file")
        }
        Input::Expression(expr) => parse_expression(&expr).context("error parsing expression"),
        Input::Template(template) => parse_template(&template).context("error parsing template"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(args: &[&str]) -> Option<Input> {
        let args = std::iter::once("hclparse").chain(args.iter().copied());
        Cli::try_parse_from(args).unwrap().input()
    }

    #[test]
    fn no_mode_selects_nothing() {
        assert_eq!(input(&[]), None);
        assert_eq!(input(&["-e", "", "-t", ""]), None);
    }

    #[test]
    fn file_beats_expression_beats_template() {
        assert_eq!(
            input(&["-t", "${a}", "-e", "1 + 2", "-f", "main.tf"]),
            Some(Input::File(PathBuf::from("main.tf")))
        );
        assert_eq!(
            input(&["-t", "${a}", "-e", "1 + 2"]),
            Some(Input::Expression("1 + 2".to_string()))
        );
        assert_eq!(
            input(&["--template", "${a}"]),
            Some(Input::Template("${a}".to_string()))
        );
    }

    #[test]
    fn empty_values_fall_through() {
        assert_eq!(
            input(&["-e", "", "-t", "x"]),
            Some(Input::Template("x".to_string()))
        );
    }

    #[test]
    fn positional_file_and_stdin() {
        assert_eq!(
            input(&["vars.hcl", "-e", "1"]),
            Some(Input::File(PathBuf::from("vars.hcl")))
        );
        assert_eq!(
            input(&["-f", "a.hcl", "b.hcl"]),
            Some(Input::File(PathBuf::from("a.hcl")))
        );
        assert_eq!(input(&["-f", "-"]), Some(Input::Stdin));
    }

    #[test]
    fn read_failure_is_reported_with_context() {
        let err = parse_input(Input::File(PathBuf::from("does/not/exist.hcl"))).unwrap_err();
        assert!(format!("{err:#}").starts_with("error reading file does/not/exist.hcl: "));
    }

    #[test]
    fn parse_failure_is_reported_with_context() {
        let err = parse_input(Input::Expression("1 +".to_string())).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.starts_with("error parsing expression: <expr>:"), "{message}");
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
