use clap::Parser;
use shadeparse::pos::SourceLocator;
use shadeparse::sexp::display_sexp;
use shadeparse::{parse, ParseError};
use std::panic::catch_unwind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum CommandError {
    #[error("I/O error")]
    Io(
        #[from]
        #[source]
        std::io::Error,
    ),
    #[error("JSON error")]
    Json(
        #[from]
        #[source]
        serde_json::Error,
    ),
    #[error("Detected one or more errors")]
    HasError,
}

fn main() -> Result<(), CommandError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let mut has_error = false;
    for file in &cli.files {
        let source = std::fs::read(file)?;
        debug!(file = %file.display(), len = source.len(), "parsing");
        let result = catch_unwind(|| parse(&source));
        let (ast, errors) = match result {
            Ok(result) => result,
            Err(e) => {
                let msg = if let Some(&e) = e.downcast_ref::<&'static str>() {
                    e
                } else if let Some(e) = e.downcast_ref::<String>() {
                    &e[..]
                } else {
                    "Box<Any>"
                };
                has_error = true;
                eprintln!("{}: {}", file.display(), msg);
                continue;
            }
        };
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&ast)?);
        } else if cli.dump {
            print!("{}", display_sexp(&ast));
        }
        if !errors.is_empty() {
            has_error = true;
            report_errors(file, &source, &errors);
        }
    }
    if has_error {
        return Err(CommandError::HasError);
    }
    Ok(())
}

fn report_errors(file: &Path, source: &[u8], errors: &[ParseError]) {
    let locator = SourceLocator::new(source);
    for error in errors {
        let start = locator.position(source, error.range().0);
        let end = locator.position(source, error.range().1);
        eprintln!(
            "{}:{}:{}-{}:{}: {}",
            file.display(),
            start.line + 1,
            start.column + 1,
            end.line + 1,
            end.column + 1,
            error
        );
    }
}

/// Parses shader files and reports syntax errors.
#[derive(Debug, Parser)]
struct Cli {
    /// Print the syntax tree as s-expressions
    #[clap(long)]
    dump: bool,
    /// Print the syntax tree as JSON
    #[clap(long, conflicts_with = "dump")]
    json: bool,
    files: Vec<PathBuf>,
}
