#![deny(
    warnings,
    missing_debug_implementations,
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
//! `permfind` - Print files under a directory whose permissions match exactly.

use std::env;
use std::io::{self, BufWriter, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{CommandFactory, Parser};
use clap_cargo::style::CLAP_STYLING;
use permfind::crawler::{Crawler, validate_directory};
use permfind::error::{Error, Result};
use permfind::logging::init_logging;
use permfind::permission::PermissionSpec;
use permfind::types::MAX_ARGS;
use tracing::debug;

/// CLI arguments for `permfind`
#[derive(Parser, Debug)]
#[command(author, about, styles = CLAP_STYLING, arg_required_else_help = true)]
struct Cli {
    /// Directory to search
    #[arg(short = 'd', value_name = "directory", allow_hyphen_values = true)]
    directory:   PathBuf,
    /// Permissions to match, for example rw-r--r-- or ---------
    #[arg(short = 'p', value_name = "permissions string", allow_hyphen_values = true)]
    permissions: String,
}

/// Parse the command line, returning `None` when help was printed
fn parse_cli() -> Result<Option<Cli>> {
    if env::args_os().len() > MAX_ARGS + 1 {
        return Err(Error::Usage("Too many command line arguments received".into()));
    }

    match Cli::try_parse() {
        Ok(cli) => Ok(Some(cli)),
        Err(e) if e.kind() == ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            Cli::command().print_help()?;
            Ok(None)
        },
        Err(e) if e.kind() == ErrorKind::DisplayHelp => {
            e.print()?;
            Ok(None)
        },
        Err(e) => Err(usage_error(&e)),
    }
}

/// Turn a parser rejection into a one-line usage error
fn usage_error(e: &clap::Error) -> Error {
    let arg = match e.get(ContextKind::InvalidArg) {
        Some(ContextValue::String(arg)) => Some(arg.clone()),
        Some(ContextValue::Strings(args)) => args.first().cloned(),
        _ => None,
    };

    let message = match (e.kind(), arg) {
        (ErrorKind::UnknownArgument, Some(arg)) => format!("Unknown option '{arg}' received"),
        (ErrorKind::MissingRequiredArgument, Some(arg)) => {
            format!("Required argument {arg} not found")
        },
        (ErrorKind::InvalidValue, Some(arg)) => format!("Required argument for {arg} not found"),
        (kind, _) => kind.as_str().unwrap_or("Invalid command line").to_owned(),
    };
    Error::Usage(message)
}

/// Walk `cli.directory` and print every match on its own line
fn find(cli: &Cli) -> Result<()> {
    let spec: PermissionSpec = cli.permissions.parse()?;
    let root = validate_directory(&cli.directory)?;

    let mut out = BufWriter::new(io::stdout().lock());
    let mut crawler = Crawler::new(&root, spec)?;

    for item in crawler.by_ref() {
        match item {
            Ok(path) => {
                out.write_all(path.as_os_str().as_bytes())?;
                out.write_all(b"\n")?;
            },
            Err(e) if e.is_recoverable() => {
                out.flush()?;
                eprintln!("{e}");
            },
            Err(e) => {
                out.flush()?;
                return Err(e);
            },
        }
    }
    out.flush()?;

    let (entries, matches, dirs) = crawler.progress();
    debug!(entries, matches, dirs, root = %root.display(), "search finished");

    Ok(())
}

fn main() -> ExitCode {
    init_logging();

    let result = parse_cli().and_then(|cli| cli.map_or(Ok(()), |cli| find(&cli)));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.to_string().trim_end());
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        },
    }
}
