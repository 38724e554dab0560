use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use http::Method;

use crate::manifest::Manifest;
use crate::router::{match_pattern, MatchOptions, ParamRules};
use crate::server::{Emitted, Request};

/// Command-line interface for fastsite
#[derive(Parser, Debug)]
#[command(name = "fastsite")]
#[command(about = "Inspect and exercise fastsite route definitions", long_about = None)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "FASTSITE_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the routes declared in a site manifest
    Routes {
        /// Path to the YAML site manifest
        #[arg(short, long)]
        manifest: PathBuf,
    },
    /// Dispatch one request through a site manifest and print the response
    Request {
        /// Path to the YAML site manifest
        #[arg(short, long)]
        manifest: PathBuf,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Request header as `Name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Request body
        #[arg(short, long)]
        data: Option<String>,

        /// Request target, e.g. `/users/42?tab=posts`
        path: String,
    },
    /// Match a single path against a pattern and print the parameters
    Match {
        /// Route pattern, e.g. `/users/:id`
        pattern: String,

        /// Request path
        path: String,

        /// Compare literal segments case-insensitively
        #[arg(long, default_value_t = false)]
        case_insensitive: bool,

        /// Disable trailing-slash normalization
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
}

/// Parse the process arguments and run the selected command
///
/// # Errors
///
/// Returns any error raised by the command.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let _guard = crate::logging::init_logging(&cli.log_level)?;
    let stdout = std::io::stdout();
    execute(&cli.command, &mut stdout.lock())
}

/// Run `command`, writing its output to `out`
///
/// # Errors
///
/// Fails when a manifest cannot be loaded or built, a header is malformed,
/// or writing to `out` fails.
pub fn execute(command: &Commands, out: &mut impl Write) -> Result<()> {
    match command {
        Commands::Routes { manifest } => {
            let app = load_app(manifest)?;
            for route in app.routes() {
                let method = route.method().map_or("*", Method::as_str);
                writeln!(
                    out,
                    "{:<7} {}{}",
                    method,
                    route.pattern(),
                    if route.filters().is_empty() {
                        String::new()
                    } else {
                        format!("  ({} filters)", route.filters().len())
                    }
                )?;
            }
            Ok(())
        }
        Commands::Request {
            manifest,
            method,
            headers,
            data,
            path,
        } => {
            let mut app = load_app(manifest)?;
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .map_err(|_| anyhow!("invalid method '{method}'"))?;
            let mut request = Request::new(method, path);
            for header in headers {
                let (name, value) = header
                    .split_once(':')
                    .ok_or_else(|| anyhow!("invalid header '{header}': expected 'Name: value'"))?;
                request = request.with_header(name.trim(), value.trim());
            }
            if let Some(body) = data {
                request = request.with_body(body.as_bytes().to_vec());
            }
            let emitted = app.run(&request);
            print_emitted(&emitted, out)
        }
        Commands::Match {
            pattern,
            path,
            case_insensitive,
            strict,
        } => {
            let opts = MatchOptions {
                case_sensitive: !*case_insensitive,
                strict: *strict,
            };
            match match_pattern(pattern, path, &ParamRules::new(), opts) {
                Ok(Some(params)) => {
                    writeln!(out, "{}", serde_json::to_string(params.as_slice())?)?;
                }
                Ok(None) => writeln!(out, "no match")?,
                Err(err) => writeln!(out, "error: {err}")?,
            }
            Ok(())
        }
    }
}

fn load_app(path: &Path) -> Result<crate::app::Application> {
    let mut manifest = Manifest::load(path)?;
    manifest.apply_env();
    manifest
        .build()
        .with_context(|| format!("failed to build site from {}", path.display()))
}

fn print_emitted(emitted: &Emitted, out: &mut impl Write) -> Result<()> {
    writeln!(out, "{}", emitted.status_line())?;
    for (name, value) in &emitted.headers {
        writeln!(out, "{name}: {value}")?;
    }
    writeln!(out)?;
    out.write_all(&emitted.body)?;
    if !emitted.body.is_empty() && !emitted.body.ends_with(b"\n") {
        writeln!(out)?;
    }
    Ok(())
}
