//! # CLI Module
//!
//! Command-line interface of the `fastsite` binary.
//!
//! ## Commands
//!
//! ### `routes`
//!
//! List the routes a site manifest declares, in registration order:
//!
//! ```bash
//! fastsite routes --manifest site.yaml
//! ```
//!
//! ### `request`
//!
//! Run one request through the whole lifecycle and print the emitted
//! status line, headers and body:
//!
//! ```bash
//! fastsite request --manifest site.yaml -X POST -H 'Accept: application/json' /users/42
//! ```
//!
//! ### `match`
//!
//! Check a pattern against a path without a manifest:
//!
//! ```bash
//! fastsite match '/news/:year?/:month?' /news/2024
//! # ["2024"]
//! ```
//!
//! ## Usage from Code
//!
//! ```rust,ignore
//! use fastsite::cli::{execute, Cli};
//! use clap::Parser;
//!
//! let cli = Cli::parse();
//! execute(&cli.command, &mut std::io::stdout())?;
//! ```

mod commands;


pub use commands::{execute, run_cli, Cli, Commands};
