//! `metafetch` fetches the metadata of many files from the Google Drive API
//! as fast as the API quota allows, but never faster.
//!
//! The binary is a wrapper around metafetch-lib, which does the actual
//! rate-limited fetching.
//!
//! Fetch the metadata of all file IDs in a file:
//! ```sh
//! metafetch ids.txt metadata.json
//! ```
//!
//! Read IDs from stdin and only request a few fields:
//! ```sh
//! cat ids.txt | metafetch --fields id,name,owners - metadata.json
//! ```
//!
//! Stay below 1000 requests per 100 seconds with 20 parallel requests:
//! ```sh
//! metafetch --quota 1000 --period 100s --concurrency 20 ids.txt metadata.json
//! ```
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    rustdoc::invalid_html_tags,
    missing_copy_implementations,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_extern_crates,
    variant_size_differences,
    clippy::missing_const_for_fn
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]
#![deny(missing_docs)]

use std::io::{self, ErrorKind};
use std::path::PathBuf;

use anyhow::{Context, Error, Result, bail};
use clap::{Parser, crate_version};
use formatters::log::init_logging;
use log::{error, info};

use metafetch_lib::{CancellationToken, input};
#[cfg(feature = "native-tls")]
use openssl_sys as _; // required for vendored-openssl feature

use options::METAFETCH_CONFIG_FILE;

mod client;
mod commands;
mod formatters;
mod options;
mod progress;
mod stats;
mod verbosity;
mod writer;

use crate::{
    commands::CommandParams,
    options::{Config, MetafetchOptions},
};

/// A C-like enum that can be cast to `i32` and used as process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCode {
    Success = 0,
    // NOTE: exit code 1 is used for any `Result::Err` bubbled up to `main()`
    // using the `?` operator.
    #[allow(unused)]
    UnexpectedFailure = 1,
    RequestFailure = 2,
    ConfigFile = 3,
}

fn main() -> Result<()> {
    // std::process::exit doesn't guarantee that all destructors will be run,
    // therefore we wrap the main code in another function to ensure that.
    // See: https://doc.rust-lang.org/stable/std/process/fn.exit.html
    let exit_code = run_main()?;
    std::process::exit(exit_code);
}

/// Merge all provided config options into one.
/// This includes a potential config file, command-line- and environment variables
fn load_config() -> Result<MetafetchOptions> {
    let mut opts = MetafetchOptions::parse();

    init_logging(&opts.config.verbose);

    // Load a potentially existing config file and merge it into the config from
    // the CLI
    if let Some(config_file) = &opts.config_file {
        match Config::load_from_file(config_file) {
            Ok(c) => opts.config.merge(c),
            Err(e) => {
                bail!(
                    "Cannot load configuration file `{}`: {e:?}",
                    config_file.display()
                );
            }
        }
    } else {
        // If no config file was explicitly provided, we try to load the default
        // config file from the current directory if the file exits. This will
        // raise an error if the file is invalid, just like the explicit provided
        // config file.
        let default_config = PathBuf::from(METAFETCH_CONFIG_FILE);
        if default_config.is_file() {
            match Config::load_from_file(&default_config) {
                Ok(c) => opts.config.merge(c),
                Err(e) => {
                    bail!(
                        "Cannot load default configuration file `{}`: {e:?}",
                        default_config.display()
                    );
                }
            }
        }
    }

    // Reject an unusable rate limit before anything is read or sent
    let rate_limit = opts.config.rate_limit().validate()?;
    opts.config.concurrency = rate_limit.concurrency;

    Ok(opts)
}

/// Set up runtime and call metafetch entrypoint
fn run_main() -> Result<i32> {
    use std::process::exit;

    let opts = match load_config() {
        Ok(opts) => opts,
        Err(e) => {
            error!(
                "Error while loading config: {e}\n\
                See: https://github.com/metafetch/metafetch/blob/v{}/metafetch.example.toml",
                crate_version!()
            );
            exit(ExitCode::ConfigFile as i32);
        }
    };

    let runtime = match opts.config.threads {
        Some(threads) => {
            // We define our own runtime instead of the `tokio::main` attribute
            // since we want to make the number of threads configurable
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(threads)
                .enable_all()
                .build()?
        }
        None => tokio::runtime::Runtime::new()?,
    };

    match runtime.block_on(run(&opts)) {
        Err(e) if Some(ErrorKind::BrokenPipe) == underlying_io_error_kind(&e) => {
            exit(ExitCode::Success as i32);
        }
        res => res,
    }
}

/// Check if the given error can be traced back to an `io::ErrorKind`
/// This is helpful for troubleshooting the root cause of an error.
/// Code is taken from the anyhow documentation.
fn underlying_io_error_kind(error: &Error) -> Option<io::ErrorKind> {
    for cause in error.chain() {
        if let Some(io_error) = cause.downcast_ref::<io::Error>() {
            return Some(io_error.kind());
        }
    }
    None
}

/// Run metafetch on the given input
async fn run(opts: &MetafetchOptions) -> Result<i32> {
    let source = opts.input();
    let keys = source
        .read_keys()
        .with_context(|| format!("Cannot read file IDs from {source}"))?;
    info!("Read {} unique file ID(s) from {source}", keys.len());

    // Fail on a broken fields file before spending any quota
    let tsv_fields = opts
        .config
        .tsv
        .as_deref()
        .map(writer::load_fields)
        .transpose()?;

    let client = client::create(&opts.config)?;
    let cancel = CancellationToken::new();
    commands::fetch::cancel_on_interrupt(&cancel, opts.config.max_runtime);

    let params = CommandParams {
        client,
        requests: input::requests(keys, opts.config.fields().as_ref()).collect(),
        cancel: cancel.clone(),
        cfg: opts.config.clone(),
    };
    let (result, stats, exit_code) = commands::fetch(params).await?;
    // Stop listening for Ctrl-C
    cancel.cancel();

    writer::write_json(&opts.output, &result, opts.config.indent)?;
    if let Some(fields) = tsv_fields {
        writer::write_tsv(&opts.output, &result, &fields)?;
    }

    if !opts.config.verbose.is_quiet() {
        eprintln!("{stats}");
    }

    Ok(exit_code as i32)
}
