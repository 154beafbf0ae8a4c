use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

use crate::{formatters::color::color_for_level, verbosity::Verbosity};

/// Width of the widest level prefix, e.g. `[ERROR]`
const LEVEL_WIDTH: usize = 7;

/// Initialize the logging system with the given verbosity level.
pub(crate) fn init_logging(verbose: &Verbosity) {
    // Set a base level for all modules to `warn`, which is a reasonable default.
    // It will be overridden by RUST_LOG if it's set.
    let env = Env::default().filter_or("RUST_LOG", "warn");

    let mut builder = Builder::from_env(env);
    builder
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false);

    if std::env::var("RUST_LOG").is_err() {
        // Dependencies stay at `warn`; only our own crates get chattier
        // with `-v`.
        builder
            .filter_level(LevelFilter::Warn.min(verbose.log_level_filter()))
            .filter_module("metafetch", verbose.log_level_filter())
            .filter_module("metafetch_lib", verbose.log_level_filter());
    }

    builder.format(move |buf, record| {
        let level = record.level();
        let prefix = format!("{:>LEVEL_WIDTH$}", format!("[{level}]"));
        writeln!(
            buf,
            "{} {}",
            color_for_level(level).apply_to(prefix),
            record.args()
        )
    });

    builder.init();
}
