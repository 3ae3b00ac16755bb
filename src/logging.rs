//! env_logger setup for the binary: `LEVEL  target  message` on stderr, crate prefix stripped.

use std::io::Write;

const CRATE_PREFIX: &str = "vidpress::";

/// Drops the `vidpress::` prefix so lines stay short; other crates' targets are kept as-is.
pub fn short_target(target: &str) -> &str {
    target.strip_prefix(CRATE_PREFIX).unwrap_or(target)
}

/// Installs the global logger. `RUST_LOG` wins over `verbose`. Safe to call more than once.
pub fn init(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let result = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter),
    )
    .format(|buf, record| {
        writeln!(
            buf,
            "{level:5}  {target}  {message}",
            level = record.level(),
            target = short_target(record.target()),
            message = record.args()
        )
    })
    .try_init();

    if result.is_ok() {
        log::debug!(target: "vidpress::logging", "logger initialized (default filter {})", default_filter);
    }
}
