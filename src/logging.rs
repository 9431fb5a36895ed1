//! Structured logging setup. One subscriber installed once from `main`,
//! matching spec.md §6's `<timestamp> <level> <file>:<line> <public>:<private>
//! <message>` line shape — the original program got the same shape from
//! logrus's `SetReportCaller`; here `tracing-subscriber`'s `fmt` layer does
//! it natively via `with_file`/`with_line_number`.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `debug` corresponds to the `-d/--debug`
/// CLI flag.
pub fn init(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .init();
}

/// Test-only subscriber that writes to the test harness's captured output
/// instead of stdout.
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
