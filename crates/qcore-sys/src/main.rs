// Entry point for the headless host
//
//   qcore [-basedir <dir>] [-game <dir>] [-connect <address>]
//         [-record <file> | -playback <file>] [-frames <n>] [-frametime <sec>]
//         [+set <cvar> <value>] [+<command> <args>]...
//
// Logging is controlled with RUST_LOG.

use std::process;

use tracing_subscriber::EnvFilter;

use qcore_common::common::{ComArgs, Console};
use qcore_common::error::QError;
use qcore_sys::sys_null;

/// Report a fatal error and exit.
fn sys_error(error: &QError) -> ! {
    tracing::error!(%error, "fatal");
    eprintln!("Error: {}", error);
    process::exit(1);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = ComArgs::from_args(std::env::args());
    if let Err(e) = sys_null::sys_main(args, Console::new()) {
        sys_error(&e);
    }
}
