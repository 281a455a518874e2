use std::{
    io::IsTerminal,
    sync::atomic::{AtomicBool, Ordering},
};

use stacked_errors::{Result, StackableErr};
use tracing_subscriber::EnvFilter;

/// Set by the handler that [std_init] installs
pub static CTRLC_ISSUED: AtomicBool = AtomicBool::new(false);

/// Sets up a `tracing_subscriber` (`info` level unless `RUST_LOG` says
/// otherwise) writing to stderr, and the ctrl-c handler. Stdout is left to the
/// bot.
///
/// With the handler installed, Ctrl-C no longer kills this process. The
/// foreground container command still receives the interrupt from the
/// terminal and exits on its own, after which the image cleanup can run.
pub fn std_init() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
    ctrlc::set_handler(move || {
        CTRLC_ISSUED.store(true, Ordering::SeqCst);
    })
    .stack_err_locationless("std_init -> failed to set the ctrl-c handler")?;
    Ok(())
}

/// Returns if `CTRLC_ISSUED` has been set, and resets it to `false`
pub fn ctrlc_issued_reset() -> bool {
    CTRLC_ISSUED.swap(false, Ordering::SeqCst)
}
