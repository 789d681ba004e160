use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::console::ConsoleWriter;

/// Installs the global subscriber. `RUST_LOG` wins; otherwise `debug` picks DEBUG over INFO.
pub fn init_tracing(debug: bool) -> Result<(), eyre::Report> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(if debug { "debug" } else { "info" }),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_file(false)
                .with_line_number(false)
                .with_thread_names(false)
                .with_writer(ConsoleWriter),
        )
        .with(filter)
        .try_init()?;

    Ok(())
}
