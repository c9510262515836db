use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Installs the global tracing subscriber, writing to stderr.
///
/// `filter` (the `--log` flag) wins over `RUST_LOG`. With neither set no
/// subscriber is installed and every event is discarded. Only the first call
/// has any effect.
pub fn init_tracing(filter: Option<&str>) {
    INIT.call_once(|| {
        let env_filter = match filter {
            Some(directives) => EnvFilter::new(directives),
            None => match EnvFilter::try_from_default_env() {
                Ok(env_filter) => env_filter,
                Err(_) => return,
            },
        };

        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .with(env_filter)
            .try_init();
    });
}
