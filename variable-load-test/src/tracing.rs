use tracing_subscriber::EnvFilter;

/// Default directives when `RUST_LOG` is unset: errors from dependencies, everything from the
/// load generator.
const DEFAULT_DIRECTIVES: &str = "ERROR,variable_load=TRACE";

/// Installs a subscriber that writes through the test harness' capture.
///
/// `RUST_LOG` replaces the default directives, for example `RUST_LOG=variable_load::pacing=debug`
/// to follow a single module while debugging a test. Only the first call per test binary takes
/// effect.
///
/// # Example
///
/// ```
/// variable_load_test::tracing::init();
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_test_writer()
        .compact()
        .try_init()
        .ok();
}
