use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

/// Targets of the soak crates, logged at `TRACE` in tests.
const SOAK_TARGETS: &[&str] = &["iosoak", "iosoak_engine", "iosoak_runner"];

/// Captures logs of a test in the output of the Rust test runner.
///
/// `RUST_LOG` replaces the default filter, which shows everything the soak crates log and only
/// errors from dependencies. Calling this more than once is fine.
///
/// ```
/// iosoak_test::tracing::init();
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        SOAK_TARGETS
            .iter()
            .filter_map(|target| format!("{target}=trace").parse::<Directive>().ok())
            .fold(EnvFilter::new("error"), |filter, directive| {
                filter.add_directive(directive)
            })
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .without_time()
        .compact()
        .try_init()
        .ok();
}
