use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Run configuration for a [`TestRunner`](crate::engine::TestRunner).
///
/// A `timeout` of zero disables the wall-clock check; the example budgets
/// always apply.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Size of the initial and mutation buffers.
    pub buffer_size: usize,
    /// Cap on valid-or-better executions during generation.
    pub max_examples: u64,
    /// Cap on total executions considered during generation.
    pub max_iterations: u64,
    /// Executions between fresh random buffers during generation.
    pub max_mutations: u64,
    /// Cap on accepted shrinks.
    pub max_shrinks: u64,
    /// Wall-clock cap on the whole run.
    pub timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            buffer_size: 8 * 1024,
            max_examples: 200,
            max_iterations: 1000,
            max_mutations: 10,
            max_shrinks: 500,
            timeout: Duration::from_secs(60),
        }
    }
}

const BUFFER_SIZE: &str = "CONJECTURE_BUFFER_SIZE";
const MAX_EXAMPLES: &str = "CONJECTURE_MAX_EXAMPLES";
const MAX_ITERATIONS: &str = "CONJECTURE_MAX_ITERATIONS";
const MAX_MUTATIONS: &str = "CONJECTURE_MAX_MUTATIONS";
const MAX_SHRINKS: &str = "CONJECTURE_MAX_SHRINKS";
const TIMEOUT: &str = "CONJECTURE_TIMEOUT";

impl Settings {
    /// Defaults with `CONJECTURE_*` environment overrides applied. The
    /// timeout override is in whole seconds. Values that fail to parse are
    /// skipped with a warning.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        parse_or_warn(BUFFER_SIZE, &mut settings.buffer_size);
        parse_or_warn(MAX_EXAMPLES, &mut settings.max_examples);
        parse_or_warn(MAX_ITERATIONS, &mut settings.max_iterations);
        parse_or_warn(MAX_MUTATIONS, &mut settings.max_mutations);
        parse_or_warn(MAX_SHRINKS, &mut settings.max_shrinks);
        let mut timeout_secs = settings.timeout.as_secs();
        parse_or_warn(TIMEOUT, &mut timeout_secs);
        settings.timeout = Duration::from_secs(timeout_secs);
        settings
    }
}

fn parse_or_warn<T: FromStr + fmt::Display>(var: &str, dst: &mut T) {
    if let Ok(value) = env::var(var) {
        match value.parse() {
            Ok(parsed) => *dst = parsed,
            Err(_) => log::warn!(
                "{}={} can't be parsed, using default of {}",
                var,
                value,
                dst
            ),
        }
    }
}
