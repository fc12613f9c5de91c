//! Subscriber installation

use std::sync::Once;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive, e.g. `persistx=trace`
pub const LOG_ENV: &str = "PERSISTX_LOG";

/// Output profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable lines
    Development,
    /// JSON lines
    Production,
    /// No output; pair with `init_test_capture()`
    Test,
}

impl Profile {
    /// Filter used when `PERSISTX_LOG` is unset or unparsable
    pub fn default_directive(self) -> &'static str {
        match self {
            Profile::Development => "persistx=debug",
            Profile::Production => "persistx=info",
            Profile::Test => "off",
        }
    }

    fn filter(self) -> EnvFilter {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(self.default_directive()))
    }
}

static INSTALLED: Once = Once::new();

/// Install the global subscriber for `profile`
///
/// Later calls are ignored. Logs go to stderr; stdout belongs to command
/// output.
pub fn init(profile: Profile) {
    INSTALLED.call_once(|| {
        let builder = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(profile.filter());
        match profile {
            Profile::Development => builder.with_target(false).init(),
            Profile::Production => builder.json().with_current_span(false).init(),
            Profile::Test => tracing_subscriber::registry().init(),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_to_persistx_crates() {
        assert_eq!(Profile::Development.default_directive(), "persistx=debug");
        assert_eq!(Profile::Production.default_directive(), "persistx=info");
        assert_eq!(Profile::Test.default_directive(), "off");
    }
}
