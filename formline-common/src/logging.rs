//! Log output for the Formline binaries.
//!
//! Events are tagged with the direction of the traffic they describe:
//! [`outgoing!`](crate::outgoing) for commands sent to an SMTP server,
//! [`incoming!`](crate::incoming) for its replies and
//! [`internal!`](crate::internal) for everything the service decides on its
//! own. Each macro opens a span named after the direction, so the compact
//! formatter prints it in front of the message.

use std::str::FromStr;

use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    Layer, filter::FilterFn, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

/// Environment variable holding the log level, e.g. `debug` or `warn`.
pub const LEVEL_ENV: &str = "LOG_LEVEL";

const TARGET_PREFIX: &str = "formline";

#[doc(hidden)]
#[macro_export]
macro_rules! directed_event {
    ($level:expr, $direction:expr, $($msg:expr),*) => {{
        let span = $crate::tracing::span!($level, $direction);
        let _enter = span.enter();

        $crate::tracing::event!($level, $($msg),*)
    }};
}

/// Log a command written to a remote SMTP server. TRACE unless a level is
/// given.
#[macro_export]
macro_rules! outgoing {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::directed_event!($crate::tracing::Level::$level, "outgoing", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::outgoing!(level = TRACE, $($msg),*)
    };
}

/// Log a reply read from a remote SMTP server.
#[macro_export]
macro_rules! incoming {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::directed_event!($crate::tracing::Level::$level, "incoming", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::incoming!(level = TRACE, $($msg),*)
    };
}

/// Log a service event: start-up, shutdown, store and workflow decisions.
#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::directed_event!($crate::tracing::Level::$level, "internal", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::internal!(level = TRACE, $($msg),*)
    };
}

const fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    }
}

/// Parse a configured level. `None` and unparseable values give the build
/// default; the latter is reported on stderr since no subscriber exists yet.
fn parse_level(configured: Option<&str>) -> LevelFilter {
    let Some(configured) = configured else {
        return default_level();
    };

    LevelFilter::from_str(configured.trim()).unwrap_or_else(|_| {
        let fallback = default_level();
        eprintln!("{LEVEL_ENV}={configured:?} is not a log level, using {fallback}");
        fallback
    })
}

/// Install the global subscriber: compact lines with RFC 3339 UTC
/// timestamps, limited to Formline's own targets.
///
/// Calling it again, or after a test installed its own subscriber, leaves
/// the existing one in place.
pub fn init() {
    let level = parse_level(std::env::var(LEVEL_ENV).ok().as_deref());

    let formatter = tracing_subscriber::fmt::layer()
        .compact()
        .with_ansi(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
        .with_filter(level)
        .with_filter(FilterFn::new(|metadata| {
            metadata.target().starts_with(TARGET_PREFIX)
        }));

    if tracing_subscriber::Registry::default()
        .with(formatter)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global subscriber already installed, keeping it");
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_named_levels_parse_case_insensitively() {
        assert_eq!(parse_level(Some("warn")), LevelFilter::WARN);
        assert_eq!(parse_level(Some("DEBUG")), LevelFilter::DEBUG);
        assert_eq!(parse_level(Some(" off ")), LevelFilter::OFF);
    }

    #[test]
    fn test_unset_or_invalid_level_uses_build_default() {
        assert_eq!(parse_level(None), default_level());
        assert_eq!(parse_level(Some("chatty")), default_level());
    }

    #[test]
    fn test_macros_accept_format_arguments() {
        let attempt = 2;
        crate::internal!(level = DEBUG, "Retrying store write, attempt {attempt}");
        crate::outgoing!("EHLO {}", "forms.test");
        crate::incoming!(level = WARN, "421 {}", "service closing");
    }
}
