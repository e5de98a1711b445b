//! Logging and tracing configuration
//!
//! Logs are controlled by the `RUST_LOG` environment variable.
//! Default level is INFO for this crate, WARN for dependencies.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "autopilot=info,warn";

/// Initialize tracing for the CLI and dashboard (stderr logging)
///
/// `verbose` lowers the crate level to DEBUG unless `RUST_LOG` is set.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("autopilot=debug,warn")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// Replace a bearer credential with a fixed mask for log output
pub fn mask_authorization(value: &str) -> String {
    match value.strip_prefix("Bearer ") {
        Some(_) => "Bearer ****".to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_authorization() {
        assert_eq!(mask_authorization("Bearer abc.def"), "Bearer ****");
        assert_eq!(mask_authorization("Basic xyz"), "Basic xyz");
    }
}
