//! Tracing subscriber setup.
//!
//! The crates log through `tracing`; nothing is printed until a subscriber is
//! installed. The filter comes from `RUST_LOG` and defaults to `info`, e.g.
//! `RUST_LOG=lectern_http=debug` shows every transmission and its attempt number.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a human-readable subscriber.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Install a subscriber emitting one JSON object per event.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing_json() -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter())
        .with_current_span(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_refused() {
        // Whichever runs first wins; the other must not panic.
        let first = init_tracing();
        let second = init_tracing_json();
        assert!(!(first && second));
    }
}
