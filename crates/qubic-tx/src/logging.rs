//! Tracing subscriber setup for binaries and embedding hosts.

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "info,qubic_tx=info,hyper_util=warn,reqwest=warn";

/// Installs a formatted subscriber filtered by `RUST_LOG`.
///
/// Does nothing when a global subscriber is already installed.
pub fn init_tracing() {
    if tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .try_init()
        .is_err()
    {
        // Host already installed a subscriber.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init_tracing();
        init_tracing();
        tracing::info!(filter = DEFAULT_LOG_FILTER, "tracing ready");
    }
}
