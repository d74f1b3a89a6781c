use crate::Result;

/// Initialize tracing output for the process.
///
/// Without the `tracing` feature this is a no-op; the runtime logs through
/// the tagged println/eprintln lines instead. The API stays stable either
/// way so callers don't have to care.
pub fn init(service_name: &str) -> Result<()> {
    let _ = service_name;

    #[cfg(feature = "tracing")]
    {
        use tracing_subscriber::{fmt, EnvFilter};

        // Defaults to info for our crates; override with `RUST_LOG`.
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("info,gramcast_core=info,{service_name}=info"))
        });

        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(true)
            .init();
    }

    Ok(())
}
