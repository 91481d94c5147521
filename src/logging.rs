/// Installs a `tracing` fmt subscriber filtered by `RUST_LOG`.
///
/// `RUST_LOG=rbxweb=debug` shows every outbound attempt, including CSRF retries.
/// Calling it more than once (e.g. from several tests) is a no-op after the first call.
pub fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
