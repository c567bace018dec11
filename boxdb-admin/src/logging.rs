// Thin bootstrap over `tracing_subscriber`, mirroring how a real server
// sets up logging before it opens the engine. Controlled by `RUST_LOG`
// the same way any `tracing`-based binary in this workspace is.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    // A second call (e.g. from a test harness that already installed one)
    // is not an error; the engine should still function without logging.
    let _ = tracing::subscriber::set_global_default(subscriber);
}
