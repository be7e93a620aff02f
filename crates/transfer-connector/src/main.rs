//! transfer-connector: prepares a data directory, validates its
//! configuration, and prints the effective settings.
//!
//! Exits non-zero when the configuration is invalid, so a host can run it as
//! a preflight check before accepting connections.

use std::path::PathBuf;

use transfer_connector::bootstrap::prepare;
use transfer_connector::ServerTransfer;

fn main() -> anyhow::Result<()> {
    let data_dir = {
        let args: Vec<String> = std::env::args().collect();
        args.iter()
            .position(|a| a == "--data-dir")
            .and_then(|i| args.get(i + 1).cloned())
            .or_else(|| args.get(1).filter(|a| !a.starts_with('-')).cloned())
            .or_else(|| std::env::var("TRANSFER_DATA_DIR").ok())
            .unwrap_or_else(|| "transfer-connector".to_string())
    };

    // Tracing is configured from the file, so it is prepared first.
    let prepared = prepare(&PathBuf::from(data_dir))?;

    // The tonic OTLP exporter needs a reactor context.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let _tracing_guard = transfer_tracing::init_tracing(prepared.config().tracing());

        let plugin = ServerTransfer::bootstrap(prepared);
        println!("{}", serde_json::to_string_pretty(plugin.config())?);
        Ok::<(), anyhow::Error>(())
    })
}
