//! Plugin bootstrap: data directory, default config, and handler wiring.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use crate::config::TransferConfig;
use crate::coordinator::RedirectCoordinator;
use crate::manual::ManualTransferHandler;
use crate::stats::TransferStats;

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration written on first start.
pub const DEFAULT_CONFIG: &str = include_str!("../config.toml");

/// Make sure `data_dir/config.toml` exists, writing the bundled default if
/// it does not. Returns the config file path.
pub fn ensure_default_config(data_dir: &Path) -> io::Result<PathBuf> {
    let path = data_dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        std::fs::create_dir_all(data_dir)?;
        std::fs::write(&path, DEFAULT_CONFIG)?;
    }
    Ok(path)
}

/// A data directory with a loaded, validated configuration, ready to wire.
pub struct Prepared {
    data_dir: PathBuf,
    config: TransferConfig,
    write_error: Option<io::Error>,
}

impl Prepared {
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }
}

/// Write the default config into `data_dir` if missing, then load and
/// validate it. Any configuration error aborts startup.
///
/// Failing to write the default config is not fatal; loading then falls back
/// to defaults and environment overrides. The failure is kept and logged by
/// [`ServerTransfer::bootstrap`], once the subscriber is up.
pub fn prepare(data_dir: &Path) -> anyhow::Result<Prepared> {
    let write_error = ensure_default_config(data_dir).err();
    let config_path = data_dir.join(CONFIG_FILE_NAME);
    let config = TransferConfig::load(&config_path)
        .with_context(|| format!("invalid configuration in {}", config_path.display()))?;
    Ok(Prepared {
        data_dir: data_dir.to_path_buf(),
        config,
        write_error,
    })
}

/// The wired connector: one coordinator and one manual handler sharing a
/// validated configuration and a set of counters.
pub struct ServerTransfer {
    config: Arc<TransferConfig>,
    coordinator: Arc<RedirectCoordinator>,
    manual: ManualTransferHandler,
    stats: TransferStats,
}

impl ServerTransfer {
    /// Wire the handlers for a prepared data directory.
    pub fn bootstrap(prepared: Prepared) -> Self {
        let Prepared {
            data_dir,
            config,
            write_error,
        } = prepared;
        if let Some(e) = write_error {
            tracing::error!(
                error = %e,
                data_dir = %data_dir.display(),
                "Failed to write default config.toml to data directory"
            );
        }
        tracing::info!(data_dir = %data_dir.display(), "Bootstrapping transfer-connector");
        Self::with_config(config)
    }

    pub fn with_config(config: TransferConfig) -> Self {
        let config = Arc::new(config);
        let stats = TransferStats::new();
        let coordinator = Arc::new(RedirectCoordinator::new(config.clone(), stats.clone()));
        let manual = ManualTransferHandler::new(config.clone(), stats.clone());

        tracing::info!(
            direct_connect = config.direct_connect(),
            target = ?config.target().map(|t| t.to_string()),
            marker = %config.cookie_name(),
            channel = %config.channel_name(),
            "Transfer handlers registered"
        );

        Self {
            config,
            coordinator,
            manual,
            stats,
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Arc<RedirectCoordinator> {
        &self.coordinator
    }

    pub fn manual(&self) -> &ManualTransferHandler {
        &self.manual
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigError, DEFAULT_CHANNEL_NAME, DEFAULT_COOKIE_NAME};
    use crate::manual::{encode_manual_frame, MessageSource, LEGACY_CHANNEL};
    use crate::session::{ClientSession, ProtocolVersion};
    use crate::testing::RecordingSession;
    use figment::Jail;

    #[test]
    fn test_bundled_default_config_is_valid() {
        let config = TransferConfig::from_toml_str(DEFAULT_CONFIG).unwrap();
        assert!(!config.direct_connect());
        assert_eq!(config.cookie_name(), DEFAULT_COOKIE_NAME);
        assert_eq!(config.channel_name(), DEFAULT_CHANNEL_NAME);
    }

    #[test]
    fn test_first_start_writes_default_config() {
        Jail::expect_with(|jail| {
            let data_dir = jail.directory().join("plugins/transfer");

            let plugin = ServerTransfer::bootstrap(prepare(&data_dir).unwrap());

            let written = std::fs::read_to_string(data_dir.join(CONFIG_FILE_NAME)).unwrap();
            assert_eq!(written, DEFAULT_CONFIG);
            assert!(!plugin.config().direct_connect());
            Ok(())
        });
    }

    #[test]
    fn test_existing_config_is_kept() {
        Jail::expect_with(|jail| {
            std::fs::create_dir_all(jail.directory().join("data")).unwrap();
            jail.create_file(
                "data/config.toml",
                r#"
                direct-connect = true
                direct-connect-server-address = "backend.example.com:25566"
                "#,
            )?;

            let plugin = ServerTransfer::bootstrap(prepare(Path::new("data")).unwrap());
            assert!(plugin.config().direct_connect());
            Ok(())
        });
    }

    #[test]
    fn test_invalid_cookie_name_fails_startup() {
        Jail::expect_with(|jail| {
            std::fs::create_dir_all(jail.directory().join("data")).unwrap();
            jail.create_file("data/config.toml", "cookie-name = \"Transfer Cookie\"")?;

            let err = match prepare(Path::new("data")) {
                Ok(_) => panic!("startup must fail on an invalid cookie name"),
                Err(e) => e,
            };
            assert!(matches!(
                err.downcast_ref::<ConfigError>(),
                Some(ConfigError::InvalidCookieName { .. })
            ));
            Ok(())
        });
    }

    #[test]
    fn test_unwritable_data_dir_falls_back_to_defaults() {
        Jail::expect_with(|jail| {
            // A file where the data directory should be.
            jail.create_file("blocked", "")?;
            jail.set_env("TRANSFER_DIRECT_CONNECT", "true");
            jail.set_env("TRANSFER_DIRECT_CONNECT_SERVER_ADDRESS", "backend.example.com:25566");

            let prepared = prepare(Path::new("blocked")).unwrap();
            assert!(prepared.write_error.is_some());
            assert!(prepared.config().direct_connect());

            let plugin = ServerTransfer::bootstrap(prepared);
            assert!(plugin.config().direct_connect());
            Ok(())
        });
    }

    #[test]
    fn test_manual_path_is_independent_of_coordinator() {
        let config = TransferConfig::from_toml_str(
            r#"
            direct-connect = true
            direct-connect-server-address = "backend.example.com:25566"
            "#,
        )
        .unwrap();
        let plugin = ServerTransfer::with_config(config);
        let session = RecordingSession::new(ProtocolVersion(767));
        let frame = encode_manual_frame(DEFAULT_CHANNEL_NAME, "play.example.com").unwrap();

        plugin
            .manual()
            .on_plugin_message(MessageSource::Client(&session), LEGACY_CHANNEL, &frame);

        assert_eq!(plugin.coordinator().pending_waits(), 0);
        assert!(!plugin.coordinator().is_marked(session.id()));
        let stats = plugin.stats().snapshot();
        assert_eq!(stats.manual_transfers, 1);
        assert_eq!(stats.redirects, 0);
    }
}
