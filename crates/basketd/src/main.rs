//! # basketd
//!
//! basket server binary: loads settings, wires the verifier, store and
//! broadcast binding together, and serves until Ctrl-C.

#![deny(unsafe_code)]

mod logging;
mod wiring;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use basket_settings::{BasketSettings, BroadcastMode};
use clap::Parser;

/// basket list-sync server.
#[derive(Parser, Debug)]
#[command(name = "basketd", about = "basket list-sync server")]
struct Cli {
    /// Settings file (defaults to `~/.basket/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Broadcast binding: `hosted` or `gateway` (overrides settings).
    #[arg(long)]
    mode: Option<BroadcastMode>,
}

impl Cli {
    /// Load layered settings, then apply CLI flags on top.
    fn settings(&self) -> Result<BasketSettings> {
        let path = self.config.clone().unwrap_or_else(basket_settings::settings_path);
        let loaded = basket_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        self.resolve(loaded)
    }

    /// Apply CLI flags to `loaded` and validate the result once.
    fn resolve(&self, mut loaded: BasketSettings) -> Result<BasketSettings> {
        self.apply_overrides(&mut loaded);
        loaded.validate().context("Invalid settings")?;
        Ok(loaded)
    }

    fn apply_overrides(&self, settings: &mut BasketSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(mode) = self.mode {
            settings.broadcast.mode = mode;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.settings()?;
    logging::init_subscriber(&settings.logging);

    let server = wiring::build_server(&settings)?;
    let handle = server.listen().await.context("Failed to bind server")?;
    tracing::info!(
        "basket listening on http://{} (mode: {})",
        handle.addr,
        settings.broadcast.mode
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server
        .shutdown()
        .graceful_shutdown(
            vec![handle.into_join_handle()],
            Duration::from_secs(settings.server.shutdown_timeout_secs),
        )
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_overrides() {
        let cli = Cli::parse_from([
            "basketd",
            "--config",
            "/etc/basket.json",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--mode",
            "gateway",
        ]);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/etc/basket.json")));
        assert_eq!(cli.mode, Some(BroadcastMode::Gateway));

        let mut settings = BasketSettings::default();
        cli.apply_overrides(&mut settings);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.broadcast.mode, BroadcastMode::Gateway);
    }

    #[test]
    fn no_flags_keep_settings() {
        let cli = Cli::parse_from(["basketd"]);
        let mut settings = BasketSettings::default();
        settings.server.port = 1234;
        cli.apply_overrides(&mut settings);
        assert_eq!(settings.server.port, 1234);
        assert_eq!(settings.broadcast.mode, BroadcastMode::Hosted);
    }

    #[test]
    fn mode_flag_rescues_incomplete_gateway_file() {
        let mut loaded = BasketSettings::default();
        loaded.identity.project_id = "demo".into();
        loaded.broadcast.mode = BroadcastMode::Gateway;

        assert!(Cli::parse_from(["basketd"]).resolve(loaded.clone()).is_err());
        let settings = Cli::parse_from(["basketd", "--mode", "hosted"])
            .resolve(loaded)
            .unwrap();
        assert_eq!(settings.broadcast.mode, BroadcastMode::Hosted);
    }

    #[test]
    fn unknown_mode_rejected() {
        assert!(Cli::try_parse_from(["basketd", "--mode", "carrier-pigeon"]).is_err());
    }
}
