//! Builds a [`BasketServer`] from settings.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use basket_auth::{HttpKeyFetcher, IdentityVerifier, KeyCache, SystemClock, VerifierConfig};
use basket_server::broadcast::GatewayClient;
use basket_server::store::MemoryListStore;
use basket_server::topics::TopicHub;
use basket_server::{BasketServer, ServerConfig, Transport};
use basket_settings::{BasketSettings, BroadcastMode, IdentitySettings};

/// Verifier backed by the configured key endpoint.
pub fn build_verifier(identity: &IdentitySettings) -> Result<IdentityVerifier> {
    let fetcher = HttpKeyFetcher::new(
        identity.keys_url.clone(),
        identity.default_key_ttl_secs,
        Duration::from_secs(identity.fetch_timeout_secs),
    )
    .context("Failed to build key fetch client")?;
    let clock = Arc::new(SystemClock);
    let keys = Arc::new(KeyCache::new(
        Arc::new(fetcher),
        clock.clone(),
        identity.min_key_refresh_secs,
    ));
    let config = VerifierConfig::new(identity.project_id.clone(), identity.expected_issuer());
    Ok(IdentityVerifier::new(config, keys, clock))
}

/// Broadcast binding selected by `broadcast.mode`.
pub fn build_transport(settings: &BasketSettings) -> Result<Transport> {
    Ok(match settings.broadcast.mode {
        BroadcastMode::Hosted => Transport::Hosted(Arc::new(TopicHub::new())),
        BroadcastMode::Gateway => {
            let client = GatewayClient::new(&settings.broadcast.gateway).context("Failed to build relay client")?;
            Transport::Gateway(Arc::new(client))
        }
    })
}

/// Wire everything together.
pub fn build_server(settings: &BasketSettings) -> Result<BasketServer> {
    let verifier = build_verifier(&settings.identity)?;
    let transport = build_transport(settings)?;
    tracing::debug!(mode = %settings.broadcast.mode, project = %settings.identity.project_id, "wiring server");
    Ok(BasketServer::new(
        ServerConfig::from(&settings.server),
        verifier,
        Arc::new(MemoryListStore::new()),
        transport,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(mode: BroadcastMode) -> BasketSettings {
        let mut settings = BasketSettings::default();
        settings.identity.project_id = "demo".into();
        settings.server.host = "127.0.0.1".into();
        settings.server.port = 0;
        settings.broadcast.mode = mode;
        settings.broadcast.gateway.app_id = "app".into();
        settings.broadcast.gateway.api_key = "key".into();
        settings
    }

    #[test]
    fn verifier_uses_project_issuer() {
        let verifier = build_verifier(&settings(BroadcastMode::Hosted).identity).unwrap();
        assert_eq!(verifier.config().audience, "demo");
        assert_eq!(verifier.config().issuer, "https://securetoken.google.com/demo");
    }

    #[test]
    fn transport_follows_mode() {
        assert!(matches!(
            build_transport(&settings(BroadcastMode::Hosted)).unwrap(),
            Transport::Hosted(_)
        ));
        assert!(matches!(
            build_transport(&settings(BroadcastMode::Gateway)).unwrap(),
            Transport::Gateway(_)
        ));
    }

    #[tokio::test]
    async fn wired_server_reports_mode() {
        for mode in [BroadcastMode::Hosted, BroadcastMode::Gateway] {
            let server = build_server(&settings(mode)).unwrap();
            let handle = server.listen().await.unwrap();
            let body: serde_json::Value = reqwest::get(format!("http://{}/health", handle.addr))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            assert_eq!(body["mode"], mode.as_str());
            server
                .shutdown()
                .graceful_shutdown(vec![handle.into_join_handle()], Duration::from_secs(5))
                .await;
        }
    }
}
