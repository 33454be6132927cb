// =============================================================================
// HTTP Market Feed — the production `MarketFeed`
// =============================================================================

use std::future::Future;

use anyhow::Result;
use tracing::debug;

use super::btc_price::SpotPriceClient;
use super::fx_rate::FxRateClient;
use super::live_users::LiveUsersClient;
use super::MarketFeed;
use crate::runtime_config::RuntimeConfig;

/// Talks to the real FX, spot price and record store endpoints over one
/// shared reqwest client.
pub struct HttpMarketFeed {
    fx: FxRateClient,
    btc: SpotPriceClient,
    users: LiveUsersClient,
}

impl HttpMarketFeed {
    /// Build the feed from config. The client timeout is the per-fetch bound.
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .build()
            .expect("failed to build reqwest client for HttpMarketFeed");

        debug!(
            fx = %config.fx_endpoint,
            btc = %config.btc_endpoint,
            live_users_configured = !config.live_users.base_url.is_empty(),
            "HttpMarketFeed initialised"
        );

        Self {
            fx: FxRateClient::with_client(
                client.clone(),
                config.fx_endpoint.clone(),
                config.local_currency.clone(),
            ),
            btc: SpotPriceClient::with_client(client.clone(), config.btc_endpoint.clone()),
            users: LiveUsersClient::with_client(client, config.live_users.clone()),
        }
    }
}

impl MarketFeed for HttpMarketFeed {
    fn exchange_rate(&self) -> impl Future<Output = Result<f64>> + Send {
        self.fx.fetch()
    }

    fn btc_price(&self) -> impl Future<Output = Result<u64>> + Send {
        self.btc.fetch()
    }

    fn live_users(&self) -> impl Future<Output = Result<u64>> + Send {
        self.users.fetch()
    }
}
