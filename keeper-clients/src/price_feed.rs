//! External fiat price source.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use keeper_core::{CoreError, FixedDecimal};
use serde::Deserialize;
use tracing::debug;

/// Default CoinGecko endpoint for keyed access.
pub const COINGECKO_PRO_URL: &str = "https://pro-api.coingecko.com/api/v3";

/// Quote currency requested from the feed.
pub const QUOTE_CURRENCY: &str = "usd";

#[async_trait::async_trait]
pub trait PriceFeed: Send + Sync {
  /// USD price of the asset the feed knows as `token_id`.
  ///
  /// # Errors
  /// * `PriceUnavailable` on transport failure or a missing price
  async fn fetch_fiat_price(
    &self,
    token_id: &str,
  ) -> std::result::Result<FixedDecimal, CoreError>;
}

#[derive(Debug, Deserialize)]
pub struct CoinResponse {
  #[serde(default)]
  pub market_data: Option<MarketData>,
}

#[derive(Debug, Deserialize)]
pub struct MarketData {
  #[serde(default)]
  pub current_price: HashMap<String, f64>,
}

impl CoinResponse {
  /// USD price from the market data block.
  ///
  /// # Errors
  /// * No positive USD price in the response
  pub fn usd_price(&self) -> Result<FixedDecimal> {
    let price = self
      .market_data
      .as_ref()
      .and_then(|data| data.current_price.get(QUOTE_CURRENCY))
      .copied()
      .context("response carries no usd price")?;
    if !price.is_finite() || price <= 0.0 {
      bail!("non-positive usd price {price}");
    }
    FixedDecimal::from_f64(price)
      .with_context(|| format!("usd price {price} out of range"))
  }
}

/// CoinGecko coin-detail client.
pub struct CoinGeckoClient {
  base_url: String,
  api_key: String,
  client: reqwest::Client,
}

impl CoinGeckoClient {
  #[must_use]
  pub fn new(
    base_url: impl Into<String>,
    api_key: impl Into<String>,
  ) -> CoinGeckoClient {
    CoinGeckoClient {
      base_url: base_url.into(),
      api_key: api_key.into(),
      client: reqwest::Client::new(),
    }
  }

  async fn coin(&self, token_id: &str) -> Result<CoinResponse> {
    let url = format!("{}/coins/{token_id}", self.base_url);
    debug!(token_id, "fetching fiat price");
    let resp = self
      .client
      .get(&url)
      .query(&[
        ("localization", "false"),
        ("tickers", "false"),
        ("market_data", "true"),
        ("community_data", "false"),
        ("developer_data", "false"),
        ("sparkline", "false"),
        ("x_cg_pro_api_key", self.api_key.as_str()),
      ])
      .send()
      .await
      .context("price request failed")?;
    if !resp.status().is_success() {
      bail!("price request returned HTTP {}", resp.status());
    }
    resp.json().await.context("malformed price response")
  }
}

#[async_trait::async_trait]
impl PriceFeed for CoinGeckoClient {
  async fn fetch_fiat_price(
    &self,
    token_id: &str,
  ) -> std::result::Result<FixedDecimal, CoreError> {
    self
      .coin(token_id)
      .await
      .and_then(|coin| coin.usd_price())
      .map_err(|e| CoreError::PriceUnavailable(format!("{token_id}: {e:#}")))
  }
}

/// Feed that always answers with the same price.
#[derive(Clone, Debug)]
pub struct StaticPriceFeed {
  price: Option<FixedDecimal>,
}

impl StaticPriceFeed {
  #[must_use]
  pub fn new(price: FixedDecimal) -> StaticPriceFeed {
    StaticPriceFeed { price: Some(price) }
  }

  /// Feed whose every request fails.
  #[must_use]
  pub fn unavailable() -> StaticPriceFeed {
    StaticPriceFeed { price: None }
  }
}

#[async_trait::async_trait]
impl PriceFeed for StaticPriceFeed {
  async fn fetch_fiat_price(
    &self,
    token_id: &str,
  ) -> std::result::Result<FixedDecimal, CoreError> {
    self
      .price
      .ok_or_else(|| CoreError::PriceUnavailable(token_id.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_usd_from_market_data() -> Result<()> {
    let body = r#"{
      "id": "celo-dollar",
      "market_data": { "current_price": { "eur": 0.93, "usd": 0.998 } }
    }"#;
    let coin: CoinResponse = serde_json::from_str(body)?;
    assert_eq!(coin.usd_price()?, "0.998".parse::<FixedDecimal>()?);
    Ok(())
  }

  #[test]
  fn missing_market_data_is_an_error() -> Result<()> {
    let coin: CoinResponse = serde_json::from_str(r#"{ "id": "x" }"#)?;
    assert!(coin.usd_price().is_err());
    let coin: CoinResponse = serde_json::from_str(
      r#"{ "market_data": { "current_price": { "usd": 0 } } }"#,
    )?;
    assert!(coin.usd_price().is_err());
    Ok(())
  }

  #[tokio::test]
  async fn static_feed() -> Result<()> {
    let feed = StaticPriceFeed::new(FixedDecimal::one());
    assert_eq!(feed.fetch_fiat_price("any").await?, FixedDecimal::one());
    assert_eq!(
      StaticPriceFeed::unavailable().fetch_fiat_price("any").await,
      Err(CoreError::PriceUnavailable("any".to_string()))
    );
    Ok(())
  }
}
