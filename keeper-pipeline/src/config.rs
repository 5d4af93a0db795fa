//! Keeper configuration.

use std::path::Path;

use anyhow::{Context, Result};
use keeper_clients::price_feed::COINGECKO_PRO_URL;
use keeper_core::peg::PEGGED_USD_PRICE;
use keeper_core::{FixedDecimal, U256};
use serde::Deserialize;

pub const API_KEY_VAR: &str = "KEEPER_PRICE_FEED_API_KEY";
pub const PRICE_FEED_URL_VAR: &str = "KEEPER_PRICE_FEED_URL";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PriceFeedConfig {
  pub api_key: String,
  pub base_url: String,
  /// Feed identifier of the reference token.
  pub reference_token_id: String,
}

impl Default for PriceFeedConfig {
  fn default() -> PriceFeedConfig {
    PriceFeedConfig {
      api_key: String::new(),
      base_url: COINGECKO_PRO_URL.to_string(),
      reference_token_id: "celo-dollar".to_string(),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
  /// Seconds from submission until the swap reverts.
  pub deadline_secs: u64,
  /// Net transfer limit per asset, in tokens.
  pub limit: FixedDecimal,
  /// Raw on-chain minimum output.
  pub min_total_amount_out: u128,
}

impl Default for SwapConfig {
  fn default() -> SwapConfig {
    SwapConfig {
      deadline_secs: 3600,
      limit: FixedDecimal::from_int(1_000_000),
      min_total_amount_out: 100_000_000,
    }
  }
}

impl SwapConfig {
  #[must_use]
  pub fn min_total_amount_out(&self) -> U256 {
    U256::from(self.min_total_amount_out)
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KeeperConfig {
  pub price_feed: PriceFeedConfig,
  /// Reference price used when the feed cannot be reached.
  pub fallback_reference_price: FixedDecimal,
  pub pegged_currency_usd_price: FixedDecimal,
  /// Relayer balances below this raise a warning.
  pub min_token_balance: FixedDecimal,
  pub reference_oracle_confirmations: u64,
  pub reserve_token_oracle_confirmations: u64,
  pub correction_confirmations: u64,
  pub swap: SwapConfig,
  pub notification_channel: String,
  /// Webhook for operator notifications; logged only when unset.
  pub notification_webhook: Option<String>,
}

impl Default for KeeperConfig {
  fn default() -> KeeperConfig {
    KeeperConfig {
      price_feed: PriceFeedConfig::default(),
      fallback_reference_price: FixedDecimal::one(),
      pegged_currency_usd_price: PEGGED_USD_PRICE,
      min_token_balance: FixedDecimal::from_int(50),
      reference_oracle_confirmations: 2,
      reserve_token_oracle_confirmations: 1,
      correction_confirmations: 1,
      swap: SwapConfig::default(),
      notification_channel: "Kolektivo Notifications".to_string(),
      notification_webhook: None,
    }
  }
}

impl KeeperConfig {
  /// # Errors
  /// * Malformed TOML
  pub fn from_toml(text: &str) -> Result<KeeperConfig> {
    toml::from_str(text).context("invalid keeper configuration")
  }

  /// Reads a TOML file and applies environment overrides.
  ///
  /// # Errors
  /// * Unreadable file or malformed TOML
  pub fn load(path: &Path) -> Result<KeeperConfig> {
    let text = std::fs::read_to_string(path)
      .with_context(|| format!("failed to read {}", path.display()))?;
    let mut config = KeeperConfig::from_toml(&text)?;
    config.apply_overrides(|name| std::env::var(name).ok());
    Ok(config)
  }

  /// Defaults with environment overrides applied.
  #[must_use]
  pub fn from_env() -> KeeperConfig {
    let mut config = KeeperConfig::default();
    config.apply_overrides(|name| std::env::var(name).ok());
    config
  }

  pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(key) = lookup(API_KEY_VAR) {
      self.price_feed.api_key = key;
    }
    if let Some(url) = lookup(PRICE_FEED_URL_VAR) {
      self.price_feed.base_url = url;
    }
  }
}
