//! Runs one keeper cycle against a JSON chain fixture and prints the calls it
//! would have submitted.
//!
//! Run with:
//! ```
//! cargo run --bin keeper-dry-run -- keeper-pipeline/tests/data/fixture.json [keeper.toml]
//! ```
//!
//! Without a price feed API key the fixture's reference price is used.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use itertools::Itertools;
use keeper_clients::notifier::{LogNotifier, Notifier, WebhookNotifier};
use keeper_clients::price_feed::{CoinGeckoClient, PriceFeed};
use keeper_pipeline::config::KeeperConfig;
use keeper_pipeline::dry_run::{DryRunChain, DryRunFixture};
use keeper_pipeline::logging;
use keeper_pipeline::pipeline::OracleReportingPipeline;

#[tokio::main]
async fn main() -> Result<()> {
  logging::init();

  let mut args = std::env::args().skip(1);
  let fixture_path = args
    .next()
    .context("usage: keeper-dry-run <fixture.json> [config.toml]")?;
  let config = match args.next() {
    Some(path) => KeeperConfig::load(Path::new(&path))?,
    None => KeeperConfig::from_env(),
  };
  let fixture = DryRunFixture::load(Path::new(&fixture_path))?;

  let price_feed: Arc<dyn PriceFeed> = if config.price_feed.api_key.is_empty()
  {
    Arc::new(fixture.price_feed())
  } else {
    Arc::new(CoinGeckoClient::new(
      config.price_feed.base_url.clone(),
      config.price_feed.api_key.clone(),
    ))
  };
  let notifier: Arc<dyn Notifier> = match &config.notification_webhook {
    Some(url) => Arc::new(WebhookNotifier::new(
      url.clone(),
      config.notification_channel.clone(),
    )),
    None => Arc::new(LogNotifier),
  };

  let chain = Arc::new(DryRunChain::new(fixture.chain.clone()));
  let pipeline = OracleReportingPipeline::new(
    config,
    Arc::new(fixture.registry()),
    chain.clone(),
    chain.clone(),
    price_feed,
    notifier,
  );
  let outcome = pipeline.handler().await;

  let calls = chain
    .submitted()
    .iter()
    .map(serde_json::to_string)
    .collect::<Result<Vec<_>, _>>()?;
  println!("{}", calls.iter().join("\n"));
  let status = outcome?;
  println!("{status}");
  Ok(())
}
