//! Fiat price of the reference token, published to its oracle.

use anyhow::Result;
use keeper_clients::contracts::ContractRole;
use keeper_clients::transaction::{push_report, send};
use keeper_core::FixedDecimal;
use tracing::{info, warn};

use super::Cycle;

pub const SERVICE: &str = "reference-price";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReferencePrice {
  pub value: FixedDecimal,
  /// The feed failed and `value` is the configured fallback.
  pub fallback: bool,
}

/// Fetches the reference price and publishes it. A feed failure is recorded
/// and degrades to the configured fallback, which is never published.
pub async fn run(cycle: Cycle<'_>) -> ReferencePrice {
  let token_id = cycle.config.price_feed.reference_token_id.as_str();
  match cycle.price_feed.fetch_fiat_price(token_id).await {
    Ok(value) => {
      info!(service = SERVICE, %value, "fetched reference price");
      cycle.ctx.guard(SERVICE, publish(cycle, value)).await;
      ReferencePrice {
        value,
        fallback: false,
      }
    }
    Err(err) => {
      cycle
        .ctx
        .record_failure(SERVICE, &anyhow::Error::from(err))
        .await;
      let value = cycle.config.fallback_reference_price;
      warn!(service = SERVICE, %value, "using fallback reference price");
      ReferencePrice {
        value,
        fallback: true,
      }
    }
  }
}

async fn publish(cycle: Cycle<'_>, price: FixedDecimal) -> Result<()> {
  let contracts = cycle.contracts;
  let oracle_address = cycle
    .chain
    .oracle_per_erc20(&contracts.reserve, contracts.reference_token.address)
    .await?;
  let oracle = cycle.registry.bind(ContractRole::Oracle, oracle_address)?;
  let handle = send(cycle.submitter, push_report(&oracle, price)?).await?;
  info!(service = SERVICE, tx = %handle.hash, "published reference price");
  handle
    .wait(cycle.config.reference_oracle_confirmations)
    .await?;
  Ok(())
}
