//! Exchange rate of the pegged currency against the reserve token.

use anyhow::Result;
use keeper_clients::transaction::{report, send};
use keeper_core::peg::{pegged_exchange_rate, sorted_oracle_value};
use keeper_core::FixedDecimal;
use tracing::info;

use super::Cycle;

pub const SERVICE: &str = "pegged-rate";

/// Reports the whole-unit rate to the sorted oracles without waiting for
/// confirmation.
///
/// # Errors
/// * `PriceTooSmall` for a non-positive reserve token price
/// * Submission failure
pub async fn run(
  cycle: Cycle<'_>,
  priced_price: FixedDecimal,
) -> Result<FixedDecimal> {
  let rate =
    pegged_exchange_rate(priced_price, cycle.config.pegged_currency_usd_price)?;
  let contracts = cycle.contracts;
  let call = report(
    &contracts.sorted_oracles,
    contracts.pegged_token.address,
    sorted_oracle_value(rate)?,
  );
  let handle = send(cycle.submitter, call).await?;
  info!(service = SERVICE, %rate, tx = %handle.hash, "reported pegged rate");
  Ok(rate)
}
