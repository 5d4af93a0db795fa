//! Keeps the peg reserve's reserve token holdings in line with the value of
//! the pegged currency in circulation.

use anyhow::{ensure, Result};
use keeper_clients::transaction::{send, transfer, transfer_exchange_gold};
use keeper_core::peg::{peg_adjustment, PegAdjustment};
use keeper_core::FixedDecimal;
use tracing::info;

use super::Cycle;

pub const SERVICE: &str = "peg-reserve";

/// # Errors
/// * Relayer or peg reserve cannot cover the adjustment
/// * Read, submission or confirmation failure
pub async fn run(
  cycle: Cycle<'_>,
  priced_price: FixedDecimal,
) -> Result<PegAdjustment> {
  let contracts = cycle.contracts;
  let relayer = cycle.submitter.sender();
  let held = cycle
    .chain
    .balance_of(&contracts.reserve_token, contracts.peg_reserve.address)
    .await?;
  let pegged_supply = cycle.chain.total_supply(&contracts.pegged_token).await?;
  let adjustment = peg_adjustment(
    held,
    priced_price,
    pegged_supply,
    cycle.config.pegged_currency_usd_price,
  )?;
  let call = match adjustment {
    PegAdjustment::Balanced => {
      info!(service = SERVICE, "peg reserve balanced");
      return Ok(adjustment);
    }
    PegAdjustment::TopUp { amount } => {
      let available = cycle
        .chain
        .balance_of(&contracts.reserve_token, relayer)
        .await?;
      ensure!(
        available >= amount,
        "relayer holds {available} reserve tokens, top-up needs {amount}"
      );
      transfer(&contracts.reserve_token, contracts.peg_reserve.address, amount)?
    }
    PegAdjustment::Withdraw { amount } => {
      let available =
        cycle.chain.unfrozen_balance(&contracts.peg_reserve).await?;
      ensure!(
        available >= amount,
        "peg reserve can release {available} reserve tokens, \
         withdrawal needs {amount}"
      );
      transfer_exchange_gold(&contracts.peg_reserve, relayer, amount)?
    }
  };
  let handle = send(cycle.submitter, call).await?;
  info!(
    service = SERVICE,
    ?adjustment,
    tx = %handle.hash,
    "submitted peg reserve adjustment"
  );
  handle.wait(cycle.config.correction_confirmations).await?;
  Ok(adjustment)
}
