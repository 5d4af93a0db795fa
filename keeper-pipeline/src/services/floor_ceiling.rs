//! Reserve invariant check and the corrective swap when the market price
//! leaves the floor/ceiling band.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{ensure, Context, Result};
use keeper_clients::transaction::{batch_swap_exact_in, send, ExactInSwap};
use keeper_core::rebalance_delta::{
  compute_delta, ensure_supply, payment_for, Direction, RebalanceDelta,
};
use keeper_core::reserve_invariant::{classify_breach, BreachEvaluation};
use keeper_core::{CoreError, FixedDecimal};
use tracing::info;

use super::allowance::ensure_allowance;
use super::Cycle;

pub const SERVICE: &str = "floor-ceiling";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Correction {
  pub delta: RebalanceDelta,
  /// Amount paid into the pool: reference tokens for a buy, reserve tokens
  /// for a sell.
  pub payment: FixedDecimal,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FloorCeilingOutcome {
  pub evaluation: BreachEvaluation,
  pub correction: Option<Correction>,
}

/// Classifies the reserve invariant at `priced_price` and, on a breach, swaps
/// toward the violated bound.
///
/// # Errors
/// * `DegenerateSupply` for a zero reserve token supply, before any pool read
/// * Read failures, invalid pool data, unaffordable payment
/// * Submission or confirmation failure
pub async fn run(
  cycle: Cycle<'_>,
  priced_price: FixedDecimal,
  reference_price: FixedDecimal,
) -> Result<FloorCeilingOutcome> {
  let contracts = cycle.contracts;
  let supply = cycle.chain.total_supply(&contracts.reserve_token).await?;
  ensure_supply(supply)?;
  let reserve_value = cycle.chain.reserve_value(&contracts.reserve).await?;
  let multiplier = cycle
    .chain
    .ceiling_multiplier_bps(&contracts.proxy_pool)
    .await?;
  let supply_value = supply
    .checked_mul(&priced_price)
    .ok_or(CoreError::Arithmetic("supply value"))?;
  let evaluation =
    classify_breach(reserve_value, supply_value, priced_price, multiplier)?;
  info!(
    service = SERVICE,
    backing_ratio_bps = evaluation.status.backing_ratio_bps,
    floor = %evaluation.floor,
    ceiling = %evaluation.ceiling,
    breach = %evaluation.breach,
    "evaluated reserve invariant"
  );
  let Some(target_usd) = evaluation.breach.target_price() else {
    return Ok(FloorCeilingOutcome {
      evaluation,
      correction: None,
    });
  };
  // The pool prices the reserve token in reference token units.
  let target = target_usd
    .checked_div(&reference_price)
    .ok_or(CoreError::Arithmetic("target price"))?;
  let snapshot = cycle
    .chain
    .pool_snapshot(&contracts.vault, &contracts.reserve_pool)
    .await?
    .validate()?;
  let pair = contracts.pair();
  let delta = compute_delta(supply, target, &snapshot, &pair)?;
  if delta.token_amount.is_zero() {
    return Ok(FloorCeilingOutcome {
      evaluation,
      correction: None,
    });
  }
  let payment = payment_for(&delta, &snapshot, &pair)?;
  let correction = Correction { delta, payment };
  execute(cycle, &correction).await?;
  Ok(FloorCeilingOutcome {
    evaluation,
    correction: Some(correction),
  })
}

async fn execute(cycle: Cycle<'_>, correction: &Correction) -> Result<()> {
  let contracts = cycle.contracts;
  let swap_config = &cycle.config.swap;
  let (token_in, token_out) = match correction.delta.direction {
    Direction::Buy => (&contracts.reference_token, &contracts.reserve_token),
    Direction::Sell => (&contracts.reserve_token, &contracts.reference_token),
  };
  ensure!(
    correction.payment <= swap_config.limit,
    "payment {} exceeds the swap limit {}",
    correction.payment,
    swap_config.limit
  );
  ensure_allowance(
    cycle,
    token_in,
    contracts.proxy_pool.address,
    correction.payment,
  )
  .await?;
  ensure_allowance(cycle, token_in, contracts.vault.address, correction.payment)
    .await?;
  let relayer = cycle.submitter.sender();
  let swap = ExactInSwap {
    pool_id: cycle.chain.pool_id(&contracts.reserve_pool).await?,
    token_in: token_in.address,
    token_out: token_out.address,
    amount_in: correction.payment,
    sender: relayer,
    recipient: relayer,
    limit: swap_config.limit,
    min_total_amount_out: swap_config.min_total_amount_out(),
    deadline: deadline_after(unix_now()?, swap_config.deadline_secs)?,
  };
  let handle =
    send(cycle.submitter, batch_swap_exact_in(&contracts.proxy_pool, &swap)?)
      .await?;
  info!(
    service = SERVICE,
    direction = %correction.delta.direction,
    amount = %correction.delta.token_amount,
    payment = %correction.payment,
    tx = %handle.hash,
    "submitted corrective swap"
  );
  handle.wait(cycle.config.correction_confirmations).await?;
  Ok(())
}

fn unix_now() -> Result<u64> {
  Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

fn deadline_after(now: u64, window_secs: u64) -> Result<u64> {
  now
    .checked_add(window_secs)
    .with_context(|| format!("swap deadline window {window_secs}s overflows"))
}
