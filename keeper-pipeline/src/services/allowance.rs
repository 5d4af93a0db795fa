use anyhow::{ensure, Result};
use keeper_clients::contracts::ContractRef;
use keeper_clients::transaction::{approve, send};
use keeper_core::{Address, FixedDecimal};
use tracing::{debug, info};

use super::Cycle;

/// Makes sure `spender` may pull `amount` of `token` from the relayer.
/// Approves only when the current allowance falls short. Returns whether an
/// approval was submitted.
///
/// # Errors
/// * Relayer balance below `amount`
/// * Read, submission or confirmation failure
pub async fn ensure_allowance(
  cycle: Cycle<'_>,
  token: &ContractRef,
  spender: Address,
  amount: FixedDecimal,
) -> Result<bool> {
  let owner = cycle.submitter.sender();
  let balance = cycle.chain.balance_of(token, owner).await?;
  ensure!(
    balance >= amount,
    "relayer holds {balance} of {}, needs {amount}",
    token.role
  );
  let current = cycle.chain.allowance(token, owner, spender).await?;
  if current >= amount {
    debug!(token = %token.role, %spender, %current, "allowance sufficient");
    return Ok(false);
  }
  let handle = send(cycle.submitter, approve(token, spender, amount)?).await?;
  info!(token = %token.role, %spender, %amount, tx = %handle.hash, "approved");
  handle.wait(cycle.config.correction_confirmations).await?;
  Ok(true)
}
