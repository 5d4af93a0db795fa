//! Relayer balance check.

use anyhow::Result;
use futures::future::try_join_all;
use keeper_clients::contracts::ContractRole;
use keeper_clients::notifier::notify_best_effort;
use tracing::warn;

use super::Cycle;

pub const SERVICE: &str = "relayer-balances";

/// Warns and notifies for every token the relayer holds less than the
/// configured minimum of. A low balance never fails the cycle.
///
/// # Errors
/// * Balance read failure
pub async fn run(cycle: Cycle<'_>) -> Result<Vec<ContractRole>> {
  let contracts = cycle.contracts;
  let relayer = cycle.submitter.sender();
  let minimum = cycle.config.min_token_balance;
  let tokens = [
    &contracts.reserve_token,
    &contracts.pegged_token,
    &contracts.reference_token,
  ];
  let balances = try_join_all(
    tokens
      .iter()
      .map(|token| cycle.chain.balance_of(token, relayer)),
  )
  .await?;
  let mut low = Vec::new();
  for (token, balance) in tokens.into_iter().zip(balances) {
    if balance >= minimum {
      continue;
    }
    warn!(
      service = SERVICE,
      token = %token.role,
      %balance,
      "low relayer balance"
    );
    notify_best_effort(
      cycle.ctx.notifier(),
      "Low relayer balance",
      &format!(
        "Relayer {relayer} holds {balance} {}, below the minimum of {minimum}",
        token.role
      ),
    )
    .await;
    low.push(token.role);
  }
  Ok(low)
}
