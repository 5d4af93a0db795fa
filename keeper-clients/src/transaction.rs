//! State-changing contract calls and their confirmation.

use std::fmt::{self, Debug, Display};

use anyhow::{anyhow, Result};
use keeper_core::{Address, FixedDecimal, U256};
use serde::Serialize;

use crate::chain::PoolId;
use crate::contracts::ContractRef;

/// Fractional digits of ERC-20 token amounts on the wire.
pub const TOKEN_DECIMALS: u32 = 18;

/// Encodable call argument.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CallArg {
  Address(Address),
  #[serde(serialize_with = "serialize_uint")]
  Uint(U256),
  Bool(bool),
  #[serde(serialize_with = "serialize_bytes")]
  Bytes(Vec<u8>),
  Array(Vec<CallArg>),
  Tuple(Vec<CallArg>),
}

fn serialize_uint<S: serde::Serializer>(
  value: &U256,
  serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
  serializer.collect_str(value)
}

fn serialize_bytes<S: serde::Serializer>(
  value: &[u8],
  serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
  serializer.collect_str(&format_args!("0x{}", hex::encode(value)))
}

/// A method invocation on a deployed contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContractCall {
  pub target: Address,
  pub method: &'static str,
  pub args: Vec<CallArg>,
}

/// Token amount as an 18-decimal on-chain integer.
///
/// # Errors
/// * Negative amount
pub fn to_wei(amount: FixedDecimal) -> Result<U256> {
  amount
    .to_scaled_u256(TOKEN_DECIMALS)
    .ok_or_else(|| anyhow!("amount {amount} cannot be sent on-chain"))
}

/// `oracle.pushReport(price)`
///
/// # Errors
/// * Negative price
pub fn push_report(
  oracle: &ContractRef,
  price: FixedDecimal,
) -> Result<ContractCall> {
  Ok(ContractCall {
    target: oracle.address,
    method: "pushReport",
    args: vec![CallArg::Uint(to_wei(price)?)],
  })
}

/// `sortedOracles.report(token, value, lesserKey, greaterKey)`; zero neighbor
/// keys let the contract locate the insert position.
#[must_use]
pub fn report(
  sorted_oracles: &ContractRef,
  token: Address,
  value: U256,
) -> ContractCall {
  ContractCall {
    target: sorted_oracles.address,
    method: "report",
    args: vec![
      CallArg::Address(token),
      CallArg::Uint(value),
      CallArg::Address(Address::ZERO),
      CallArg::Address(Address::ZERO),
    ],
  }
}

/// `token.transfer(to, amount)`
///
/// # Errors
/// * Negative amount
pub fn transfer(
  token: &ContractRef,
  to: Address,
  amount: FixedDecimal,
) -> Result<ContractCall> {
  Ok(ContractCall {
    target: token.address,
    method: "transfer",
    args: vec![CallArg::Address(to), CallArg::Uint(to_wei(amount)?)],
  })
}

/// `token.approve(spender, amount)`
///
/// # Errors
/// * Negative amount
pub fn approve(
  token: &ContractRef,
  spender: Address,
  amount: FixedDecimal,
) -> Result<ContractCall> {
  Ok(ContractCall {
    target: token.address,
    method: "approve",
    args: vec![CallArg::Address(spender), CallArg::Uint(to_wei(amount)?)],
  })
}

/// `pegReserve.transferExchangeGold(to, amount)`
///
/// # Errors
/// * Negative amount
pub fn transfer_exchange_gold(
  peg_reserve: &ContractRef,
  to: Address,
  amount: FixedDecimal,
) -> Result<ContractCall> {
  Ok(ContractCall {
    target: peg_reserve.address,
    method: "transferExchangeGold",
    args: vec![CallArg::Address(to), CallArg::Uint(to_wei(amount)?)],
  })
}

/// Single-hop exact-in swap through the proxy pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExactInSwap {
  pub pool_id: PoolId,
  pub token_in: Address,
  pub token_out: Address,
  pub amount_in: FixedDecimal,
  pub sender: Address,
  pub recipient: Address,
  /// Per-asset net transfer limit, applied to both assets.
  pub limit: FixedDecimal,
  pub min_total_amount_out: U256,
  /// Unix timestamp after which the swap reverts.
  pub deadline: u64,
}

/// `proxyPool.batchSwapExactIn(swaps, assets, totalAmountIn,
/// minTotalAmountOut, funds, limits, deadline)`
///
/// # Errors
/// * Negative amount or limit
pub fn batch_swap_exact_in(
  proxy_pool: &ContractRef,
  swap: &ExactInSwap,
) -> Result<ContractCall> {
  let amount_in = CallArg::Uint(to_wei(swap.amount_in)?);
  let step = CallArg::Tuple(vec![
    CallArg::Bytes(swap.pool_id.as_bytes().to_vec()),
    CallArg::Uint(U256::zero()),
    CallArg::Uint(U256::one()),
    amount_in.clone(),
    CallArg::Bytes(Vec::new()),
  ]);
  let funds = CallArg::Tuple(vec![
    CallArg::Address(swap.sender),
    CallArg::Bool(false),
    CallArg::Address(swap.recipient),
    CallArg::Bool(false),
  ]);
  let limit = CallArg::Uint(to_wei(swap.limit)?);
  Ok(ContractCall {
    target: proxy_pool.address,
    method: "batchSwapExactIn",
    args: vec![
      CallArg::Array(vec![step]),
      CallArg::Array(vec![
        CallArg::Address(swap.token_in),
        CallArg::Address(swap.token_out),
      ]),
      amount_in,
      CallArg::Uint(swap.min_total_amount_out),
      funds,
      CallArg::Array(vec![limit.clone(), limit]),
      CallArg::Uint(U256::from(swap.deadline)),
    ],
  })
}

/// Hash of a submitted transaction.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct TxHash(pub [u8; 32]);

impl Display for TxHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "0x{}", hex::encode(self.0))
  }
}

impl Debug for TxHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    Display::fmt(self, f)
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
  pub hash: TxHash,
  pub block_number: u64,
  pub confirmations: u64,
}

/// Signs and broadcasts calls from the relayer account.
#[async_trait::async_trait]
pub trait TransactionSubmitter: Send + Sync {
  /// Relayer account the transactions are sent from.
  fn sender(&self) -> Address;

  async fn submit(&self, call: ContractCall) -> Result<TxHash>;

  /// Resolves once the transaction has `confirmations` blocks on top of it.
  async fn wait_confirmations(
    &self,
    hash: TxHash,
    confirmations: u64,
  ) -> Result<Receipt>;
}

/// A submitted transaction that can be awaited.
pub struct TransactionHandle<'a> {
  pub hash: TxHash,
  submitter: &'a dyn TransactionSubmitter,
}

impl TransactionHandle<'_> {
  /// # Errors
  /// * Transaction reverted or was dropped
  pub async fn wait(self, confirmations: u64) -> Result<Receipt> {
    self
      .submitter
      .wait_confirmations(self.hash, confirmations)
      .await
  }
}

/// Submits `call` and returns a handle to await its confirmation.
///
/// # Errors
/// * Submission failure
pub async fn send(
  submitter: &dyn TransactionSubmitter,
  call: ContractCall,
) -> Result<TransactionHandle<'_>> {
  let hash = submitter.submit(call).await?;
  Ok(TransactionHandle { hash, submitter })
}
