//! In-memory chain described by a JSON fixture. Reads come from the fixture,
//! submitted calls are recorded instead of broadcast.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use keeper_clients::chain::{ChainReader, PoolId};
use keeper_clients::contracts::{
  ContractRef, JsonContractRegistry, RegistryDocument,
};
use keeper_clients::price_feed::StaticPriceFeed;
use keeper_clients::transaction::{
  ContractCall, Receipt, TransactionSubmitter, TxHash,
};
use keeper_core::pool::PoolSnapshot;
use keeper_core::{Address, FixedDecimal};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Clone, Debug, Deserialize)]
pub struct PoolState {
  pub pool_id: PoolId,
  pub snapshot: PoolSnapshot,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AllowanceEntry {
  pub token: Address,
  pub owner: Address,
  pub spender: Address,
  pub amount: FixedDecimal,
}

/// Contract state keyed by contract address. Unknown token balances and
/// allowances read as zero; everything else missing is an error.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChainState {
  pub relayer: Address,
  pub pools: HashMap<Address, PoolState>,
  pub reserve_values: HashMap<Address, FixedDecimal>,
  /// Reserve address to the oracle of its own token.
  pub token_oracles: HashMap<Address, Address>,
  /// Token address to its oracle.
  pub oracles_per_token: HashMap<Address, Address>,
  pub total_supplies: HashMap<Address, FixedDecimal>,
  /// Token address to owner balances.
  pub balances: HashMap<Address, HashMap<Address, FixedDecimal>>,
  pub allowances: Vec<AllowanceEntry>,
  pub ceiling_multipliers: HashMap<Address, u64>,
  pub unfrozen_balances: HashMap<Address, FixedDecimal>,
  /// Read or call names that fail, e.g. `pool_snapshot` or `transfer`.
  pub failing: HashSet<String>,
}

impl ChainState {
  pub fn set_balance(
    &mut self,
    token: Address,
    owner: Address,
    amount: FixedDecimal,
  ) {
    self.balances.entry(token).or_default().insert(owner, amount);
  }

  pub fn fail(&mut self, name: &str) {
    self.failing.insert(name.to_string());
  }
}

/// Registry, interfaces, chain state and feed price for one dry run.
#[derive(Clone, Debug, Deserialize)]
pub struct DryRunFixture {
  pub registry: RegistryDocument,
  pub interfaces: HashMap<String, Vec<Value>>,
  pub chain: ChainState,
  /// Price the static feed answers with; the feed fails when absent.
  #[serde(default)]
  pub reference_price: Option<FixedDecimal>,
}

impl DryRunFixture {
  /// # Errors
  /// * Malformed fixture
  pub fn from_json(text: &str) -> Result<DryRunFixture> {
    serde_json::from_str(text).context("invalid dry-run fixture")
  }

  /// # Errors
  /// * Unreadable file or malformed fixture
  pub fn load(path: &Path) -> Result<DryRunFixture> {
    let text = std::fs::read_to_string(path)
      .with_context(|| format!("failed to read {}", path.display()))?;
    DryRunFixture::from_json(&text)
  }

  #[must_use]
  pub fn registry(&self) -> JsonContractRegistry {
    JsonContractRegistry::new(self.registry.clone(), self.interfaces.clone())
  }

  #[must_use]
  pub fn price_feed(&self) -> StaticPriceFeed {
    self
      .reference_price
      .map_or_else(StaticPriceFeed::unavailable, StaticPriceFeed::new)
  }
}

pub struct DryRunChain {
  state: ChainState,
  reads: Mutex<Vec<&'static str>>,
  submitted: Mutex<Vec<ContractCall>>,
}

impl DryRunChain {
  #[must_use]
  pub fn new(state: ChainState) -> DryRunChain {
    DryRunChain {
      state,
      reads: Mutex::new(Vec::new()),
      submitted: Mutex::new(Vec::new()),
    }
  }

  /// Calls submitted so far, in submission order.
  #[must_use]
  pub fn submitted(&self) -> Vec<ContractCall> {
    self
      .submitted
      .lock()
      .map(|calls| calls.clone())
      .unwrap_or_default()
  }

  /// Names of the reads served so far, in order.
  #[must_use]
  pub fn reads(&self) -> Vec<&'static str> {
    self
      .reads
      .lock()
      .map(|reads| reads.clone())
      .unwrap_or_default()
  }

  fn read(&self, name: &'static str) -> Result<()> {
    self
      .reads
      .lock()
      .map_err(|_| anyhow!("dry-run read log poisoned"))?
      .push(name);
    if self.state.failing.contains(name) {
      bail!("{name} unavailable");
    }
    Ok(())
  }

  fn lookup<T: Copy>(
    map: &HashMap<Address, T>,
    key: Address,
    what: &str,
  ) -> Result<T> {
    map
      .get(&key)
      .copied()
      .with_context(|| format!("no {what} for {key}"))
  }
}

#[async_trait::async_trait]
impl ChainReader for DryRunChain {
  async fn pool_snapshot(
    &self,
    _vault: &ContractRef,
    pool: &ContractRef,
  ) -> Result<PoolSnapshot> {
    self.read("pool_snapshot")?;
    self
      .state
      .pools
      .get(&pool.address)
      .map(|p| p.snapshot.clone())
      .with_context(|| format!("no pool at {}", pool.address))
  }

  async fn pool_id(&self, pool: &ContractRef) -> Result<PoolId> {
    self.read("pool_id")?;
    self
      .state
      .pools
      .get(&pool.address)
      .map(|p| p.pool_id)
      .with_context(|| format!("no pool at {}", pool.address))
  }

  async fn reserve_value(&self, reserve: &ContractRef) -> Result<FixedDecimal> {
    self.read("reserve_value")?;
    DryRunChain::lookup(
      &self.state.reserve_values,
      reserve.address,
      "reserve value",
    )
  }

  async fn token_oracle(&self, reserve: &ContractRef) -> Result<Address> {
    self.read("token_oracle")?;
    DryRunChain::lookup(&self.state.token_oracles, reserve.address, "oracle")
  }

  async fn oracle_per_erc20(
    &self,
    _reserve: &ContractRef,
    token: Address,
  ) -> Result<Address> {
    self.read("oracle_per_erc20")?;
    DryRunChain::lookup(&self.state.oracles_per_token, token, "oracle")
  }

  async fn total_supply(&self, token: &ContractRef) -> Result<FixedDecimal> {
    self.read("total_supply")?;
    DryRunChain::lookup(&self.state.total_supplies, token.address, "supply")
  }

  async fn balance_of(
    &self,
    token: &ContractRef,
    owner: Address,
  ) -> Result<FixedDecimal> {
    self.read("balance_of")?;
    Ok(
      self
        .state
        .balances
        .get(&token.address)
        .and_then(|owners| owners.get(&owner))
        .copied()
        .unwrap_or_default(),
    )
  }

  async fn allowance(
    &self,
    token: &ContractRef,
    owner: Address,
    spender: Address,
  ) -> Result<FixedDecimal> {
    self.read("allowance")?;
    Ok(
      self
        .state
        .allowances
        .iter()
        .find(|entry| {
          entry.token == token.address
            && entry.owner == owner
            && entry.spender == spender
        })
        .map(|entry| entry.amount)
        .unwrap_or_default(),
    )
  }

  async fn ceiling_multiplier_bps(
    &self,
    proxy_pool: &ContractRef,
  ) -> Result<u64> {
    self.read("ceiling_multiplier_bps")?;
    DryRunChain::lookup(
      &self.state.ceiling_multipliers,
      proxy_pool.address,
      "ceiling multiplier",
    )
  }

  async fn unfrozen_balance(
    &self,
    peg_reserve: &ContractRef,
  ) -> Result<FixedDecimal> {
    self.read("unfrozen_balance")?;
    DryRunChain::lookup(
      &self.state.unfrozen_balances,
      peg_reserve.address,
      "unfrozen balance",
    )
  }
}

#[async_trait::async_trait]
impl TransactionSubmitter for DryRunChain {
  fn sender(&self) -> Address {
    self.state.relayer
  }

  async fn submit(&self, call: ContractCall) -> Result<TxHash> {
    if self.state.failing.contains(call.method) {
      bail!("{} reverted", call.method);
    }
    let mut submitted = self
      .submitted
      .lock()
      .map_err(|_| anyhow!("dry-run call log poisoned"))?;
    debug!(method = call.method, target = %call.target, "recorded call");
    submitted.push(call);
    let mut hash = [0u8; 32];
    hash[24..].copy_from_slice(&(submitted.len() as u64).to_be_bytes());
    Ok(TxHash(hash))
  }

  async fn wait_confirmations(
    &self,
    hash: TxHash,
    confirmations: u64,
  ) -> Result<Receipt> {
    if self.state.failing.contains("wait_confirmations") {
      bail!("{hash} was dropped");
    }
    let mut index = [0u8; 8];
    index.copy_from_slice(&hash.0[24..]);
    Ok(Receipt {
      hash,
      block_number: u64::from_be_bytes(index),
      confirmations,
    })
  }
}
