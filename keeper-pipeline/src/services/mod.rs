//! Sub-services run by one cycle. Each reads its inputs fresh from chain and
//! reports failures through `anyhow`; the pipeline decides which failures
//! are fatal.

pub mod allowance;
pub mod balances;
pub mod floor_ceiling;
pub mod peg_reserve;
pub mod pegged_rate;
pub mod reference_price;
pub mod reserve_token;

use keeper_clients::chain::ChainReader;
use keeper_clients::contracts::ContractRegistry;
use keeper_clients::price_feed::PriceFeed;
use keeper_clients::transaction::TransactionSubmitter;

use crate::config::KeeperConfig;
use crate::context::RunContext;
use crate::deployment::DeployedContracts;

/// Collaborators and state shared by the services of one cycle.
#[derive(Clone, Copy)]
pub struct Cycle<'a> {
  pub config: &'a KeeperConfig,
  pub registry: &'a dyn ContractRegistry,
  pub chain: &'a dyn ChainReader,
  pub submitter: &'a dyn TransactionSubmitter,
  pub price_feed: &'a dyn PriceFeed,
  pub contracts: &'a DeployedContracts,
  pub ctx: &'a RunContext,
}
