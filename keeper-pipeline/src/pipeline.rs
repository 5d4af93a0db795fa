//! One price-reporting and rebalancing cycle.

use std::sync::Arc;

use keeper_clients::chain::ChainReader;
use keeper_clients::contracts::{ContractRegistry, ContractRole};
use keeper_clients::notifier::Notifier;
use keeper_clients::price_feed::PriceFeed;
use keeper_clients::transaction::TransactionSubmitter;
use keeper_core::peg::PegAdjustment;
use keeper_core::FixedDecimal;
use tokio::join;
use tracing::{error, info};

use crate::config::KeeperConfig;
use crate::context::{RunContext, RunLock};
use crate::deployment::DeployedContracts;
use crate::error::CycleError;
use crate::services::floor_ceiling::FloorCeilingOutcome;
use crate::services::reference_price::ReferencePrice;
use crate::services::{
  balances, floor_ceiling, peg_reserve, pegged_rate, reference_price,
  reserve_token, Cycle,
};

/// Status string returned to the scheduler on success.
pub const SUCCEEDED: &str = "Succeeded";

/// What a cycle observed and did. Services that failed leave their field
/// empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleReport {
  pub reference_price: ReferencePrice,
  pub priced_price: FixedDecimal,
  pub pegged_rate: Option<FixedDecimal>,
  pub peg_adjustment: Option<PegAdjustment>,
  pub floor_ceiling: Option<FloorCeilingOutcome>,
  pub low_balances: Option<Vec<ContractRole>>,
  /// At least one service recorded a failure.
  pub failed: bool,
}

pub struct OracleReportingPipeline {
  config: KeeperConfig,
  registry: Arc<dyn ContractRegistry>,
  chain: Arc<dyn ChainReader>,
  submitter: Arc<dyn TransactionSubmitter>,
  price_feed: Arc<dyn PriceFeed>,
  notifier: Arc<dyn Notifier>,
  lock: RunLock,
}

impl OracleReportingPipeline {
  #[must_use]
  pub fn new(
    config: KeeperConfig,
    registry: Arc<dyn ContractRegistry>,
    chain: Arc<dyn ChainReader>,
    submitter: Arc<dyn TransactionSubmitter>,
    price_feed: Arc<dyn PriceFeed>,
    notifier: Arc<dyn Notifier>,
  ) -> OracleReportingPipeline {
    OracleReportingPipeline {
      config,
      registry,
      chain,
      submitter,
      price_feed,
      notifier,
      lock: RunLock::new(),
    }
  }

  #[must_use]
  pub fn config(&self) -> &KeeperConfig {
    &self.config
  }

  #[must_use]
  pub fn run_lock(&self) -> &RunLock {
    &self.lock
  }

  /// Scheduler entrypoint.
  ///
  /// # Errors
  /// * Any [`CycleError`]; service failures collapse into `ServicesFailed`
  pub async fn handler(&self) -> Result<&'static str, CycleError> {
    let report = self.run_cycle().await?;
    if report.failed {
      Err(CycleError::ServicesFailed)
    } else {
      Ok(SUCCEEDED)
    }
  }

  /// Runs every service once.
  ///
  /// The reference price degrades to the configured fallback, the reserve
  /// token spot price is fatal, and the remaining services run concurrently
  /// once the spot price is confirmed on-chain, each recording its own
  /// failure.
  ///
  /// # Errors
  /// * `CycleInProgress` if another cycle holds the lock
  /// * `Registry` if a contract cannot be resolved
  /// * `DerivedPriceUnavailable` if the spot price cannot be computed
  pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
    let _guard = self.lock.try_acquire()?;
    let ctx = RunContext::new(Arc::clone(&self.notifier));
    let contracts = DeployedContracts::resolve(self.registry.as_ref())?;
    let cycle = Cycle {
      config: &self.config,
      registry: self.registry.as_ref(),
      chain: self.chain.as_ref(),
      submitter: self.submitter.as_ref(),
      price_feed: self.price_feed.as_ref(),
      contracts: &contracts,
      ctx: &ctx,
    };
    info!("cycle started");

    let reference_price = reference_price::run(cycle).await;
    let priced_price =
      match reserve_token::spot_price(cycle, reference_price.value).await {
        Ok(price) => price,
        Err(err) => {
          ctx.record_failure(reserve_token::SERVICE, &err).await;
          error!("cycle aborted without a reserve token price");
          let detail = format!("{err:#}");
          return Err(CycleError::DerivedPriceUnavailable(detail));
        }
      };
    ctx
      .guard(
        reserve_token::SERVICE,
        reserve_token::publish(cycle, priced_price),
      )
      .await;

    let (rate, adjustment, band, low) = join!(
      ctx.guard(pegged_rate::SERVICE, pegged_rate::run(cycle, priced_price)),
      ctx.guard(peg_reserve::SERVICE, peg_reserve::run(cycle, priced_price)),
      ctx.guard(
        floor_ceiling::SERVICE,
        floor_ceiling::run(cycle, priced_price, reference_price.value),
      ),
      ctx.guard(balances::SERVICE, balances::run(cycle)),
    );

    let failed = ctx.has_failed();
    if failed {
      error!("cycle finished with failures");
    } else {
      info!("cycle finished");
    }
    Ok(CycleReport {
      reference_price,
      priced_price,
      pegged_rate: rate,
      peg_adjustment: adjustment,
      floor_ceiling: band,
      low_balances: low,
      failed,
    })
  }
}
