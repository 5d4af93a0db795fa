//! Full cycles against the in-memory dry-run chain.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use keeper_clients::contracts::{ContractRole, RegistryError};
use keeper_clients::notifier::Notifier;
use keeper_clients::transaction::{CallArg, ContractCall};
use keeper_core::peg::PegAdjustment;
use keeper_core::rebalance_delta::Direction;
use keeper_core::reserve_invariant::BreachState;
use keeper_core::{Address, FixedDecimal, U256};
use keeper_pipeline::config::KeeperConfig;
use keeper_pipeline::dry_run::{
  AllowanceEntry, ChainState, DryRunChain, DryRunFixture,
};
use keeper_pipeline::error::CycleError;
use keeper_pipeline::pipeline::{OracleReportingPipeline, SUCCEEDED};
use keeper_pipeline::services::reference_price::ReferencePrice;
use test_context::{test_context, AsyncTestContext};

const FIXTURE: &str = include_str!("data/fixture.json");

const RESERVE: Address = Address::new([0x0a; 20]);
const KCUR: Address = Address::new([0x11; 20]);
const CUSD: Address = Address::new([0x22; 20]);
const KG: Address = Address::new([0x33; 20]);
const VAULT: Address = Address::new([0x44; 20]);
const PROXY_POOL: Address = Address::new([0x66; 20]);
const SORTED_ORACLES: Address = Address::new([0x77; 20]);
const PEG_RESERVE: Address = Address::new([0x88; 20]);
const KCUR_ORACLE: Address = Address::new([0x99; 20]);
const CUSD_ORACLE: Address = Address::new([0xaa; 20]);
const RELAYER: Address = Address::new([0xbb; 20]);

#[derive(Default)]
struct RecordingNotifier {
  sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
  fn subjects(&self) -> Vec<String> {
    self
      .sent
      .lock()
      .map(|sent| sent.iter().map(|(subject, _)| subject.clone()).collect())
      .unwrap_or_default()
  }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
  async fn notify(&self, subject: &str, message: &str) -> Result<()> {
    self
      .sent
      .lock()
      .map_err(|_| anyhow!("poisoned"))?
      .push((subject.to_string(), message.to_string()));
    Ok(())
  }
}

struct Harness {
  pipeline: OracleReportingPipeline,
  chain: Arc<DryRunChain>,
  notifier: Arc<RecordingNotifier>,
}

impl Harness {
  fn calls_to(&self, target: Address, method: &str) -> Vec<ContractCall> {
    self
      .chain
      .submitted()
      .into_iter()
      .filter(|call| call.target == target && call.method == method)
      .collect()
  }

  fn single_call(&self, target: Address, method: &str) -> Result<ContractCall> {
    let mut calls = self.calls_to(target, method);
    anyhow::ensure!(calls.len() == 1, "expected one {method}, got {calls:?}");
    calls.pop().context("no call")
  }
}

struct PipelineTestContext {
  fixture: DryRunFixture,
}

impl AsyncTestContext for PipelineTestContext {
  async fn setup() -> Self {
    Self::new().expect("Failed to load dry-run fixture")
  }
}

impl PipelineTestContext {
  fn new() -> Result<Self> {
    Ok(Self {
      fixture: DryRunFixture::from_json(FIXTURE)?,
    })
  }

  fn state(&self) -> ChainState {
    self.fixture.chain.clone()
  }

  fn harness(&self, state: ChainState) -> Harness {
    self.harness_with(state, KeeperConfig::default(), self.fixture.clone())
  }

  fn harness_with(
    &self,
    state: ChainState,
    config: KeeperConfig,
    fixture: DryRunFixture,
  ) -> Harness {
    let chain = Arc::new(DryRunChain::new(state));
    let notifier = Arc::new(RecordingNotifier::default());
    let pipeline = OracleReportingPipeline::new(
      config,
      Arc::new(fixture.registry()),
      chain.clone(),
      chain.clone(),
      Arc::new(fixture.price_feed()),
      notifier.clone(),
    );
    Harness {
      pipeline,
      chain,
      notifier,
    }
  }
}

fn fd(text: &str) -> FixedDecimal {
  text.parse().expect("valid decimal literal")
}

fn wei(text: &str) -> U256 {
  fd(text).to_scaled_u256(18).expect("non-negative amount")
}

#[test_context(PipelineTestContext)]
#[tokio::test]
async fn in_band_cycle_publishes_and_realigns(
  ctx: &PipelineTestContext,
) -> Result<()> {
  let harness = ctx.harness(ctx.state());
  let report = harness.pipeline.run_cycle().await?;

  assert!(!report.failed);
  assert_eq!(
    report.reference_price,
    ReferencePrice {
      value: fd("1"),
      fallback: false,
    }
  );
  assert_eq!(report.priced_price, fd("2"));
  assert_eq!(report.pegged_rate, Some(fd("4")));
  assert_eq!(
    report.peg_adjustment,
    Some(PegAdjustment::TopUp {
      amount: fd("396.64804469273725"),
    })
  );
  let band = report.floor_ceiling.context("floor/ceiling outcome")?;
  assert_eq!(band.evaluation.status.backing_ratio_bps, 7_500);
  assert_eq!(band.evaluation.breach, BreachState::NoBreach);
  assert_eq!(band.correction, None);
  assert_eq!(report.low_balances, Some(vec![ContractRole::ReferenceToken]));

  let calls = harness.chain.submitted();
  assert_eq!(calls[0].target, CUSD_ORACLE);
  assert_eq!(calls[0].args, vec![CallArg::Uint(wei("1"))]);
  assert_eq!(calls[1].target, KCUR_ORACLE);
  assert_eq!(calls[1].args, vec![CallArg::Uint(wei("2"))]);

  let rate = harness.single_call(SORTED_ORACLES, "report")?;
  assert_eq!(rate.args[0], CallArg::Address(KG));
  assert_eq!(
    rate.args[1],
    CallArg::Uint(U256::from(4u64) * U256::exp10(24))
  );
  let top_up = harness.single_call(KCUR, "transfer")?;
  assert_eq!(top_up.args[0], CallArg::Address(PEG_RESERVE));
  assert!(harness.calls_to(PROXY_POOL, "batchSwapExactIn").is_empty());
  assert_eq!(harness.notifier.subjects(), vec!["Low relayer balance"]);
  Ok(())
}

#[test_context(PipelineTestContext)]
#[tokio::test]
async fn handler_reports_success(ctx: &PipelineTestContext) -> Result<()> {
  let harness = ctx.harness(ctx.state());
  assert_eq!(harness.pipeline.handler().await?, SUCCEEDED);
  Ok(())
}

#[test_context(PipelineTestContext)]
#[tokio::test]
async fn price_feed_failure_falls_back_and_continues(
  ctx: &PipelineTestContext,
) -> Result<()> {
  let mut fixture = ctx.fixture.clone();
  fixture.reference_price = None;
  let config = KeeperConfig {
    fallback_reference_price: fd("0.99"),
    ..KeeperConfig::default()
  };
  let harness = ctx.harness_with(ctx.state(), config.clone(), fixture.clone());
  let report = harness.pipeline.run_cycle().await?;

  assert!(report.failed);
  assert!(report.reference_price.fallback);
  assert_eq!(report.priced_price, fd("1.98"));
  assert!(report.pegged_rate.is_some());
  assert!(report.floor_ceiling.is_some());
  assert!(harness.calls_to(CUSD_ORACLE, "pushReport").is_empty());
  let published = harness.single_call(KCUR_ORACLE, "pushReport")?;
  assert_eq!(published.args, vec![CallArg::Uint(wei("1.98"))]);
  assert!(harness
    .notifier
    .subjects()
    .contains(&"reference-price failed".to_string()));

  let harness = ctx.harness_with(ctx.state(), config, fixture);
  assert!(matches!(
    harness.pipeline.handler().await,
    Err(CycleError::ServicesFailed)
  ));
  Ok(())
}

#[test_context(PipelineTestContext)]
#[tokio::test]
async fn unreadable_pool_aborts_cycle(ctx: &PipelineTestContext) -> Result<()> {
  let mut state = ctx.state();
  state.fail("pool_snapshot");
  let harness = ctx.harness(state);

  let result = harness.pipeline.run_cycle().await;
  assert!(matches!(result, Err(CycleError::DerivedPriceUnavailable(_))));
  let calls = harness.chain.submitted();
  assert_eq!(calls.len(), 1);
  assert_eq!(calls[0].target, CUSD_ORACLE);
  Ok(())
}

#[test_context(PipelineTestContext)]
#[tokio::test]
async fn zero_supply_fails_before_pool_read(
  ctx: &PipelineTestContext,
) -> Result<()> {
  let mut state = ctx.state();
  state.total_supplies.insert(KCUR, FixedDecimal::zero());
  let harness = ctx.harness(state);
  let report = harness.pipeline.run_cycle().await?;

  assert!(report.failed);
  assert_eq!(report.floor_ceiling, None);
  assert!(report.pegged_rate.is_some());
  assert!(report.peg_adjustment.is_some());
  let snapshot_reads = harness
    .chain
    .reads()
    .into_iter()
    .filter(|name| *name == "pool_snapshot")
    .count();
  assert_eq!(snapshot_reads, 1);
  assert!(!harness.chain.reads().contains(&"reserve_value"));
  Ok(())
}

#[test_context(PipelineTestContext)]
#[tokio::test]
async fn floor_breach_buys_reserve_token(
  ctx: &PipelineTestContext,
) -> Result<()> {
  let mut state = ctx.state();
  state.reserve_values.insert(RESERVE, fd("3000000"));
  state.set_balance(CUSD, RELAYER, fd("500000"));
  let harness = ctx.harness(state);
  let report = harness.pipeline.run_cycle().await?;

  assert!(!report.failed);
  let band = report.floor_ceiling.context("floor/ceiling outcome")?;
  assert_eq!(band.evaluation.status.backing_ratio_bps, 15_000);
  assert_eq!(
    band.evaluation.breach,
    BreachState::FloorBreach { floor: fd("3") }
  );
  let correction = band.correction.context("correction")?;
  assert_eq!(correction.delta.direction, Direction::Buy);
  assert_eq!(
    correction.delta.token_amount,
    fd("33590.978554075692333333")
  );
  assert_eq!(correction.payment, fd("72092.523109850220506108"));

  let approvals = harness.calls_to(CUSD, "approve");
  let spenders: Vec<CallArg> =
    approvals.iter().map(|call| call.args[0].clone()).collect();
  assert_eq!(
    spenders,
    vec![CallArg::Address(PROXY_POOL), CallArg::Address(VAULT)]
  );
  let swap = harness.single_call(PROXY_POOL, "batchSwapExactIn")?;
  assert_eq!(
    swap.args[1],
    CallArg::Array(vec![CallArg::Address(CUSD), CallArg::Address(KCUR)])
  );
  assert_eq!(swap.args[2], CallArg::Uint(wei("72092.523109850220506108")));
  assert_eq!(swap.args[3], CallArg::Uint(U256::from(100_000_000u64)));
  Ok(())
}

#[test_context(PipelineTestContext)]
#[tokio::test]
async fn ceiling_breach_sells_reserve_token(
  ctx: &PipelineTestContext,
) -> Result<()> {
  let mut state = ctx.state();
  state.reserve_values.insert(RESERVE, fd("500000"));
  state.set_balance(KCUR, RELAYER, fd("200000"));
  state.allowances.push(AllowanceEntry {
    token: KCUR,
    owner: RELAYER,
    spender: PROXY_POOL,
    amount: fd("1000000"),
  });
  let harness = ctx.harness(state);
  let report = harness.pipeline.run_cycle().await?;

  assert!(!report.failed);
  let band = report.floor_ceiling.context("floor/ceiling outcome")?;
  assert_eq!(
    band.evaluation.breach,
    BreachState::CeilingBreach {
      ceiling: fd("0.95"),
    }
  );
  let correction = band.correction.context("correction")?;
  assert_eq!(correction.delta.direction, Direction::Sell);
  assert_eq!(correction.payment, correction.delta.token_amount);
  assert_eq!(correction.payment, fd("61410.786821698413666666"));

  let approval = harness.single_call(KCUR, "approve")?;
  assert_eq!(approval.args[0], CallArg::Address(VAULT));
  let swap = harness.single_call(PROXY_POOL, "batchSwapExactIn")?;
  assert_eq!(
    swap.args[1],
    CallArg::Array(vec![CallArg::Address(KCUR), CallArg::Address(CUSD)])
  );
  Ok(())
}

#[test_context(PipelineTestContext)]
#[tokio::test]
async fn unaffordable_correction_is_recorded(
  ctx: &PipelineTestContext,
) -> Result<()> {
  let mut state = ctx.state();
  state.reserve_values.insert(RESERVE, fd("3000000"));
  let harness = ctx.harness(state);
  let report = harness.pipeline.run_cycle().await?;

  assert!(report.failed);
  assert_eq!(report.floor_ceiling, None);
  assert!(report.pegged_rate.is_some());
  assert!(harness.calls_to(CUSD, "approve").is_empty());
  assert!(harness.calls_to(PROXY_POOL, "batchSwapExactIn").is_empty());
  assert!(harness
    .notifier
    .subjects()
    .contains(&"floor-ceiling failed".to_string()));
  Ok(())
}

#[test_context(PipelineTestContext)]
#[tokio::test]
async fn long_peg_reserve_releases_tokens(
  ctx: &PipelineTestContext,
) -> Result<()> {
  let mut state = ctx.state();
  state.total_supplies.insert(KG, fd("1000"));
  let harness = ctx.harness(state);
  let report = harness.pipeline.run_cycle().await?;

  assert_eq!(
    report.peg_adjustment,
    Some(PegAdjustment::Withdraw {
      amount: fd("720.67039106145255"),
    })
  );
  let release = harness.single_call(PEG_RESERVE, "transferExchangeGold")?;
  assert_eq!(release.args[0], CallArg::Address(RELAYER));
  assert!(harness.calls_to(KCUR, "transfer").is_empty());
  Ok(())
}

#[test_context(PipelineTestContext)]
#[tokio::test]
async fn short_relayer_cannot_top_up_peg_reserve(
  ctx: &PipelineTestContext,
) -> Result<()> {
  let mut state = ctx.state();
  state.set_balance(KCUR, RELAYER, fd("100"));
  let harness = ctx.harness(state);
  let report = harness.pipeline.run_cycle().await?;

  assert!(report.failed);
  assert_eq!(report.peg_adjustment, None);
  assert!(report.floor_ceiling.is_some());
  assert!(harness.calls_to(KCUR, "transfer").is_empty());
  assert!(harness
    .notifier
    .subjects()
    .contains(&"peg-reserve failed".to_string()));
  Ok(())
}

#[test_context(PipelineTestContext)]
#[tokio::test]
async fn frozen_peg_reserve_cannot_release(
  ctx: &PipelineTestContext,
) -> Result<()> {
  let mut state = ctx.state();
  state.total_supplies.insert(KG, fd("1000"));
  state.unfrozen_balances.insert(PEG_RESERVE, fd("500"));
  let harness = ctx.harness(state);
  let report = harness.pipeline.run_cycle().await?;

  assert!(report.failed);
  assert_eq!(report.peg_adjustment, None);
  assert!(harness
    .calls_to(PEG_RESERVE, "transferExchangeGold")
    .is_empty());
  assert!(harness.calls_to(KCUR, "transfer").is_empty());
  assert!(harness
    .notifier
    .subjects()
    .contains(&"peg-reserve failed".to_string()));
  Ok(())
}

#[test_context(PipelineTestContext)]
#[tokio::test]
async fn overlapping_cycle_is_rejected(
  ctx: &PipelineTestContext,
) -> Result<()> {
  let harness = ctx.harness(ctx.state());
  let _held = harness.pipeline.run_lock().try_acquire()?;
  assert!(matches!(
    harness.pipeline.run_cycle().await,
    Err(CycleError::CycleInProgress)
  ));
  assert!(harness.chain.submitted().is_empty());
  Ok(())
}

#[test_context(PipelineTestContext)]
#[tokio::test]
async fn missing_contract_fails_cycle(ctx: &PipelineTestContext) -> Result<()> {
  let mut fixture = ctx.fixture.clone();
  fixture.registry.contracts.remove("ProxyPool");
  let harness =
    ctx.harness_with(ctx.state(), KeeperConfig::default(), fixture);
  let result = harness.pipeline.run_cycle().await;
  assert!(matches!(
    result,
    Err(CycleError::Registry(RegistryError::NotFound(ref name)))
      if name == "ProxyPool"
  ));
  Ok(())
}
