//! Orchestration of the reserve keeper: one cycle fetches the reference
//! price, derives and publishes the reserve token price, reports the pegged
//! exchange rate, realigns the peg reserve and corrects floor or ceiling
//! breaches of the reserve invariant.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use keeper_clients::prelude::*;
//! use keeper_pipeline::config::KeeperConfig;
//! use keeper_pipeline::dry_run::{DryRunChain, DryRunFixture};
//! use keeper_pipeline::pipeline::OracleReportingPipeline;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let fixture = DryRunFixture::load("fixture.json".as_ref())?;
//! let chain = Arc::new(DryRunChain::new(fixture.chain.clone()));
//! let pipeline = OracleReportingPipeline::new(
//!   KeeperConfig::from_env(),
//!   Arc::new(fixture.registry()),
//!   chain.clone(),
//!   chain,
//!   Arc::new(fixture.price_feed()),
//!   Arc::new(LogNotifier),
//! );
//! let status = pipeline.handler().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod deployment;
pub mod dry_run;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod services;
