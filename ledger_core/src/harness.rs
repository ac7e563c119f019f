//! Load Harness - orchestrates one verification run.
//!
//! ```text
//! ┌────────────┐   ┌──────────────────────────────┐   ┌────────────┐   ┌────────────┐
//! │ Provisioner│──►│ Worker 0 … Worker T-1        │──►│ Aggregator │──►│ Reconciler │
//! │ (serial)   │   │ (parallel, private counters) │   │ (pure)     │   │ (serial)   │
//! └────────────┘   └──────────────┬───────────────┘   └────────────┘   └────────────┘
//!                                 │ join barrier
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use ledger_core::{LoadHarness, HarnessConfig, HttpWalletService, HttpConfig};
//! use ledger_env::TokioContext;
//!
//! let service = Arc::new(HttpWalletService::new(&HttpConfig::new(url))?);
//! let harness = LoadHarness::new(TokioContext::shared(), service, HarnessConfig::default());
//! let report = harness.run().await?;
//! ```

use crate::config::HarnessConfig;
use crate::executor::TransferExecutor;
use crate::metrics::{aggregate, RunTotals, WorkerResult};
use crate::provisioner::{Provisioned, Provisioner};
use crate::reconciler::{ReconcileError, Reconciler, Reconciliation};
use crate::worker::Worker;

use ledger_env::{LedgerContext, WalletId, WalletService};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Run-level failures.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Pair sampling needs two distinct wallets
    #[error("only {created} of {requested} wallets were created; at least 2 are needed")]
    NotEnoughWallets { created: usize, requested: usize },
    
    /// A worker task panicked or was cancelled
    #[error("worker task failed: {0}")]
    WorkerPanicked(String),
    
    /// Balances could not be read back
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    
    /// The conservation invariant does not hold
    #[error("total balance mismatch: expected {expected}, observed {observed}")]
    BalanceMismatch {
        expected: Decimal,
        observed: Decimal,
        report: Box<RunReport>,
    },
}

/// Everything known at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Parameters of the run
    pub config: HarnessConfig,
    
    /// Wallets requested
    pub wallets_requested: usize,
    
    /// Wallets actually created
    pub wallets_created: usize,
    
    /// Aggregated worker counters
    pub totals: RunTotals,
    
    /// Expected vs. observed balances
    pub reconciliation: Reconciliation,
    
    /// Run duration by the context's clock
    pub elapsed_ms: u64,
}

impl RunReport {
    /// Initial total balance (quantized).
    pub fn initial_total(&self) -> Decimal {
        self.reconciliation.expected
    }
    
    /// Final total balance (quantized).
    pub fn final_total(&self) -> Decimal {
        self.reconciliation.observed
    }
    
    /// Logs the end-of-run summary.
    pub fn log_summary(&self) {
        let c = &self.totals.counters;
        info!("Successful debits: {}", c.successful_debits);
        info!("Failed debits: {}", c.failed_debits);
        info!("Successful credits: {}", c.successful_credits);
        info!("Failed credits: {}", c.failed_credits);
        info!("Aborted connections: {}", c.aborted_connections);
        if c.abandoned_legs > 0 {
            error!("Abandoned legs: {}", c.abandoned_legs);
        }
        info!("Final total balance: {}", self.final_total());
    }
}

/// Drives provisioning, the worker pool, aggregation and reconciliation.
///
/// Generic over the context and service implementations, allowing the
/// same harness to run against a live service (tokio + HTTP) or the
/// in-memory simulation.
pub struct LoadHarness<Ctx, Svc>
where
    Ctx: LedgerContext,
    Svc: WalletService,
{
    /// Environment context
    context: Arc<Ctx>,
    
    /// Shared service handle (the only cross-worker resource)
    service: Arc<Svc>,
    
    /// Run parameters
    config: HarnessConfig,
}

impl<Ctx, Svc> LoadHarness<Ctx, Svc>
where
    Ctx: LedgerContext,
    Svc: WalletService,
{
    /// Creates a harness with the given context, service and configuration.
    pub fn new(context: Arc<Ctx>, service: Arc<Svc>, config: HarnessConfig) -> Self {
        Self {
            context,
            service,
            config,
        }
    }
    
    fn executor(&self) -> TransferExecutor<Ctx, Svc> {
        TransferExecutor::new(
            Arc::clone(&self.context),
            Arc::clone(&self.service),
            self.config.backoff,
        )
    }
    
    /// Creates the wallet population.
    pub async fn provision(&self) -> Provisioned {
        Provisioner::new(Arc::clone(&self.context), Arc::clone(&self.service))
            .provision(self.config.wallets, self.config.initial_balance)
            .await
    }
    
    /// Spawns one task per worker and waits for all of them.
    ///
    /// Returns only after every worker has terminated; results arrive in
    /// completion order.
    pub async fn run_workers(&self, wallets: Arc<[WalletId]>) -> Result<Vec<WorkerResult>, HarnessError> {
        let mut tasks = JoinSet::new();
        
        for index in 0..self.config.workers {
            let worker = Worker::new(
                index,
                self.config.iterations,
                Arc::clone(&wallets),
                self.config.amount_mode,
                self.executor(),
                self.context.worker_rng(index as u64),
            );
            tasks.spawn(worker.run());
        }
        
        let mut results = Vec::with_capacity(self.config.workers);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => {
                    tasks.abort_all();
                    return Err(HarnessError::WorkerPanicked(e.to_string()));
                }
            }
        }
        Ok(results)
    }
    
    /// Runs the whole verification.
    ///
    /// # Errors
    ///
    /// [`HarnessError::BalanceMismatch`] is the correctness failure; every
    /// other variant means the run could not reach a verdict.
    pub async fn run(&self) -> Result<RunReport, HarnessError> {
        let started = self.context.now();
        
        info!("Number of threads: {}", self.config.workers);
        info!("Number of wallets: {}", self.config.wallets);
        info!("Initial balance: {}", self.config.initial_balance);
        info!("Number of iterations: {}", self.config.iterations);
        info!("Transfer amount: {}", self.config.amount_mode);
        
        let provisioned = self.provision().await;
        if provisioned.created() < 2 && self.config.total_iterations() > 0 {
            return Err(HarnessError::NotEnoughWallets {
                created: provisioned.created(),
                requested: provisioned.requested,
            });
        }
        let expected = provisioned.expected_total();
        info!("Initial total balance: {}", expected);
        
        let wallets: Arc<[WalletId]> = provisioned.wallets.into();
        let results = self.run_workers(Arc::clone(&wallets)).await?;
        let totals = aggregate(&results);
        
        let reconciliation = Reconciler::new(
            Arc::clone(&self.context),
            Arc::clone(&self.service),
            self.config.backoff,
        )
        .reconcile(&wallets, expected, self.config.amount_mode.scale())
        .await?;
        
        let report = RunReport {
            config: self.config.clone(),
            wallets_requested: provisioned.requested,
            wallets_created: wallets.len(),
            totals,
            reconciliation,
            elapsed_ms: (self.context.now() - started).as_millis() as u64,
        };
        report.log_summary();
        
        if report.reconciliation.is_conserved() {
            Ok(report)
        } else {
            Err(HarnessError::BalanceMismatch {
                expected: report.initial_total(),
                observed: report.final_total(),
                report: Box::new(report),
            })
        }
    }
}
