//! Worker - one logical thread of randomized pairwise transfers.

use crate::amount::AmountMode;
use crate::executor::{Transfer, TransferExecutor};
use crate::metrics::WorkerResult;

use ledger_env::{LedgerContext, WalletId, WalletService};
use rand::seq::index;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tracing::debug;

/// Picks two distinct indices in `0..len`, uniformly, without replacement.
///
/// # Panics
/// Panics if `len < 2`; the harness refuses to start workers in that case.
pub fn sample_pair<R: Rng + ?Sized>(rng: &mut R, len: usize) -> (usize, usize) {
    let picked = index::sample(rng, len, 2);
    (picked.index(0), picked.index(1))
}

/// A worker owning its RNG and counters for its entire run.
///
/// Nothing the worker writes is visible to other workers; the only shared
/// pieces are the immutable wallet list and the executor's service handle.
pub struct Worker<Ctx, Svc>
where
    Ctx: LedgerContext,
    Svc: WalletService,
{
    /// Worker index (for logging and RNG derivation)
    index: usize,
    
    /// Iterations to run
    iterations: u64,
    
    /// Full wallet population
    wallets: Arc<[WalletId]>,
    
    /// Amount selection
    amount_mode: AmountMode,
    
    /// Leg executor (shares the service)
    executor: TransferExecutor<Ctx, Svc>,
    
    /// Private random source
    rng: ChaCha8Rng,
    
    /// Private counters
    tally: WorkerResult,
}

impl<Ctx, Svc> Worker<Ctx, Svc>
where
    Ctx: LedgerContext,
    Svc: WalletService,
{
    /// Creates a worker.
    pub fn new(
        index: usize,
        iterations: u64,
        wallets: Arc<[WalletId]>,
        amount_mode: AmountMode,
        executor: TransferExecutor<Ctx, Svc>,
        rng: ChaCha8Rng,
    ) -> Self {
        Self {
            index,
            iterations,
            wallets,
            amount_mode,
            executor,
            rng,
            tally: WorkerResult::new(),
        }
    }
    
    /// Draws the next transfer.
    pub fn next_transfer(&mut self) -> Transfer {
        let (from, to) = sample_pair(&mut self.rng, self.wallets.len());
        Transfer {
            source: self.wallets[from].clone(),
            destination: self.wallets[to].clone(),
            amount: self.amount_mode.sample(&mut self.rng),
        }
    }
    
    /// Runs every iteration and hands back the counters.
    pub async fn run(mut self) -> WorkerResult {
        debug!(worker = self.index, iterations = self.iterations, "worker started");
        
        for _ in 0..self.iterations {
            let transfer = self.next_transfer();
            // Abandoned legs are already counted in the tally
            let _ = self.executor.execute(&transfer, &mut self.tally).await;
        }
        
        debug!(
            worker = self.index,
            debits = self.tally.successful_debits,
            credits = self.tally.successful_credits,
            failed = self.tally.failed_attempts(),
            "worker finished"
        );
        self.tally
    }
}
