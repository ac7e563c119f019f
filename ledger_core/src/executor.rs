//! Transfer Executor - the per-leg retry state machine.
//!
//! ```text
//!            ┌──────────── failure ────────────┐
//!            ▼                                 │
//!   ──► ATTEMPT ── success ──► DONE        BACKOFF
//!            │                                 ▲
//!            └── failure (count, classify) ────┘
//! ```
//!
//! With the default policy there is no terminal failure state: a leg is
//! retried until the service accepts it. A bounded policy adds one, which
//! surfaces as [`LegError::RetriesExhausted`].

use crate::backoff::BackoffPolicy;
use crate::metrics::WorkerResult;

use ledger_env::{FailureKind, LedgerContext, Leg, ServiceError, WalletId, WalletService};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// A leg gave up before the service accepted it.
#[derive(Debug, Clone, Error)]
pub enum LegError {
    #[error("{leg} on wallet {wallet} abandoned after {attempts} attempts: {last}")]
    RetriesExhausted {
        leg: Leg,
        wallet: WalletId,
        attempts: u32,
        last: ServiceError,
    },
}

/// How a successful leg got there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegOutcome {
    /// Attempts issued, including the successful one
    pub attempts: u32,
}

impl LegOutcome {
    /// Number of retries (attempts after the first).
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// One iteration's movement of `amount` from `source` to `destination`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub source: WalletId,
    pub destination: WalletId,
    pub amount: Decimal,
}

/// Executes debit and credit legs against the shared service.
pub struct TransferExecutor<Ctx, Svc>
where
    Ctx: LedgerContext,
    Svc: WalletService,
{
    context: Arc<Ctx>,
    service: Arc<Svc>,
    policy: BackoffPolicy,
}

impl<Ctx, Svc> Clone for TransferExecutor<Ctx, Svc>
where
    Ctx: LedgerContext,
    Svc: WalletService,
{
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            service: Arc::clone(&self.service),
            policy: self.policy,
        }
    }
}

impl<Ctx, Svc> TransferExecutor<Ctx, Svc>
where
    Ctx: LedgerContext,
    Svc: WalletService,
{
    /// Creates an executor sharing the given context and service.
    pub fn new(context: Arc<Ctx>, service: Arc<Svc>, policy: BackoffPolicy) -> Self {
        Self {
            context,
            service,
            policy,
        }
    }
    
    /// Drives one leg to completion, recording every attempt into `tally`.
    pub async fn execute_leg(
        &self,
        leg: Leg,
        wallet: &WalletId,
        amount: Decimal,
        tally: &mut WorkerResult,
    ) -> Result<LegOutcome, LegError> {
        let mut retry_count: u32 = 0;
        
        loop {
            let attempts = retry_count.saturating_add(1);
            trace!(%leg, %wallet, %amount, attempt = attempts, "sending leg");
            
            let error = match self.service.apply(leg, wallet, amount).await {
                Ok(()) => {
                    tally.record_success(leg);
                    return Ok(LegOutcome { attempts });
                }
                Err(e) => e,
            };
            
            let kind = error.kind();
            tally.record_failure(leg, kind);
            
            if !self.policy.allows_attempt(attempts) {
                tally.record_abandoned();
                warn!(%leg, %wallet, attempts, error = %error, "giving up on leg");
                return Err(LegError::RetriesExhausted {
                    leg,
                    wallet: wallet.clone(),
                    attempts,
                    last: error,
                });
            }
            
            let delay = self.policy.delay(retry_count);
            let delay_ms = delay.as_millis() as u64;
            match kind {
                FailureKind::ConnectionExhausted => warn!(
                    %leg, %wallet, retry = retry_count, delay_ms, error = %error,
                    "connection aborted, backing off"
                ),
                FailureKind::Other => debug!(
                    %leg, %wallet, retry = retry_count, delay_ms, error = %error,
                    "leg failed, backing off"
                ),
            }
            
            self.context.sleep(delay).await;
            retry_count = attempts;
        }
    }
    
    /// Executes the debit then the credit of one transfer.
    ///
    /// If the debit is abandoned the credit is skipped, so no money is
    /// created. An abandoned credit leaves the debited amount missing,
    /// which reconciliation reports.
    pub async fn execute(&self, transfer: &Transfer, tally: &mut WorkerResult) -> Result<(), LegError> {
        self.execute_leg(Leg::Debit, &transfer.source, transfer.amount, tally).await?;
        self.execute_leg(Leg::Credit, &transfer.destination, transfer.amount, tally).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualClock, ScriptedService};
    use ledger_env::Operation;
    use std::time::Duration;
    
    fn setup(policy: BackoffPolicy) -> (Arc<ManualClock>, Arc<ScriptedService>, TransferExecutor<ManualClock, ScriptedService>) {
        let clock = Arc::new(ManualClock::new());
        let service = Arc::new(ScriptedService::with_wallets(&["a", "b"], Decimal::new(100, 0)));
        let executor = TransferExecutor::new(clock.clone(), service.clone(), policy);
        (clock, service, executor)
    }
    
    #[tokio::test]
    async fn test_leg_succeeds_first_try() {
        let (clock, _service, executor) = setup(BackoffPolicy::default());
        let mut tally = WorkerResult::new();
        
        let outcome = executor
            .execute_leg(Leg::Debit, &WalletId::new("a"), Decimal::TEN, &mut tally)
            .await
            .unwrap();
        
        assert_eq!(outcome.attempts, 1);
        assert_eq!(tally.successful_debits, 1);
        assert!(clock.sleeps().is_empty());
    }
    
    #[tokio::test]
    async fn test_leg_retries_with_growing_backoff() {
        let (clock, service, executor) = setup(BackoffPolicy::default());
        service.fail_next(Operation::Debit, vec![
            ServiceError::Timeout(30_000),
            ServiceError::exhausted("reset"),
            ServiceError::Status { status: 503, body: String::new() },
        ]);
        let mut tally = WorkerResult::new();
        
        let outcome = executor
            .execute_leg(Leg::Debit, &WalletId::new("a"), Decimal::TEN, &mut tally)
            .await
            .unwrap();
        
        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.retries(), 3);
        assert_eq!(tally.successful_debits, 1);
        assert_eq!(tally.failed_debits, 2);
        assert_eq!(tally.aborted_connections, 1);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(100), Duration::from_millis(200), Duration::from_millis(400)]
        );
        assert_eq!(service.balance_of("a"), Decimal::new(90, 0));
    }
    
    #[tokio::test]
    async fn test_backoff_caps_at_max_delay() {
        let (clock, service, executor) = setup(BackoffPolicy::default());
        service.fail_next(Operation::Credit, vec![ServiceError::Timeout(1); 10]);
        let mut tally = WorkerResult::new();
        
        executor
            .execute_leg(Leg::Credit, &WalletId::new("b"), Decimal::TEN, &mut tally)
            .await
            .unwrap();
        
        let sleeps = clock.sleeps();
        assert_eq!(sleeps.len(), 10);
        assert_eq!(sleeps[6], Duration::from_millis(6400));
        assert_eq!(sleeps[7], Duration::from_secs(10));
        assert_eq!(sleeps[9], Duration::from_secs(10));
        assert_eq!(tally.failed_credits, 10);
    }
    
    #[tokio::test]
    async fn test_bounded_policy_abandons_leg() {
        let (clock, service, executor) = setup(BackoffPolicy::default().with_max_attempts(Some(3)));
        service.fail_next(Operation::Debit, vec![ServiceError::Timeout(1); 5]);
        let mut tally = WorkerResult::new();
        
        let err = executor
            .execute_leg(Leg::Debit, &WalletId::new("a"), Decimal::TEN, &mut tally)
            .await
            .unwrap_err();
        
        let LegError::RetriesExhausted { attempts, leg, .. } = err;
        assert_eq!(attempts, 3);
        assert_eq!(leg, Leg::Debit);
        assert_eq!(tally.failed_debits, 3);
        assert_eq!(tally.abandoned_legs, 1);
        assert_eq!(clock.sleeps().len(), 2);
    }
    
    #[tokio::test]
    async fn test_abandoned_debit_skips_credit() {
        let (_clock, service, executor) = setup(BackoffPolicy::default().with_max_attempts(Some(1)));
        service.fail_next(Operation::Debit, vec![ServiceError::Timeout(1)]);
        let mut tally = WorkerResult::new();
        let transfer = Transfer {
            source: WalletId::new("a"),
            destination: WalletId::new("b"),
            amount: Decimal::TEN,
        };
        
        assert!(executor.execute(&transfer, &mut tally).await.is_err());
        assert_eq!(tally.successful_credits, 0);
        assert_eq!(service.balance_of("a") + service.balance_of("b"), Decimal::new(200, 0));
    }
    
    #[tokio::test]
    async fn test_transfer_moves_amount() {
        let (_clock, service, executor) = setup(BackoffPolicy::default());
        let mut tally = WorkerResult::new();
        let transfer = Transfer {
            source: WalletId::new("a"),
            destination: WalletId::new("b"),
            amount: Decimal::new(1050, 2),
        };
        
        executor.execute(&transfer, &mut tally).await.unwrap();
        
        assert_eq!(service.balance_of("a"), Decimal::new(8950, 2));
        assert_eq!(service.balance_of("b"), Decimal::new(11050, 2));
        assert_eq!(tally.successful_debits, 1);
        assert_eq!(tally.successful_credits, 1);
    }
}
