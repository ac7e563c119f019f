//! Reconciler - the conservation oracle.
//!
//! Re-reads every wallet, sums with exact decimal arithmetic, and compares
//! the quantized sum against the expected total.

use crate::backoff::BackoffPolicy;

use ledger_env::{LedgerContext, ServiceError, WalletId, WalletService};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// A balance could not be read within the retry budget.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("balance of wallet {wallet} unavailable after {attempts} attempts: {last}")]
    BalanceUnavailable {
        wallet: WalletId,
        attempts: u32,
        last: ServiceError,
    },
}

/// Rounds `value` to `scale` fractional digits (banker's rounding).
pub fn quantize(value: Decimal, scale: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(scale);
    rounded
}

/// Expected vs. observed total balance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    /// Quantized expected total
    pub expected: Decimal,
    
    /// Quantized observed total
    pub observed: Decimal,
    
    /// Fractional digits both totals were quantized to
    pub scale: u32,
    
    /// Wallets read
    pub wallets: usize,
    
    /// Failed balance reads that were retried
    pub read_retries: u64,
}

impl Reconciliation {
    /// Returns true if no money was created or destroyed.
    pub fn is_conserved(&self) -> bool {
        self.expected == self.observed
    }
    
    /// Observed minus expected.
    pub fn drift(&self) -> Decimal {
        self.observed - self.expected
    }
    
    /// Panics if the totals diverge.
    pub fn assert_conserved(&self) {
        assert_eq!(
            self.expected, self.observed,
            "The total balance before and after the transactions do not match"
        );
    }
}

/// Reads balances sequentially and checks conservation.
pub struct Reconciler<Ctx, Svc>
where
    Ctx: LedgerContext,
    Svc: WalletService,
{
    context: Arc<Ctx>,
    service: Arc<Svc>,
    policy: BackoffPolicy,
}

impl<Ctx, Svc> Reconciler<Ctx, Svc>
where
    Ctx: LedgerContext,
    Svc: WalletService,
{
    pub fn new(context: Arc<Ctx>, service: Arc<Svc>, policy: BackoffPolicy) -> Self {
        Self {
            context,
            service,
            policy,
        }
    }
    
    /// Reads one balance, retrying under the backoff policy.
    async fn read_balance(&self, wallet: &WalletId, retries: &mut u64) -> Result<Decimal, ReconcileError> {
        let mut retry_count: u32 = 0;
        
        loop {
            let attempts = retry_count.saturating_add(1);
            match self.service.balance(wallet).await {
                Ok(balance) => return Ok(balance),
                Err(e) if self.policy.allows_attempt(attempts) => {
                    let delay = self.policy.delay(retry_count);
                    warn!(%wallet, retry = retry_count, error = %e, "Failed to get wallet balance, retrying");
                    *retries += 1;
                    self.context.sleep(delay).await;
                    retry_count = attempts;
                }
                Err(e) => {
                    return Err(ReconcileError::BalanceUnavailable {
                        wallet: wallet.clone(),
                        attempts,
                        last: e,
                    });
                }
            }
        }
    }
    
    /// Sums every wallet's current balance and compares it with `expected`.
    pub async fn reconcile(
        &self,
        wallets: &[WalletId],
        expected: Decimal,
        scale: u32,
    ) -> Result<Reconciliation, ReconcileError> {
        let mut observed = Decimal::ZERO;
        let mut read_retries = 0;
        
        for wallet in wallets {
            let balance = self.read_balance(wallet, &mut read_retries).await?;
            debug!(%wallet, %balance, "read balance");
            observed += balance;
        }
        
        let reconciliation = Reconciliation {
            expected: quantize(expected, scale),
            observed: quantize(observed, scale),
            scale,
            wallets: wallets.len(),
            read_retries,
        };
        
        if reconciliation.is_conserved() {
            info!(expected = %reconciliation.expected, "total balance conserved");
        } else {
            error!(
                expected = %reconciliation.expected,
                observed = %reconciliation.observed,
                drift = %reconciliation.drift(),
                "The total balance before and after the transactions do not match"
            );
        }
        
        Ok(reconciliation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualClock, ScriptedService};
    use ledger_env::Operation;
    use std::str::FromStr;
    
    fn reconciler(service: Arc<ScriptedService>, policy: BackoffPolicy) -> Reconciler<ManualClock, ScriptedService> {
        Reconciler::new(Arc::new(ManualClock::new()), service, policy)
    }
    
    fn ids(names: &[&str]) -> Vec<WalletId> {
        names.iter().map(|n| WalletId::new(*n)).collect()
    }
    
    #[test]
    fn test_quantize_banker() {
        assert_eq!(quantize(Decimal::from_str("1.005").unwrap(), 2), Decimal::from_str("1.00").unwrap());
        assert_eq!(quantize(Decimal::from_str("1.015").unwrap(), 2), Decimal::from_str("1.02").unwrap());
        assert_eq!(quantize(Decimal::from_str("300").unwrap(), 2).to_string(), "300.00");
    }
    
    #[tokio::test]
    async fn test_reconcile_conserved() {
        let service = Arc::new(ScriptedService::with_wallets(&["a", "b", "c"], Decimal::new(100, 0)));
        let r = reconciler(service, BackoffPolicy::default())
            .reconcile(&ids(&["a", "b", "c"]), Decimal::new(300, 0), 2)
            .await
            .unwrap();
        
        assert!(r.is_conserved());
        assert_eq!(r.wallets, 3);
        r.assert_conserved();
    }
    
    #[tokio::test]
    async fn test_reconcile_ignores_noise_below_scale() {
        let service = Arc::new(ScriptedService::with_wallets(&["a"], Decimal::from_str("99.999999").unwrap()));
        let r = reconciler(service, BackoffPolicy::default())
            .reconcile(&ids(&["a"]), Decimal::new(100, 0), 5)
            .await
            .unwrap();
        
        assert!(r.is_conserved());
    }
    
    #[tokio::test]
    async fn test_reconcile_detects_drift() {
        let service = Arc::new(ScriptedService::with_wallets(&["a", "b"], Decimal::new(100, 0)));
        let r = reconciler(service, BackoffPolicy::default())
            .reconcile(&ids(&["a", "b"]), Decimal::new(210, 0), 2)
            .await
            .unwrap();
        
        assert!(!r.is_conserved());
        assert_eq!(r.drift(), Decimal::new(-10, 0));
    }
    
    #[tokio::test]
    #[should_panic(expected = "do not match")]
    async fn test_assert_conserved_panics_on_mismatch() {
        let service = Arc::new(ScriptedService::with_wallets(&["a"], Decimal::new(90, 0)));
        let r = reconciler(service, BackoffPolicy::default())
            .reconcile(&ids(&["a"]), Decimal::new(100, 0), 2)
            .await
            .unwrap();
        r.assert_conserved();
    }
    
    #[tokio::test]
    async fn test_reads_are_retried() {
        let service = Arc::new(ScriptedService::with_wallets(&["a", "b"], Decimal::new(50, 0)));
        service.fail_next(Operation::ReadBalance, vec![ServiceError::Timeout(1); 3]);
        
        let r = reconciler(service, BackoffPolicy::default())
            .reconcile(&ids(&["a", "b"]), Decimal::new(100, 0), 2)
            .await
            .unwrap();
        
        assert!(r.is_conserved());
        assert_eq!(r.read_retries, 3);
    }
    
    #[tokio::test]
    async fn test_bounded_reads_give_up() {
        let service = Arc::new(ScriptedService::with_wallets(&["a"], Decimal::new(50, 0)));
        service.fail_next(Operation::ReadBalance, vec![ServiceError::Timeout(1); 3]);
        
        let err = reconciler(service, BackoffPolicy::default().with_max_attempts(Some(2)))
            .reconcile(&ids(&["a"]), Decimal::new(50, 0), 2)
            .await
            .unwrap_err();
        
        let ReconcileError::BalanceUnavailable { attempts, .. } = err;
        assert_eq!(attempts, 2);
    }
}
