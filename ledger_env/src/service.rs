//! Ledger service abstraction consumed by the harness.

use async_trait::async_trait;
use crate::error::{FailureKind, ServiceError};
use crate::types::{Leg, NewWallet, Operation, WalletId};
use rust_decimal::Decimal;

/// Abstraction for the remote wallet service.
///
/// # Implementations
///
/// - **Production**: `HttpWalletService` over a pooled reqwest client
/// - **Simulation**: `SimLedger`, an in-memory ledger with fault injection
///
/// # Call Flow
///
/// ```text
/// Worker                     Service
///   |-- debit(a, 10.00) ------->|
///   |<------------- Ok / Err ---|
///   |-- credit(b, 10.00) ------>|
///   |<------------- Ok / Err ---|
/// ```
///
/// Implementations must be safe for concurrent use: every worker shares
/// one instance (and, in production, one connection pool).
#[async_trait]
pub trait WalletService: Send + Sync + 'static {
    /// Creates a wallet and returns its service-assigned identifier.
    async fn create_wallet(&self, wallet: &NewWallet) -> Result<WalletId, ServiceError>;
    
    /// Removes `amount` from the wallet's balance.
    async fn debit(&self, wallet: &WalletId, amount: Decimal) -> Result<(), ServiceError>;
    
    /// Adds `amount` to the wallet's balance.
    async fn credit(&self, wallet: &WalletId, amount: Decimal) -> Result<(), ServiceError>;
    
    /// Reads the wallet's current balance.
    async fn balance(&self, wallet: &WalletId) -> Result<Decimal, ServiceError>;
    
    /// Dispatches one transfer leg.
    async fn apply(&self, leg: Leg, wallet: &WalletId, amount: Decimal) -> Result<(), ServiceError> {
        match leg {
            Leg::Debit => self.debit(wallet, amount).await,
            Leg::Credit => self.credit(wallet, amount).await,
        }
    }
}

/// Marker trait for fault controllers in simulation.
///
/// Allows injecting failures into specific wallet operations.
pub trait FaultInjector: Send + Sync {
    /// Fails the next `count` calls of `op` on `wallet` with the given kind.
    /// `None` targets every wallet.
    fn fail_next(&self, wallet: Option<&WalletId>, op: Operation, count: u32, kind: FailureKind);
    
    /// Fails every call of `op` on `wallet` until healed.
    fn fail_forever(&self, wallet: &WalletId, op: Operation);
    
    /// Sets the probability (0.0 - 1.0) that any call fails.
    fn set_failure_rate(&self, rate: f64);
    
    /// Removes all injected faults.
    fn heal_all(&self);
}
