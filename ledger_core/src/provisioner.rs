//! Wallet Provisioner - creates the wallet population for a run.

use ledger_env::{LedgerContext, NewWallet, WalletId, WalletService};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

/// Wallets created for a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provisioned {
    /// Successfully created wallets, in creation order
    pub wallets: Vec<WalletId>,
    
    /// Wallets asked for
    pub requested: usize,
    
    /// Balance every wallet started with
    pub initial_balance: Decimal,
}

impl Provisioned {
    /// Number of wallets actually created.
    pub fn created(&self) -> usize {
        self.wallets.len()
    }
    
    /// Number of creations that failed and were skipped.
    pub fn skipped(&self) -> usize {
        self.requested - self.wallets.len()
    }
    
    /// Sum of balances the population starts with.
    ///
    /// Uses the created count, never the requested count: a skipped wallet
    /// holds no money.
    pub fn expected_total(&self) -> Decimal {
        self.initial_balance * Decimal::from(self.wallets.len())
    }
}

/// Creates wallets sequentially, skipping failures.
pub struct Provisioner<Ctx, Svc>
where
    Ctx: LedgerContext,
    Svc: WalletService,
{
    context: Arc<Ctx>,
    service: Arc<Svc>,
}

impl<Ctx, Svc> Provisioner<Ctx, Svc>
where
    Ctx: LedgerContext,
    Svc: WalletService,
{
    pub fn new(context: Arc<Ctx>, service: Arc<Svc>) -> Self {
        Self { context, service }
    }
    
    /// Issues one creation request per wallet.
    pub async fn provision(&self, count: usize, initial_balance: Decimal) -> Provisioned {
        let mut wallets = Vec::with_capacity(count);
        
        for i in 0..count {
            let request = NewWallet::new(initial_balance, self.context.derive_user_id(i as u64));
            match self.service.create_wallet(&request).await {
                Ok(id) => {
                    debug!(wallet = %id, user = %request.user_id, "created wallet");
                    wallets.push(id);
                }
                Err(e) => error!("Failed to create wallet: {}", e),
            }
        }
        
        Provisioned {
            wallets,
            requested: count,
            initial_balance,
        }
    }
}
