//! Ground truth ledger for simulation.
//!
//! The SimLedger is the "God's eye view" of the simulated service:
//! - True balance of every wallet
//! - Atomic debit/credit under one lock
//! - Fault injection hooks on every call
//!
//! The harness only sees it through `WalletService`; scenarios read the
//! ground truth directly to cross-check what the harness reconciled.

use crate::faults::{SimFaultController, Verdict};

use async_trait::async_trait;
use ledger_env::{NewWallet, Operation, ServiceError, UserId, WalletId, WalletService};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A wallet as the simulated service stores it.
#[derive(Debug, Clone, PartialEq)]
pub struct SimWallet {
    pub id: WalletId,
    pub user_id: UserId,
    pub balance: Decimal,
}

#[derive(Debug, Default)]
struct LedgerState {
    wallets: HashMap<WalletId, SimWallet>,
    next_id: u64,
    calls: HashMap<Operation, u64>,
}

/// In-memory ledger implementing the wallet service.
pub struct SimLedger {
    state: Mutex<LedgerState>,
    faults: Arc<SimFaultController>,
}

impl SimLedger {
    /// Creates an empty ledger whose random faults derive from `seed`.
    pub fn new(seed: u64) -> Self {
        Self::with_faults(Arc::new(SimFaultController::new(seed)))
    }
    
    /// Creates an empty ledger using an existing fault controller.
    pub fn with_faults(faults: Arc<SimFaultController>) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            faults,
        }
    }
    
    /// Identifier the `n`-th creation request (1-based) receives.
    ///
    /// Ids are consumed even by failed creations, like a database sequence.
    pub fn id_for(n: u64) -> WalletId {
        WalletId::new(format!("wallet-{}", n))
    }
    
    /// Returns the fault controller.
    pub fn faults(&self) -> &Arc<SimFaultController> {
        &self.faults
    }
    
    /// Sum of every stored balance.
    pub fn total_balance(&self) -> Decimal {
        self.state.lock().unwrap().wallets.values().map(|w| w.balance).sum()
    }
    
    /// Number of stored wallets.
    pub fn wallet_count(&self) -> usize {
        self.state.lock().unwrap().wallets.len()
    }
    
    /// Returns a stored wallet.
    pub fn wallet(&self, id: &WalletId) -> Option<SimWallet> {
        self.state.lock().unwrap().wallets.get(id).cloned()
    }
    
    /// Number of calls received for `op`, including failed ones.
    pub fn calls(&self, op: Operation) -> u64 {
        self.state.lock().unwrap().calls.get(&op).copied().unwrap_or(0)
    }
    
    /// Total calls received.
    pub fn total_calls(&self) -> u64 {
        self.state.lock().unwrap().calls.values().sum()
    }
    
    fn count(&self, op: Operation) {
        *self.state.lock().unwrap().calls.entry(op).or_insert(0) += 1;
    }
    
    fn adjust(&self, wallet: &WalletId, op: Operation, delta: Decimal) -> Result<(), ServiceError> {
        self.count(op);
        let verdict = self.faults.check(Some(wallet), op);
        if let Verdict::Fail(e) = verdict {
            return Err(e);
        }
        
        {
            let mut state = self.state.lock().unwrap();
            let stored = state.wallets.get_mut(wallet).ok_or_else(|| ServiceError::Status {
                status: 404,
                body: format!("wallet {} not found", wallet),
            })?;
            stored.balance += delta;
        }
        
        match verdict {
            Verdict::LoseAck(e) => Err(e),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl WalletService for SimLedger {
    async fn create_wallet(&self, wallet: &NewWallet) -> Result<WalletId, ServiceError> {
        tokio::task::yield_now().await;
        self.count(Operation::CreateWallet);
        
        let id = {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            Self::id_for(state.next_id)
        };
        
        let verdict = self.faults.check(Some(&id), Operation::CreateWallet);
        if let Verdict::Fail(e) = verdict {
            return Err(e);
        }
        
        self.state.lock().unwrap().wallets.insert(
            id.clone(),
            SimWallet {
                id: id.clone(),
                user_id: wallet.user_id,
                balance: wallet.balance,
            },
        );
        
        match verdict {
            Verdict::LoseAck(e) => Err(e),
            _ => Ok(id),
        }
    }
    
    async fn debit(&self, wallet: &WalletId, amount: Decimal) -> Result<(), ServiceError> {
        tokio::task::yield_now().await;
        self.adjust(wallet, Operation::Debit, -amount)
    }
    
    async fn credit(&self, wallet: &WalletId, amount: Decimal) -> Result<(), ServiceError> {
        tokio::task::yield_now().await;
        self.adjust(wallet, Operation::Credit, amount)
    }
    
    async fn balance(&self, wallet: &WalletId) -> Result<Decimal, ServiceError> {
        tokio::task::yield_now().await;
        self.count(Operation::ReadBalance);
        
        if let Verdict::Fail(e) | Verdict::LoseAck(e) = self.faults.check(Some(wallet), Operation::ReadBalance) {
            return Err(e);
        }
        
        self.state
            .lock()
            .unwrap()
            .wallets
            .get(wallet)
            .map(|w| w.balance)
            .ok_or_else(|| ServiceError::Status {
                status: 404,
                body: format!("wallet {} not found", wallet),
            })
    }
}
