//! Test doubles for unit tests inside this crate.
//!
//! The full simulation (virtual clock, fault controller, scenarios) lives in
//! `ledger_sim`; these are the minimum needed to exercise one component.

use async_trait::async_trait;
use ledger_env::{LedgerContext, NewWallet, Operation, ServiceError, UserId, WalletId, WalletService};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Clock that records requested sleeps instead of waiting.
#[derive(Default)]
pub struct ManualClock {
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }
    
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerContext for ManualClock {
    fn now(&self) -> Duration {
        *self.elapsed.lock().unwrap()
    }
    
    async fn sleep(&self, duration: Duration) {
        *self.elapsed.lock().unwrap() += duration;
        self.sleeps.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
    
    fn worker_rng(&self, worker_index: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(worker_index)
    }
    
    fn derive_user_id(&self, index: u64) -> UserId {
        UserId::from_seed(index)
    }
    
    fn seed(&self) -> u64 {
        0
    }
}

/// In-memory service whose failures are scripted per operation.
#[derive(Default)]
pub struct ScriptedService {
    balances: Mutex<HashMap<WalletId, Decimal>>,
    failures: Mutex<HashMap<Operation, VecDeque<ServiceError>>>,
    next_id: Mutex<u64>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }
    
    pub fn with_wallets(ids: &[&str], balance: Decimal) -> Self {
        let service = Self::new();
        {
            let mut balances = service.balances.lock().unwrap();
            for id in ids {
                balances.insert(WalletId::new(*id), balance);
            }
        }
        service
    }
    
    /// Queues errors returned, in order, by the next calls of `op`.
    pub fn fail_next(&self, op: Operation, errors: Vec<ServiceError>) {
        self.failures.lock().unwrap().entry(op).or_default().extend(errors);
    }
    
    pub fn balance_of(&self, id: &str) -> Decimal {
        self.balances.lock().unwrap()[&WalletId::new(id)]
    }
    
    fn scripted(&self, op: Operation) -> Result<(), ServiceError> {
        match self.failures.lock().unwrap().get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
    
    fn adjust(&self, wallet: &WalletId, delta: Decimal) -> Result<(), ServiceError> {
        let mut balances = self.balances.lock().unwrap();
        let balance = balances
            .get_mut(wallet)
            .ok_or(ServiceError::Status { status: 404, body: wallet.to_string() })?;
        *balance += delta;
        Ok(())
    }
}

#[async_trait]
impl WalletService for ScriptedService {
    async fn create_wallet(&self, wallet: &NewWallet) -> Result<WalletId, ServiceError> {
        self.scripted(Operation::CreateWallet)?;
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let id = WalletId::new(format!("w{}", *next_id));
        self.balances.lock().unwrap().insert(id.clone(), wallet.balance);
        Ok(id)
    }
    
    async fn debit(&self, wallet: &WalletId, amount: Decimal) -> Result<(), ServiceError> {
        self.scripted(Operation::Debit)?;
        self.adjust(wallet, -amount)
    }
    
    async fn credit(&self, wallet: &WalletId, amount: Decimal) -> Result<(), ServiceError> {
        self.scripted(Operation::Credit)?;
        self.adjust(wallet, amount)
    }
    
    async fn balance(&self, wallet: &WalletId) -> Result<Decimal, ServiceError> {
        self.scripted(Operation::ReadBalance)?;
        self.balances
            .lock()
            .unwrap()
            .get(wallet)
            .copied()
            .ok_or(ServiceError::Status { status: 404, body: wallet.to_string() })
    }
}
