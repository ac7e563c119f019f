//! Fault injection for the simulated ledger.

use ledger_env::{FailureKind, FaultInjector, Operation, ServiceError, WalletId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::sync::Mutex;

/// What the ledger should do with one incoming call.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Apply and acknowledge
    Pass,
    
    /// Reject without applying
    Fail(ServiceError),
    
    /// Apply, then report failure (lost acknowledgement)
    LoseAck(ServiceError),
}

/// A countdown rule matching one operation on one (or every) wallet.
#[derive(Debug, Clone)]
struct ScriptedFault {
    wallet: Option<WalletId>,
    op: Operation,
    remaining: u32,
    kind: FailureKind,
    lose_ack: bool,
}

impl ScriptedFault {
    fn matches(&self, wallet: Option<&WalletId>, op: Operation) -> bool {
        self.remaining > 0
            && self.op == op
            && match &self.wallet {
                None => true,
                Some(target) => wallet == Some(target),
            }
    }
}

#[derive(Debug)]
struct FaultState {
    scripted: Vec<ScriptedFault>,
    forever: HashSet<(WalletId, Operation)>,
    failure_rate: f64,
    exhaustion_share: f64,
    rng: ChaCha8Rng,
    injected: u64,
}

/// Fault controller shared by the simulated ledger and the scenario driving it.
pub struct SimFaultController {
    state: Mutex<FaultState>,
}

fn error_for(kind: FailureKind, wallet: Option<&WalletId>, op: Operation) -> ServiceError {
    let target = wallet.map(WalletId::to_string).unwrap_or_default();
    match kind {
        FailureKind::ConnectionExhausted => {
            ServiceError::exhausted(format!("injected: connection pool exhausted ({:?} {})", op, target))
        }
        FailureKind::Other => ServiceError::Status {
            status: 503,
            body: format!("injected: {:?} {} unavailable", op, target),
        },
    }
}

impl SimFaultController {
    /// Creates a controller with no faults; `seed` drives random failures.
    pub fn new(seed: u64) -> Self {
        Self {
            state: Mutex::new(FaultState {
                scripted: Vec::new(),
                forever: HashSet::new(),
                failure_rate: 0.0,
                exhaustion_share: 0.0,
                rng: ChaCha8Rng::seed_from_u64(seed),
                injected: 0,
            }),
        }
    }
    
    /// Sets the fraction (0.0 - 1.0) of random failures that are connection exhaustion.
    pub fn set_exhaustion_share(&self, share: f64) {
        self.state.lock().unwrap().exhaustion_share = share.clamp(0.0, 1.0);
    }
    
    /// Applies the next `count` calls of `op`, then reports them as failed.
    pub fn lose_ack_next(&self, wallet: Option<&WalletId>, op: Operation, count: u32) {
        self.state.lock().unwrap().scripted.push(ScriptedFault {
            wallet: wallet.cloned(),
            op,
            remaining: count,
            kind: FailureKind::Other,
            lose_ack: true,
        });
    }
    
    /// Returns how many faults have fired.
    pub fn injected(&self) -> u64 {
        self.state.lock().unwrap().injected
    }
    
    /// Decides the fate of one call.
    ///
    /// Precedence: permanent faults, then scripted countdowns (oldest first),
    /// then the random failure rate. Random failures never hit wallet
    /// creation; provisioning losses are always scripted.
    pub fn check(&self, wallet: Option<&WalletId>, op: Operation) -> Verdict {
        let mut state = self.state.lock().unwrap();
        
        if let Some(w) = wallet {
            if state.forever.contains(&(w.clone(), op)) {
                state.injected += 1;
                return Verdict::Fail(error_for(FailureKind::Other, wallet, op));
            }
        }
        
        if let Some(rule) = state.scripted.iter_mut().find(|r| r.matches(wallet, op)) {
            rule.remaining -= 1;
            let error = error_for(rule.kind, wallet, op);
            let lose_ack = rule.lose_ack;
            state.injected += 1;
            return if lose_ack {
                Verdict::LoseAck(error)
            } else {
                Verdict::Fail(error)
            };
        }
        
        if state.failure_rate > 0.0 && op != Operation::CreateWallet {
            let rate = state.failure_rate;
            if state.rng.gen_bool(rate) {
                let share = state.exhaustion_share;
                let kind = if state.rng.gen_bool(share) {
                    FailureKind::ConnectionExhausted
                } else {
                    FailureKind::Other
                };
                state.injected += 1;
                return Verdict::Fail(error_for(kind, wallet, op));
            }
        }
        
        Verdict::Pass
    }
}

impl FaultInjector for SimFaultController {
    fn fail_next(&self, wallet: Option<&WalletId>, op: Operation, count: u32, kind: FailureKind) {
        self.state.lock().unwrap().scripted.push(ScriptedFault {
            wallet: wallet.cloned(),
            op,
            remaining: count,
            kind,
            lose_ack: false,
        });
    }
    
    fn fail_forever(&self, wallet: &WalletId, op: Operation) {
        self.state.lock().unwrap().forever.insert((wallet.clone(), op));
    }
    
    fn set_failure_rate(&self, rate: f64) {
        self.state.lock().unwrap().failure_rate = rate.clamp(0.0, 1.0);
    }
    
    fn heal_all(&self) {
        let mut state = self.state.lock().unwrap();
        state.scripted.clear();
        state.forever.clear();
        state.failure_rate = 0.0;
    }
}
