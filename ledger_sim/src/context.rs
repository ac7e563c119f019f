//! Simulation context implementing LedgerContext for deterministic testing.

use async_trait::async_trait;
use ledger_env::{LedgerContext, UserId};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Sleeps kept in the log; later ones are only counted.
const SLEEP_LOG_LIMIT: usize = 4096;

/// Simulation context backed by a virtual clock and seeded RNG.
///
/// This implements `LedgerContext` using:
/// - A virtual clock that only moves when someone sleeps (or `advance_time`)
/// - Per-worker ChaCha8 streams derived from the master seed
/// - Simulated sleep that advances virtual time and yields to the scheduler
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,
    
    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,
    
    /// Requested sleeps, in order (bounded)
    sleep_log: Arc<Mutex<SleepLog>>,
}

#[derive(Debug, Default)]
struct SleepLog {
    entries: Vec<Duration>,
    count: u64,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(Mutex::new(0)),
            sleep_log: Arc::new(Mutex::new(SleepLog::default())),
        }
    }
    
    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }
    
    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        let mut time = self.virtual_time_ns.lock().unwrap();
        *time = time.saturating_add(duration.as_nanos() as u64);
    }
    
    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        *self.virtual_time_ns.lock().unwrap()
    }
    
    /// Returns the first logged sleeps, in request order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleep_log.lock().unwrap().entries.clone()
    }
    
    /// Returns how many sleeps were requested in total.
    pub fn sleep_count(&self) -> u64 {
        self.sleep_log.lock().unwrap().count
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            sleep_log: Arc::clone(&self.sleep_log),
        }
    }
}

#[async_trait]
impl LedgerContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }
    
    async fn sleep(&self, duration: Duration) {
        {
            let mut log = self.sleep_log.lock().unwrap();
            log.count += 1;
            if log.entries.len() < SLEEP_LOG_LIMIT {
                log.entries.push(duration);
            }
        }
        self.advance_time(duration);
        tokio::task::yield_now().await;
    }
    
    fn worker_rng(&self, worker_index: u64) -> ChaCha8Rng {
        let worker_seed = self.seed
            .wrapping_mul(0x9e3779b97f4a7c15)  // Golden ratio prime
            .wrapping_add(worker_index.wrapping_mul(0x517cc1b727220a95));
        ChaCha8Rng::seed_from_u64(worker_seed)
    }
    
    fn derive_user_id(&self, index: u64) -> UserId {
        UserId::from_seed(self.seed.wrapping_mul(0x3c6ef372fe94f82b) ^ index)
    }
    
    fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    
    #[test]
    fn test_sim_context_time() {
        let ctx = SimContext::new(42);
        assert_eq!(ctx.now(), Duration::ZERO);
        
        ctx.advance_time(Duration::from_secs(1));
        assert_eq!(ctx.now(), Duration::from_secs(1));
        
        ctx.advance_time(Duration::from_millis(500));
        assert_eq!(ctx.now(), Duration::from_millis(1500));
    }
    
    #[tokio::test]
    async fn test_sleep_advances_virtual_time_and_logs() {
        let ctx = SimContext::new(1);
        ctx.sleep(Duration::from_millis(100)).await;
        ctx.sleep(Duration::from_millis(200)).await;
        
        assert_eq!(ctx.now(), Duration::from_millis(300));
        assert_eq!(ctx.sleeps(), vec![Duration::from_millis(100), Duration::from_millis(200)]);
        assert_eq!(ctx.sleep_count(), 2);
    }
    
    #[test]
    fn test_worker_rngs_deterministic_and_distinct() {
        let ctx1 = SimContext::new(42);
        let ctx2 = SimContext::new(42);
        
        let a: u64 = ctx1.worker_rng(3).gen();
        let b: u64 = ctx2.worker_rng(3).gen();
        let c: u64 = ctx1.worker_rng(4).gen();
        
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
    
    #[test]
    fn test_user_ids_deterministic() {
        let ctx = SimContext::new(9);
        assert_eq!(ctx.derive_user_id(1), SimContext::new(9).derive_user_id(1));
        assert_ne!(ctx.derive_user_id(1), ctx.derive_user_id(2));
    }
    
    #[test]
    fn test_sim_context_clone_shares_time() {
        let ctx1 = SimContext::new(42);
        let ctx2 = ctx1.clone();
        
        ctx1.advance_time(Duration::from_secs(5));
        
        assert_eq!(ctx1.now(), ctx2.now());
    }
}
