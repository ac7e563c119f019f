//! Core environment context trait for the load harness.

use crate::types::UserId;
use async_trait::async_trait;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

/// The central interface for Environment Interaction.
///
/// This trait abstracts the "real world" so that the harness can run
/// in both production (tokio) and simulation (virtual clock) environments.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, OS entropy
/// - **Simulation**: `SimContext` - virtual clock, `ChaCha8Rng(seed)`
///
/// # Determinism
///
/// For simulation, all methods that would normally introduce non-determinism
/// (time, randomness) are controlled by the implementation.
#[async_trait]
pub trait LedgerContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;
    
    /// Suspends the calling worker for the given duration.
    ///
    /// Only the caller is suspended; other workers keep running.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock and yields
    async fn sleep(&self, duration: Duration);
    
    /// Returns the random source owned by one worker.
    ///
    /// The RNG is moved into the worker, so no two workers share
    /// random state. In simulation the stream is derived from the
    /// master seed combined with `worker_index`.
    fn worker_rng(&self, worker_index: u64) -> ChaCha8Rng;
    
    /// Derives the client-side user identifier for the `index`-th wallet.
    ///
    /// Production returns a fresh v4 UUID every call.
    fn derive_user_id(&self, index: u64) -> UserId;
    
    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    /// In simulation, returns the master seed.
    fn seed(&self) -> u64;
}
