//! # Shortloop Runtime
//!
//! Runtime implementation for the shortloop client architecture.
//!
//! The [`Store`] coordinates a reducer with its effects:
//!
//! ```text
//! Action → Reducer → (State, Effects) → Effect Execution → More Actions
//! ```
//!
//! Reducers run synchronously under a write lock; effects run on spawned
//! tasks and may feed actions back into the store. Actions produced by
//! effects are also broadcast to observers, which is what enables
//! request/response flows via [`Store::send_and_wait_for`].

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use shortloop_core::effect::Effect;
use shortloop_core::reducer::Reducer;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, RwLock};

/// Errors surfaced by the [`Store`] runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store is shutting down and rejects new actions.
    #[error("Store is shutting down")]
    ShutdownInProgress,

    /// Timed out waiting for a matching action.
    #[error("Timed out waiting for action")]
    Timeout,

    /// The action broadcast channel closed (store dropped).
    #[error("Action channel closed")]
    ChannelClosed,

    /// Shutdown timed out with effects still running.
    #[error("Shutdown timed out with {0} effects still running")]
    ShutdownTimeout(usize),
}

/// Handle for awaiting the completion of the effects produced by one
/// [`Store::send`] call.
///
/// Tracks only the effects returned directly by that reduce step; actions
/// fed back by those effects are tracked by their own `send` calls.
#[derive(Debug)]
pub struct EffectHandle {
    rx: watch::Receiver<usize>,
}

impl EffectHandle {
    /// A handle that is already complete (no effects were produced).
    #[must_use]
    pub fn completed() -> Self {
        let (_tx, rx) = watch::channel(0);
        Self { rx }
    }

    /// Wait until every tracked effect has finished.
    pub async fn wait(&mut self) {
        loop {
            if *self.rx.borrow_and_update() == 0 {
                return;
            }
            // Sender dropped means all tracking guards are gone too.
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Wait for effect completion, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `Err(StoreError::Timeout)` if effects are still running when
    /// the timeout expires.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

/// Shared effect-completion counter behind an [`EffectHandle`].
struct EffectTracking {
    count: Arc<AtomicUsize>,
    tx: watch::Sender<usize>,
}

impl Clone for EffectTracking {
    fn clone(&self) -> Self {
        Self {
            count: Arc::clone(&self.count),
            tx: self.tx.clone(),
        }
    }
}

impl EffectTracking {
    fn new() -> (EffectHandle, Self) {
        let (tx, rx) = watch::channel(0);
        (
            EffectHandle { rx },
            Self {
                count: Arc::new(AtomicUsize::new(0)),
                tx,
            },
        )
    }

    fn increment(&self) {
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.tx.send(n);
    }

    fn decrement(&self) {
        let n = self.count.fetch_sub(1, Ordering::SeqCst) - 1;
        let _ = self.tx.send(n);
    }
}

/// Guard that decrements effect tracking on drop, so the counter stays
/// correct even if an effect task panics.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking).
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The Store - runtime coordinator for a reducer.
///
/// The Store manages:
/// 1. State (behind `RwLock` for concurrent access)
/// 2. Reducer (flow logic)
/// 3. Environment (injected dependencies)
/// 4. Effect execution (with feedback loop)
///
/// # Type Parameters
///
/// - `S`: State type
/// - `A`: Action type
/// - `E`: Environment type
/// - `R`: Reducer implementation
pub struct Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    state: Arc<RwLock<S>>,
    reducer: R,
    environment: E,
    shutdown: Arc<AtomicBool>,
    pending_effects: Arc<AtomicUsize>,
    /// Actions produced by effects are broadcast to observers. This is
    /// what request/response waiting and session watchers hook into.
    action_broadcast: broadcast::Sender<A>,
}

impl<S, A, E, R> Clone for Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Clone,
    E: Clone,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            reducer: self.reducer.clone(),
            environment: self.environment.clone(),
            shutdown: Arc::clone(&self.shutdown),
            pending_effects: Arc::clone(&self.pending_effects),
            action_broadcast: self.action_broadcast.clone(),
        }
    }
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
    A: Send + Clone + 'static,
    S: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a new store with initial state, reducer, and environment.
    ///
    /// Action broadcast capacity defaults to 16; increase with
    /// [`Store::with_broadcast_capacity`] if observers frequently lag.
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        Self::with_broadcast_capacity(initial_state, reducer, environment, 16)
    }

    /// Create a new store with a custom action broadcast capacity.
    #[must_use]
    pub fn with_broadcast_capacity(
        initial_state: S,
        reducer: R,
        environment: E,
        capacity: usize,
    ) -> Self {
        let (action_broadcast, _) = broadcast::channel(capacity);

        Self {
            state: Arc::new(RwLock::new(initial_state)),
            reducer,
            environment,
            shutdown: Arc::new(AtomicBool::new(false)),
            pending_effects: Arc::new(AtomicUsize::new(0)),
            action_broadcast,
        }
    }

    /// Send an action to the store.
    ///
    /// 1. Acquires the write lock on state
    /// 2. Calls the reducer with (state, action, environment)
    /// 3. Executes returned effects asynchronously
    /// 4. Effects may produce more actions (feedback loop)
    ///
    /// Returns after *starting* effect execution, not after completion; use
    /// the returned [`EffectHandle`] to wait.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting
    /// down.
    #[tracing::instrument(skip(self, action), name = "store_send")]
    pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
        if self.shutdown.load(Ordering::Acquire) {
            tracing::warn!("Rejected action: store is shutting down");
            return Err(StoreError::ShutdownInProgress);
        }

        metrics::counter!("store.commands.total").increment(1);

        let (handle, tracking) = EffectTracking::new();

        let effects = {
            let mut state = self.state.write().await;

            let start = std::time::Instant::now();
            let effects = self.reducer.reduce(&mut state, action, &self.environment);
            metrics::histogram!("store.reducer.duration_seconds")
                .record(start.elapsed().as_secs_f64());

            effects
        };

        tracing::trace!("Reducer returned {} effects", effects.len());
        for effect in effects {
            self.execute_effect(effect, &tracking);
        }

        Ok(handle)
    }

    /// Send an action and wait for a matching result action.
    ///
    /// Designed for request/response flows: subscribe to the action
    /// broadcast *before* sending (avoiding a race), send the command, then
    /// wait for the first effect-produced action matching the predicate.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Timeout`]: no matching action within `timeout`
    /// - [`StoreError::ChannelClosed`]: broadcast closed mid-wait
    /// - [`StoreError::ShutdownInProgress`]: store is shutting down
    pub async fn send_and_wait_for<F>(
        &self,
        action: A,
        predicate: F,
        timeout: Duration,
    ) -> Result<A, StoreError>
    where
        F: Fn(&A) -> bool,
    {
        let mut rx = self.action_broadcast.subscribe();

        self.send(action).await?;

        tokio::time::timeout(timeout, async {
            loop {
                match rx.recv().await {
                    Ok(action) if predicate(&action) => return Ok(action),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Action observer lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(StoreError::ChannelClosed);
                    }
                }
            }
        })
        .await
        .map_err(|_| StoreError::Timeout)?
    }

    /// Subscribe to all actions produced by effects of this store.
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
        self.action_broadcast.subscribe()
    }

    /// Read current state via a closure, releasing the lock promptly.
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        let state = self.state.read().await;
        f(&state)
    }

    /// Initiate graceful shutdown: reject new actions, then wait for
    /// pending effects to drain.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires with
    /// effects still running.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        tracing::info!("Initiating graceful shutdown");
        self.shutdown.store(true, Ordering::Release);

        let start = std::time::Instant::now();
        let poll_interval = Duration::from_millis(50);

        loop {
            let pending = self.pending_effects.load(Ordering::Acquire);

            if pending == 0 {
                tracing::info!("All effects completed, shutdown successful");
                return Ok(());
            }

            if start.elapsed() >= timeout {
                tracing::error!(pending_effects = pending, "Shutdown timeout");
                return Err(StoreError::ShutdownTimeout(pending));
            }

            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Execute one top-level effect with completion tracking.
    ///
    /// `Effect::None` is a no-op. Everything else runs on a spawned task
    /// whose guards keep both the handle counter and the shutdown counter
    /// honest, even on panic.
    fn execute_effect(&self, effect: Effect<A>, tracking: &EffectTracking) {
        match &effect {
            Effect::None => {
                metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                return;
            }
            Effect::Future(_) => {
                metrics::counter!("store.effects.executed", "type" => "future").increment(1);
            }
            Effect::Delay { .. } => {
                metrics::counter!("store.effects.executed", "type" => "delay").increment(1);
            }
            Effect::Parallel(_) => {
                metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);
            }
            Effect::Sequential(_) => {
                metrics::counter!("store.effects.executed", "type" => "sequential").increment(1);
            }
        }

        tracking.increment();
        self.pending_effects.fetch_add(1, Ordering::SeqCst);

        let guard = DecrementGuard(tracking.clone());
        let pending_guard = PendingGuard(Arc::clone(&self.pending_effects));
        let store = self.clone();

        tokio::spawn(async move {
            let _guard = guard;
            let _pending_guard = pending_guard;
            Self::run_effect(store, effect).await;
        });
    }

    /// Run an effect tree to completion on the current task.
    ///
    /// Boxed for recursion: `Sequential` awaits children in order,
    /// `Parallel` spawns them and joins.
    fn run_effect(store: Self, effect: Effect<A>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            match effect {
                Effect::None => {}
                Effect::Future(fut) => {
                    if let Some(action) = fut.await {
                        tracing::trace!("Effect produced an action, feeding back");
                        // Reduce before broadcasting so observers woken by
                        // this action see the state it produced.
                        let _ = store.send(action.clone()).await;
                        let _ = store.action_broadcast.send(action);
                    }
                }
                Effect::Delay { duration, action } => {
                    tokio::time::sleep(duration).await;
                    let _ = store.send((*action).clone()).await;
                    let _ = store.action_broadcast.send(*action);
                }
                Effect::Sequential(effects) => {
                    for effect in effects {
                        Self::run_effect(store.clone(), effect).await;
                    }
                }
                Effect::Parallel(effects) => {
                    let tasks: Vec<_> = effects
                        .into_iter()
                        .map(|effect| tokio::spawn(Self::run_effect(store.clone(), effect)))
                        .collect();
                    for task in tasks {
                        let _ = task.await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use shortloop_core::{smallvec, SmallVec};

    #[derive(Clone, Debug, Default)]
    struct CounterState {
        count: i32,
        acked: bool,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum CounterAction {
        Increment,
        IncrementLater,
        Ack,
    }

    #[derive(Clone)]
    struct CounterReducer;

    impl Reducer for CounterReducer {
        type State = CounterState;
        type Action = CounterAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                CounterAction::Increment => {
                    state.count += 1;
                    smallvec![Effect::Future(Box::pin(async { Some(CounterAction::Ack) }))]
                }
                CounterAction::IncrementLater => {
                    smallvec![Effect::delayed(
                        Duration::from_millis(10),
                        CounterAction::Increment,
                    )]
                }
                CounterAction::Ack => {
                    state.acked = true;
                    smallvec![Effect::None]
                }
            }
        }
    }

    #[tokio::test]
    async fn send_runs_reducer_and_feeds_back_effect_actions() {
        let store = Store::new(CounterState::default(), CounterReducer, ());

        let mut handle = store
            .send(CounterAction::Increment)
            .await
            .unwrap_or_else(|e| panic!("send failed: {e}"));
        handle.wait().await;

        assert_eq!(store.state(|s| s.count).await, 1);
        assert!(store.state(|s| s.acked).await);
    }

    #[tokio::test]
    async fn delay_effect_fires_after_duration() {
        let store = Store::new(CounterState::default(), CounterReducer, ());

        let result = store
            .send_and_wait_for(
                CounterAction::IncrementLater,
                |a| matches!(a, CounterAction::Ack),
                Duration::from_secs(1),
            )
            .await;

        assert_eq!(result, Ok(CounterAction::Ack));
        assert_eq!(store.state(|s| s.count).await, 1);
    }

    #[tokio::test]
    async fn send_and_wait_for_times_out_without_matching_action() {
        let store = Store::new(CounterState::default(), CounterReducer, ());

        let result = store
            .send_and_wait_for(
                CounterAction::Ack,
                |a| matches!(a, CounterAction::Increment),
                Duration::from_millis(50),
            )
            .await;

        assert_eq!(result, Err(StoreError::Timeout));
    }

    #[tokio::test]
    async fn shutdown_rejects_new_actions() {
        let store = Store::new(CounterState::default(), CounterReducer, ());

        store
            .shutdown(Duration::from_secs(1))
            .await
            .unwrap_or_else(|e| panic!("shutdown failed: {e}"));

        let result = store.send(CounterAction::Increment).await;
        assert!(matches!(result, Err(StoreError::ShutdownInProgress)));
    }

    #[tokio::test]
    async fn completed_handle_returns_immediately() {
        let mut handle = EffectHandle::completed();
        handle
            .wait_with_timeout(Duration::from_millis(10))
            .await
            .unwrap_or_else(|e| panic!("wait failed: {e}"));
    }
}
