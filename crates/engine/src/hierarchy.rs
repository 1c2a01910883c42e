//! Hierarchical bandit: one global model, one model per user
//!
//! The global model learns from every user and is always resident; per-user
//! models refine its predictions once a user has enough feedback history and
//! live in a bounded LRU cache that writes models back to the store on
//! eviction. Persistence is batched through dirty tracking: models are
//! flushed every `flush_threshold` updates, on eviction, and at shutdown.
//!
//! Locking: all in-memory state sits behind one std mutex that is never held
//! across an await point. Store I/O works on serialized snapshots taken
//! under the lock and written after it is released, so a slow database
//! stalls persistence, never selection or learning. A tokio mutex gates
//! flush/close so shutdown waits for an in-flight flush.

use crate::cache::{EvictFn, LruCache};
use crate::context::Context;
use crate::diversity::rerank_within_arm;
use crate::genre::Candidate;
use crate::linucb::LinUcbModel;
use crate::storage::{user_model_id, ModelStore, GLOBAL_MODEL_ID};
use chrono::Utc;
use rand::Rng;
use reverie_core::{retry_with_backoff, BanditConfig, RetryPolicy, ReverieError, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Upper bound on a single store write (plus one retry)
const PERSIST_TIMEOUT: Duration = Duration::from_secs(5);

/// Updates at which the blend weight saturates
const BLEND_SCALE: f64 = 50.0;

/// Ceiling on the per-user blend weight
const MAX_BLEND: f64 = 0.7;

/// A serialized model waiting to be written to the store
struct PendingWrite {
    model_id: String,
    /// Set for user models so dirty tracking can be cleared on success
    user_id: Option<String>,
    blob: Vec<u8>,
    n_updates: u64,
}

/// In-memory engine state; guarded by a single mutex
struct EngineState {
    global: LinUcbModel,
    users: LruCache<String, LinUcbModel>,
    dirty_users: HashSet<String>,
    dirty_global: bool,
    updates_since_flush: u32,
}

/// Two-level contextual bandit with write-back model persistence
pub struct HierarchicalBandit<S: ModelStore> {
    config: BanditConfig,
    store: Arc<S>,
    state: Mutex<EngineState>,
    /// Eviction snapshots queued by the cache hook, drained by the caller
    /// that triggered the eviction once the state lock is released
    pending: Arc<Mutex<Vec<PendingWrite>>>,
    /// Serializes flush/close so shutdown waits for in-flight persistence
    flush_gate: tokio::sync::Mutex<()>,
}

impl<S: ModelStore> HierarchicalBandit<S> {
    /// Build the engine, warm-loading the global model from the store
    ///
    /// A missing or corrupted global blob falls back to a fresh unfitted
    /// model; construction itself never fails on bad persisted state.
    pub async fn new(store: Arc<S>, config: BanditConfig) -> Self {
        let global = match store.get(GLOBAL_MODEL_ID).await {
            Ok(Some(record)) => match LinUcbModel::deserialize(&record.blob) {
                Ok(model) => {
                    info!("Loaded global bandit with {} updates", model.n_updates());
                    model
                }
                Err(e) => {
                    warn!("Global model blob corrupted ({}); starting fresh", e);
                    LinUcbModel::new(config.alpha)
                }
            },
            Ok(None) => {
                info!("No persisted global bandit; starting fresh");
                LinUcbModel::new(config.alpha)
            }
            Err(e) => {
                warn!("Failed to load global bandit ({}); starting fresh", e);
                LinUcbModel::new(config.alpha)
            }
        };

        let pending: Arc<Mutex<Vec<PendingWrite>>> = Arc::new(Mutex::new(Vec::new()));
        let hook_queue = Arc::clone(&pending);
        let hook: EvictFn<String, LinUcbModel> = Box::new(move |user_id, model| {
            // Snapshot while the entry is still alive; the write happens
            // after the cache lock is gone.
            let blob = model.serialize()?;
            let mut queue = hook_queue.lock().unwrap_or_else(|e| e.into_inner());
            queue.push(PendingWrite {
                model_id: user_model_id(user_id),
                user_id: Some(user_id.clone()),
                blob,
                n_updates: model.n_updates(),
            });
            Ok(())
        });

        info!(
            "Hierarchical bandit ready (cache size {}, flush threshold {})",
            config.cache_size, config.flush_threshold
        );

        Self {
            state: Mutex::new(EngineState {
                global,
                users: LruCache::with_eviction_hook(config.cache_size, hook),
                dirty_users: HashSet::new(),
                dirty_global: false,
                updates_since_flush: 0,
            }),
            config,
            store,
            pending,
            flush_gate: tokio::sync::Mutex::new(()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        // A poisoned lock means a panic mid-operation; the models themselves
        // are still structurally valid, so keep serving.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pick a candidate for this user and context
    ///
    /// The global model always answers first; its pick stands unless the
    /// user's model has at least `min_user_updates` observations and its
    /// blended score beats the global one. Failures in the user path never
    /// fail the selection, and a failing global model degrades to a uniform
    /// random pick with a neutral score.
    pub async fn select(
        &self,
        user_id: &str,
        context: &[f64],
        candidates: &[Candidate],
    ) -> Result<(usize, f64)> {
        if candidates.is_empty() {
            return Err(ReverieError::invalid_argument("no candidates provided"));
        }

        let global_pick = {
            let state = self.lock_state();
            state.global.select(context, candidates)
        };
        let (global_idx, global_score) = match global_pick {
            Ok(pick) => pick,
            Err(e @ ReverieError::InvalidArgument(_)) => return Err(e),
            Err(e) => {
                warn!("Global model selection error: {}; using random fallback", e);
                let idx = rand::thread_rng().gen_range(0..candidates.len());
                return Ok((idx, 0.5));
            }
        };

        let min_updates = self.config.min_user_updates;
        let user_pick = self
            .with_user_model(user_id, |model| {
                if model.n_updates() < min_updates {
                    return None;
                }
                let blend = (model.n_updates() as f64 / BLEND_SCALE).min(MAX_BLEND);
                match model.select(context, candidates) {
                    Ok((idx, score)) => Some((idx, score, blend)),
                    Err(e) => {
                        debug!("User model selection error for {}: {}", user_id, e);
                        None
                    }
                }
            })
            .await;

        match user_pick {
            Ok(Some((user_idx, user_score, blend))) => {
                if user_score * blend > global_score * (1.0 - blend) {
                    return Ok((user_idx, user_score));
                }
            }
            Ok(None) => {}
            Err(e) => warn!("User model path failed for {}: {}", user_id, e),
        }

        Ok((global_idx, global_score))
    }

    /// `select` followed by within-arm stochastic re-ranking
    ///
    /// The arm-level decision comes from the bandit; the returned index is a
    /// uniform draw among the chosen arm's highest-similarity candidates.
    pub async fn select_with_diversity(
        &self,
        user_id: &str,
        context: &[f64],
        candidates: &[Candidate],
    ) -> Result<(usize, f64)> {
        let (idx, score) = self.select(user_id, context, candidates).await?;
        Ok((rerank_within_arm(candidates, idx), score))
    }

    /// Fold an observed reward into both the global and the user's model
    ///
    /// Each update is independent (a failure in one does not prevent the
    /// other) and failures are logged, never surfaced: learning is
    /// best-effort from the caller's perspective. Every `flush_threshold`
    /// updates the dirty models are flushed to the store.
    pub async fn update(&self, user_id: &str, context: &[f64], candidate: &Candidate, reward: f64) {
        {
            let mut state = self.lock_state();
            match state.global.update(context, candidate, reward) {
                Ok(()) => state.dirty_global = true,
                Err(e) => warn!("Global model update error: {}", e),
            }
        }

        match self
            .with_user_model(user_id, |model| model.update(context, candidate, reward))
            .await
        {
            Ok(Ok(())) => {
                self.lock_state().dirty_users.insert(user_id.to_string());
            }
            Ok(Err(e)) => warn!("User model update error for {}: {}", user_id, e),
            Err(e) => warn!("User model path failed for {}: {}", user_id, e),
        }

        let should_flush = {
            let mut state = self.lock_state();
            state.updates_since_flush += 1;
            state.updates_since_flush >= self.config.flush_threshold
        };
        if should_flush {
            self.flush().await;
        }
    }

    /// Bootstrap a user's model from onboarding selections
    ///
    /// Each selected item becomes one training example with reward 1.0,
    /// under the supplied context or a neutral default. The model is
    /// persisted immediately rather than waiting for the dirty-flush cycle,
    /// so onboarding survives a crash. On a failed write the model
    /// is left dirty for the next flush and the error is returned.
    pub async fn warm_start_user(
        &self,
        user_id: &str,
        selected_items: &[Candidate],
        context: Option<Context>,
    ) -> Result<()> {
        if selected_items.is_empty() {
            return Ok(());
        }

        let ctx = context.unwrap_or_else(Context::neutral);
        let decisions: Vec<String> = selected_items
            .iter()
            .map(|item| item.arm().to_string())
            .collect();
        let rewards = vec![1.0; decisions.len()];
        let contexts: Vec<Vec<f64>> = decisions
            .iter()
            .map(|_| ctx.as_slice().to_vec())
            .collect();

        let snapshot = self
            .with_user_model(user_id, |model| {
                model.warm_start(&decisions, &rewards, &contexts)?;
                Ok::<_, ReverieError>((model.serialize()?, model.n_updates()))
            })
            .await??;
        let (blob, n_updates) = snapshot;

        debug!(
            "Warm-started user {} with {} onboarding items",
            user_id,
            decisions.len()
        );

        let write = PendingWrite {
            model_id: user_model_id(user_id),
            user_id: Some(user_id.to_string()),
            blob,
            n_updates,
        };
        match self.persist_blob(&write).await {
            Ok(()) => {
                self.lock_state().dirty_users.remove(user_id);
                Ok(())
            }
            Err(e) => {
                self.lock_state().dirty_users.insert(user_id.to_string());
                Err(e)
            }
        }
    }

    /// Persist every dirty model
    ///
    /// The global model is written if dirty; each dirty user still present
    /// in the cache is written; a dirty flag is cleared only after its
    /// write succeeds, so failures retry on the next cycle. One model's
    /// failure never blocks the others.
    pub async fn flush(&self) {
        let _gate = self.flush_gate.lock().await;
        self.flush_inner().await;
    }

    async fn flush_inner(&self) {
        let writes = {
            let mut state = self.lock_state();
            state.updates_since_flush = 0;

            let mut writes: Vec<PendingWrite> = Vec::new();
            if state.dirty_global {
                match state.global.serialize() {
                    Ok(blob) => writes.push(PendingWrite {
                        model_id: GLOBAL_MODEL_ID.to_string(),
                        user_id: None,
                        blob,
                        n_updates: state.global.n_updates(),
                    }),
                    Err(e) => warn!("Failed to snapshot global model: {}", e),
                }
            }
            for user_id in state.dirty_users.iter() {
                if let Some(model) = state.users.peek(user_id) {
                    match model.serialize() {
                        Ok(blob) => writes.push(PendingWrite {
                            model_id: user_model_id(user_id),
                            user_id: Some(user_id.clone()),
                            blob,
                            n_updates: model.n_updates(),
                        }),
                        Err(e) => warn!("Failed to snapshot model for user {}: {}", user_id, e),
                    }
                }
            }
            writes
        };

        if writes.is_empty() {
            return;
        }
        debug!("Flushing {} dirty model(s)", writes.len());

        for write in writes {
            match self.persist_blob(&write).await {
                Ok(()) => {
                    let mut state = self.lock_state();
                    match &write.user_id {
                        Some(user_id) => {
                            state.dirty_users.remove(user_id);
                        }
                        None => state.dirty_global = false,
                    }
                }
                Err(e) => {
                    warn!(
                        "Failed to persist model {}: {} (left dirty for next flush)",
                        write.model_id, e
                    );
                }
            }
        }
    }

    /// Flush, then defensively persist every cached user model and clear
    /// dirty tracking. Run once at shutdown; waits for an in-flight flush.
    pub async fn close(&self) {
        info!("Closing hierarchical bandit");
        let _gate = self.flush_gate.lock().await;
        self.flush_inner().await;

        let writes = {
            let state = self.lock_state();
            let mut writes: Vec<PendingWrite> = Vec::new();
            for (user_id, model) in state.users.iter() {
                match model.serialize() {
                    Ok(blob) => writes.push(PendingWrite {
                        model_id: user_model_id(user_id),
                        user_id: Some(user_id.clone()),
                        blob,
                        n_updates: model.n_updates(),
                    }),
                    Err(e) => warn!("Failed to snapshot model for user {}: {}", user_id, e),
                }
            }
            writes
        };

        for write in writes {
            if let Err(e) = self.persist_blob(&write).await {
                warn!("Failed to persist model {} on close: {}", write.model_id, e);
            }
        }

        let mut state = self.lock_state();
        state.dirty_users.clear();
        state.dirty_global = false;
        info!("Hierarchical bandit closed");
    }

    /// Number of user models currently cached
    pub fn cached_user_count(&self) -> usize {
        self.lock_state().users.len()
    }

    /// Update count of a cached user model, without loading from the store
    pub fn cached_user_updates(&self, user_id: &str) -> Option<u64> {
        self.lock_state()
            .users
            .peek(&user_id.to_string())
            .map(|model| model.n_updates())
    }

    /// Run a closure against the user's model, loading or creating it first
    ///
    /// Cache-first; on a miss the persisted blob is fetched and decoded
    /// outside the state lock (a corrupted or unreachable record degrades
    /// to a fresh unfitted model), then inserted, which may evict another
    /// user, whose snapshot is persisted before this call returns.
    async fn with_user_model<R>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut LinUcbModel) -> R,
    ) -> Result<R> {
        let key = user_id.to_string();

        {
            let mut state = self.lock_state();
            if let Some(model) = state.users.get_mut(&key) {
                return Ok(f(model));
            }
        }

        let loaded = self.load_user_model(user_id).await;
        let result = {
            let mut state = self.lock_state();
            // Another task may have loaded the same user while we were at
            // the store; its copy is at least as fresh, keep it.
            if !state.users.contains(&key) {
                state.users.insert(key.clone(), loaded);
            }
            match state.users.get_mut(&key) {
                Some(model) => Ok(f(model)),
                None => Err(ReverieError::computation(format!(
                    "user model {} missing right after insert",
                    user_id
                ))),
            }
        };

        // Write back whatever the insert evicted.
        self.persist_pending().await;
        result
    }

    async fn load_user_model(&self, user_id: &str) -> LinUcbModel {
        match self.store.get(&user_model_id(user_id)).await {
            Ok(Some(record)) => match LinUcbModel::deserialize(&record.blob) {
                Ok(model) => {
                    debug!(
                        "Loaded model for user {} ({} updates)",
                        user_id,
                        model.n_updates()
                    );
                    model
                }
                Err(e) => {
                    warn!(
                        "Model blob for user {} corrupted ({}); starting fresh",
                        user_id, e
                    );
                    LinUcbModel::new(self.config.alpha)
                }
            },
            Ok(None) => LinUcbModel::new(self.config.alpha),
            Err(e) => {
                warn!(
                    "Failed to load model for user {} ({}); starting fresh",
                    user_id, e
                );
                LinUcbModel::new(self.config.alpha)
            }
        }
    }

    async fn persist_pending(&self) {
        let writes: Vec<PendingWrite> = {
            let mut queue = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            queue.drain(..).collect()
        };

        for write in writes {
            match self.persist_blob(&write).await {
                Ok(()) => {
                    debug!("Persisted evicted model {}", write.model_id);
                    if let Some(user_id) = &write.user_id {
                        self.lock_state().dirty_users.remove(user_id);
                    }
                }
                Err(e) => {
                    warn!("Failed to persist evicted model {}: {}", write.model_id, e);
                }
            }
        }
    }

    async fn persist_blob(&self, write: &PendingWrite) -> Result<()> {
        retry_with_backoff(
            || async {
                timeout(
                    PERSIST_TIMEOUT,
                    self.store
                        .put(&write.model_id, &write.blob, write.n_updates, Utc::now()),
                )
                .await
                .map_err(|_| {
                    ReverieError::persistence(format!("timed out saving model {}", write.model_id))
                })?
            },
            RetryPolicy::persistence(),
            |_| true,
        )
        .await
    }
}
