//! Per-scope linear bandit model
//!
//! One ridge estimator per arm: a design matrix `A` (initialized to the
//! identity, so it stays symmetric positive-definite) and a response vector
//! `b`. An update folds the observed context in with `A += x*x^T`,
//! `b += reward * x`; a prediction is the point estimate `theta . x` with
//! `theta = A^-1 * b`.
//!
//! Selection scores are plain expectations; no upper-confidence term is
//! added on top. Exploration comes from the cold-start path (uniform random
//! until the first update) and from the caller's within-arm re-ranking.

use crate::context::CONTEXT_DIM;
use crate::genre::{all_arms, Candidate};
use ndarray::{Array1, Array2};
use rand::Rng;
use reverie_core::{cholesky_solve, ReverieError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Score reported when the model has no opinion: unfitted models, and arms
/// outside the vocabulary.
const NEUTRAL_SCORE: f64 = 0.5;

/// Ridge state for a single arm
#[derive(Debug, Clone)]
struct ArmState {
    /// d x d design matrix, identity at rest
    a: Array2<f64>,
    /// d response vector, zero at rest
    b: Array1<f64>,
}

impl ArmState {
    fn new(dim: usize) -> Self {
        Self {
            a: Array2::eye(dim),
            b: Array1::zeros(dim),
        }
    }

    fn observe(&mut self, x: &Array1<f64>, reward: f64) {
        let dim = x.len();
        for i in 0..dim {
            for j in 0..dim {
                self.a[[i, j]] += x[i] * x[j];
            }
        }
        self.b.scaled_add(reward, x);
    }

    fn predict(&self, x: &Array1<f64>) -> Result<f64> {
        let theta = cholesky_solve(&self.a, &self.b)?;
        Ok(theta.dot(x))
    }
}

/// Linear bandit over the fixed arm vocabulary
///
/// Unfitted until the first update; while unfitted, `select` falls back to a
/// uniform random pick with a neutral score.
#[derive(Debug, Clone)]
pub struct LinUcbModel {
    arms: Vec<String>,
    alpha: f64,
    context_dim: usize,
    n_updates: u64,
    is_fitted: bool,
    arm_states: Vec<ArmState>,
}

impl LinUcbModel {
    /// Model over the default genre arms
    pub fn new(alpha: f64) -> Self {
        Self::with_arms(all_arms(), alpha, CONTEXT_DIM)
    }

    pub fn with_arms(arms: Vec<String>, alpha: f64, context_dim: usize) -> Self {
        let arm_states = arms.iter().map(|_| ArmState::new(context_dim)).collect();
        Self {
            arms,
            alpha,
            context_dim,
            n_updates: 0,
            is_fitted: false,
            arm_states,
        }
    }

    pub fn arms(&self) -> &[String] {
        &self.arms
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn n_updates(&self) -> u64 {
        self.n_updates
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn arm_index(&self, arm: &str) -> Option<usize> {
        self.arms.iter().position(|a| a == arm)
    }

    fn shaped(&self, context: &[f64]) -> Array1<f64> {
        // Callers hand over whatever the collaborators produced; truncate or
        // zero-pad before it reaches the matrices.
        let mut x = Array1::zeros(self.context_dim);
        for (dst, src) in x.iter_mut().zip(context.iter()) {
            *dst = *src;
        }
        x
    }

    /// Pick the best candidate for this context
    ///
    /// Returns `(index, score)` into the candidate slice. Ties go to the
    /// earliest candidate. Fails with `InvalidArgument` on an empty list and
    /// `Computation` if a predict falls apart; callers are expected to treat
    /// the latter as recoverable.
    pub fn select(&self, context: &[f64], candidates: &[Candidate]) -> Result<(usize, f64)> {
        if candidates.is_empty() {
            return Err(ReverieError::invalid_argument("no candidates provided"));
        }

        if !self.is_fitted {
            let idx = rand::thread_rng().gen_range(0..candidates.len());
            return Ok((idx, NEUTRAL_SCORE));
        }

        let x = self.shaped(context);

        // One solve per distinct arm, not per candidate.
        let mut arm_scores: HashMap<usize, f64> = HashMap::new();
        let mut best_idx = 0;
        let mut best_score = f64::NEG_INFINITY;

        for (i, candidate) in candidates.iter().enumerate() {
            let score = match self.arm_index(candidate.arm()) {
                Some(arm_idx) => match arm_scores.entry(arm_idx) {
                    std::collections::hash_map::Entry::Occupied(e) => *e.get(),
                    std::collections::hash_map::Entry::Vacant(e) => {
                        *e.insert(self.arm_states[arm_idx].predict(&x)?)
                    }
                },
                None => NEUTRAL_SCORE,
            };
            if score > best_score {
                best_score = score;
                best_idx = i;
            }
        }

        Ok((best_idx, best_score))
    }

    /// Fold one observed reward into the candidate's arm
    ///
    /// Rewards are expected in `[0, 1]`; out-of-range values are accepted
    /// as-is, shaping them is the caller's contract.
    pub fn update(&mut self, context: &[f64], candidate: &Candidate, reward: f64) -> Result<()> {
        let arm = candidate.arm();
        let arm_idx = self
            .arm_index(arm)
            .ok_or_else(|| ReverieError::computation(format!("arm '{}' not in vocabulary", arm)))?;

        let x = self.shaped(context);
        self.arm_states[arm_idx].observe(&x, reward);
        self.is_fitted = true;
        self.n_updates += 1;
        Ok(())
    }

    /// Bootstrap from historical decisions, one update per example
    ///
    /// No-op on an empty decision list.
    pub fn warm_start(
        &mut self,
        decisions: &[String],
        rewards: &[f64],
        contexts: &[Vec<f64>],
    ) -> Result<()> {
        if decisions.is_empty() {
            return Ok(());
        }
        if decisions.len() != rewards.len() || decisions.len() != contexts.len() {
            return Err(ReverieError::invalid_argument(format!(
                "warm start length mismatch: {} decisions, {} rewards, {} contexts",
                decisions.len(),
                rewards.len(),
                contexts.len()
            )));
        }

        for ((decision, reward), context) in decisions.iter().zip(rewards).zip(contexts) {
            let arm_idx = self.arm_index(decision).ok_or_else(|| {
                ReverieError::computation(format!("arm '{}' not in vocabulary", decision))
            })?;
            let x = self.shaped(context);
            self.arm_states[arm_idx].observe(&x, *reward);
            self.n_updates += 1;
        }
        self.is_fitted = true;
        Ok(())
    }

    /// Encode the full model state as an opaque binary blob
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let snapshot = SerializableModel::from_model(self);
        bincode::serialize(&snapshot)
            .map_err(|e| ReverieError::computation(format!("model encode failed: {}", e)))
    }

    /// Restore a model from a serialized blob
    ///
    /// Trailing bytes beyond the encoded state are ignored; anything that
    /// fails to decode or reassemble surfaces as `ModelCorrupted`.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let snapshot: SerializableModel = bincode::deserialize(data)
            .map_err(|e| ReverieError::corrupted(format!("model decode failed: {}", e)))?;
        snapshot.into_model()
    }
}

/// Storage layout of a model: ndarray matrices flattened to shape + data
#[derive(Debug, Serialize, Deserialize)]
struct SerializableModel {
    arms: Vec<String>,
    alpha: f64,
    context_dim: u32,
    is_fitted: bool,
    n_updates: u64,
    arm_states: Vec<SerializableArm>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializableArm {
    a_shape: (u32, u32),
    a_data: Vec<f64>,
    b_data: Vec<f64>,
}

impl SerializableModel {
    fn from_model(model: &LinUcbModel) -> Self {
        let arm_states = model
            .arm_states
            .iter()
            .map(|state| SerializableArm {
                a_shape: (state.a.nrows() as u32, state.a.ncols() as u32),
                a_data: state.a.iter().copied().collect(),
                b_data: state.b.to_vec(),
            })
            .collect();

        Self {
            arms: model.arms.clone(),
            alpha: model.alpha,
            context_dim: model.context_dim as u32,
            is_fitted: model.is_fitted,
            n_updates: model.n_updates,
            arm_states,
        }
    }

    fn into_model(self) -> Result<LinUcbModel> {
        if self.arm_states.len() != self.arms.len() {
            return Err(ReverieError::corrupted(format!(
                "arm count mismatch: {} arms, {} states",
                self.arms.len(),
                self.arm_states.len()
            )));
        }

        let dim = self.context_dim as usize;
        let mut arm_states = Vec::with_capacity(self.arm_states.len());
        for state in self.arm_states {
            let (rows, cols) = (state.a_shape.0 as usize, state.a_shape.1 as usize);
            if rows != dim || cols != dim || state.b_data.len() != dim {
                return Err(ReverieError::corrupted(format!(
                    "arm state shape {}x{}/{} does not match context dim {}",
                    rows,
                    cols,
                    state.b_data.len(),
                    dim
                )));
            }
            let a = Array2::from_shape_vec((rows, cols), state.a_data)
                .map_err(|e| ReverieError::corrupted(format!("bad A matrix: {}", e)))?;
            let b = Array1::from_vec(state.b_data);
            arm_states.push(ArmState { a, b });
        }

        Ok(LinUcbModel {
            arms: self.arms,
            alpha: self.alpha,
            context_dim: dim,
            n_updates: self.n_updates,
            is_fitted: self.is_fitted,
            arm_states,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genre::Domain;

    fn movie(id: &str, genre: &str) -> Candidate {
        Candidate::new(Domain::Movie, id, genre)
    }

    fn ctx(stress: f64) -> Vec<f64> {
        let mut c = vec![0.0; CONTEXT_DIM];
        c[0] = stress;
        c[5] = 1.0;
        c
    }

    #[test]
    fn test_empty_candidates_rejected() {
        let model = LinUcbModel::new(1.0);
        let err = model.select(&ctx(0.5), &[]).unwrap_err();
        assert!(matches!(err, ReverieError::InvalidArgument(_)));
    }

    #[test]
    fn test_unfitted_select_returns_neutral_score() {
        let model = LinUcbModel::new(1.0);
        assert!(!model.is_fitted());
        let candidates = vec![movie("a", "Drama"), movie("b", "Comedy")];
        let (idx, score) = model.select(&ctx(0.5), &candidates).unwrap();
        assert!(idx < 2);
        assert_eq!(score, 0.5);
    }

    #[test]
    fn test_update_marks_fitted_and_counts() {
        let mut model = LinUcbModel::new(1.0);
        model.update(&ctx(0.5), &movie("a", "Drama"), 1.0).unwrap();
        assert!(model.is_fitted());
        assert_eq!(model.n_updates(), 1);
    }

    #[test]
    fn test_learns_arm_preference() {
        let mut model = LinUcbModel::new(1.0);
        let context = ctx(0.5);
        // Reward drama, punish comedy, several times over.
        for _ in 0..10 {
            model.update(&context, &movie("d", "Drama"), 1.0).unwrap();
            model.update(&context, &movie("c", "Comedy"), 0.0).unwrap();
        }
        let candidates = vec![movie("c2", "Comedy"), movie("d2", "Drama")];
        let (idx, score) = model.select(&context, &candidates).unwrap();
        assert_eq!(idx, 1);
        assert!(score > 0.0);
    }

    #[test]
    fn test_tie_breaks_to_first_occurrence() {
        let mut model = LinUcbModel::new(1.0);
        let context = ctx(0.5);
        model.update(&context, &movie("d", "Drama"), 1.0).unwrap();
        // Same arm twice: identical scores, first wins.
        let candidates = vec![movie("d1", "Drama"), movie("d2", "Drama")];
        let (idx, _) = model.select(&context, &candidates).unwrap();
        assert_eq!(idx, 0);
    }

    #[test]
    fn test_select_tolerates_malformed_context_length() {
        let mut model = LinUcbModel::new(1.0);
        model.update(&[0.5], &movie("d", "Drama"), 1.0).unwrap();
        let candidates = vec![movie("d1", "Drama")];
        let long: Vec<f64> = (0..64).map(|i| i as f64 * 0.01).collect();
        assert!(model.select(&long, &candidates).is_ok());
        assert!(model.select(&[], &candidates).is_ok());
    }

    #[test]
    fn test_warm_start_counts_and_fits() {
        let mut model = LinUcbModel::new(1.0);
        let decisions = vec!["drama".to_string(), "pop".to_string()];
        let rewards = vec![1.0, 1.0];
        let contexts = vec![ctx(0.3), ctx(0.3)];
        model.warm_start(&decisions, &rewards, &contexts).unwrap();
        assert!(model.is_fitted());
        assert_eq!(model.n_updates(), 2);
    }

    #[test]
    fn test_warm_start_empty_is_noop() {
        let mut model = LinUcbModel::new(1.0);
        model.warm_start(&[], &[], &[]).unwrap();
        assert!(!model.is_fitted());
        assert_eq!(model.n_updates(), 0);
    }

    #[test]
    fn test_warm_start_length_mismatch_rejected() {
        let mut model = LinUcbModel::new(1.0);
        let err = model
            .warm_start(&["drama".to_string()], &[], &[])
            .unwrap_err();
        assert!(matches!(err, ReverieError::InvalidArgument(_)));
    }

    #[test]
    fn test_serialize_round_trip_preserves_behavior() {
        let mut model = LinUcbModel::new(1.0);
        let context = ctx(0.7);
        for i in 0..5 {
            let reward = if i % 2 == 0 { 1.0 } else { 0.2 };
            model.update(&context, &movie("d", "Drama"), reward).unwrap();
            model.update(&context, &movie("t", "Horror"), 0.1).unwrap();
        }

        let blob = model.serialize().unwrap();
        let restored = LinUcbModel::deserialize(&blob).unwrap();

        assert_eq!(restored.n_updates(), model.n_updates());
        assert_eq!(restored.is_fitted(), model.is_fitted());
        assert_eq!(restored.arms(), model.arms());

        let candidates = vec![
            movie("a", "Drama"),
            movie("b", "Horror"),
            movie("c", "Comedy"),
        ];
        let (idx_a, score_a) = model.select(&context, &candidates).unwrap();
        let (idx_b, score_b) = restored.select(&context, &candidates).unwrap();
        assert_eq!(idx_a, idx_b);
        assert_eq!(score_a, score_b);
    }

    #[test]
    fn test_deserialize_ignores_trailing_bytes() {
        let mut model = LinUcbModel::new(1.0);
        model.update(&ctx(0.5), &movie("d", "Drama"), 1.0).unwrap();
        let mut blob = model.serialize().unwrap();
        blob.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let restored = LinUcbModel::deserialize(&blob).unwrap();
        assert_eq!(restored.n_updates(), 1);
    }

    #[test]
    fn test_deserialize_garbage_is_corrupted() {
        let err = LinUcbModel::deserialize(&[0x01, 0x02, 0x03]).unwrap_err();
        assert!(matches!(err, ReverieError::ModelCorrupted(_)));
    }

    #[test]
    fn test_unfitted_select_is_roughly_uniform() {
        let model = LinUcbModel::new(1.0);
        let candidates: Vec<Candidate> = (0..10)
            .map(|i| movie(&format!("m{}", i), "Drama"))
            .collect();
        let mut counts = [0usize; 10];
        for _ in 0..1000 {
            let (idx, _) = model.select(&ctx(0.5), &candidates).unwrap();
            counts[idx] += 1;
        }
        // Expect ~100 per slot; allow generous slack for a statistical test.
        for count in counts {
            assert!(count > 50, "index starved: {:?}", counts);
            assert!(count < 200, "index favored: {:?}", counts);
        }
    }
}
