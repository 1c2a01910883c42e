//! Reverie Personalization Engine
//!
//! Hierarchical contextual bandit for nostalgic content selection: a global
//! linear model shared by all users plus per-user models in a bounded
//! write-back cache, with the nostalgia scoring and reward shaping that
//! produce its inputs. Candidate generation and stress/emotion inference
//! live in collaborator services; this crate owns the learning loop and its
//! persistence.

pub mod cache;
pub mod context;
pub mod diversity;
pub mod genre;
pub mod hierarchy;
pub mod linucb;
pub mod nostalgia;
pub mod reward;
pub mod storage;

// Re-export key types
pub use cache::LruCache;
pub use context::{
    build_context_features, positive_rate, shape_context, Context, Emotion, CONTEXT_DIM,
};
pub use diversity::rerank_within_arm;
pub use genre::{
    all_arms, arm_for, normalize_movie_genre, normalize_song_genre, Candidate, Domain,
};
pub use hierarchy::HierarchicalBandit;
pub use linucb::LinUcbModel;
pub use nostalgia::{age_nostalgia, age_nostalgia_default, nostalgia_score, popularity_score};
pub use reward::{calculate_reward, InteractionType};
pub use storage::{
    user_model_id, InMemoryModelStore, ModelRecord, ModelStore, PostgresModelStore,
    GLOBAL_MODEL_ID,
};

pub use reverie_core::BanditConfig;

#[cfg(test)]
mod tests;
