//! Context feature vector construction
//!
//! The bandit conditions on a fixed 12-dimensional context:
//! `[stress, emotion one-hot (7), positive_rate, birth_year, padding (2)]`.
//! Collaborator inputs arrive untyped and out of range; everything here
//! tolerates that: unknown emotions produce an all-zero one-hot block,
//! wrong-length vectors are truncated or zero-padded, missing birth years
//! fall back to the normalization center.

use serde::{Deserialize, Serialize};

/// Number of context features
pub const CONTEXT_DIM: usize = 12;

/// Named offsets into the context vector
pub const STRESS_OFFSET: usize = 0;
pub const EMOTION_OFFSET: usize = 1;
pub const POSITIVE_RATE_OFFSET: usize = 8;
pub const BIRTH_YEAR_OFFSET: usize = 9;

/// Emotion labels produced by the detection collaborator, in one-hot order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Anger,
    Fear,
    Joy,
    Love,
    Neutral,
    Sadness,
    Surprise,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Joy,
        Emotion::Love,
        Emotion::Neutral,
        Emotion::Sadness,
        Emotion::Surprise,
    ];

    /// Parse a detector label; unknown labels yield `None`
    pub fn from_label(label: &str) -> Option<Emotion> {
        match label.trim().to_lowercase().as_str() {
            "anger" => Some(Emotion::Anger),
            "fear" => Some(Emotion::Fear),
            "joy" => Some(Emotion::Joy),
            "love" => Some(Emotion::Love),
            "neutral" => Some(Emotion::Neutral),
            "sadness" => Some(Emotion::Sadness),
            "surprise" => Some(Emotion::Surprise),
            _ => None,
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|e| *e == self).unwrap_or(0)
    }
}

/// Fixed-size context vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Context([f64; CONTEXT_DIM]);

impl Context {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Neutral context used when no signal is available: mild stress,
    /// neutral emotion, everything else zero.
    pub fn neutral() -> Self {
        let mut features = [0.0; CONTEXT_DIM];
        features[STRESS_OFFSET] = 0.3;
        features[EMOTION_OFFSET + Emotion::Neutral.index()] = 1.0;
        Context(features)
    }
}

impl AsRef<[f64]> for Context {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

impl From<[f64; CONTEXT_DIM]> for Context {
    fn from(features: [f64; CONTEXT_DIM]) -> Self {
        Context(features)
    }
}

/// Build the context vector from collaborator signals
///
/// `emotion` is the raw detector label; an unrecognized label leaves the
/// one-hot block at zero. `birth_year` is normalized around 2000 with a
/// 40-year scale (roughly 1960-2040), `None` defaulting to the center.
pub fn build_context_features(
    stress_score: f64,
    emotion: &str,
    user_positive_rate: f64,
    birth_year: Option<i32>,
) -> Context {
    let mut features = [0.0; CONTEXT_DIM];

    features[STRESS_OFFSET] = stress_score;

    if let Some(e) = Emotion::from_label(emotion) {
        features[EMOTION_OFFSET + e.index()] = 1.0;
    }

    features[POSITIVE_RATE_OFFSET] = user_positive_rate;

    features[BIRTH_YEAR_OFFSET] = match birth_year {
        Some(year) => (f64::from(year) - 2000.0) / 40.0,
        None => 0.0,
    };

    Context(features)
}

/// Reshape an arbitrary slice to exactly `CONTEXT_DIM` elements
///
/// Longer inputs are truncated, shorter ones zero-padded. Malformed input
/// lengths must never abort a selection or update.
pub fn shape_context(raw: &[f64]) -> [f64; CONTEXT_DIM] {
    let mut shaped = [0.0; CONTEXT_DIM];
    for (dst, src) in shaped.iter_mut().zip(raw.iter()) {
        *dst = *src;
    }
    shaped
}

/// Share of positive reactions in a user's recent feedback
///
/// Neutral 0.5 when there is no history to judge from.
pub fn positive_rate(positive: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.5;
    }
    positive as f64 / total as f64
}
