//! Reward shaping from interaction signals
//!
//! Converts raw interaction events into the `[0, 1]` reward the bandit
//! learns from. Explicit feedback ("does this bring back memories?") is the
//! gold standard and overrides every implicit signal. A `None` result means
//! the event carries no learning signal and the bandit must not be updated.

use serde::{Deserialize, Serialize};

/// Interaction types reported by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    /// Impression only
    View,
    /// User opened / played the item
    Click,
    /// User skipped the item
    Skip,
    /// User moved on to the next recommendation
    Next,
    /// User played the item again
    Replay,
    /// Explicit feedback submission
    Feedback,
}

/// Reward hierarchy:
///
/// 1. Explicit memories answer (yes/no): 1.0 / 0.0, overrides everything
/// 2. Replay: 1.0
/// 3. Click: 0.8
/// 4. Next after lingering > 30s without an explicit vote: 0.6
/// 5. Skip: 0.0
/// 6. Everything else (including plain views): no signal
pub fn calculate_reward(
    interaction: InteractionType,
    brings_back_memories: Option<bool>,
    duration_seconds: u32,
    feedback_submitted: bool,
) -> Option<f64> {
    if let Some(memories) = brings_back_memories {
        return Some(if memories { 1.0 } else { 0.0 });
    }

    match interaction {
        InteractionType::Replay => Some(1.0),
        InteractionType::Click => Some(0.8),
        InteractionType::Next => {
            // If they lingered and haven't already voted, count mild
            // interest; a prior vote makes this event redundant.
            if duration_seconds > 30 && !feedback_submitted {
                Some(0.6)
            } else {
                None
            }
        }
        InteractionType::Skip => Some(0.0),
        InteractionType::View | InteractionType::Feedback => None,
    }
}
