//! Progress values published while the snippet index is being rebuilt.

use serde::{Deserialize, Serialize};

/// State of the most recent index refresh.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "fraction", rename_all = "snake_case")]
pub enum RefreshProgress {
    /// No refresh has been started yet.
    #[default]
    None,
    /// A refresh is running; the value is clamped to `0.0..=1.0`.
    InProgress(f32),
    /// The last refresh finished and its snapshot has been published.
    Complete,
}

impl RefreshProgress {
    /// Build an `InProgress` value from a done/total pair.
    pub fn from_counts(done: usize, total: usize) -> Self {
        if total == 0 {
            return RefreshProgress::InProgress(0.0);
        }
        let fraction = (done as f64 / total as f64).clamp(0.0, 1.0);
        RefreshProgress::InProgress(fraction as f32)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, RefreshProgress::InProgress(_))
    }

    /// Fraction of work done, `1.0` once complete.
    pub fn fraction(&self) -> f32 {
        match self {
            RefreshProgress::None => 0.0,
            RefreshProgress::InProgress(f) => f.clamp(0.0, 1.0),
            RefreshProgress::Complete => 1.0,
        }
    }
}

/// Point-in-time view of the index for status displays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStatus {
    pub progress: RefreshProgress,
    pub snippet_count: usize,
    pub folder_count: usize,
}

impl IndexStatus {
    pub fn ready(&self) -> bool {
        self.progress == RefreshProgress::Complete
    }
}
