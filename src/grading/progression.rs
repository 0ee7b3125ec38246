// src/grading/progression.rs

use serde::{Deserialize, Serialize};

/// Levels cycle 1..=4 within a stage before rolling over.
pub const MAX_LEVEL: i32 = 4;

/// Per-subject progression state: (stage, level) with stage >= 1 and level
/// in 1..=4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectProgress {
    pub stage: i32,
    pub level: i32,
}

impl Default for SubjectProgress {
    fn default() -> Self {
        Self::start()
    }
}

impl SubjectProgress {
    /// Initial state for a subject the student has not attempted yet.
    pub fn start() -> Self {
        SubjectProgress { stage: 1, level: 1 }
    }

    /// State after a passed attempt: level increments within the stage, and
    /// rolls over to (stage + 1, level 1) past level 4.
    pub fn advanced(self) -> Self {
        if self.level < MAX_LEVEL {
            SubjectProgress {
                stage: self.stage,
                level: self.level + 1,
            }
        } else {
            SubjectProgress {
                stage: self.stage + 1,
                level: 1,
            }
        }
    }

    /// A failed attempt never moves the state.
    pub fn after(self, passed: bool) -> Self {
        if passed { self.advanced() } else { self }
    }
}
