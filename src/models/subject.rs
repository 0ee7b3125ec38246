// src/models/subject.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical subject enumeration.
///
/// A single lowercase spelling is the only one that exists anywhere in the
/// system (requests, responses, and the `subject` Postgres enum), so no
/// dual-cased keys can ever accumulate in student records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "subject", rename_all = "lowercase")]
pub enum Subject {
    Physics,
    Chemistry,
    Botany,
    Zoology,
}

impl Subject {
    pub const ALL: [Subject; 4] = [
        Subject::Physics,
        Subject::Chemistry,
        Subject::Botany,
        Subject::Zoology,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Physics => "physics",
            Subject::Chemistry => "chemistry",
            Subject::Botany => "botany",
            Subject::Zoology => "zoology",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
