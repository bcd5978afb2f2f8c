//! Authentication verdicts
//!
//! A rejected claim is a verdict, not an error: callers receive
//! `granted == false` with a stable failure code whether the scores, the
//! identity, or the phrase killed the claim.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Why a claim was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailure {
    /// The score gates rejected the sample
    ScoresRejected,
    /// The top class does not map to the claimed identifier
    IdMismatch,
    /// The spoken phrase did not match the challenge
    PhraseMismatch,
}

/// Full authentication outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthVerdict {
    pub granted: bool,
    /// Class with the highest raw score
    pub predicted_id: i32,
    /// Calibrated confidence in [0, 1]
    pub confidence: f64,
    /// Raw score per class
    pub scores: BTreeMap<i32, f64>,
    pub expected_phrase: Option<String>,
    pub transcription: Option<String>,
    pub text_similarity: Option<f64>,
    /// Whether the phrase check passed (false when it never ran)
    pub text_ok: bool,
    /// Whether the predicted class maps to the claimed identifier
    pub id_match: bool,
    pub failure: Option<AuthFailure>,
    pub elapsed_ms: u64,
}
