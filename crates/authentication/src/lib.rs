//! Authentication decision engine
//!
//! Combines classifier scores, the claimed-identity mapping, and an
//! independently transcribed phrase challenge into a single verdict with a
//! calibrated confidence. The external phrase store, transcriber, and user
//! directory are consumed through traits; claim rejections are verdicts,
//! never errors.

pub mod authenticator;
pub mod externals;
pub mod memory;
pub mod rest;
pub mod text;
pub mod verdict;

pub use authenticator::{AuthRequest, Authenticator, ScoreDecision};
pub use externals::{Phrase, PhraseState, PhraseStore, Transcriber, UserDirectory, UserRecord};
pub use memory::{
    FailingTranscriber, InMemoryPhraseStore, InMemoryUserDirectory, StaticTranscriber,
};
pub use rest::{HttpTranscriber, RestPhraseStore, RestUserDirectory};
pub use text::{normalize_text, phrase_similarity};
pub use verdict::{AuthFailure, AuthVerdict};
