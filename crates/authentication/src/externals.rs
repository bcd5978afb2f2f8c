//! External collaborator boundaries
//!
//! The engine consumes three services it does not own: the phrase store,
//! the transcriber, and the user directory. Each is a trait here, with a
//! REST implementation in [`crate::rest`] and in-memory implementations in
//! [`crate::memory`] for tests and offline tooling.

use serde::{Deserialize, Serialize};
use std::path::Path;
use voice_biometric_common::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhraseState {
    Active,
    Disabled,
}

/// A challenge phrase with its usage budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phrase {
    pub id: i32,
    pub text: String,
    pub uses_count: u32,
    pub uses_limit: u32,
    pub state: PhraseState,
}

/// Read/consume access to the phrase store.
pub trait PhraseStore {
    /// Fetch a phrase by id.
    ///
    /// # Errors
    /// `ExternalUnavailable` after retries.
    fn phrase_by_id(&self, id: i32) -> Result<Phrase>;

    /// Pick a random active phrase and consume one use.
    ///
    /// Contract: the read-increment (and the disable when the limit is
    /// reached) must be atomic; two concurrent picks never observe the same
    /// remaining budget.
    ///
    /// # Errors
    /// `ExternalUnavailable` after retries, or when no active phrase
    /// remains.
    fn pick_random_active(&self) -> Result<Phrase>;
}

/// Opaque speech-to-text service. Implementations must enforce their own
/// 15-second deadline.
pub trait Transcriber {
    /// # Errors
    /// `ExternalUnavailable` on timeout or service failure.
    fn transcribe(&self, audio_path: &Path) -> Result<String>;
}

/// A registered user as the directory sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: i64,
    pub identifier: String,
    pub display_name: String,
    pub has_voice_credential: bool,
}

/// Directory of users and their biometric credentials.
pub trait UserDirectory {
    /// # Errors
    /// `ExternalUnavailable` after retries.
    fn lookup_user(&self, identifier: &str) -> Result<Option<UserRecord>>;

    /// Record that `user_id` now has a credential of `kind` (e.g. "voice").
    ///
    /// # Errors
    /// `ExternalUnavailable` after retries.
    fn register_biometric_credential(&self, user_id: i64, kind: &str) -> Result<()>;
}
