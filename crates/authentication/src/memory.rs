//! In-memory collaborator implementations
//!
//! Used by tests and offline tooling. The phrase store serialises its
//! read-increment-disable under one mutex, satisfying the atomicity the
//! trait contract demands.

use crate::externals::{Phrase, PhraseState, PhraseStore, Transcriber, UserDirectory, UserRecord};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use voice_biometric_common::{EngineError, Result};

/// Mutex-guarded phrase store.
#[derive(Default)]
pub struct InMemoryPhraseStore {
    phrases: Mutex<BTreeMap<i32, Phrase>>,
}

impl InMemoryPhraseStore {
    #[must_use]
    pub fn with_phrases(phrases: Vec<Phrase>) -> Self {
        Self {
            phrases: Mutex::new(phrases.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    pub fn insert(&self, phrase: Phrase) {
        self.phrases
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(phrase.id, phrase);
    }
}

impl PhraseStore for InMemoryPhraseStore {
    fn phrase_by_id(&self, id: i32) -> Result<Phrase> {
        self.phrases
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::ExternalUnavailable {
                service: "phrase store".to_string(),
                reason: format!("phrase {id} not found"),
            })
    }

    fn pick_random_active(&self) -> Result<Phrase> {
        // One critical section covers pick, increment, and disable
        let mut phrases = self
            .phrases
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let active: Vec<i32> = phrases
            .values()
            .filter(|p| p.state == PhraseState::Active && p.uses_count < p.uses_limit)
            .map(|p| p.id)
            .collect();

        let &id = active
            .get(fastrand::usize(..active.len().max(1)))
            .ok_or_else(|| EngineError::ExternalUnavailable {
                service: "phrase store".to_string(),
                reason: "no active phrase available".to_string(),
            })?;

        let phrase = phrases.get_mut(&id).expect("id came from the map");
        phrase.uses_count += 1;
        if phrase.uses_count == phrase.uses_limit {
            phrase.state = PhraseState::Disabled;
        }
        Ok(phrase.clone())
    }
}

/// Transcriber that always hears the same text.
pub struct StaticTranscriber {
    text: String,
}

impl StaticTranscriber {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Transcriber for StaticTranscriber {
    fn transcribe(&self, _audio_path: &Path) -> Result<String> {
        Ok(self.text.clone())
    }
}

/// Transcriber that simulates an unreachable service.
pub struct FailingTranscriber;

impl Transcriber for FailingTranscriber {
    fn transcribe(&self, _audio_path: &Path) -> Result<String> {
        Err(EngineError::ExternalUnavailable {
            service: "transcriber".to_string(),
            reason: "simulated outage".to_string(),
        })
    }
}

/// Mutex-guarded user directory.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: Mutex<BTreeMap<String, UserRecord>>,
}

impl InMemoryUserDirectory {
    #[must_use]
    pub fn with_users(users: Vec<UserRecord>) -> Self {
        Self {
            users: Mutex::new(users.into_iter().map(|u| (u.identifier.clone(), u)).collect()),
        }
    }

    pub fn insert(&self, user: UserRecord) {
        self.users
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(user.identifier.clone(), user);
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn lookup_user(&self, identifier: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .users
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(identifier)
            .cloned())
    }

    fn register_biometric_credential(&self, user_id: i64, _kind: &str) -> Result<()> {
        let mut users = self
            .users
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for user in users.values_mut() {
            if user.user_id == user_id {
                user.has_voice_credential = true;
                return Ok(());
            }
        }
        Err(EngineError::ExternalUnavailable {
            service: "user directory".to_string(),
            reason: format!("user {user_id} not found"),
        })
    }
}
