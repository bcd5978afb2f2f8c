//! REST-backed collaborator implementations
//!
//! Thin blocking clients over the external phrase store, transcriber, and
//! user directory. Transient failures (transport errors and 5xx) retry up
//! to three times with exponential backoff; everything else surfaces as
//! `ExternalUnavailable` with the service name attached.

use crate::externals::{Phrase, PhraseState, PhraseStore, Transcriber, UserDirectory, UserRecord};
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};
use voice_biometric_common::{EngineError, Result};

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 200;
const TRANSCRIBER_TIMEOUT: Duration = Duration::from_secs(15);

fn unavailable(service: &str, reason: impl ToString) -> EngineError {
    EngineError::ExternalUnavailable {
        service: service.to_string(),
        reason: reason.to_string(),
    }
}

/// Run a request up to [`MAX_ATTEMPTS`] times, backing off on transport
/// errors and 5xx responses.
fn with_retries(
    service: &str,
    mut call: impl FnMut() -> reqwest::Result<Response>,
) -> Result<Response> {
    let mut last_reason = String::new();

    for attempt in 0..MAX_ATTEMPTS {
        if attempt > 0 {
            let backoff = Duration::from_millis(BACKOFF_BASE_MS << (attempt - 1));
            warn!(service, attempt, ?backoff, "retrying external call");
            std::thread::sleep(backoff);
        }

        match call() {
            Ok(response) if response.status().is_server_error() => {
                last_reason = format!("server error {}", response.status());
            }
            Ok(response) => return Ok(response),
            Err(e) => last_reason = e.to_string(),
        }
    }

    Err(unavailable(service, last_reason))
}

fn expect_success(service: &str, response: Response) -> Result<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(unavailable(
            service,
            format!("unexpected status {}", response.status()),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct PhraseRow {
    id: i32,
    text: String,
    uses_count: u32,
    uses_limit: u32,
    state: String,
}

impl From<PhraseRow> for Phrase {
    fn from(row: PhraseRow) -> Self {
        let state = if row.state == "active" {
            PhraseState::Active
        } else {
            PhraseState::Disabled
        };
        Phrase {
            id: row.id,
            text: row.text,
            uses_count: row.uses_count,
            uses_limit: row.uses_limit,
            state,
        }
    }
}

/// Phrase store backed by a PostgREST-style interface.
pub struct RestPhraseStore {
    client: Client,
    base_url: String,
}

impl RestPhraseStore {
    /// # Errors
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| unavailable("phrase store", e))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn fetch_rows(&self, query: &str) -> Result<Vec<PhraseRow>> {
        let url = format!("{}/phrases{query}", self.base_url);
        let response = with_retries("phrase store", || self.client.get(&url).send())?;
        expect_success("phrase store", response)?
            .json()
            .map_err(|e| unavailable("phrase store", e))
    }
}

impl PhraseStore for RestPhraseStore {
    fn phrase_by_id(&self, id: i32) -> Result<Phrase> {
        let rows = self.fetch_rows(&format!("?id=eq.{id}"))?;
        rows.into_iter()
            .next()
            .map(Phrase::from)
            .ok_or_else(|| unavailable("phrase store", format!("phrase {id} not found")))
    }

    fn pick_random_active(&self) -> Result<Phrase> {
        // Compare-and-set loop: the increment is conditional on the use
        // count we observed, so two concurrent picks cannot both consume
        // the same budget slot.
        for _ in 0..MAX_ATTEMPTS {
            let rows = self.fetch_rows("?state=eq.active")?;
            let available: Vec<PhraseRow> = rows
                .into_iter()
                .filter(|row| row.uses_count < row.uses_limit)
                .collect();
            if available.is_empty() {
                return Err(unavailable("phrase store", "no active phrase available"));
            }

            let row = &available[fastrand::usize(..available.len())];
            let next_count = row.uses_count + 1;
            let next_state = if next_count == row.uses_limit {
                "disabled"
            } else {
                "active"
            };

            let url = format!(
                "{}/phrases?id=eq.{}&uses_count=eq.{}",
                self.base_url, row.id, row.uses_count
            );
            let body = serde_json::json!({
                "uses_count": next_count,
                "state": next_state,
            });
            let response = with_retries("phrase store", || {
                self.client
                    .patch(&url)
                    .header("Prefer", "return=representation")
                    .json(&body)
                    .send()
            })?;
            let response = expect_success("phrase store", response)?;

            // An empty representation means the conditional matched nothing:
            // someone else consumed the slot first, so pick again.
            let updated: Vec<PhraseRow> =
                response.json().map_err(|e| unavailable("phrase store", e))?;
            if let Some(row) = updated.into_iter().next() {
                debug!(phrase_id = row.id, uses = row.uses_count, "phrase consumed");
                return Ok(row.into());
            }
        }

        Err(unavailable(
            "phrase store",
            "lost the use-counter race repeatedly",
        ))
    }
}

/// HTTP transcription service with a hard 15-second deadline.
pub struct HttpTranscriber {
    client: Client,
    endpoint: String,
}

impl HttpTranscriber {
    /// # Errors
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(TRANSCRIBER_TIMEOUT)
            .build()
            .map_err(|e| unavailable("transcriber", e))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl Transcriber for HttpTranscriber {
    fn transcribe(&self, audio_path: &Path) -> Result<String> {
        let bytes = std::fs::read(audio_path)?;
        let response = with_retries("transcriber", || {
            self.client
                .post(&self.endpoint)
                .header("Content-Type", "application/octet-stream")
                .body(bytes.clone())
                .send()
        })?;
        let parsed: TranscriptionResponse = expect_success("transcriber", response)?
            .json()
            .map_err(|e| unavailable("transcriber", e))?;
        Ok(parsed.text)
    }
}

#[derive(Debug, Deserialize)]
struct UserRow {
    user_id: i64,
    identifier: String,
    display_name: String,
    #[serde(default)]
    has_voice_credential: bool,
}

/// User directory backed by a PostgREST-style interface.
pub struct RestUserDirectory {
    client: Client,
    base_url: String,
}

impl RestUserDirectory {
    /// # Errors
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| unavailable("user directory", e))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

impl UserDirectory for RestUserDirectory {
    fn lookup_user(&self, identifier: &str) -> Result<Option<UserRecord>> {
        let url = format!("{}/users?identifier=eq.{identifier}", self.base_url);
        let response = with_retries("user directory", || self.client.get(&url).send())?;
        let rows: Vec<UserRow> = expect_success("user directory", response)?
            .json()
            .map_err(|e| unavailable("user directory", e))?;

        Ok(rows.into_iter().next().map(|row| UserRecord {
            user_id: row.user_id,
            identifier: row.identifier,
            display_name: row.display_name,
            has_voice_credential: row.has_voice_credential,
        }))
    }

    fn register_biometric_credential(&self, user_id: i64, kind: &str) -> Result<()> {
        let url = format!("{}/credentials", self.base_url);
        let body = serde_json::json!({
            "user_id": user_id,
            "kind": kind,
        });
        let response =
            with_retries("user directory", || self.client.post(&url).json(&body).send())?;
        expect_success("user directory", response)?;
        Ok(())
    }
}
