//! Score gating, confidence calibration, and phrase fusion

use crate::externals::{PhraseStore, Transcriber};
use crate::text::phrase_similarity;
use crate::verdict::{AuthFailure, AuthVerdict};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};
use voice_biometric_common::{AuthConfig, Deadline, Result};
use voice_biometric_svm::SvmModel;

/// Sentinel used when fewer than two classes produce scores.
const NO_RUNNER_UP: f64 = -999.0;

/// One authentication claim.
pub struct AuthRequest<'a> {
    pub features: &'a [f64],
    /// External identifier the caller claims to be
    pub claimed_id: &'a str,
    /// Challenge phrase id; `<= 0` skips the phrase check
    pub phrase_id: i32,
    /// Recording handed to the transcriber for the phrase check
    pub audio_path: &'a Path,
}

/// Pure outcome of the score gates, before identity and phrase fusion.
#[derive(Debug, Clone, Copy)]
pub struct ScoreDecision {
    pub predicted_id: i32,
    pub top: f64,
    pub runner_up: f64,
    pub separation: f64,
    pub granted: bool,
}

/// Multi-criterion authentication engine.
pub struct Authenticator {
    config: AuthConfig,
}

impl Authenticator {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Apply the score gates to a per-class score map.
    ///
    /// Grant iff (score ∧ separation ∧ runner-up) ∨ excellent ∨
    /// (score ∧ (separation ∨ runner-up)).
    ///
    /// # Panics
    /// Panics on an empty score map; `SvmModel::score_all` never returns
    /// one.
    #[must_use]
    pub fn decide_scores(&self, scores: &BTreeMap<i32, f64>) -> ScoreDecision {
        assert!(!scores.is_empty(), "score map must not be empty");

        let (&predicted_id, &top) = scores
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .expect("non-empty scores");

        let runner_up = scores
            .iter()
            .filter(|(&class_id, _)| class_id != predicted_id)
            .map(|(_, &s)| s)
            .fold(NO_RUNNER_UP, f64::max);

        let separation = top - runner_up;

        let score_ok = top >= self.config.score_min;
        let separation_ok = separation >= self.config.diff_min;
        let runner_up_ok = runner_up < top * self.config.runner_up_factor;
        let excellent = top >= self.config.score_high;

        let granted = (score_ok && separation_ok && runner_up_ok)
            || excellent
            || (score_ok && (separation_ok || runner_up_ok));

        debug!(
            predicted_id,
            top, runner_up, separation, score_ok, separation_ok, runner_up_ok, excellent,
            granted, "score gates evaluated"
        );

        ScoreDecision {
            predicted_id,
            top,
            runner_up,
            separation,
            granted,
        }
    }

    /// Calibrated confidence for a decided claim.
    ///
    /// Rejected claims stay at or below 0.40; granted claims map the top
    /// score into [0.70, 1.0], with a 5% bonus above a 2.0 separation.
    #[must_use]
    pub fn confidence(&self, granted: bool, top: f64, separation: f64) -> f64 {
        if !granted {
            return (top / self.config.score_min).min(0.40).clamp(0.0, 1.0);
        }

        let mut confidence = if top >= self.config.score_high {
            0.95 + (0.05_f64).min((top - self.config.score_high) * 0.02)
        } else if top >= self.config.score_min {
            let range = self.config.score_high - self.config.score_min;
            0.70 + ((top - self.config.score_min) / range) * 0.25
        } else {
            // Granted via a gate combination despite a sub-minimum top score
            0.50
        };

        if separation > 2.0 {
            confidence = (confidence * 1.05).min(1.0);
        }
        confidence
    }

    /// Authenticate a claim end to end: score the features, gate, check the
    /// claimed identity against the predicted class, and fuse the phrase
    /// challenge.
    ///
    /// Claim rejections come back as a verdict; only infrastructure
    /// failures (empty model, dimension mismatch, cancelled deadline,
    /// externals down) are errors.
    ///
    /// # Errors
    /// `ModelNotLoaded`, `DimensionMismatch`, `Cancelled`,
    /// `ExternalUnavailable`.
    pub fn authenticate(
        &self,
        model: &SvmModel,
        id_map: &BTreeMap<i32, String>,
        request: &AuthRequest<'_>,
        phrase_store: &dyn PhraseStore,
        transcriber: &dyn Transcriber,
        deadline: &Deadline,
    ) -> Result<AuthVerdict> {
        deadline.check()?;

        let scores = model.score_all(request.features)?;
        let decision = self.decide_scores(&scores);

        // The class id / external identifier mapping is enforced here, once
        let id_match = id_map
            .get(&decision.predicted_id)
            .is_some_and(|identifier| identifier == request.claimed_id);

        let mut granted = decision.granted && id_match;
        let mut failure = if !decision.granted {
            Some(AuthFailure::ScoresRejected)
        } else if !id_match {
            Some(AuthFailure::IdMismatch)
        } else {
            None
        };

        let mut expected_phrase = None;
        let mut transcription = None;
        let mut text_similarity = None;
        let mut text_ok = false;

        if granted && request.phrase_id > 0 {
            deadline.check()?;
            let phrase = phrase_store.phrase_by_id(request.phrase_id)?;
            let heard = transcriber.transcribe(request.audio_path)?;

            let similarity = phrase_similarity(&phrase.text, &heard);
            text_ok = similarity >= self.config.phrase_similarity_min;

            debug!(
                phrase_id = phrase.id,
                similarity, text_ok, "phrase challenge evaluated"
            );

            expected_phrase = Some(phrase.text);
            transcription = Some(heard);
            text_similarity = Some(similarity);

            if !text_ok {
                granted = false;
                failure = Some(AuthFailure::PhraseMismatch);
            }
        }

        let confidence = self.confidence(granted, decision.top, decision.separation);

        info!(
            predicted_id = decision.predicted_id,
            granted, confidence, id_match, "authentication decided"
        );

        Ok(AuthVerdict {
            granted,
            predicted_id: decision.predicted_id,
            confidence,
            scores,
            expected_phrase,
            transcription,
            text_similarity,
            text_ok,
            id_match,
            failure,
            elapsed_ms: deadline.elapsed_ms(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryPhraseStore, InMemoryUserDirectory, StaticTranscriber};
    use voice_biometric_common::EngineError;
    use voice_biometric_svm::BinaryClassifier;

    fn scores(pairs: &[(i32, f64)]) -> BTreeMap<i32, f64> {
        pairs.iter().copied().collect()
    }

    fn authenticator() -> Authenticator {
        Authenticator::new(AuthConfig::default())
    }

    #[test]
    fn test_clear_winner_granted() {
        let d = authenticator().decide_scores(&scores(&[(1, 0.9), (2, 0.2)]));
        assert!(d.granted);
        assert_eq!(d.predicted_id, 1);
        assert!((d.separation - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_low_score_rejected() {
        // Below score_min and score_high, separation present but top weak
        let d = authenticator().decide_scores(&scores(&[(1, 0.05), (2, -0.9)]));
        assert!(!d.granted);
    }

    #[test]
    fn test_excellent_score_granted_without_separation() {
        let d = authenticator().decide_scores(&scores(&[(1, 0.85), (2, 0.82)]));
        assert!(d.granted);
    }

    #[test]
    fn test_close_runner_up_rejected() {
        // Decent top but tiny separation and runner-up above 75% of top
        let d = authenticator().decide_scores(&scores(&[(1, 0.4), (2, 0.35)]));
        assert!(!d.granted);
    }

    #[test]
    fn test_single_class_uses_sentinel_runner_up() {
        let d = authenticator().decide_scores(&scores(&[(1, 0.5)]));
        assert!(d.granted);
        assert_eq!(d.runner_up, NO_RUNNER_UP);
    }

    #[test]
    fn test_confidence_rejected_capped_at_040() {
        let auth = authenticator();
        assert!(auth.confidence(false, 0.05, 0.0) <= 0.40);
        assert!(auth.confidence(false, 5.0, 0.0) <= 0.40);
        assert!(auth.confidence(false, -1.0, 0.0) >= 0.0);
    }

    #[test]
    fn test_confidence_excellent_band() {
        let auth = authenticator();
        let c = auth.confidence(true, 0.9, 0.7);
        assert!(c >= 0.95 && c <= 1.0);
    }

    #[test]
    fn test_confidence_mid_band() {
        let auth = authenticator();
        let c = auth.confidence(true, 0.45, 0.5);
        assert!(c >= 0.70 && c < 0.95);
    }

    #[test]
    fn test_confidence_monotone_in_top_score() {
        let auth = authenticator();
        let mut last = 0.0;
        for i in 0..200 {
            let top = -0.5 + i as f64 * 0.01;
            let granted = top >= 0.1;
            let c = auth.confidence(granted, top, 0.5);
            if i > 0 && granted {
                assert!(c + 1e-12 >= last, "confidence decreased at top={top}");
            }
            last = c;
        }
    }

    #[test]
    fn test_confidence_separation_bonus_capped() {
        let auth = authenticator();
        let base = auth.confidence(true, 0.9, 1.0);
        let boosted = auth.confidence(true, 0.9, 2.5);
        assert!(boosted >= base);
        assert!(boosted <= 1.0);
    }

    fn two_class_model() -> SvmModel {
        // Class 10 scores the first coordinate, class 20 the second
        let mut model = SvmModel::new(2);
        model
            .insert(BinaryClassifier {
                class_id: 10,
                weights: vec![1.0, 0.0],
                bias: 0.0,
            })
            .unwrap();
        model
            .insert(BinaryClassifier {
                class_id: 20,
                weights: vec![0.0, 1.0],
                bias: 0.0,
            })
            .unwrap();
        model
    }

    fn id_map() -> BTreeMap<i32, String> {
        BTreeMap::from([(10, "alice".to_string()), (20, "bob".to_string())])
    }

    fn fixtures() -> (InMemoryPhraseStore, InMemoryUserDirectory) {
        let phrases = InMemoryPhraseStore::with_phrases(vec![crate::externals::Phrase {
            id: 1,
            text: "mi voz es mi clave".to_string(),
            uses_count: 0,
            uses_limit: 100,
            state: crate::externals::PhraseState::Active,
        }]);
        (phrases, InMemoryUserDirectory::default())
    }

    #[test]
    fn test_authenticate_grants_matching_claim() {
        let (phrases, _) = fixtures();
        let transcriber = StaticTranscriber::new("Mi voz es mi clave");
        let verdict = authenticator()
            .authenticate(
                &two_class_model(),
                &id_map(),
                &AuthRequest {
                    features: &[0.9, 0.2],
                    claimed_id: "alice",
                    phrase_id: 1,
                    audio_path: Path::new("claim.wav"),
                },
                &phrases,
                &transcriber,
                &Deadline::none(),
            )
            .unwrap();

        assert!(verdict.granted);
        assert!(verdict.id_match);
        assert!(verdict.text_ok);
        assert!(verdict.confidence >= 0.95);
        assert_eq!(verdict.predicted_id, 10);
        assert!(verdict.failure.is_none());
    }

    #[test]
    fn test_authenticate_rejects_id_mismatch_regardless_of_scores() {
        let (phrases, _) = fixtures();
        let transcriber = StaticTranscriber::new("mi voz es mi clave");
        let verdict = authenticator()
            .authenticate(
                &two_class_model(),
                &id_map(),
                &AuthRequest {
                    features: &[0.9, 0.2],
                    claimed_id: "bob",
                    phrase_id: 1,
                    audio_path: Path::new("claim.wav"),
                },
                &phrases,
                &transcriber,
                &Deadline::none(),
            )
            .unwrap();

        assert!(!verdict.granted);
        assert!(!verdict.id_match);
        assert_eq!(verdict.failure, Some(AuthFailure::IdMismatch));
        assert!(verdict.confidence <= 0.40);
    }

    #[test]
    fn test_authenticate_rejects_wrong_phrase() {
        let (phrases, _) = fixtures();
        let transcriber = StaticTranscriber::new("una frase totalmente distinta");
        let verdict = authenticator()
            .authenticate(
                &two_class_model(),
                &id_map(),
                &AuthRequest {
                    features: &[0.9, 0.2],
                    claimed_id: "alice",
                    phrase_id: 1,
                    audio_path: Path::new("claim.wav"),
                },
                &phrases,
                &transcriber,
                &Deadline::none(),
            )
            .unwrap();

        assert!(!verdict.granted);
        assert!(verdict.id_match);
        assert!(!verdict.text_ok);
        assert_eq!(verdict.failure, Some(AuthFailure::PhraseMismatch));
        assert!(verdict.text_similarity.unwrap() < 0.70);
    }

    #[test]
    fn test_authenticate_skips_phrase_when_not_requested() {
        let (phrases, _) = fixtures();
        let transcriber = StaticTranscriber::new("ignored");
        let verdict = authenticator()
            .authenticate(
                &two_class_model(),
                &id_map(),
                &AuthRequest {
                    features: &[0.9, 0.2],
                    claimed_id: "alice",
                    phrase_id: 0,
                    audio_path: Path::new("claim.wav"),
                },
                &phrases,
                &transcriber,
                &Deadline::none(),
            )
            .unwrap();

        assert!(verdict.granted);
        assert!(verdict.expected_phrase.is_none());
        assert!(verdict.transcription.is_none());
    }

    #[test]
    fn test_authenticate_propagates_dimension_mismatch() {
        let (phrases, _) = fixtures();
        let transcriber = StaticTranscriber::new("x");
        let result = authenticator().authenticate(
            &two_class_model(),
            &id_map(),
            &AuthRequest {
                features: &[0.9],
                claimed_id: "alice",
                phrase_id: 0,
                audio_path: Path::new("claim.wav"),
            },
            &phrases,
            &transcriber,
            &Deadline::none(),
        );
        assert!(matches!(result, Err(EngineError::DimensionMismatch { .. })));
    }
}
