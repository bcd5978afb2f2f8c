//! Voice Biometric CLI - dataset, training, and verification tooling
//!
//! Offline counterpart of the enrolment/authentication service: builds
//! datasets from directories of recordings, trains and evaluates models,
//! and runs single verifications against a model directory.

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use voice_biometric_auth::{
    AuthRequest, Authenticator, InMemoryPhraseStore, InMemoryUserDirectory, Phrase, PhraseState,
    RestPhraseStore, RestUserDirectory, StaticTranscriber, UserRecord,
};
use voice_biometric_common::{Deadline, EngineConfig};
use voice_biometric_dataset::{diagnose, export_csv, load_dataset, speakers_below_minimum};
use voice_biometric_enrollment::Enroller;
use voice_biometric_model_store::ModelStore;
use voice_biometric_pipeline::{load_wav, FeaturePipeline};
use voice_biometric_svm::{evaluate_multiclass, train_one_vs_all};

#[derive(Parser)]
#[command(
    name = "voice-biometric",
    version,
    about = "Speaker biometric engine tooling",
    long_about = "Build feature datasets from recordings, train and evaluate the\n\
                  one-vs-all speaker model, enrol speakers, and verify claims."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract features from a directory of per-speaker recordings
    ///
    /// Expects <AUDIO_DIR>/<speaker_id>/*.wav; every file is augmented and
    /// appended to the dataset under its numeric speaker id.
    ProcessDataset {
        /// Directory with one subdirectory per speaker
        audio_dir: PathBuf,
        /// Dataset file to append to
        #[arg(long, default_value = "dataset/train.dat")]
        dataset: PathBuf,
        /// Also export the dataset as CSV next to the binary file
        #[arg(long)]
        csv: bool,
    },

    /// Train the full one-vs-all model from a dataset
    Train {
        #[arg(long, default_value = "dataset/train.dat")]
        dataset: PathBuf,
        /// Model directory to write
        #[arg(long, default_value = "model")]
        model_dir: PathBuf,
        /// Abort if training exceeds this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Evaluate a model against a labeled dataset
    Evaluate {
        #[arg(long, default_value = "dataset/test.dat")]
        dataset: PathBuf,
        #[arg(long, default_value = "model")]
        model_dir: PathBuf,
    },

    /// Enrol a speaker from recordings (offline: directory checks are local)
    Enroll {
        /// Numeric speaker identifier
        identifier: String,
        /// Enrolment recordings (WAV)
        #[arg(required = true)]
        audios: Vec<PathBuf>,
        #[arg(long, default_value = "dataset/train.dat")]
        dataset: PathBuf,
        #[arg(long, default_value = "model")]
        model_dir: PathBuf,
        /// User directory REST endpoint; omitted = offline mode
        #[arg(long)]
        directory_url: Option<String>,
    },

    /// Verify a claimed identity against a recording
    Verify {
        /// Claimed numeric speaker identifier
        identifier: String,
        /// Recording to verify (WAV)
        audio: PathBuf,
        #[arg(long, default_value = "model")]
        model_dir: PathBuf,
        /// Challenge phrase id (requires a phrase source)
        #[arg(long, default_value_t = 0)]
        phrase_id: i32,
        /// Phrase store REST endpoint
        #[arg(long)]
        phrase_url: Option<String>,
        /// Offline phrase check: expected text given directly
        #[arg(long)]
        expected_text: Option<String>,
        /// Offline phrase check: transcription given directly
        #[arg(long)]
        transcription: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = EngineConfig::default();

    match cli.command {
        Commands::ProcessDataset { audio_dir, dataset, csv } => {
            process_dataset(&config, &audio_dir, &dataset, csv)
        }
        Commands::Train { dataset, model_dir, timeout_secs } => {
            train(&config, &dataset, &model_dir, timeout_secs)
        }
        Commands::Evaluate { dataset, model_dir } => evaluate(&dataset, &model_dir),
        Commands::Enroll { identifier, audios, dataset, model_dir, directory_url } => {
            enroll(&config, &identifier, &audios, &dataset, &model_dir, directory_url)
        }
        Commands::Verify {
            identifier,
            audio,
            model_dir,
            phrase_id,
            phrase_url,
            expected_text,
            transcription,
        } => verify(
            &config,
            &identifier,
            &audio,
            &model_dir,
            phrase_id,
            phrase_url,
            expected_text,
            transcription,
        ),
    }
}

fn process_dataset(
    config: &EngineConfig,
    audio_dir: &PathBuf,
    dataset_path: &PathBuf,
    csv: bool,
) -> Result<()> {
    let pipeline = FeaturePipeline::new(config.clone());
    if let Some(parent) = dataset_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut speakers = 0usize;
    let mut total_vectors = 0usize;

    for entry in std::fs::read_dir(audio_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let speaker: i32 = match entry.file_name().to_string_lossy().parse() {
            Ok(id) => id,
            Err(_) => {
                tracing::warn!(dir = %entry.path().display(), "skipping non-numeric speaker dir");
                continue;
            }
        };

        let mut vectors = Vec::new();
        for file in std::fs::read_dir(entry.path())? {
            let path = file?.path();
            if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("wav")) {
                let audio = load_wav(&path)?;
                match pipeline.extract_augmented(&audio) {
                    Ok(mut extracted) => vectors.append(&mut extracted),
                    Err(e) => tracing::warn!(file = %path.display(), error = %e, "skipping recording"),
                }
            }
        }

        if vectors.is_empty() {
            tracing::warn!(speaker, "no usable recordings");
            continue;
        }

        let labels = vec![speaker; vectors.len()];
        voice_biometric_dataset::append_samples(dataset_path, &vectors, &labels)?;
        speakers += 1;
        total_vectors += vectors.len();
        println!("speaker {speaker}: {} vectors", vectors.len());
    }

    let dataset = load_dataset(dataset_path)?;
    if let Some(diag) = diagnose(&dataset) {
        println!(
            "dataset: {} samples, {} classes, dimension {}",
            diag.num_samples,
            diag.num_classes(),
            diag.dimension
        );
        let short = speakers_below_minimum(&dataset, config.dataset.min_samples_per_speaker);
        if !short.is_empty() {
            println!("speakers below the {}-sample minimum: {short:?}", config.dataset.min_samples_per_speaker);
        }
    }

    if csv {
        let csv_path = dataset_path.with_extension("csv");
        export_csv(&csv_path, &dataset)?;
        println!("CSV written to {}", csv_path.display());
    }

    println!("processed {speakers} speakers, {total_vectors} vectors");
    Ok(())
}

fn train(
    config: &EngineConfig,
    dataset_path: &PathBuf,
    model_dir: &PathBuf,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let dataset = load_dataset(dataset_path)?;
    let deadline = match timeout_secs {
        Some(secs) => Deadline::within(Duration::from_secs(secs)),
        None => Deadline::none(),
    };

    let report = train_one_vs_all(&dataset, &config.svm, &deadline)?;

    let store = ModelStore::open(model_dir)?;
    store.save_full(&report.model)?;

    println!(
        "trained {} classes at dimension {}",
        report.model.num_classes(),
        report.model.dimension()
    );
    for (class_id, metrics) in &report.per_class {
        println!(
            "  class {class_id}: recall {:.1}% specificity {:.1}% f1 {:.1}%",
            metrics.recall(),
            metrics.specificity(),
            metrics.f1()
        );
    }
    if !report.degenerate_classes.is_empty() {
        println!("degenerate classes: {:?}", report.degenerate_classes);
    }
    Ok(())
}

fn evaluate(dataset_path: &PathBuf, model_dir: &PathBuf) -> Result<()> {
    let store = ModelStore::open(model_dir)?;
    let model = store.load()?;
    let dataset = load_dataset(dataset_path)?;

    let evaluation = evaluate_multiclass(&model, &dataset)?;
    println!("accuracy: {:.2}%", evaluation.accuracy);
    for (class_id, metrics) in &evaluation.per_class {
        println!(
            "  class {class_id}: recall {:.1}% specificity {:.1}% precision {:.1}%",
            metrics.recall(),
            metrics.specificity(),
            metrics.precision()
        );
    }
    if let Some(rates) = evaluation.biometric {
        println!(
            "FAR {:.2}% / FRR {:.2}% / EER {:.2}% at threshold {:.4}",
            rates.far, rates.frr, rates.eer, rates.eer_threshold
        );
    }
    Ok(())
}

fn enroll(
    config: &EngineConfig,
    identifier: &str,
    audio_paths: &[PathBuf],
    dataset_path: &PathBuf,
    model_dir: &PathBuf,
    directory_url: Option<String>,
) -> Result<()> {
    let mut audios = Vec::with_capacity(audio_paths.len());
    for path in audio_paths {
        audios.push(load_wav(path)?);
    }

    if let Some(parent) = dataset_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = ModelStore::open(model_dir)?;
    let enroller = Enroller::new(config.clone(), dataset_path.clone(), store);

    let outcome = match directory_url {
        Some(url) => {
            let directory = RestUserDirectory::new(url)?;
            enroller.enroll(identifier, &audios, &directory, None, &Deadline::none())?
        }
        None => {
            // Offline mode: a local directory that knows only this speaker
            let directory = InMemoryUserDirectory::with_users(vec![UserRecord {
                user_id: identifier.parse().unwrap_or(0),
                identifier: identifier.to_string(),
                display_name: identifier.to_string(),
                has_voice_credential: false,
            }]);
            enroller.enroll(identifier, &audios, &directory, None, &Deadline::none())?
        }
    };

    println!(
        "enrolled speaker {} ({} samples, {:?})",
        outcome.class_id, outcome.samples_added, outcome.training
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn verify(
    config: &EngineConfig,
    identifier: &str,
    audio_path: &PathBuf,
    model_dir: &PathBuf,
    phrase_id: i32,
    phrase_url: Option<String>,
    expected_text: Option<String>,
    transcription: Option<String>,
) -> Result<()> {
    let store = ModelStore::open(model_dir)?;
    let model = store.load()?;

    let pipeline = FeaturePipeline::new(config.clone());
    let features = pipeline.extract_file(audio_path)?;

    // Class ids double as external identifiers; the map keeps that explicit
    let id_map: BTreeMap<i32, String> = model
        .classes()
        .into_iter()
        .map(|class_id| (class_id, class_id.to_string()))
        .collect();

    let authenticator = Authenticator::new(config.auth.clone());
    let request = AuthRequest {
        features: &features,
        claimed_id: identifier,
        phrase_id,
        audio_path,
    };

    let verdict = if let Some(url) = phrase_url {
        let phrases = RestPhraseStore::new(url)?;
        let transcriber = voice_biometric_auth::HttpTranscriber::new(
            std::env::var("TRANSCRIBER_URL").unwrap_or_else(|_| "http://localhost:9000/transcribe".to_string()),
        )?;
        authenticator.authenticate(&model, &id_map, &request, &phrases, &transcriber, &Deadline::none())?
    } else if phrase_id > 0 {
        let Some(expected) = expected_text else {
            bail!("--expected-text is required for an offline phrase check");
        };
        let heard = transcription.unwrap_or_else(|| expected.clone());
        let phrases = InMemoryPhraseStore::with_phrases(vec![Phrase {
            id: phrase_id,
            text: expected,
            uses_count: 0,
            uses_limit: u32::MAX,
            state: PhraseState::Active,
        }]);
        let transcriber = StaticTranscriber::new(heard);
        authenticator.authenticate(&model, &id_map, &request, &phrases, &transcriber, &Deadline::none())?
    } else {
        let phrases = InMemoryPhraseStore::default();
        let transcriber = StaticTranscriber::new(String::new());
        authenticator.authenticate(&model, &id_map, &request, &phrases, &transcriber, &Deadline::none())?
    };

    println!("{}", serde_json::to_string_pretty(&verdict)?);
    if !verdict.granted {
        std::process::exit(1);
    }
    Ok(())
}
