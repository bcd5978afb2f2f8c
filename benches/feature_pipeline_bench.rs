//! Feature pipeline throughput benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use voice_biometric_common::{AudioBuffer, EngineConfig};
use voice_biometric_pipeline::FeaturePipeline;
use voice_biometric_preprocessing::{apply_vad, normalize_rms};
use voice_biometric_spectral::apply_stft;

fn speech_like(seconds: usize) -> AudioBuffer {
    let sr = 16000usize;
    let samples: Vec<f64> = (0..seconds * sr)
        .map(|i| {
            let t = i as f64 / sr as f64;
            0.3 * f64::sin(2.0 * std::f64::consts::PI * 150.0 * t)
                + 0.1 * f64::sin(2.0 * std::f64::consts::PI * 450.0 * t)
        })
        .collect();
    AudioBuffer::new(samples, 16000).unwrap()
}

fn bench_stages(c: &mut Criterion) {
    let config = EngineConfig::default();
    let audio = speech_like(3);

    c.bench_function("rms_normalize_3s", |b| {
        b.iter(|| normalize_rms(black_box(&audio), 0.1));
    });

    let normalized = normalize_rms(&audio, 0.1);
    c.bench_function("vad_3s", |b| {
        b.iter(|| apply_vad(black_box(&normalized), &config.preprocessing.vad));
    });

    c.bench_function("stft_3s", |b| {
        b.iter(|| apply_stft(black_box(&normalized), &config.stft));
    });
}

fn bench_full_pipeline(c: &mut Criterion) {
    let pipeline = FeaturePipeline::new(EngineConfig::default());
    let audio = speech_like(3);

    c.bench_function("extract_features_3s", |b| {
        b.iter(|| pipeline.extract(black_box(&audio)).unwrap());
    });
}

criterion_group!(benches, bench_stages, bench_full_pipeline);
criterion_main!(benches);
