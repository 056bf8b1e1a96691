//! Clip loading against real WAV files on disk.

use std::path::Path;
use training::dataset::{collate, load_wav_clip, recording_durations, ClipSample};
use training::TrainBackend;

fn write_wav(path: &Path, sample_rate: u32, seconds: f64, amplitude: i16) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let total = (seconds * sample_rate as f64).round() as usize;
    for i in 0..total {
        let sign = if i % 2 == 0 { 1 } else { -1 };
        writer.write_sample(amplitude * sign).unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn clip_is_sliced_and_peak_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rec.wav");
    write_wav(&path, 8_000, 1.0, 8_000);

    let clip = load_wav_clip(&path, 8_000, 0.25, 0.5).unwrap();
    assert_eq!(clip.len(), 4_000);
    let peak = clip.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert!((peak - 0.9).abs() < 1e-5);
    assert!(clip.iter().all(|s| s.abs() > 0.0));
}

#[test]
fn clip_past_end_of_file_is_zero_padded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rec.wav");
    write_wav(&path, 8_000, 1.0, 8_000);

    let clip = load_wav_clip(&path, 8_000, 0.75, 0.5).unwrap();
    assert_eq!(clip.len(), 4_000);
    assert!(clip[..2_000].iter().any(|s| s.abs() > 0.0));
    assert!(clip[2_000..].iter().all(|s| *s == 0.0));
}

#[test]
fn sample_rate_mismatch_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rec.wav");
    write_wav(&path, 8_000, 0.5, 8_000);

    let err = load_wav_clip(&path, 16_000, 0.0, 0.5).unwrap_err();
    assert!(err.to_string().contains("sample rate mismatch"));
}

#[test]
fn collate_rejects_an_empty_batch() {
    let device = Default::default();
    let samples: Vec<ClipSample> = Vec::new();
    assert!(collate::<TrainBackend>(&samples, &device).is_err());
}

#[test]
fn durations_are_reported_per_recording() {
    let dir = tempfile::tempdir().unwrap();
    write_wav(&dir.path().join("a.wav"), 8_000, 1.0, 4_000);
    write_wav(&dir.path().join("b.wav"), 8_000, 2.5, 4_000);
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let durations = recording_durations(dir.path()).unwrap();
    assert_eq!(durations.len(), 2);
    assert!((durations["a.wav"] - 1.0).abs() < 1e-9);
    assert!((durations["b.wav"] - 2.5).abs() < 1e-9);
}
