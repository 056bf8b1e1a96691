//! Clip loading and batch collation for the segment classifier.

use annotations::Segment;
use burn::tensor::{backend::Backend, Int, Tensor, TensorData};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One fixed-length audio clip reduced to frame energies, plus its label.
#[derive(Debug, Clone)]
pub struct ClipSample {
    pub features: Vec<f32>,
    pub label: i64,
}

#[derive(Debug, Clone)]
pub struct ClipBatch<B: Backend> {
    /// Frame energies per clip (shape: [batch, n_frames]).
    pub features: Tensor<B, 2>,
    /// Class index per clip (shape: [batch]).
    pub labels: Tensor<B, 1, Int>,
}

/// Turns annotation segments into classifier inputs by slicing the referenced
/// recordings under `audio_root`.
#[derive(Debug, Clone)]
pub struct ClipLoader {
    pub audio_root: PathBuf,
    pub sample_rate: u32,
    pub seq_len: f64,
    pub n_frames: usize,
}

impl ClipLoader {
    /// Load one segment as a peak-normalized frame-energy vector.
    pub fn load_sample(&self, record: &Segment) -> anyhow::Result<ClipSample> {
        let path = self.audio_root.join(&record.filename);
        let samples = load_wav_clip(&path, self.sample_rate, record.begin_time, self.seq_len)?;
        let features = frame_energies(&samples, self.n_frames);
        Ok(ClipSample {
            features,
            label: record.label as i64,
        })
    }

    pub fn load_batch(&self, records: &[&Segment]) -> anyhow::Result<Vec<ClipSample>> {
        records.iter().map(|r| self.load_sample(r)).collect()
    }
}

/// Read a mono clip of `seq_len` seconds starting at `begin_time`,
/// zero-padded past end of file. Multi-channel audio is averaged to mono;
/// a sample-rate mismatch is an error rather than a silent resample.
pub fn load_wav_clip(
    path: &Path,
    expected_sr: u32,
    begin_time: f64,
    seq_len: f64,
) -> anyhow::Result<Vec<f32>> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| anyhow::anyhow!("failed to open wav {}: {e}", path.display()))?;
    let spec = reader.spec();
    if spec.sample_rate != expected_sr {
        anyhow::bail!(
            "sample rate mismatch for {}: got {}, expected {}",
            path.display(),
            spec.sample_rate,
            expected_sr
        );
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .filter_map(Result::ok)
            .collect(),
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .filter_map(Result::ok)
                .map(|s| s as f32 / max_value)
                .collect()
        }
    };
    let mono: Vec<f32> = if spec.channels > 1 {
        samples
            .chunks(spec.channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    } else {
        samples
    };

    let start = (begin_time * expected_sr as f64).round() as usize;
    let len = (seq_len * expected_sr as f64).round() as usize;
    let mut clip = vec![0.0f32; len];
    if start < mono.len() {
        let end = (start + len).min(mono.len());
        clip[..end - start].copy_from_slice(&mono[start..end]);
    }
    Ok(normalize_peak(clip, 0.9))
}

/// Peak-normalize to `max_val`; silent clips pass through unchanged.
pub fn normalize_peak(mut samples: Vec<f32>, max_val: f32) -> Vec<f32> {
    let peak = samples.iter().fold(0.0f32, |max, s| max.max(s.abs()));
    if peak > 0.0 {
        let scale = max_val / peak;
        for sample in &mut samples {
            *sample *= scale;
        }
    }
    samples
}

/// Reduce a clip to `n_frames` RMS energies over equal-width frames.
pub fn frame_energies(samples: &[f32], n_frames: usize) -> Vec<f32> {
    if n_frames == 0 {
        return Vec::new();
    }
    let frame_len = (samples.len() / n_frames).max(1);
    (0..n_frames)
        .map(|i| {
            let start = i * frame_len;
            if start >= samples.len() {
                return 0.0;
            }
            let end = (start + frame_len).min(samples.len());
            let frame = &samples[start..end];
            (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
        })
        .collect()
}

/// Collate loaded clips into feature/label tensors.
pub fn collate<B: Backend>(
    samples: &[ClipSample],
    device: &B::Device,
) -> anyhow::Result<ClipBatch<B>> {
    if samples.is_empty() {
        anyhow::bail!("cannot collate empty batch");
    }
    let n_frames = samples[0].features.len();
    let mut features = Vec::with_capacity(samples.len() * n_frames);
    let mut labels = Vec::with_capacity(samples.len());
    for sample in samples {
        if sample.features.len() != n_frames {
            anyhow::bail!(
                "feature length differs within batch: {} vs {}",
                sample.features.len(),
                n_frames
            );
        }
        features.extend_from_slice(&sample.features);
        labels.push(sample.label);
    }

    let features = Tensor::<B, 2>::from_data(
        TensorData::new(features, [samples.len(), n_frames]),
        device,
    );
    let labels =
        Tensor::<B, 1, Int>::from_data(TensorData::new(labels, [samples.len()]), device);
    Ok(ClipBatch { features, labels })
}

/// Resample `count` records with replacement, weighting every record
/// inversely to its label's frequency. An imbalanced call/background set
/// comes out roughly label-balanced; deterministic for a given seed.
pub fn weighted_sample(records: &[Segment], count: usize, seed: u64) -> anyhow::Result<Vec<Segment>> {
    use rand::distr::weighted::WeightedIndex;
    use rand::distr::Distribution;

    if records.is_empty() || count == 0 {
        return Ok(Vec::new());
    }
    let mut label_counts: BTreeMap<u8, usize> = BTreeMap::new();
    for record in records {
        *label_counts.entry(record.label).or_default() += 1;
    }
    let weights: Vec<f64> = records
        .iter()
        .map(|record| 1.0 / label_counts[&record.label] as f64)
        .collect();
    let dist = WeightedIndex::new(&weights)
        .map_err(|e| anyhow::anyhow!("invalid sampling weights: {e}"))?;

    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    Ok((0..count)
        .map(|_| records[dist.sample(&mut rng)].clone())
        .collect())
}

/// Seeded shuffle split into (train, validation).
pub fn split_records(records: &[Segment], val_fraction: f64, seed: u64) -> (Vec<Segment>, Vec<Segment>) {
    let mut shuffled: Vec<Segment> = records.to_vec();
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);
    let val_len = ((records.len() as f64) * val_fraction).round() as usize;
    let val_len = val_len.min(shuffled.len());
    let val = shuffled.split_off(shuffled.len() - val_len);
    (shuffled, val)
}

/// WAV duration in seconds for every recording directly under `audio_root`.
pub fn recording_durations(audio_root: &Path) -> anyhow::Result<BTreeMap<String, f64>> {
    let mut durations = BTreeMap::new();
    for entry in fs::read_dir(audio_root)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("wav") {
            continue;
        }
        let reader = hound::WavReader::open(&path)
            .map_err(|e| anyhow::anyhow!("failed to open wav {}: {e}", path.display()))?;
        let spec = reader.spec();
        let seconds = reader.duration() as f64 / spec.sample_rate as f64;
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        durations.insert(name.to_string(), seconds);
    }
    Ok(durations)
}
