//! Runs a trained classifier over a labeled segments CSV, printing
//! classification metrics and optionally writing per-segment class
//! probabilities for later detection analysis.

use annotations::{read_segments_csv, Segment};
use burn::tensor::activation::softmax;
use burn::tensor::backend::Backend;
use clap::Parser;
use models::{ConvClassifierConfig, LinearClassifierConfig};
use serde::Serialize;
use std::path::PathBuf;
use training::config::DataConfig;
use training::dataset::{collate, ClipLoader};
use training::metrics::classification_metrics;
use training::trainer::SegmentClassifier;
use training::util::{
    load_conv_classifier_from_checkpoint, load_linear_classifier_from_checkpoint,
    validate_backend_choice, BackendKind, ModelKind,
};
use training::TrainBackend;

#[derive(Parser, Debug)]
#[command(about = "Evaluate a classifier checkpoint on labeled segments")]
struct Args {
    #[arg(long, default_value = "checkpoints/best.bin")]
    checkpoint: PathBuf,

    #[arg(long, value_enum, default_value_t = ModelKind::Linear)]
    model: ModelKind,

    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    backend: BackendKind,

    #[arg(long)]
    data_config: Option<PathBuf>,

    #[arg(long, default_value_t = 16)]
    batch_size: usize,

    /// Write per-segment probabilities to this CSV.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct InferenceRow {
    begin_time: f64,
    end_time: f64,
    filename: String,
    call_length: f64,
    label: u8,
    prob_background: f32,
    prob_call: f32,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    validate_backend_choice(args.backend)?;
    let data = DataConfig::load(args.data_config.as_deref())?;

    let segments = read_segments_csv(&data.annotations_csv)?;
    if segments.is_empty() {
        anyhow::bail!("no segments found in {}", data.annotations_csv.display());
    }

    let loader = ClipLoader {
        audio_root: data.audio_root.clone(),
        sample_rate: data.sample_rate,
        seq_len: data.seq_len,
        n_frames: data.n_frames,
    };
    let device = <TrainBackend as Backend>::Device::default();

    let rows = match args.model {
        ModelKind::Linear => {
            let cfg = LinearClassifierConfig {
                n_frames: data.n_frames,
                ..Default::default()
            };
            let model = load_linear_classifier_from_checkpoint(&args.checkpoint, cfg, &device)
                .map_err(|e| {
                    anyhow::anyhow!("failed to load {}: {e}", args.checkpoint.display())
                })?;
            run_inference(&model, &loader, &segments, args.batch_size, &device)?
        }
        ModelKind::Conv => {
            let model = load_conv_classifier_from_checkpoint(
                &args.checkpoint,
                ConvClassifierConfig::default(),
                &device,
            )
            .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", args.checkpoint.display()))?;
            run_inference(&model, &loader, &segments, args.batch_size, &device)?
        }
    };

    let labels: Vec<i64> = rows.iter().map(|r| r.label as i64).collect();
    let preds: Vec<i64> = rows
        .iter()
        .map(|r| i64::from(r.prob_call > r.prob_background))
        .collect();
    let report = classification_metrics(&labels, &preds);
    println!(
        "accuracy {:.3} precision {:.3} recall {:.3} f1 {:.3} over {} segment(s)",
        report.accuracy,
        report.precision,
        report.recall,
        report.f1,
        rows.len()
    );

    if let Some(output) = &args.output {
        let mut writer = csv::Writer::from_path(output)?;
        for row in &rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        println!("wrote probabilities to {}", output.display());
    }
    Ok(())
}

fn run_inference<M>(
    model: &M,
    loader: &ClipLoader,
    segments: &[Segment],
    batch_size: usize,
    device: &<TrainBackend as Backend>::Device,
) -> anyhow::Result<Vec<InferenceRow>>
where
    M: SegmentClassifier<TrainBackend>,
{
    let mut rows = Vec::with_capacity(segments.len());
    let refs: Vec<&Segment> = segments.iter().collect();
    for chunk in refs.chunks(batch_size.max(1)) {
        let samples = loader.load_batch(chunk)?;
        let batch = collate::<TrainBackend>(&samples, device)?;
        let probs = softmax(model.logits(batch.features), 1);
        let flat = probs
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("failed to read probability tensor: {e:?}"))?;
        for (segment, pair) in chunk.iter().zip(flat.chunks(2)) {
            rows.push(InferenceRow {
                begin_time: segment.begin_time,
                end_time: segment.end_time,
                filename: segment.filename.clone(),
                call_length: segment.call_length,
                label: segment.label,
                prob_background: pair[0],
                prob_call: pair[1],
            });
        }
    }
    Ok(rows)
}
