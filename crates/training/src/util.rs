//! CLI plumbing shared by the training and evaluation binaries.

use crate::config::DataConfig;
use crate::dataset::{split_records, weighted_sample, ClipLoader};
use crate::trainer::{ADBackend, Trainer};
use crate::TrainBackend;
use annotations::read_segments_csv;
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings, RecorderError};
use burn::tensor::backend::Backend;
use clap::{Parser, ValueEnum};
use models::{ConvClassifier, ConvClassifierConfig, LinearClassifier, LinearClassifierConfig};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelKind {
    Linear,
    Conv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    NdArray,
    Wgpu,
}

/// The compute backend is fixed at compile time; reject a flag that asks
/// for a backend this binary was not built with.
pub fn validate_backend_choice(backend: BackendKind) -> anyhow::Result<()> {
    match backend {
        BackendKind::NdArray if cfg!(feature = "backend-wgpu") => {
            anyhow::bail!("built with the backend-wgpu feature; pass --backend wgpu")
        }
        BackendKind::Wgpu if !cfg!(feature = "backend-wgpu") => {
            anyhow::bail!("rebuild with --features backend-wgpu to use the wgpu backend")
        }
        _ => Ok(()),
    }
}

#[derive(Parser, Debug)]
#[command(about = "Train a call classifier on combined annotations")]
pub struct TrainArgs {
    #[arg(long, value_enum, default_value_t = ModelKind::Linear)]
    pub model: ModelKind,

    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,

    /// Data config TOML; falls back to WHALESONG_DATA_CONFIG, then
    /// whalesong-data.toml, then built-in defaults.
    #[arg(long)]
    pub data_config: Option<PathBuf>,

    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Per-epoch learning-rate decay factor.
    #[arg(long, default_value_t = 1.0)]
    pub gamma: f64,

    #[arg(long, default_value = "checkpoints")]
    pub output_dir: PathBuf,

    #[arg(long, default_value = "logs/metrics.jsonl")]
    pub metrics_path: PathBuf,

    /// Resample the training split with inverse-frequency label weights
    /// before each run, balancing call and background draws.
    #[arg(long)]
    pub balance: bool,

    /// Continue from the state file and last checkpoint in --output-dir.
    #[arg(long)]
    pub resume: bool,
}

pub fn run_train(args: &TrainArgs) -> anyhow::Result<()> {
    validate_backend_choice(args.backend)?;
    let data = DataConfig::load(args.data_config.as_deref())?;

    let segments = read_segments_csv(&data.annotations_csv)?;
    if segments.is_empty() {
        anyhow::bail!(
            "no segments found in {}; run prepare first",
            data.annotations_csv.display()
        );
    }
    let (mut train, val) = split_records(&segments, data.val_fraction, data.seed);
    if args.balance {
        train = weighted_sample(&train, train.len(), data.seed)?;
    }
    println!(
        "{} train / {} validation segment(s)",
        train.len(),
        val.len()
    );

    let loader = ClipLoader {
        audio_root: data.audio_root.clone(),
        sample_rate: data.sample_rate,
        seq_len: data.seq_len,
        n_frames: data.n_frames,
    };

    let mut trainer = Trainer::new(
        args.epochs,
        args.batch_size,
        args.lr,
        args.gamma,
        data.seed,
        args.output_dir.clone(),
        args.metrics_path.clone(),
    );
    if args.resume {
        trainer = trainer.with_resumed_state()?;
    }

    let device = <ADBackend as Backend>::Device::default();
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    match args.model {
        ModelKind::Linear => {
            let mut model = LinearClassifier::<ADBackend>::new(
                LinearClassifierConfig {
                    n_frames: data.n_frames,
                    ..Default::default()
                },
                &device,
            );
            if args.resume && trainer.last_path().exists() {
                model = model.load_file(trainer.last_path(), &recorder, &device)?;
            }
            trainer.fit(model, &loader, &train, &val)?;
        }
        ModelKind::Conv => {
            let mut model =
                ConvClassifier::<ADBackend>::new(ConvClassifierConfig::default(), &device);
            if args.resume && trainer.last_path().exists() {
                model = model.load_file(trainer.last_path(), &recorder, &device)?;
            }
            trainer.fit(model, &loader, &train, &val)?;
        }
    }

    println!("checkpoints written to {}", args.output_dir.display());
    Ok(())
}

pub fn load_linear_classifier_from_checkpoint(
    path: &Path,
    cfg: LinearClassifierConfig,
    device: &<TrainBackend as Backend>::Device,
) -> Result<LinearClassifier<TrainBackend>, RecorderError> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    LinearClassifier::new(cfg, device).load_file(path, &recorder, device)
}

pub fn load_conv_classifier_from_checkpoint(
    path: &Path,
    cfg: ConvClassifierConfig,
    device: &<TrainBackend as Backend>::Device,
) -> Result<ConvClassifier<TrainBackend>, RecorderError> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    ConvClassifier::new(cfg, device).load_file(path, &recorder, device)
}
