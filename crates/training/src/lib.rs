#![recursion_limit = "256"]

pub mod config;
pub mod dataset;
pub mod metrics;
pub mod trainer;
pub mod util;

pub use config::DataConfig;
pub use dataset::{collate, split_records, weighted_sample, ClipBatch, ClipLoader, ClipSample};
pub use metrics::{classification_metrics, EpochRecord, LossMeter, MetricsReport};
pub use models::{
    ConvClassifier, ConvClassifierConfig, LinearClassifier, LinearClassifierConfig,
};
pub use trainer::{SegmentClassifier, TrainState, Trainer};
pub use util::{run_train, TrainArgs};

/// Backend alias for training/eval (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn_ndarray::NdArray<f32>;
