//! Burn models for bioacoustic segment classification.
//!
//! This crate defines the network architectures used to classify fixed-length
//! audio segments from their frame-energy vectors:
//! - `LinearClassifier`: two-layer MLP baseline.
//! - `ConvClassifier`: 1-D convolutional stack with adaptive pooling.
//!
//! These are pure Burn Modules with no awareness of the classifier seam used
//! at training time. The `training` crate binds them into its trainer and
//! eval paths.

use burn::module::Module;
use burn::nn;
use burn::tensor::activation::relu;
use burn::tensor::Tensor;

#[derive(Debug, Clone)]
pub struct LinearClassifierConfig {
    pub n_frames: usize,
    pub hidden: usize,
    pub num_classes: usize,
}

impl Default for LinearClassifierConfig {
    fn default() -> Self {
        Self {
            n_frames: 64,
            hidden: 64,
            num_classes: 2,
        }
    }
}

#[derive(Debug, Module)]
pub struct LinearClassifier<B: burn::tensor::backend::Backend> {
    linear1: nn::Linear<B>,
    linear2: nn::Linear<B>,
}

impl<B: burn::tensor::backend::Backend> LinearClassifier<B> {
    pub fn new(cfg: LinearClassifierConfig, device: &B::Device) -> Self {
        let linear1 = nn::LinearConfig::new(cfg.n_frames, cfg.hidden).init(device);
        let linear2 = nn::LinearConfig::new(cfg.hidden, cfg.num_classes).init(device);
        Self { linear1, linear2 }
    }

    /// Class logits with shape [batch, num_classes].
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = relu(self.linear1.forward(input));
        self.linear2.forward(x)
    }
}

#[derive(Debug, Clone)]
pub struct ConvClassifierConfig {
    pub channels: usize,
    pub kernel_size: usize,
    /// Output length of the adaptive pooling stage.
    pub pooled: usize,
    pub num_classes: usize,
}

impl Default for ConvClassifierConfig {
    fn default() -> Self {
        Self {
            channels: 16,
            kernel_size: 5,
            pooled: 8,
            num_classes: 2,
        }
    }
}

#[derive(Debug, Module)]
pub struct ConvClassifier<B: burn::tensor::backend::Backend> {
    conv1: nn::conv::Conv1d<B>,
    conv2: nn::conv::Conv1d<B>,
    pool: nn::pool::AdaptiveAvgPool1d,
    head: nn::Linear<B>,
}

impl<B: burn::tensor::backend::Backend> ConvClassifier<B> {
    pub fn new(cfg: ConvClassifierConfig, device: &B::Device) -> Self {
        let channels = cfg.channels.max(1);
        let pooled = cfg.pooled.max(1);
        let conv1 = nn::conv::Conv1dConfig::new(1, channels, cfg.kernel_size)
            .with_padding(nn::PaddingConfig1d::Same)
            .init(device);
        let conv2 = nn::conv::Conv1dConfig::new(channels, channels * 2, cfg.kernel_size)
            .with_padding(nn::PaddingConfig1d::Same)
            .init(device);
        let pool = nn::pool::AdaptiveAvgPool1dConfig::new(pooled).init();
        let head = nn::LinearConfig::new(channels * 2 * pooled, cfg.num_classes).init(device);
        Self {
            conv1,
            conv2,
            pool,
            head,
        }
    }

    /// Class logits with shape [batch, num_classes]. The frame-energy input
    /// is treated as a single-channel 1-D signal.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch, n_frames] = input.dims();
        let x = input.reshape([batch, 1, n_frames]);
        let x = relu(self.conv1.forward(x));
        let x = relu(self.conv2.forward(x));
        let x = self.pool.forward(x);
        let [batch, channels, pooled] = x.dims();
        let x = x.reshape([batch, channels * pooled]);
        self.head.forward(x)
    }
}

pub mod prelude {
    pub use super::{
        ConvClassifier, ConvClassifierConfig, LinearClassifier, LinearClassifierConfig,
    };
}
