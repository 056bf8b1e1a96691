//! Epoch loop, checkpointing, and resume state for segment classifiers.

use crate::dataset::{collate, ClipLoader};
use crate::metrics::{append_metrics, classification_metrics, EpochRecord, LossMeter, MetricsReport};
use crate::TrainBackend;
use annotations::Segment;
use burn::module::{AutodiffModule, Module};
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Int, Tensor};
use models::{ConvClassifier, LinearClassifier};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub type ADBackend = burn::backend::Autodiff<TrainBackend>;

/// Seam between the trainer and the concrete network architectures.
pub trait SegmentClassifier<B: Backend>: Module<B> {
    /// Class logits with shape [batch, num_classes].
    fn logits(&self, input: Tensor<B, 2>) -> Tensor<B, 2>;
}

impl<B: Backend> SegmentClassifier<B> for LinearClassifier<B> {
    fn logits(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.forward(input)
    }
}

impl<B: Backend> SegmentClassifier<B> for ConvClassifier<B> {
    fn logits(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.forward(input)
    }
}

/// Progress persisted alongside the checkpoints so a later run can resume.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TrainState {
    pub epochs_trained: usize,
    /// Best validation loss seen so far; `None` before the first epoch.
    pub best_loss: Option<f32>,
}

impl TrainState {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn improves(&self, val_loss: f32) -> bool {
        self.best_loss.map_or(true, |best| val_loss < best)
    }
}

pub struct Trainer {
    pub epochs: usize,
    pub batch_size: usize,
    pub lr: f64,
    /// Multiplicative learning-rate decay applied once per epoch.
    pub gamma: f64,
    pub seed: u64,
    pub output_dir: PathBuf,
    pub metrics_path: PathBuf,
    pub state: TrainState,
}

impl Trainer {
    pub fn new(
        epochs: usize,
        batch_size: usize,
        lr: f64,
        gamma: f64,
        seed: u64,
        output_dir: PathBuf,
        metrics_path: PathBuf,
    ) -> Self {
        Self {
            epochs,
            batch_size,
            lr,
            gamma,
            seed,
            output_dir,
            metrics_path,
            state: TrainState::default(),
        }
    }

    /// Restore epoch/best-loss progress from a previous run's state file.
    pub fn with_resumed_state(mut self) -> anyhow::Result<Self> {
        let path = self.state_path();
        if path.exists() {
            self.state = TrainState::load(&path)?;
            println!(
                "resuming after {} trained epoch(s), best val loss {:?}",
                self.state.epochs_trained, self.state.best_loss
            );
        }
        Ok(self)
    }

    pub fn state_path(&self) -> PathBuf {
        self.output_dir.join("state.json")
    }

    pub fn last_path(&self) -> PathBuf {
        self.output_dir.join("last.bin")
    }

    pub fn best_path(&self) -> PathBuf {
        self.output_dir.join("best.bin")
    }

    /// Run the remaining epochs, checkpointing `last.bin` every epoch and
    /// `best.bin` whenever validation loss improves. Returns the trained
    /// model; a fully-trained state returns the input model unchanged.
    pub fn fit<M>(
        &mut self,
        mut model: M,
        loader: &ClipLoader,
        train: &[Segment],
        val: &[Segment],
    ) -> anyhow::Result<M>
    where
        M: SegmentClassifier<ADBackend> + AutodiffModule<ADBackend>,
        M::InnerModule: SegmentClassifier<TrainBackend>,
    {
        if self.state.epochs_trained >= self.epochs {
            println!(
                "already trained for {} epoch(s); nothing to do",
                self.state.epochs_trained
            );
            return Ok(model);
        }

        let device = <ADBackend as Backend>::Device::default();
        let loss_fn = CrossEntropyLossConfig::new().init(&device);
        let mut optim = AdamConfig::new().init();
        let mut meter = LossMeter::new();
        std::fs::create_dir_all(&self.output_dir)?;

        for epoch in self.state.epochs_trained..self.epochs {
            let lr_epoch = self.lr * self.gamma.powi(epoch as i32);

            let mut order: Vec<&Segment> = train.iter().collect();
            let mut rng =
                rand::rngs::StdRng::seed_from_u64(self.seed.wrapping_add(epoch as u64));
            order.shuffle(&mut rng);

            meter.reset();
            let mut train_labels = Vec::with_capacity(train.len());
            let mut train_preds = Vec::with_capacity(train.len());
            for chunk in order.chunks(self.batch_size) {
                let samples = loader.load_batch(chunk)?;
                let batch = collate::<ADBackend>(&samples, &device)?;

                let logits = model.logits(batch.features);
                let loss = loss_fn.forward(logits.clone(), batch.labels.clone());
                meter.add(loss.clone().into_scalar().elem::<f32>());

                train_labels.extend(int_vec(batch.labels)?);
                train_preds.extend(argmax_classes(logits)?);

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(lr_epoch, model, grads);
            }
            let train_loss = meter.summarize_epoch();
            let train_metrics = classification_metrics(&train_labels, &train_preds);

            let (val_loss, val_metrics) =
                evaluate(&model.valid(), loader, val, self.batch_size, &device)?;

            self.log_epoch(epoch, "train", train_loss, train_metrics)?;
            self.log_epoch(epoch, "val", val_loss, val_metrics)?;
            println!(
                "epoch {epoch}: train_loss {train_loss:.4} val_loss {val_loss:.4} val_acc {:.3}",
                val_metrics.accuracy
            );

            let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
            if self.state.improves(val_loss) {
                self.state.best_loss = Some(val_loss);
                model.clone().save_file(self.best_path(), &recorder)?;
            }
            model.clone().save_file(self.last_path(), &recorder)?;
            self.state.epochs_trained = epoch + 1;
            self.state.save(&self.state_path())?;
        }

        Ok(model)
    }

    fn log_epoch(
        &self,
        epoch: usize,
        split: &str,
        loss: f32,
        metrics: MetricsReport,
    ) -> anyhow::Result<()> {
        append_metrics(
            &self.metrics_path,
            &EpochRecord {
                epoch,
                split,
                loss,
                metrics,
            },
        )
    }
}

/// Mean loss and classification metrics over a record set, without gradients.
pub fn evaluate<M>(
    model: &M,
    loader: &ClipLoader,
    records: &[Segment],
    batch_size: usize,
    device: &<TrainBackend as Backend>::Device,
) -> anyhow::Result<(f32, MetricsReport)>
where
    M: SegmentClassifier<TrainBackend>,
{
    let loss_fn = CrossEntropyLossConfig::new().init(device);
    let mut meter = LossMeter::new();
    let mut labels = Vec::with_capacity(records.len());
    let mut preds = Vec::with_capacity(records.len());
    let refs: Vec<&Segment> = records.iter().collect();
    for chunk in refs.chunks(batch_size.max(1)) {
        let samples = loader.load_batch(chunk)?;
        let batch = collate::<TrainBackend>(&samples, device)?;
        let logits = model.logits(batch.features);
        let loss = loss_fn.forward(logits.clone(), batch.labels.clone());
        meter.add(loss.into_scalar().elem::<f32>());
        labels.extend(int_vec(batch.labels)?);
        preds.extend(argmax_classes(logits)?);
    }
    Ok((meter.summarize_epoch(), classification_metrics(&labels, &preds)))
}

fn argmax_classes<B: Backend>(logits: Tensor<B, 2>) -> anyhow::Result<Vec<i64>> {
    let [batch, _] = logits.dims();
    int_vec(logits.argmax(1).reshape([batch]))
}

fn int_vec<B: Backend>(tensor: Tensor<B, 1, Int>) -> anyhow::Result<Vec<i64>> {
    tensor
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| anyhow::anyhow!("failed to read int tensor: {e:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/state.json");
        let state = TrainState {
            epochs_trained: 3,
            best_loss: Some(0.25),
        };
        state.save(&path).unwrap();
        let loaded = TrainState::load(&path).unwrap();
        assert_eq!(loaded.epochs_trained, 3);
        assert_eq!(loaded.best_loss, Some(0.25));
    }

    #[test]
    fn fresh_state_always_improves() {
        let state = TrainState::default();
        assert!(state.improves(10.0));
        let state = TrainState {
            epochs_trained: 1,
            best_loss: Some(0.5),
        };
        assert!(state.improves(0.4));
        assert!(!state.improves(0.5));
        assert!(!state.improves(0.6));
    }
}
