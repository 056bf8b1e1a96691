//! Running loss aggregation and classification metrics.

use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Accumulates batch losses over one epoch.
#[derive(Debug, Default, Clone)]
pub struct LossMeter {
    losses: Vec<f32>,
}

impl LossMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: f32) {
        self.losses.push(value);
    }

    pub fn reset(&mut self) {
        self.losses.clear();
    }

    /// Mean loss over the epoch; 0.0 when no batches were recorded.
    pub fn summarize_epoch(&self) -> f32 {
        if self.losses.is_empty() {
            return 0.0;
        }
        self.losses.iter().sum::<f32>() / self.losses.len() as f32
    }

    pub fn count(&self) -> usize {
        self.losses.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsReport {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Binary classification metrics with class 1 as the positive class.
/// Zero denominators yield 0.0 rather than NaN.
pub fn classification_metrics(labels: &[i64], preds: &[i64]) -> MetricsReport {
    let mut correct = 0usize;
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (&label, &pred) in labels.iter().zip(preds.iter()) {
        if label == pred {
            correct += 1;
        }
        match (pred == 1, label == 1) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_ += 1,
            (false, false) => {}
        }
    }

    let total = labels.len();
    let accuracy = if total > 0 {
        correct as f64 / total as f64
    } else {
        0.0
    };
    let precision = if tp + fp > 0 {
        tp as f64 / (tp + fp) as f64
    } else {
        0.0
    };
    let recall = if tp + fn_ > 0 {
        tp as f64 / (tp + fn_) as f64
    } else {
        0.0
    };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    MetricsReport {
        accuracy,
        precision,
        recall,
        f1,
    }
}

/// One JSONL row appended to the metrics log after each epoch pass.
#[derive(Debug, Clone, Serialize)]
pub struct EpochRecord<'a> {
    pub epoch: usize,
    pub split: &'a str,
    pub loss: f32,
    #[serde(flatten)]
    pub metrics: MetricsReport,
}

pub fn append_metrics(path: &Path, record: &EpochRecord) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    serde_json::to_writer(&mut file, record)?;
    writeln!(file)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loss_meter_means_over_epoch() {
        let mut meter = LossMeter::new();
        meter.add(1.0);
        meter.add(3.0);
        assert_eq!(meter.summarize_epoch(), 2.0);
        meter.reset();
        assert_eq!(meter.summarize_epoch(), 0.0);
        assert_eq!(meter.count(), 0);
    }

    #[test]
    fn metrics_on_known_confusion() {
        // labels: 1 1 0 0 1, preds: 1 0 0 1 1 -> tp=2 fp=1 fn=1, acc=3/5
        let labels = [1, 1, 0, 0, 1];
        let preds = [1, 0, 0, 1, 1];
        let report = classification_metrics(&labels, &preds);
        assert!((report.accuracy - 0.6).abs() < 1e-12);
        assert!((report.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.f1 - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn metrics_on_empty_input_are_zero() {
        let report = classification_metrics(&[], &[]);
        assert_eq!(report.accuracy, 0.0);
        assert_eq!(report.precision, 0.0);
        assert_eq!(report.recall, 0.0);
        assert_eq!(report.f1, 0.0);
    }

    #[test]
    fn epoch_records_append_as_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/metrics.jsonl");
        let report = classification_metrics(&[1, 0], &[1, 0]);
        for epoch in 0..2 {
            append_metrics(
                &path,
                &EpochRecord {
                    epoch,
                    split: "train",
                    loss: 0.5,
                    metrics: report,
                },
            )
            .unwrap();
        }
        let raw = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["epoch"], 0);
        assert_eq!(first["split"], "train");
        assert_eq!(first["accuracy"], 1.0);
    }
}
