use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

const DEFAULT_CONFIG_NAME: &str = "whalesong-data.toml";

/// Resolved dataset configuration, passed explicitly into the pipeline.
#[derive(Debug, Clone)]
pub struct DataConfig {
    pub audio_root: PathBuf,
    pub annotations_csv: PathBuf,
    /// Expected sample rate of every recording.
    pub sample_rate: u32,
    /// Clip length in seconds fed to the classifier.
    pub seq_len: f64,
    /// Number of frame energies per clip (model input width).
    pub n_frames: usize,
    pub val_fraction: f64,
    pub seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            audio_root: PathBuf::from("assets/recordings"),
            annotations_csv: PathBuf::from("assets/annotations/combined_annotations.csv"),
            sample_rate: 16_000,
            seq_len: 1.0,
            n_frames: 64,
            val_fraction: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct DataConfigFile {
    audio_root: Option<String>,
    annotations_csv: Option<String>,
    sample_rate: Option<u32>,
    seq_len: Option<f64>,
    n_frames: Option<usize>,
    val_fraction: Option<f64>,
    seed: Option<u64>,
}

impl DataConfig {
    /// Load from an explicit path, else `WHALESONG_DATA_CONFIG`, else
    /// `whalesong-data.toml` in the working directory, else defaults.
    ///
    /// A file the caller named must exist and parse; only the ambient
    /// `whalesong-data.toml` lookup treats a missing file as defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let cfg = match explicit {
            Some(path) => Self::from_path(path)?
                .with_context(|| format!("data config {} not found", path.display()))?,
            None => match std::env::var("WHALESONG_DATA_CONFIG") {
                Ok(path) => Self::from_path(Path::new(&path))?.with_context(|| {
                    format!("data config {path} (WHALESONG_DATA_CONFIG) not found")
                })?,
                Err(_) => Self::from_path(Path::new(DEFAULT_CONFIG_NAME))?.unwrap_or_default(),
            },
        };
        cfg.warn_if_invalid();
        Ok(cfg)
    }

    /// `Ok(None)` when the file does not exist. A file that exists but fails
    /// to read or parse is an error, never silent defaults.
    pub fn from_path(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read data config {}", path.display()))?;
        let file: DataConfigFile = toml::from_str(&raw)
            .with_context(|| format!("failed to parse data config {}", path.display()))?;
        Ok(Some(Self::from_file(file)))
    }

    fn from_file(file: DataConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            audio_root: file
                .audio_root
                .map(PathBuf::from)
                .unwrap_or(defaults.audio_root),
            annotations_csv: file
                .annotations_csv
                .map(PathBuf::from)
                .unwrap_or(defaults.annotations_csv),
            sample_rate: file.sample_rate.unwrap_or(defaults.sample_rate),
            seq_len: file.seq_len.unwrap_or(defaults.seq_len),
            n_frames: file.n_frames.unwrap_or(defaults.n_frames),
            val_fraction: file.val_fraction.unwrap_or(defaults.val_fraction),
            seed: file.seed.unwrap_or(defaults.seed),
        }
    }

    fn warn_if_invalid(&self) {
        if self.seq_len <= 0.0 {
            eprintln!("data config: seq_len must be positive; clips will be empty");
        }
        if self.n_frames == 0 {
            eprintln!("data config: n_frames is zero; feature vectors will be empty");
        }
        if !(0.0..1.0).contains(&self.val_fraction) {
            eprintln!("data config: val_fraction outside [0, 1); validation split may be empty");
        }
        if self.sample_rate == 0 {
            eprintln!("data config: sample_rate is zero; audio loading will fail");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_none() {
        assert!(DataConfig::from_path(Path::new("does-not-exist.toml"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn partial_file_overlays_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "audio_root = \"/data/recs\"").unwrap();
        writeln!(file, "sample_rate = 44100").unwrap();
        drop(file);

        let cfg = DataConfig::from_path(&path).unwrap().unwrap();
        assert_eq!(cfg.audio_root, PathBuf::from("/data/recs"));
        assert_eq!(cfg.sample_rate, 44_100);
        assert_eq!(cfg.n_frames, DataConfig::default().n_frames);
        assert_eq!(cfg.seq_len, DataConfig::default().seq_len);
    }

    #[test]
    fn malformed_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.toml");
        std::fs::write(&path, "audio_root = [not valid toml").unwrap();

        let err = DataConfig::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("failed to parse data config"));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let err = DataConfig::load(Some(Path::new("does-not-exist.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
