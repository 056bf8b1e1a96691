//! Core interval types and error definitions for annotation processing.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type AnnotationResult<T> = Result<T, AnnotationError>;

#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("invalid interval in {filename}: end_time {end_time} <= begin_time {begin_time}")]
    InvalidInterval {
        filename: String,
        begin_time: f64,
        end_time: f64,
    },
    #[error("intervals for {filename} are not sorted by begin_time")]
    UnsortedInput { filename: String },
    #[error("recording duration unknown for {filename}")]
    MissingDuration { filename: String },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// One labeled or derived time span within a named recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub filename: String,
    pub begin_time: f64,
    pub end_time: f64,
    /// Raw annotation tag from the selection table, when one exists.
    pub annotation: Option<String>,
}

impl Interval {
    pub fn new(filename: impl Into<String>, begin_time: f64, end_time: f64) -> Self {
        Self {
            filename: filename.into(),
            begin_time,
            end_time,
            annotation: None,
        }
    }

    pub fn length(&self) -> f64 {
        self.end_time - self.begin_time
    }

    pub fn validate(&self) -> AnnotationResult<()> {
        if !self.begin_time.is_finite() || !self.end_time.is_finite() || self.end_time <= self.begin_time
        {
            return Err(AnnotationError::InvalidInterval {
                filename: self.filename.clone(),
                begin_time: self.begin_time,
                end_time: self.end_time,
            });
        }
        Ok(())
    }
}

pub const LABEL_BACKGROUND: u8 = 0;
pub const LABEL_CALL: u8 = 1;

/// Output row of the annotation pipeline.
///
/// Field order defines the serialized CSV column order
/// (`begin_time,end_time,filename,call_length,label`) and must not change;
/// downstream consumers match columns positionally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub begin_time: f64,
    pub end_time: f64,
    pub filename: String,
    pub call_length: f64,
    pub label: u8,
}

impl Segment {
    pub fn from_interval(interval: &Interval, label: u8) -> Self {
        Self {
            begin_time: interval.begin_time,
            end_time: interval.end_time,
            filename: interval.filename.clone(),
            call_length: interval.length(),
            label,
        }
    }
}
