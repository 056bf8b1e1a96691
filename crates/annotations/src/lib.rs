//! Interval merging and Raven annotation I/O for bioacoustic datasets.
//!
//! The central transformation collapses possibly-overlapping labeled time
//! intervals into non-overlapping call segments, derives the background
//! segments between them, and serializes the combined result as the
//! `begin_time,end_time,filename,call_length,label` CSV consumed by the
//! training pipeline.

pub mod background;
pub mod merge;
pub mod raven;
pub mod types;

pub use background::{derive_background, BackgroundPolicy};
pub use merge::{label_and_combine, merge_by_recording, merge_overlapping};
pub use raven::{
    build_combined_annotations, collect_selection_tables, detections_to_raven, read_segments_csv,
    read_selection_table, write_segments_csv, write_selection_table, RavenSelection, SegmentScore,
};
pub use types::{
    AnnotationError, AnnotationResult, Interval, Segment, LABEL_BACKGROUND, LABEL_CALL,
};
