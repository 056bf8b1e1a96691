//! Raven selection-table I/O and conversions to and from pipeline rows.

use crate::background::{derive_background, BackgroundPolicy};
use crate::merge::{label_and_combine, merge_by_recording};
use crate::types::{AnnotationError, AnnotationResult, Interval, Segment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One row of a Raven selection table. The serde renames pin the exact header
/// names Raven writes and expects; tables are tab-separated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RavenSelection {
    #[serde(rename = "Selection")]
    pub selection: u32,
    #[serde(rename = "View")]
    pub view: String,
    #[serde(rename = "Channel")]
    pub channel: u32,
    #[serde(rename = "Begin Time (s)")]
    pub begin_time: f64,
    #[serde(rename = "End Time (s)")]
    pub end_time: f64,
    #[serde(rename = "Low Freq (Hz)")]
    pub low_freq: f64,
    #[serde(rename = "High Freq (Hz)")]
    pub high_freq: f64,
    #[serde(rename = "Annotation")]
    pub annotation: Option<String>,
}

fn csv_err(path: &Path, source: csv::Error) -> AnnotationError {
    AnnotationError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn io_err(path: &Path, source: std::io::Error) -> AnnotationError {
    AnnotationError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub fn read_selection_table(path: &Path) -> AnnotationResult<Vec<RavenSelection>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .map_err(|e| csv_err(path, e))?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row.map_err(|e| csv_err(path, e))?);
    }
    Ok(rows)
}

pub fn write_selection_table(path: &Path, rows: &[RavenSelection]) -> AnnotationResult<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .map_err(|e| csv_err(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| csv_err(path, e))?;
    }
    writer.flush().map_err(|e| io_err(path, e))?;
    Ok(())
}

/// Scan a directory for Raven `*selections.txt` exports and flatten them into
/// intervals. The recording filename is derived from the table filename
/// (`X.Table.1.selections.txt` -> `X.wav`); blank annotation cells are
/// backfilled with the first positive tag, since legacy exports leave the tag
/// column empty on confirmed calls.
pub fn collect_selection_tables(
    dir: &Path,
    positive_tags: &[String],
) -> AnnotationResult<Vec<Interval>> {
    let entries = fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with("selections.txt"))
        })
        .collect();
    paths.sort();

    let mut intervals = Vec::new();
    for path in paths {
        let recording = recording_name(&path);
        for row in read_selection_table(&path)? {
            let annotation = row
                .annotation
                .filter(|tag| !tag.trim().is_empty())
                .or_else(|| positive_tags.first().cloned());
            intervals.push(Interval {
                filename: recording.clone(),
                begin_time: row.begin_time,
                end_time: row.end_time,
                annotation,
            });
        }
    }
    Ok(intervals)
}

fn recording_name(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let stem = name
        .strip_suffix(".Table.1.selections.txt")
        .or_else(|| name.strip_suffix(".selections.txt"))
        .or_else(|| name.strip_suffix("selections.txt"))
        .unwrap_or(name)
        .trim_end_matches('.');
    format!("{stem}.wav")
}

/// End-to-end annotation pipeline: merge every labeled interval, keep the
/// positive tags as calls, derive background from the gaps between all merged
/// intervals, and label the combined rows.
pub fn build_combined_annotations(
    intervals: &[Interval],
    positive_tags: &[String],
    policy: BackgroundPolicy,
    durations: &BTreeMap<String, f64>,
) -> AnnotationResult<Vec<Segment>> {
    let calls: Vec<Interval> = intervals
        .iter()
        .filter(|interval| {
            interval
                .annotation
                .as_deref()
                .is_some_and(|tag| positive_tags.iter().any(|positive| positive == tag))
        })
        .cloned()
        .collect();

    let merged_all = merge_by_recording(intervals)?;
    let merged_calls = merge_by_recording(&calls)?;
    let background = derive_background(&merged_all, policy, durations)?;
    Ok(label_and_combine(&merged_calls, &background))
}

pub fn write_segments_csv(path: &Path, segments: &[Segment]) -> AnnotationResult<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_err(path, e))?;
    for segment in segments {
        writer.serialize(segment).map_err(|e| csv_err(path, e))?;
    }
    writer.flush().map_err(|e| io_err(path, e))?;
    Ok(())
}

pub fn read_segments_csv(path: &Path) -> AnnotationResult<Vec<Segment>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_err(path, e))?;
    let mut segments = Vec::new();
    for row in reader.deserialize() {
        segments.push(row.map_err(|e| csv_err(path, e))?);
    }
    Ok(segments)
}

/// Per-segment classifier score attached to the segment's begin time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentScore {
    pub begin_time: f64,
    pub score: f64,
}

/// Convert per-segment classifier scores into Raven selection rows.
///
/// Segments scoring above `threshold` become boxes spanning
/// `begin..begin + seq_len` (end rounded to 3 decimals) across the full
/// frequency band up to `max_freq`. The final box is clamped to the dataset
/// end so it never runs past the end of the audio.
pub fn detections_to_raven(
    scores: &[SegmentScore],
    seq_len: f64,
    threshold: f64,
    class_name: &str,
    channel: u32,
    max_freq: f64,
) -> Vec<RavenSelection> {
    let dataset_end = (scores.len() as f64 * seq_len * 10.0).round() / 10.0;

    let mut rows = Vec::new();
    for score in scores {
        if score.score <= threshold {
            continue;
        }
        let end_time = ((score.begin_time + seq_len) * 1000.0).round() / 1000.0;
        rows.push(RavenSelection {
            selection: rows.len() as u32 + 1,
            view: "Spectrogram 1".to_string(),
            channel,
            begin_time: score.begin_time,
            end_time,
            low_freq: 0.0,
            high_freq: max_freq,
            annotation: Some(class_name.to_string()),
        });
    }
    if let Some(last) = rows.last_mut() {
        if last.end_time > dataset_end {
            last.end_time = dataset_end;
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_selection_table_with_extra_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec_01.Table.1.selections.txt");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            "Selection\tView\tChannel\tBegin Time (s)\tEnd Time (s)\tLow Freq (Hz)\tHigh Freq (Hz)\tDelta Time (s)\tAnnotation"
        )
        .unwrap();
        writeln!(file, "1\tSpectrogram 1\t1\t12.5\t14.0\t0\t8000\t1.5\tw").unwrap();
        writeln!(file, "2\tSpectrogram 1\t1\t20.0\t21.0\t0\t8000\t1.0\t").unwrap();
        drop(file);

        let rows = read_selection_table(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].begin_time, 12.5);
        assert_eq!(rows[0].annotation.as_deref(), Some("w"));
        assert!(rows[1].annotation.as_deref().unwrap_or("").is_empty());
    }

    #[test]
    fn collect_backfills_blank_annotations_with_first_positive_tag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec_01.Table.1.selections.txt");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            "Selection\tView\tChannel\tBegin Time (s)\tEnd Time (s)\tLow Freq (Hz)\tHigh Freq (Hz)\tAnnotation"
        )
        .unwrap();
        writeln!(file, "1\tSpectrogram 1\t1\t0.0\t1.0\t0\t8000\t").unwrap();
        drop(file);

        let tags = vec!["w".to_string(), "sc".to_string()];
        let intervals = collect_selection_tables(dir.path(), &tags).unwrap();
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].filename, "rec_01.wav");
        assert_eq!(intervals[0].annotation.as_deref(), Some("w"));
    }

    #[test]
    fn recording_name_strips_table_suffix() {
        assert_eq!(
            recording_name(Path::new("/data/rec_01.Table.1.selections.txt")),
            "rec_01.wav"
        );
        assert_eq!(
            recording_name(Path::new("rec_02.selections.txt")),
            "rec_02.wav"
        );
    }

    #[test]
    fn selection_table_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.selections.txt");
        let rows = vec![RavenSelection {
            selection: 1,
            view: "Spectrogram 1".to_string(),
            channel: 1,
            begin_time: 3.0,
            end_time: 4.5,
            low_freq: 0.0,
            high_freq: 20_000.0,
            annotation: Some("call".to_string()),
        }];
        write_selection_table(&path, &rows).unwrap();
        let read_back = read_selection_table(&path).unwrap();
        assert_eq!(read_back, rows);
    }

    #[test]
    fn segments_csv_preserves_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("combined.csv");
        let segments = vec![Segment {
            begin_time: 1.0,
            end_time: 2.0,
            filename: "a.wav".to_string(),
            call_length: 1.0,
            label: 1,
        }];
        write_segments_csv(&path, &segments).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("begin_time,end_time,filename,call_length,label"));
        assert_eq!(read_segments_csv(&path).unwrap(), segments);
    }

    #[test]
    fn detections_above_threshold_become_numbered_rows() {
        let scores = vec![
            SegmentScore {
                begin_time: 0.0,
                score: 0.2,
            },
            SegmentScore {
                begin_time: 1.0,
                score: 0.9,
            },
            SegmentScore {
                begin_time: 2.0,
                score: 0.8,
            },
        ];
        let rows = detections_to_raven(&scores, 1.0, 0.5, "call", 1, 20_000.0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].selection, 1);
        assert_eq!(rows[1].selection, 2);
        assert_eq!(rows[0].begin_time, 1.0);
        assert_eq!(rows[0].end_time, 2.0);
        assert_eq!(rows[0].view, "Spectrogram 1");
        assert_eq!(rows[0].high_freq, 20_000.0);
    }

    #[test]
    fn last_detection_clamped_to_dataset_end() {
        let scores = vec![
            SegmentScore {
                begin_time: 0.0,
                score: 0.9,
            },
            SegmentScore {
                begin_time: 0.35,
                score: 0.9,
            },
        ];
        // dataset end is 2 * 0.35 rounded to one decimal = 0.7
        let rows = detections_to_raven(&scores, 0.35, 0.5, "call", 1, 20_000.0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].end_time, 0.7);
    }

    #[test]
    fn no_detections_below_threshold() {
        let scores = vec![SegmentScore {
            begin_time: 0.0,
            score: 0.5,
        }];
        assert!(detections_to_raven(&scores, 1.0, 0.5, "call", 1, 20_000.0).is_empty());
    }
}
