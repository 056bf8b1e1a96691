//! Overlap merging for labeled call intervals.

use crate::types::{
    AnnotationError, AnnotationResult, Interval, Segment, LABEL_BACKGROUND, LABEL_CALL,
};
use std::collections::BTreeMap;

/// Collapse the sorted intervals of a single recording into the minimal
/// non-overlapping set covering the same union of time.
///
/// Touching intervals merge: `cur.begin_time <= last.end_time` extends the
/// accumulated interval. The closed-interval tie-break at exact equality is a
/// policy callers rely on; do not change it to a strict comparison.
///
/// The input must be sorted ascending by `begin_time`; an unsorted slice fails
/// with [`AnnotationError::UnsortedInput`], and any interval with
/// `end_time <= begin_time` fails with [`AnnotationError::InvalidInterval`].
/// An empty slice yields an empty vector.
pub fn merge_overlapping(intervals: &[Interval]) -> AnnotationResult<Vec<Interval>> {
    let Some(first) = intervals.first() else {
        return Ok(Vec::new());
    };
    first.validate()?;

    let mut merged = vec![first.clone()];
    for pair in intervals.windows(2) {
        let cur = &pair[1];
        cur.validate()?;
        if cur.begin_time < pair[0].begin_time {
            return Err(AnnotationError::UnsortedInput {
                filename: cur.filename.clone(),
            });
        }
        let last = merged.last_mut().expect("accumulator starts non-empty");
        if cur.begin_time <= last.end_time {
            last.end_time = last.end_time.max(cur.end_time);
        } else {
            merged.push(cur.clone());
        }
    }
    Ok(merged)
}

/// Partition intervals by recording, sort each partition by begin time, and
/// merge per recording. Output is grouped by filename in lexical order; the
/// caller's input is not mutated.
pub fn merge_by_recording(intervals: &[Interval]) -> AnnotationResult<Vec<Interval>> {
    let mut by_file: BTreeMap<&str, Vec<Interval>> = BTreeMap::new();
    for interval in intervals {
        by_file
            .entry(interval.filename.as_str())
            .or_default()
            .push(interval.clone());
    }

    let mut merged = Vec::new();
    for (_file, mut partition) in by_file {
        partition.sort_by(|a, b| a.begin_time.total_cmp(&b.begin_time));
        merged.extend(merge_overlapping(&partition)?);
    }
    Ok(merged)
}

/// Label call and background intervals and combine them into output rows:
/// background rows (label 0) first, then call rows (label 1). No ordering
/// guarantee holds across the combined sequence; consumers sort by
/// filename/begin_time when they need one.
pub fn label_and_combine(calls: &[Interval], background: &[Interval]) -> Vec<Segment> {
    let mut combined: Vec<Segment> = background
        .iter()
        .map(|interval| Segment::from_interval(interval, LABEL_BACKGROUND))
        .collect();
    combined.extend(
        calls
            .iter()
            .map(|interval| Segment::from_interval(interval, LABEL_CALL)),
    );
    combined
}
