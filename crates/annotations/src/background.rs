//! Background-segment derivation from merged call intervals.

use crate::types::{AnnotationError, AnnotationResult, Interval};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which background regions to emit besides the interior gaps between calls.
///
/// The default emits interior gaps only, matching the historical pipeline
/// output. Leading (recording start to first call) and trailing (last call to
/// end of recording) segments are opt-in; trailing derivation needs the
/// recording duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundPolicy {
    pub leading: bool,
    pub trailing: bool,
}

/// Derive background intervals from merged, non-overlapping intervals.
///
/// For each recording, one background interval is emitted per gap between
/// consecutive merged intervals: `{prior end_time, next begin_time}`. With no
/// following interval, nothing is emitted unless `policy.trailing` is set, in
/// which case the recording duration from `durations` closes the final gap
/// (missing duration fails with [`AnnotationError::MissingDuration`]).
pub fn derive_background(
    merged: &[Interval],
    policy: BackgroundPolicy,
    durations: &BTreeMap<String, f64>,
) -> AnnotationResult<Vec<Interval>> {
    let mut by_file: BTreeMap<&str, Vec<&Interval>> = BTreeMap::new();
    for interval in merged {
        by_file
            .entry(interval.filename.as_str())
            .or_default()
            .push(interval);
    }

    let mut background = Vec::new();
    for (file, intervals) in by_file {
        if policy.leading {
            if let Some(first) = intervals.first() {
                if first.begin_time > 0.0 {
                    background.push(Interval::new(file, 0.0, first.begin_time));
                }
            }
        }
        for pair in intervals.windows(2) {
            // merged intervals are disjoint, so the successor holds the next
            // beginning strictly past this end
            if pair[1].begin_time > pair[0].end_time {
                background.push(Interval::new(file, pair[0].end_time, pair[1].begin_time));
            }
        }
        if policy.trailing {
            if let Some(last) = intervals.last() {
                let duration = durations.get(file).copied().ok_or_else(|| {
                    AnnotationError::MissingDuration {
                        filename: file.to_string(),
                    }
                })?;
                if duration > last.end_time {
                    background.push(Interval::new(file, last.end_time, duration));
                }
            }
        }
    }
    Ok(background)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merged() -> Vec<Interval> {
        vec![
            Interval::new("a.wav", 1.0, 3.0),
            Interval::new("a.wav", 5.0, 6.0),
        ]
    }

    #[test]
    fn interior_gaps_only_by_default() {
        let background =
            derive_background(&merged(), BackgroundPolicy::default(), &BTreeMap::new()).unwrap();
        assert_eq!(background, vec![Interval::new("a.wav", 3.0, 5.0)]);
    }

    #[test]
    fn leading_segment_when_enabled() {
        let policy = BackgroundPolicy {
            leading: true,
            trailing: false,
        };
        let background = derive_background(&merged(), policy, &BTreeMap::new()).unwrap();
        assert_eq!(
            background,
            vec![
                Interval::new("a.wav", 0.0, 1.0),
                Interval::new("a.wav", 3.0, 5.0),
            ]
        );
    }

    #[test]
    fn trailing_segment_uses_recording_duration() {
        let policy = BackgroundPolicy {
            leading: false,
            trailing: true,
        };
        let durations = BTreeMap::from([("a.wav".to_string(), 10.0)]);
        let background = derive_background(&merged(), policy, &durations).unwrap();
        assert_eq!(
            background,
            vec![
                Interval::new("a.wav", 3.0, 5.0),
                Interval::new("a.wav", 6.0, 10.0),
            ]
        );
    }

    #[test]
    fn trailing_without_duration_fails() {
        let policy = BackgroundPolicy {
            leading: false,
            trailing: true,
        };
        let err = derive_background(&merged(), policy, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, AnnotationError::MissingDuration { .. }));
    }

    #[test]
    fn call_spanning_whole_recording_yields_no_background() {
        let policy = BackgroundPolicy {
            leading: true,
            trailing: true,
        };
        let durations = BTreeMap::from([("a.wav".to_string(), 4.0)]);
        let merged = vec![Interval::new("a.wav", 0.0, 4.0)];
        let background = derive_background(&merged, policy, &durations).unwrap();
        assert!(background.is_empty());
    }

    #[test]
    fn recordings_are_independent() {
        let merged = vec![
            Interval::new("a.wav", 0.0, 1.0),
            Interval::new("a.wav", 2.0, 3.0),
            Interval::new("b.wav", 4.0, 5.0),
        ];
        let background =
            derive_background(&merged, BackgroundPolicy::default(), &BTreeMap::new()).unwrap();
        // no gap spans from a.wav's last interval into b.wav's first
        assert_eq!(background, vec![Interval::new("a.wav", 1.0, 2.0)]);
    }
}
