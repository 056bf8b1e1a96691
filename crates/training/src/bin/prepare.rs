//! Builds the combined annotations CSV from a directory of Raven selection
//! tables: merge overlapping calls per recording, derive background gaps,
//! and write the labeled segments the trainer consumes.

use annotations::{
    build_combined_annotations, collect_selection_tables, write_segments_csv, BackgroundPolicy,
    LABEL_CALL,
};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use training::dataset::recording_durations;

#[derive(Parser, Debug)]
#[command(about = "Combine Raven selection tables into a labeled segments CSV")]
struct Args {
    /// Directory containing `*selections.txt` tables.
    #[arg(long)]
    selections_dir: PathBuf,

    /// Directory with the matching WAV recordings; required for
    /// --trailing-background so gaps can be closed at each file's end.
    #[arg(long)]
    audio_dir: Option<PathBuf>,

    #[arg(long, default_value = "combined_annotations.csv")]
    output: PathBuf,

    /// Annotation tags treated as calls; anything else shapes background only.
    #[arg(long, value_delimiter = ',', default_value = "w,sc")]
    positive_tags: Vec<String>,

    /// Also emit background from time zero up to the first call.
    #[arg(long)]
    leading_background: bool,

    /// Also emit background from the last call to the end of the recording.
    #[arg(long)]
    trailing_background: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if args.trailing_background && args.audio_dir.is_none() {
        anyhow::bail!("--trailing-background needs --audio-dir to read recording durations");
    }

    let durations = match &args.audio_dir {
        Some(dir) => recording_durations(dir)?,
        None => BTreeMap::new(),
    };

    let intervals = collect_selection_tables(&args.selections_dir, &args.positive_tags)?;
    println!(
        "collected {} interval(s) from {}",
        intervals.len(),
        args.selections_dir.display()
    );

    let policy = BackgroundPolicy {
        leading: args.leading_background,
        trailing: args.trailing_background,
    };
    let segments = build_combined_annotations(&intervals, &args.positive_tags, policy, &durations)?;
    let calls = segments.iter().filter(|s| s.label == LABEL_CALL).count();
    println!(
        "writing {} segment(s) ({} call, {} background) to {}",
        segments.len(),
        calls,
        segments.len() - calls,
        args.output.display()
    );

    write_segments_csv(&args.output, &segments)?;
    Ok(())
}
