//! Turns an inference CSV of per-segment probabilities into a Raven
//! selection table of detections, printing metrics when ground-truth
//! labels are present in the file.

use annotations::{detections_to_raven, write_selection_table, SegmentScore};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use training::metrics::classification_metrics;

#[derive(Parser, Debug)]
#[command(about = "Convert inference probabilities into a Raven selection table")]
struct Args {
    /// CSV produced by eval --output.
    inference_csv: PathBuf,

    /// Segment length in seconds; used when the CSV has no call_length column.
    #[arg(long, default_value_t = 0.2)]
    seq_len: f64,

    /// Detection threshold on the call probability.
    #[arg(long, default_value_t = 0.5)]
    threshold: f64,

    #[arg(long, default_value = "call")]
    class_name: String,

    #[arg(long, default_value_t = 1)]
    channel: u32,

    /// Upper frequency bound written into each selection row.
    #[arg(long, default_value_t = 8000.0)]
    max_freq: f64,

    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Only print metrics; skip writing the selection table.
    #[arg(long)]
    no_raven: bool,
}

#[derive(Debug, Deserialize)]
struct InferenceRow {
    /// Absent in bare inference CSVs; begin times are then synthesized as
    /// consecutive multiples of the segment length.
    #[serde(default)]
    begin_time: Option<f64>,
    #[serde(default)]
    call_length: Option<f64>,
    #[serde(default)]
    label: Option<i64>,
    prob_call: f64,
}

fn scores_from_rows(rows: &[InferenceRow], seq_len: f64) -> Vec<SegmentScore> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| SegmentScore {
            begin_time: row.begin_time.unwrap_or(index as f64 * seq_len),
            score: row.prob_call,
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut reader = csv::Reader::from_path(&args.inference_csv)?;
    let mut rows: Vec<InferenceRow> = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    if rows.is_empty() {
        anyhow::bail!("no rows in {}", args.inference_csv.display());
    }

    let seq_len = rows[0].call_length.unwrap_or(args.seq_len);
    let scores = scores_from_rows(&rows, seq_len);

    if rows.iter().all(|row| row.label.is_some()) {
        let labels: Vec<i64> = rows.iter().filter_map(|row| row.label).collect();
        let preds: Vec<i64> = rows
            .iter()
            .map(|row| i64::from(row.prob_call >= args.threshold))
            .collect();
        let report = classification_metrics(&labels, &preds);
        println!(
            "accuracy {:.3} precision {:.3} recall {:.3} f1 {:.3}",
            report.accuracy, report.precision, report.recall, report.f1
        );
    }

    let selections = detections_to_raven(
        &scores,
        seq_len,
        args.threshold,
        &args.class_name,
        args.channel,
        args.max_freq,
    );
    println!("{} detection(s) above threshold {}", selections.len(), args.threshold);

    if !args.no_raven {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let path = args
            .output_dir
            .join(format!("detections-{stamp}.Table.1.selections.txt"));
        write_selection_table(&path, &selections)?;
        println!("wrote {}", path.display());
    }
    Ok(())
}
