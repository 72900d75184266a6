//! flag-runner: batch + stream purchase anomaly runner.
//!
//! Usage:
//!   flag-runner batch_log.json stream_log.json flagged_purchases.json
//!   flag-runner batch_log.json stream_log.json flagged_purchases.json --db runs.db
//!   flag-runner --synthetic 12345 flagged_purchases.json

use anyhow::{bail, Context, Result};
use spendnet_core::{
    detector::{AnomalyDetector, RunStats},
    event::Record,
    feed,
    sink::{FlagSink, JsonLinesSink},
    store::FlagStore,
    synth::{SynthParams, SyntheticFeed},
};
use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Flags that take a value; their values are not positional arguments.
const VALUE_FLAGS: [&str; 2] = ["--db", "--synthetic"];

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let db = flag_value(&args, "--db");
    let synthetic_seed: Option<u64> = flag_value(&args, "--synthetic")
        .map(|s| s.parse::<u64>().with_context(|| format!("--synthetic expects a seed, got {s}")))
        .transpose()?;
    let positional = positional_args(&args);

    let (init, stream, output) = match (synthetic_seed, positional.as_slice()) {
        (Some(seed), [output]) => {
            let feed = SyntheticFeed::generate(seed, &SynthParams::default());
            (feed.init, feed.stream, *output)
        }
        (None, [batch, stream, output]) => {
            let init = feed::load_file(Path::new(batch))?;
            let stream = feed::load_file(Path::new(stream))?;
            if init.skipped + stream.skipped > 0 {
                log::warn!(
                    "skipped {} malformed lines",
                    init.skipped + stream.skipped
                );
            }
            (init.records, stream.records, *output)
        }
        _ => bail!(
            "usage: flag-runner <batch_log> <stream_log> <flagged_out> [--db <path>]\n       \
             flag-runner --synthetic <seed> <flagged_out> [--db <path>]"
        ),
    };

    println!("flag-runner");
    println!("  output:    {output}");
    println!("  db:        {}", db.unwrap_or("(none)"));
    if let Some(seed) = synthetic_seed {
        println!("  synthetic: seed {seed}");
    }
    println!();

    let started_at = chrono::Utc::now();
    let mut detector = AnomalyDetector::from_init_feed(init)
        .context("initialization feed must start with a D/T record")?;

    let file = File::create(output).with_context(|| format!("Cannot create {output}"))?;
    let mut writer = JsonLinesSink::new(BufWriter::new(file));

    match db {
        Some(path) => {
            let store = FlagStore::open(path)?;
            store.migrate()?;
            let run_id = format!("run-{}", uuid::Uuid::new_v4());
            store.insert_run(&run_id, detector.config(), started_at)?;

            let mut sinks = (&mut writer, store.recorder(&run_id));
            run(&mut detector, stream, &mut sinks)?;
            store.finish_run(&run_id, detector.stats())?;
            println!("  run_id:    {run_id}");
        }
        None => run(&mut detector, stream, &mut writer)?,
    }

    print_summary(&detector, writer.written(), started_at);
    Ok(())
}

fn run<S: FlagSink>(detector: &mut AnomalyDetector, stream: Vec<Record>, sink: &mut S) -> Result<()> {
    detector.run_stream(stream, sink)?;
    Ok(())
}

fn print_summary(detector: &AnomalyDetector, written: usize, started_at: chrono::DateTime<chrono::Utc>) {
    let RunStats {
        records,
        malformed,
        unknown_types,
        purchases,
        evaluated,
        insufficient_data,
        befriends,
        unfriends,
        missing_edges,
        flagged,
    } = detector.stats().clone();
    let config = detector.config();
    let elapsed = chrono::Utc::now() - started_at;

    println!("=== RUN SUMMARY ===");
    println!("  depth (D):         {}", config.depth);
    println!("  window (T):        {}", config.window);
    println!("  records:           {records}");
    println!("  malformed:         {malformed}");
    println!("  unknown types:     {unknown_types}");
    println!("  purchases:         {purchases}");
    println!("  befriends:         {befriends}");
    println!("  unfriends:         {unfriends} ({missing_edges} without an edge)");
    println!("  evaluated:         {evaluated} ({insufficient_data} with too little data)");
    println!("  flagged:           {flagged}");
    println!("  written:           {written}");
    println!("  graph:             {} users, {} edges", detector.graph().user_count(), detector.graph().edge_count());
    println!("  elapsed:           {} ms", elapsed.num_milliseconds());
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn positional_args(args: &[String]) -> Vec<&str> {
    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            iter.next();
        } else if !arg.starts_with("--") {
            positional.push(arg.as_str());
        }
    }
    positional
}
