//! JSON-lines feed reader.
//!
//! One record per line. Lines that are not UTF-8 or do not parse as a JSON object are
//! skipped and counted; a bad line never ends the read. Blank lines are
//! ignored without being counted.

use crate::{error::DetectorResult, event::Record};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Feed {
    pub records: Vec<Record>,
    /// Lines that were not a JSON object.
    pub skipped: usize,
}

pub fn read_records<R: BufRead>(mut reader: R) -> DetectorResult<Feed> {
    let mut feed = Feed::default();
    let mut buf = Vec::new();
    let mut index = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        index += 1;
        let line = match std::str::from_utf8(&buf) {
            Ok(text) => text.trim(),
            Err(e) => {
                feed.skipped += 1;
                log::debug!("feed: line {index} is not UTF-8: {e}");
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(record)) => feed.records.push(record),
            Ok(other) => {
                feed.skipped += 1;
                log::debug!("feed: line {index} is not an object: {other}");
            }
            Err(e) => {
                feed.skipped += 1;
                log::debug!("feed: line {index} skipped: {e}");
            }
        }
    }
    Ok(feed)
}

pub fn load_file(path: &Path) -> DetectorResult<Feed> {
    let file = File::open(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
    let feed = read_records(BufReader::new(file))?;
    log::info!(
        "feed: {} records from {} ({} skipped)",
        feed.records.len(),
        path.display(),
        feed.skipped
    );
    Ok(feed)
}
