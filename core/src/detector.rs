//! The anomaly detector — one run's graph and history state and the
//! per-event dispatch over it.
//!
//! ORDERING (fixed, never reordered):
//!   1. Events are applied strictly in arrival order; every mutation
//!      from event N is visible to event N + 1.
//!   2. A purchase is recorded into the buyer's history first.
//!   3. Only then, and only in the stream phase, is the buyer's
//!      neighborhood queried and the purchase judged.
//!
//! RULES:
//!   - Per-event problems (malformed records, unknown types, unfriending
//!     strangers) are counted and logged, never fatal.
//!   - A flagged purchase is built whole before anyone sees it.

use crate::{
    config::DetectorConfig,
    error::{DetectorError, DetectorResult},
    event::{Event, FlaggedPurchase, Purchase, Record},
    graph::FriendGraph,
    history::{HistoryBook, PurchaseRecord},
    neighborhood::NeighborhoodAggregator,
    sink::FlagSink,
    stats::NeighborhoodStats,
    types::Seq,
};
use serde::{Deserialize, Serialize};

/// Which half of the feed an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Historical initialization events: build state, judge nothing.
    WarmUp,
    /// Live events: every purchase is judged.
    Stream,
}

impl Phase {
    pub fn evaluates(self) -> bool {
        matches!(self, Self::Stream)
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub records: u64,
    pub malformed: u64,
    pub unknown_types: u64,
    pub purchases: u64,
    pub evaluated: u64,
    pub insufficient_data: u64,
    pub befriends: u64,
    pub unfriends: u64,
    pub missing_edges: u64,
    pub flagged: u64,
}

pub struct AnomalyDetector {
    config: DetectorConfig,
    graph: FriendGraph,
    histories: HistoryBook,
    next_seq: Seq,
    stats: RunStats,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            graph: FriendGraph::new(),
            histories: HistoryBook::new(config.window),
            next_seq: 0,
            stats: RunStats::default(),
            config,
        }
    }

    /// Build a detector from an initialization feed. The first record
    /// must carry D and T; the rest are replayed as warm-up.
    pub fn from_init_feed<I>(records: I) -> DetectorResult<Self>
    where
        I: IntoIterator<Item = Record>,
    {
        let mut records = records.into_iter();
        let first = records.next().ok_or(DetectorError::EmptyInitFeed)?;
        let config = DetectorConfig::from_init_record(&first)?;
        log::info!(
            "detector: depth={} window={}",
            config.depth,
            config.window
        );

        let mut detector = Self::new(config);
        detector.warm_up(records);
        Ok(detector)
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn graph(&self) -> &FriendGraph {
        &self.graph
    }

    pub fn histories(&self) -> &HistoryBook {
        &self.histories
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Aggregator over the current state, for inspection.
    pub fn neighborhood(&self) -> NeighborhoodAggregator<'_> {
        NeighborhoodAggregator::new(&self.graph, &self.histories)
    }

    /// Replay historical records. Nothing is flagged.
    pub fn warm_up<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = Record>,
    {
        for record in records {
            self.process_record(&record, Phase::WarmUp);
        }
        log::info!(
            "detector: warm-up done, {} users with friends, {} edges, {} users with purchases",
            self.graph.user_count(),
            self.graph.edge_count(),
            self.histories.user_count()
        );
    }

    /// Judge live records, handing each flagged purchase to `sink` as
    /// soon as it is produced. Only a failing sink stops the run.
    pub fn run_stream<I, S>(&mut self, records: I, sink: &mut S) -> DetectorResult<()>
    where
        I: IntoIterator<Item = Record>,
        S: FlagSink + ?Sized,
    {
        for record in records {
            if let Some(flag) = self.process_record(&record, Phase::Stream) {
                sink.accept(&flag)?;
            }
        }
        sink.flush()?;
        log::info!(
            "detector: stream done, {} evaluated, {} flagged",
            self.stats.evaluated,
            self.stats.flagged
        );
        Ok(())
    }

    /// Apply one raw feed record. Malformed records and unknown event
    /// types are counted and skipped.
    pub fn process_record(&mut self, record: &Record, phase: Phase) -> Option<FlaggedPurchase> {
        self.stats.records += 1;
        match Event::from_record(record) {
            Ok(Some(event)) => self.dispatch(&event, record, phase),
            Ok(None) => {
                self.stats.unknown_types += 1;
                log::debug!("detector: ignoring unknown event type in {}", display(record));
                None
            }
            Err(e) => {
                self.stats.malformed += 1;
                log::debug!("detector: skipping record: {e}");
                None
            }
        }
    }

    /// Apply one typed event. A flagged purchase carries the event
    /// rendered back into feed form.
    pub fn apply(&mut self, event: &Event, phase: Phase) -> Option<FlaggedPurchase> {
        self.stats.records += 1;
        let record = event.to_record();
        self.dispatch(event, &record, phase)
    }

    fn dispatch(&mut self, event: &Event, record: &Record, phase: Phase) -> Option<FlaggedPurchase> {
        match event {
            Event::Purchase(purchase) => {
                self.stats.purchases += 1;
                self.record_purchase(purchase);
                if phase.evaluates() {
                    self.evaluate(purchase, record)
                } else {
                    None
                }
            }
            Event::Befriend { id1, id2 } => {
                self.stats.befriends += 1;
                if !self.graph.add_friend(id1, id2) {
                    log::debug!("graph: befriend {id1} <-> {id2} changed nothing");
                }
                None
            }
            Event::Unfriend { id1, id2 } => {
                self.stats.unfriends += 1;
                if let Err(e) = self.graph.remove_friend(id1, id2) {
                    self.stats.missing_edges += 1;
                    log::warn!("graph: {e}; unfriend ignored");
                }
                None
            }
        }
    }

    fn record_purchase(&mut self, purchase: &Purchase) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let evicted = self.histories.record(
            &purchase.user,
            PurchaseRecord {
                timestamp: purchase.timestamp.clone(),
                amount: purchase.amount,
                seq,
            },
        );
        if let Some(old) = evicted {
            log::trace!(
                "history: user={} evicted purchase at {} (seq {})",
                purchase.user,
                old.timestamp,
                old.seq
            );
        }
    }

    fn evaluate(&mut self, purchase: &Purchase, record: &Record) -> Option<FlaggedPurchase> {
        self.stats.evaluated += 1;

        let amounts = self.neighborhood().recent_amounts(
            &purchase.user,
            self.config.depth,
            self.config.window,
        );

        let Some(stats) = NeighborhoodStats::from_amounts(&amounts) else {
            self.stats.insufficient_data += 1;
            log::debug!(
                "detector: user={} has {} neighborhood purchases, not judging",
                purchase.user,
                amounts.len()
            );
            return None;
        };

        if !stats.is_anomalous(purchase.amount) {
            return None;
        }

        self.stats.flagged += 1;
        log::info!(
            "detector: flagged user={} amount={:.2} at {} (mean={:.2} sd={:.2} n={})",
            purchase.user,
            purchase.amount,
            purchase.timestamp,
            stats.mean,
            stats.std_dev,
            stats.count
        );
        Some(FlaggedPurchase::new(record, &stats))
    }
}

fn display(record: &Record) -> String {
    serde_json::to_string(record).unwrap_or_else(|_| "<unprintable>".into())
}
