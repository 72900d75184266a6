//! Deterministic synthetic feeds.
//!
//! RULE: nothing here may call a platform RNG. All randomness flows
//! from a single `u64` seed through `FeedRng`, so a seed reproduces
//! the exact same initialization and stream feeds.

use crate::{config::DetectorConfig, event::{Event, Record}};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde_json::Value;

/// A seeded RNG for feed generation.
pub struct FeedRng {
    inner: Pcg64Mcg,
}

impl FeedRng {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Simplified Pareto draw; heavy right tail for spending amounts.
    pub fn pareto(&mut self, x_min: f64, alpha: f64) -> f64 {
        let u = self.next_f64().max(1e-10);
        x_min * u.powf(-1.0 / alpha)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthParams {
    pub users: u64,
    pub init_events: usize,
    pub stream_events: usize,
    pub config: DetectorConfig,
    /// Share of events that are friendship changes.
    pub social_share: f64,
    /// Share of friendship changes that are unfriends.
    pub unfriend_share: f64,
}

impl Default for SynthParams {
    fn default() -> Self {
        Self {
            users: 200,
            init_events: 5_000,
            stream_events: 1_000,
            config: DetectorConfig { depth: 2, window: 50 },
            social_share: 0.25,
            unfriend_share: 0.15,
        }
    }
}

/// An initialization feed (config record first) and a stream feed.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticFeed {
    pub init: Vec<Record>,
    pub stream: Vec<Record>,
}

impl SyntheticFeed {
    pub fn generate(seed: u64, params: &SynthParams) -> Self {
        let mut rng = FeedRng::new(seed);
        let mut edges: Vec<(u64, u64)> = Vec::new();
        let mut clock = start_time();

        let mut init = Vec::with_capacity(params.init_events + 1);
        init.push(config_record(&params.config));
        for _ in 0..params.init_events {
            init.push(next_event(&mut rng, params, &mut edges, &mut clock).to_record());
        }

        let stream = (0..params.stream_events)
            .map(|_| next_event(&mut rng, params, &mut edges, &mut clock).to_record())
            .collect();

        Self { init, stream }
    }
}

fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2017, 6, 13)
        .and_then(|d| d.and_hms_opt(11, 33, 1))
        .unwrap_or_default()
}

fn config_record(config: &DetectorConfig) -> Record {
    let mut record = Record::new();
    record.insert("D".into(), Value::from(config.depth.to_string()));
    record.insert("T".into(), Value::from(config.window.to_string()));
    record
}

fn next_event(
    rng: &mut FeedRng,
    params: &SynthParams,
    edges: &mut Vec<(u64, u64)>,
    clock: &mut NaiveDateTime,
) -> Event {
    *clock += Duration::seconds(1 + rng.next_u64_below(3) as i64);
    let users = params.users.max(2);

    if rng.chance(params.social_share) {
        if !edges.is_empty() && rng.chance(params.unfriend_share) {
            let index = rng.next_u64_below(edges.len() as u64) as usize;
            let (a, b) = edges.swap_remove(index);
            return Event::unfriend(a.to_string(), b.to_string());
        }
        let a = rng.next_u64_below(users);
        let b = (a + 1 + rng.next_u64_below(users - 1)) % users;
        let edge = (a.min(b), a.max(b));
        if !edges.contains(&edge) {
            edges.push(edge);
        }
        return Event::befriend(a.to_string(), b.to_string());
    }

    let user = rng.next_u64_below(users);
    // Occasional outsized purchase so the stream has something to flag.
    let amount = if rng.chance(0.01) {
        rng.pareto(500.0, 1.5)
    } else {
        rng.pareto(10.0, 3.0)
    };
    let amount = (amount * 100.0).round() / 100.0;
    Event::purchase(
        user.to_string(),
        amount,
        clock.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_feed() {
        let params = SynthParams { init_events: 300, stream_events: 100, ..SynthParams::default() };
        assert_eq!(
            SyntheticFeed::generate(7, &params),
            SyntheticFeed::generate(7, &params)
        );
    }

    #[test]
    fn different_seeds_differ() {
        let params = SynthParams { init_events: 300, stream_events: 100, ..SynthParams::default() };
        assert_ne!(
            SyntheticFeed::generate(1, &params).stream,
            SyntheticFeed::generate(2, &params).stream
        );
    }

    #[test]
    fn init_feed_starts_with_config() {
        let params = SynthParams { init_events: 10, stream_events: 0, ..SynthParams::default() };
        let feed = SyntheticFeed::generate(3, &params);
        assert_eq!(feed.init.len(), 11);
        let config = DetectorConfig::from_init_record(&feed.init[0]).unwrap();
        assert_eq!(config, params.config);
        assert!(feed.stream.is_empty());
    }

    #[test]
    fn friendships_never_self_loop() {
        let params = SynthParams { users: 3, init_events: 500, stream_events: 0, social_share: 1.0, ..SynthParams::default() };
        let feed = SyntheticFeed::generate(11, &params);
        for record in &feed.init[1..] {
            if let Some(Event::Befriend { id1, id2 }) = Event::from_record(record).unwrap() {
                assert_ne!(id1, id2);
            }
        }
    }
}
