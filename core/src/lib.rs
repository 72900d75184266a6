//! Social-network purchase anomaly detection.
//!
//! A feed of `befriend`, `unfriend` and `purchase` events is applied in
//! order to a friend graph and to bounded per-user purchase histories.
//! Each live purchase is compared with the most recent purchases of the
//! buyer's D-hop neighborhood and flagged when it exceeds
//! `mean + 3 * sd`.

pub mod config;
pub mod detector;
pub mod error;
pub mod event;
pub mod feed;
pub mod graph;
pub mod history;
pub mod neighborhood;
pub mod sink;
pub mod stats;
pub mod store;
pub mod synth;
pub mod types;
