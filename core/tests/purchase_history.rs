//! Purchase history: the T most recent records survive, whatever order
//! they arrive in.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use spendnet_core::history::{HistoryBook, PurchaseHistory, PurchaseRecord};

fn seqs_of(records: &[PurchaseRecord]) -> Vec<u64> {
    let mut seqs: Vec<u64> = records.iter().map(|r| r.seq).collect();
    seqs.sort_unstable();
    seqs
}

/// Keep everything, sort newest first, take T.
fn reference_top(all: &[PurchaseRecord], window: usize) -> Vec<PurchaseRecord> {
    let mut sorted = all.to_vec();
    sorted.sort_by(|a, b| b.recency_cmp(a));
    sorted.truncate(window);
    sorted
}

#[test]
fn never_exceeds_capacity() {
    let mut history = PurchaseHistory::new(3);
    for seq in 0..10u64 {
        history.record(PurchaseRecord::new(seq as i64, 1.0, seq));
        assert!(history.len() <= 3);
    }
    assert_eq!(history.len(), 3);
    assert_eq!(history.capacity(), 3);
}

#[test]
fn evicts_the_oldest_timestamp() {
    let mut history = PurchaseHistory::new(2);
    assert!(history.record(PurchaseRecord::new("2017-06-13 11:33:01", 10.0, 0)).is_none());
    assert!(history.record(PurchaseRecord::new("2017-06-13 11:33:03", 30.0, 1)).is_none());

    let evicted = history
        .record(PurchaseRecord::new("2017-06-13 11:33:02", 20.0, 2))
        .expect("one record evicted");
    assert_eq!(evicted.amount, 10.0);

    let newest: Vec<f64> = history.newest_first().iter().map(|r| r.amount).collect();
    assert_eq!(newest, vec![30.0, 20.0]);
}

/// A late-arriving purchase older than everything kept is dropped.
#[test]
fn late_old_purchase_is_dropped_when_full() {
    let mut history = PurchaseHistory::new(2);
    history.record(PurchaseRecord::new(10i64, 1.0, 0));
    history.record(PurchaseRecord::new(20i64, 2.0, 1));

    let evicted = history.record(PurchaseRecord::new(5i64, 99.0, 2)).unwrap();
    assert_eq!(evicted.amount, 99.0);
    assert_eq!(history.oldest().map(|r| r.amount), Some(1.0));
}

#[test]
fn equal_timestamps_evict_earliest_insertion() {
    let mut history = PurchaseHistory::new(2);
    history.record(PurchaseRecord::new("t", 1.0, 0));
    history.record(PurchaseRecord::new("t", 2.0, 1));
    let evicted = history.record(PurchaseRecord::new("t", 3.0, 2)).unwrap();
    assert_eq!(evicted.seq, 0);
}

#[test]
fn snapshot_does_not_mutate() {
    let mut history = PurchaseHistory::new(4);
    for seq in 0..3u64 {
        history.record(PurchaseRecord::new(seq as i64, seq as f64, seq));
    }
    let first = seqs_of(&history.snapshot());
    let second = seqs_of(&history.snapshot());
    assert_eq!(first, second);
    assert_eq!(history.len(), 3);
}

/// Random timestamps (with duplicates) against a full-sort reference.
#[test]
fn retained_set_matches_reference() {
    for seed in 0..25u64 {
        let mut rng = Pcg64Mcg::seed_from_u64(seed);
        let window = rng.gen_range(1..12usize);
        let mut history = PurchaseHistory::new(window);
        let mut all = Vec::new();

        for seq in 0..rng.gen_range(0..80u64) {
            let record = PurchaseRecord::new(
                rng.gen_range(0..40i64),
                rng.gen_range(0.0..500.0),
                seq,
            );
            all.push(record.clone());
            history.record(record);

            assert_eq!(
                seqs_of(&history.snapshot()),
                seqs_of(&reference_top(&all, window)),
                "seed {seed} after seq {seq}"
            );
        }
    }
}

#[test]
fn book_gives_each_user_their_own_window() {
    let mut book = HistoryBook::new(2);
    for seq in 0..5u64 {
        book.record("alice", PurchaseRecord::new(seq as i64, 1.0, seq));
    }
    book.record("bob", PurchaseRecord::new(0i64, 2.0, 5));

    assert_eq!(book.window(), 2);
    assert_eq!(book.user_count(), 2);
    assert_eq!(book.get("alice").map(PurchaseHistory::len), Some(2));
    assert_eq!(book.get("bob").map(PurchaseHistory::len), Some(1));
    assert!(book.get("carol").is_none());
}
