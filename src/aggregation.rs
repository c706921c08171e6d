// WHY: every worker writes into one table for the whole run; sharding keeps writers
// on different positions from queueing behind a single lock

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of independently locked shards
pub const DEFAULT_SHARD_COUNT: usize = 64;

/// Result of one game from White's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameOutcome {
    Win,
    Draw,
    Loss,
    Unknown,
}

impl GameOutcome {
    /// Maps a `Result` header value; anything but the three decisive forms is unknown.
    pub fn from_result_tag(value: &str) -> Self {
        match value {
            "1-0" => Self::Win,
            "0-1" => Self::Loss,
            "1/2-1/2" => Self::Draw,
            _ => Self::Unknown,
        }
    }
}

/// Win/draw/loss tallies for a single position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounters {
    pub wins: u64,
    pub draws: u64,
    pub losses: u64,
}

impl OutcomeCounters {
    pub fn new(wins: u64, draws: u64, losses: u64) -> Self {
        Self { wins, draws, losses }
    }

    /// Counters for a first observation; `None` for [`GameOutcome::Unknown`].
    pub fn first(outcome: GameOutcome) -> Option<Self> {
        match outcome {
            GameOutcome::Win => Some(Self::new(1, 0, 0)),
            GameOutcome::Draw => Some(Self::new(0, 1, 0)),
            GameOutcome::Loss => Some(Self::new(0, 0, 1)),
            GameOutcome::Unknown => None,
        }
    }

    /// Adds one game. Unknown outcomes are ignored.
    pub fn record(&mut self, outcome: GameOutcome) {
        match outcome {
            GameOutcome::Win => self.wins += 1,
            GameOutcome::Draw => self.draws += 1,
            GameOutcome::Loss => self.losses += 1,
            GameOutcome::Unknown => {}
        }
    }

    pub fn total(&self) -> u64 {
        self.wins + self.draws + self.losses
    }

    /// NaN for an all-zero record, which the table never produces.
    pub fn draw_rate(&self) -> f64 {
        self.draws as f64 / self.total() as f64
    }

    /// Every recorded game ended the same way.
    pub fn is_conclusive(&self) -> bool {
        let total = self.total();
        total > 0 && (self.wins == total || self.draws == total || self.losses == total)
    }

    pub fn merge(&mut self, other: &OutcomeCounters) {
        self.wins += other.wins;
        self.draws += other.draws;
        self.losses += other.losses;
    }
}

/// Concurrent map from position key to [`OutcomeCounters`].
///
/// Upserts on different shards never contend. Upserts on one key are serialized by
/// that key's shard lock, so increments are never lost and no counter triple is
/// observed half-written.
pub struct AggregationTable {
    entries: DashMap<String, OutcomeCounters>,
    shard_count: usize,
    games_aggregated: AtomicU64,
}

impl Default for AggregationTable {
    fn default() -> Self {
        Self::with_shards(DEFAULT_SHARD_COUNT)
    }
}

impl AggregationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// `shard_count` is rounded up to a power of two, at least 2.
    pub fn with_shards(shard_count: usize) -> Self {
        let shard_count = shard_count.max(2).next_power_of_two();
        Self {
            entries: DashMap::with_shard_amount(shard_count),
            shard_count,
            games_aggregated: AtomicU64::new(0),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shard_count
    }

    /// Adds one game at `key`. Returns `false` (and touches nothing) for unknown outcomes.
    ///
    /// A new key is inserted with its counters already set from `outcome`.
    pub fn upsert(&self, key: &str, outcome: GameOutcome) -> bool {
        let Some(initial) = OutcomeCounters::first(outcome) else {
            return false;
        };

        // existing keys are updated without allocating the owned key
        if let Some(mut counters) = self.entries.get_mut(key) {
            counters.record(outcome);
            return true;
        }
        self.entries
            .entry(key.to_owned())
            .and_modify(|counters| counters.record(outcome))
            .or_insert(initial);
        true
    }

    /// Counts one fully aggregated game, after its upsert.
    pub fn mark_game_aggregated(&self) {
        self.games_aggregated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn games_aggregated(&self) -> u64 {
        self.games_aggregated.load(Ordering::Relaxed)
    }

    /// Current counters for `key`, if any game reached it.
    pub fn get(&self, key: &str) -> Option<OutcomeCounters> {
        self.entries.get(key).map(|counters| *counters)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the table once every writer is gone.
    pub fn into_snapshot(self) -> TableSnapshot {
        TableSnapshot {
            entries: self.entries.into_iter().collect(),
            games_aggregated: self.games_aggregated.into_inner(),
        }
    }
}

/// Frozen table contents in unspecified order
#[derive(Debug, Clone, Default)]
pub struct TableSnapshot {
    pub entries: Vec<(String, OutcomeCounters)>,
    pub games_aggregated: u64,
}
