use clap::ValueEnum;
use std::cmp::Ordering;
use std::fmt;
use std::io::{self, Write};

use crate::aggregation::{OutcomeCounters, TableSnapshot};

/// Header row of the CSV report
pub const CSV_HEADER: &str = "FEN, Wins, Draws, Losses";

/// Row ordering of the report. Every variant ends with the key in ascending byte order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortOrder {
    /// Higher draw rate first; ties go to more games, then to more wins, draws and losses in turn
    #[default]
    DrawRate,
    /// More wins first, then more draws, then more losses
    #[value(name = "wins")]
    WinCount,
}

impl SortOrder {
    pub fn compare(self, a: &(String, OutcomeCounters), b: &(String, OutcomeCounters)) -> Ordering {
        let (key_a, ca) = a;
        let (key_b, cb) = b;
        let by_counts = match self {
            SortOrder::DrawRate => compare_draw_rate(cb, ca)
                .then_with(|| cb.total().cmp(&ca.total()))
                .then_with(|| cb.wins.cmp(&ca.wins))
                .then_with(|| cb.draws.cmp(&ca.draws))
                .then_with(|| cb.losses.cmp(&ca.losses)),
            SortOrder::WinCount => cb
                .wins
                .cmp(&ca.wins)
                .then_with(|| cb.draws.cmp(&ca.draws))
                .then_with(|| cb.losses.cmp(&ca.losses)),
        };
        by_counts.then_with(|| key_a.cmp(key_b))
    }
}

// draws_a / total_a vs draws_b / total_b without division
fn compare_draw_rate(a: &OutcomeCounters, b: &OutcomeCounters) -> Ordering {
    let lhs = u128::from(a.draws) * u128::from(b.total());
    let rhs = u128::from(b.draws) * u128::from(a.total());
    lhs.cmp(&rhs)
}

/// Games below which a position is kept regardless of its draw rate
pub const DEFAULT_WINDOW_MIN_GAMES: u64 = 10;

/// Draw-rate band in whole percent. Positions with fewer than `min_games` games are
/// never dropped; with neither bound set the window keeps everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRateWindow {
    pub min_percent: Option<u32>,
    pub max_percent: Option<u32>,
    pub min_games: u64,
}

impl Default for DrawRateWindow {
    fn default() -> Self {
        Self {
            min_percent: None,
            max_percent: None,
            min_games: DEFAULT_WINDOW_MIN_GAMES,
        }
    }
}

impl DrawRateWindow {
    pub fn is_active(&self) -> bool {
        self.min_percent.is_some() || self.max_percent.is_some()
    }

    pub fn keeps(&self, counters: &OutcomeCounters) -> bool {
        let total = counters.total();
        if total < self.min_games {
            return true;
        }
        let percent = draw_percent(counters);
        self.min_percent.map_or(true, |min| percent >= u128::from(min))
            && self.max_percent.map_or(true, |max| percent <= u128::from(max))
    }
}

/// Draw rate in percent, rounded down; 0 for an empty record.
pub fn draw_percent(counters: &OutcomeCounters) -> u128 {
    match counters.total() {
        0 => 0,
        total => u128::from(counters.draws) * 100 / u128::from(total),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    pub order: SortOrder,
    pub conclusive_only: bool,
    pub window: DrawRateWindow,
}

/// Win/draw/loss sums over the emitted rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub wins: u64,
    pub draws: u64,
    pub losses: u64,
}

impl Totals {
    fn add(&mut self, counters: &OutcomeCounters) {
        self.wins += counters.wins;
        self.draws += counters.draws;
        self.losses += counters.losses;
    }
}

/// Sorted, filtered report rows plus their summary
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub rows: Vec<(String, OutcomeCounters)>,
    pub totals: Totals,
    pub games_aggregated: u64,
}

impl Report {
    pub fn build(snapshot: TableSnapshot, options: &ReportOptions) -> Self {
        let TableSnapshot {
            mut entries,
            games_aggregated,
        } = snapshot;

        if options.conclusive_only {
            entries.retain(|(_, counters)| counters.is_conclusive());
        }
        if options.window.is_active() {
            entries.retain(|(_, counters)| options.window.keeps(counters));
        }
        entries.sort_unstable_by(|a, b| options.order.compare(a, b));

        let mut totals = Totals::default();
        for (_, counters) in &entries {
            totals.add(counters);
        }

        Self {
            rows: entries,
            totals,
            games_aggregated,
        }
    }

    pub fn write_csv<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "{CSV_HEADER}")?;
        for (key, counters) in &self.rows {
            writeln!(writer, "{}, {}, {}, {}", key, counters.wins, counters.draws, counters.losses)?;
        }
        writer.flush()
    }

    /// One position per line, in report order.
    pub fn write_epd<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for (key, _) in &self.rows {
            writeln!(writer, "{key}")?;
        }
        writer.flush()
    }

    pub fn summary(&self) -> ReportSummary<'_> {
        ReportSummary(self)
    }
}

/// `Analyzed N games in total (W/D/L = w/d/l)`
pub struct ReportSummary<'a>(&'a Report);

impl fmt::Display for ReportSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Report {
            totals,
            games_aggregated,
            ..
        } = self.0;
        write!(
            f,
            "Analyzed {} games in total (W/D/L = {}/{}/{})",
            games_aggregated, totals.wins, totals.draws, totals.losses
        )
    }
}
