use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fenwdl::analyzer::{analyze_stream, GameAnalyzer};
use fenwdl::{AggregationTable, GameOutcome};
use std::path::Path;
use std::thread;

const GAMES_PER_THREAD: usize = 20_000;

fn synthetic_keys(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("rnbqkbnr/pppppppp/8/{}/8/8/PPPPPPPP/RNBQKBNR w KQkq - {} 1", i % 8 + 1, i / 8))
        .collect()
}

fn bench_concurrent_upserts(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_upserts");
    group.sample_size(10);

    let keys = synthetic_keys(512);
    let outcomes = [GameOutcome::Win, GameOutcome::Draw, GameOutcome::Loss];

    for threads in [1usize, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let table = AggregationTable::new();
                thread::scope(|scope| {
                    for t in 0..threads {
                        let table = &table;
                        let keys = &keys;
                        scope.spawn(move || {
                            for i in 0..GAMES_PER_THREAD {
                                let key = &keys[(i * 31 + t) % keys.len()];
                                table.upsert(key, outcomes[i % 3]);
                                table.mark_game_aggregated();
                            }
                        });
                    }
                });
                black_box(table.games_aggregated())
            });
        });
    }
    group.finish();
}

fn bench_record_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_scan");
    group.sample_size(10);

    let body: String = (0..5_000)
        .map(|i| {
            let result = ["1-0", "0-1", "1/2-1/2"][i % 3];
            format!(
                "[Event \"bench\"]\n[Result \"{result}\"]\n[FEN \"position-{}\"]\n\n1. e4 {{+0.31/20 0.4s}} e5 2. Nf3 Nc6 {result}\n\n",
                i % 97
            )
        })
        .collect();

    group.bench_function("analyze_in_memory", |b| {
        b.iter(|| {
            let table = AggregationTable::new();
            let mut analyzer = GameAnalyzer::new(&table, None);
            let records = analyze_stream(body.as_bytes(), Path::new("bench"), &mut analyzer).unwrap_or(0);
            black_box((records, table.len()))
        });
    });
    group.finish();
}

criterion_group!(benches, bench_concurrent_upserts, bench_record_scan);
criterion_main!(benches);
