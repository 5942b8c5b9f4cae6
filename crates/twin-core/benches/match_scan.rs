//! Corpus scan cost.
//!
//! `find_best` scores the target against every record, so time grows linearly
//! with corpus size. Extraction is measured alongside for scale.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use twin_core::{TokenRecord, extract, find_best};

fn report(i: usize) -> String {
    let mut text = format!(
        "Token {i} (TK{i})\n├ Addr{i:0>40}\n\n📊 Market Overview (24h):\n\
         ├ Market Cap:     $ {}.{}K\n├ Traders: {}\n├ Price%: -{}.5%\n\
         └ Buyers: {}\n\n📊 Top 10 Holders: {}.20%\n",
        i % 900 + 1,
        i % 10,
        i * 7 + 3,
        i % 40,
        i * 3 + 1,
        i % 30 + 5,
    );
    for rank in 1..=10 {
        text.push_str(&format!(
            "├ {rank}. Hold{rank}...r{i} - {}.{}% - {}.5 SOL\n",
            11 - rank,
            i % 10,
            rank + i % 4
        ));
    }
    text.push_str("\n🔍 Source Wallets: 3,1%\n├ Src...a - 2 hops\n└ Src...b - 4 hops\n");
    text
}

fn corpus(size: usize) -> Vec<TokenRecord> {
    (0..size).map(|i| extract(&report(i))).collect()
}

fn bench_extract(c: &mut Criterion) {
    let text = report(7);
    c.bench_function("extract_report", |b| b.iter(|| extract(black_box(&text))));
}

fn bench_find_best(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_best");
    let target = extract(&report(10_001));
    for size in [100usize, 1_000, 10_000] {
        let records = corpus(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &records, |b, records| {
            b.iter(|| find_best(black_box(&target), records))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_extract, bench_find_best);
criterion_main!(benches);
