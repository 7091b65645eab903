use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use snapshot_tool::system::process::{ProcessClassifier, filter_names, unique_names};
use snapshot_tool::system::snapshot::{MemoryStats, ProcessEntry, Snapshot};

fn make_snapshot(n: usize) -> Snapshot {
    let processes = (0..n)
        .map(|i| {
            let cmdline = match i % 3 {
                0 => vec![format!("/usr/bin/proc_{i}"), "--daemon".to_string()],
                1 => vec![format!("/home/user/.local/bin/proc_{i}")],
                _ => Vec::new(),
            };
            ProcessEntry {
                pid: i as u32 + 1,
                name: format!("proc_{}", i % 64),
                cmdline,
            }
        })
        .collect();
    Snapshot {
        processes,
        memory: MemoryStats::default(),
        connections: Vec::new(),
    }
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_500_1000_2000");
    let classifier = ProcessClassifier::default();

    for size in [500usize, 1000, 2000] {
        let snapshot = make_snapshot(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &snapshot, |b, snapshot| {
            b.iter(|| {
                let classification = classifier.classify(black_box(snapshot));
                black_box(classification);
            })
        });
    }

    group.finish();
}

fn bench_selection_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("selection_list_500_1000_2000");
    let classifier = ProcessClassifier::default();

    for size in [500usize, 1000, 2000] {
        let classification = classifier.classify(&make_snapshot(size));
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &classification.user,
            |b, names| {
                b.iter(|| {
                    let matching = filter_names(black_box(names), black_box("PROC_1"));
                    black_box(unique_names(matching));
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_classify, bench_selection_list);
criterion_main!(benches);
