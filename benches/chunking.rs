//! Benchmarks for segmentation, optimization and end-to-end chunking.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use optislab::{
    ChunkOptimizer, ChunkingConfig, Document, DocumentOrchestrator, HashingEmbedder,
    OrchestratorConfig, Segmenter, UnicodeSegmenter,
};

fn sample_text(size: usize) -> String {
    // Generate realistic text with sentence structure
    let sentences = [
        "The quick brown fox jumps over the lazy dog. ",
        "Pack my box with five dozen liquor jugs. ",
        "How vexingly quick daft zebras jump! ",
        "The five boxing wizards jump quickly. ",
        "Sphinx of black quartz, judge my vow. ",
    ];
    let mut text = String::with_capacity(size);
    let mut i = 0;
    while text.len() < size {
        text.push_str(sentences[i % sentences.len()]);
        i += 1;
    }
    text.truncate(size);
    text
}

fn bench_segmenter(c: &mut Criterion) {
    let mut group = c.benchmark_group("segmenter");
    let segmenter = UnicodeSegmenter::new();

    for size in [1_000, 10_000, 100_000] {
        let text = sample_text(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("unicode", size), &text, |b, text| {
            b.iter(|| segmenter.segment(black_box(text)))
        });
    }

    group.finish();
}

fn bench_optimizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimizer");

    // Candidate chunks per sentence grow with max_size / mean sentence size.
    for (opt, max) in [(64, 96), (470, 512), (2_000, 4_000)] {
        let counts: Vec<usize> = (0..5_000).map(|i| 5 + (i * 7) % 20).collect();
        let optimizer = ChunkOptimizer::new(ChunkingConfig::new(opt).with_max(max)).unwrap();

        group.throughput(Throughput::Elements(counts.len() as u64));
        group.bench_with_input(BenchmarkId::new("partition", max), &counts, |b, counts| {
            b.iter(|| optimizer.partition(black_box(counts)))
        });
    }

    group.finish();
}

fn bench_chunk_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_text");
    let orchestrator = DocumentOrchestrator::new(
        Arc::new(UnicodeSegmenter::new()),
        Arc::new(HashingEmbedder::default()),
        OrchestratorConfig::default(),
    )
    .unwrap();

    for size in [1_000, 10_000, 100_000] {
        let text = sample_text(size);
        let config = ChunkingConfig::new(128).with_max(192);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("hashing", size), &text, |b, text| {
            b.iter(|| orchestrator.chunk_text(black_box(text), &config))
        });
    }

    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch");
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let orchestrator = DocumentOrchestrator::new(
        Arc::new(UnicodeSegmenter::new()),
        Arc::new(HashingEmbedder::default()),
        OrchestratorConfig::default(),
    )
    .unwrap();

    for docs in [1, 16, 64] {
        let batch: Vec<Document> = (0..docs)
            .map(|i| Document::new(i.to_string(), sample_text(10_000)))
            .collect();

        group.throughput(Throughput::Elements(docs as u64));
        group.bench_with_input(BenchmarkId::new("documents", docs), &batch, |b, batch| {
            b.iter(|| runtime.block_on(orchestrator.process_batch(black_box(batch.clone()), None)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_segmenter,
    bench_optimizer,
    bench_chunk_text,
    bench_batch
);
criterion_main!(benches);
