use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rqa_core::data::{Group, ParameterCombination, SyntheticGazeGenerator};
use rqa_core::rqa::{DistanceMetric, RecurrenceMatrixBuilder, RqaAnalyzer, RqaMetricsExtractor, SignalEmbedder};

const TRAJECTORY_LENGTHS: &[usize] = &[250, 500, 1000, 2000];
const EMBEDDING_DIMENSIONS: &[usize] = &[2, 5, 10];

fn trajectory(samples: usize) -> (Vec<f64>, Vec<f64>) {
    let mut generator = SyntheticGazeGenerator::new(42);
    generator.generate(Group::Mci, samples)
}

fn benchmark_embedding(c: &mut Criterion) {
    let mut group = c.benchmark_group("embedding");
    let (x, y) = trajectory(2000);

    for &m in EMBEDDING_DIMENSIONS {
        group.bench_with_input(BenchmarkId::new("embed_2d", m), &m, |b, &m| {
            let embedder = SignalEmbedder::new(m, 2);
            b.iter(|| embedder.embed_2d(black_box(&x), black_box(&y)))
        });
    }
    group.finish();
}

fn benchmark_recurrence_matrix(c: &mut Criterion) {
    let mut group = c.benchmark_group("recurrence_matrix");

    for &samples in TRAJECTORY_LENGTHS {
        let (x, y) = trajectory(samples);
        let embedded = SignalEmbedder::new(3, 2).embed_2d(&x, &y).unwrap();
        let rows = embedded.nrows() as u64;
        group.throughput(Throughput::Elements(rows * rows));

        for metric in [DistanceMetric::AbsDiff, DistanceMetric::Euclidean] {
            let builder = RecurrenceMatrixBuilder::new(0.05, metric);
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", metric), samples),
                &embedded,
                |b, embedded| b.iter(|| builder.build(black_box(embedded))),
            );
        }
    }
    group.finish();
}

fn benchmark_metric_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("metric_extraction");

    for &samples in TRAJECTORY_LENGTHS {
        let (x, _) = trajectory(samples);
        let embedded = SignalEmbedder::new(2, 1).embed_1d(&x).unwrap();
        let matrix = RecurrenceMatrixBuilder::new(0.05, DistanceMetric::AbsDiff)
            .build(&embedded)
            .unwrap();
        let extractor = RqaMetricsExtractor::new(2);

        group.bench_with_input(BenchmarkId::from_parameter(samples), &matrix, |b, matrix| {
            b.iter(|| extractor.extract(black_box(matrix)))
        });
    }
    group.finish();
}

fn benchmark_full_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_analysis");
    group.sample_size(20);
    let analyzer = RqaAnalyzer::new(ParameterCombination::new(3, 2, 0.05, 2).unwrap());

    for &samples in TRAJECTORY_LENGTHS {
        let (x, y) = trajectory(samples);
        group.bench_with_input(BenchmarkId::from_parameter(samples), &(x, y), |b, (x, y)| {
            b.iter(|| analyzer.analyze_signals(black_box(x), black_box(y)))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_embedding,
    benchmark_recurrence_matrix,
    benchmark_metric_extraction,
    benchmark_full_analysis
);
criterion_main!(benches);
