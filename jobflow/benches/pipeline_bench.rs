//! Benchmarks for pipeline execution.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use jobflow::cancellation::CancellationToken;
use jobflow::engine::RetryConfig;
use jobflow::testing::{ScriptedProcessor, TestPipeline};

fn run_batch(rt: &tokio::runtime::Runtime, workers: usize, jobs: usize) -> usize {
    rt.block_on(async {
        let pipeline = TestPipeline::new(workers).with_jobs(jobs).build();
        let results = pipeline.take_results().unwrap();
        let collector = tokio::spawn(results.collect());

        pipeline
            .run(
                &CancellationToken::new(),
                Arc::new(ScriptedProcessor::succeeding()),
            )
            .await
            .unwrap();

        collector.await.unwrap().len()
    })
}

fn pipeline_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("pipeline_run");

    for workers in [1, 4, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &w| {
            b.iter(|| black_box(run_batch(&rt, w, 256)));
        });
    }
    group.finish();
}

fn backoff_benchmark(c: &mut Criterion) {
    let retry = RetryConfig::new();
    c.bench_function("delay_for_attempt", |b| {
        b.iter(|| {
            for attempt in 0..=retry.max_retries {
                black_box(retry.delay_for_attempt(black_box(attempt)));
            }
        });
    });
}

criterion_group!(benches, pipeline_benchmark, backoff_benchmark);
criterion_main!(benches);
