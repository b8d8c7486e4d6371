//! Benchmarks for context bookkeeping overhead.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flowscope::prelude::*;

fn context_benchmark(c: &mut Criterion) {
    c.bench_function("push_pop_context", |b| {
        let _flow = flow_context("bench_flow");
        b.iter(|| {
            let _job = push_context(black_box("relax_job"), NodeKind::Job);
            black_box(get_context_path())
        });
    });

    c.bench_function("capture_envelope", |b| {
        let _dir = push_directory_context("/results");
        let _flow = flow_context("bench_flow");
        let _sub = push_context("bench_subflow", NodeKind::Subflow);
        b.iter(|| black_box(Enveloped::capture(1_u32).to_json()));
    });
}

fn tracked_call_benchmark(c: &mut Criterion) {
    let tracker = Tracker::new(Settings::new().with_results_dir("/tmp"));
    let job = tracker.job("relax_job", |x: u64| Ok::<_, FlowscopeError>(x + 1));
    let passthrough = Tracker::new(Settings::new().with_autodiscover_dir(false))
        .job("relax_job", |x: u64| Ok::<_, FlowscopeError>(x + 1));

    c.bench_function("tracked_nested_call", |b| {
        let _flow = flow_context("bench_flow");
        b.iter(|| job.call(black_box(1)));
    });

    c.bench_function("tracked_top_level_call", |b| {
        b.iter(|| job.call(black_box(1)));
    });

    c.bench_function("passthrough_call", |b| {
        b.iter(|| passthrough.call(black_box(1)));
    });
}

criterion_group!(benches, context_benchmark, tracked_call_benchmark);
criterion_main!(benches);
