#![expect(missing_docs, reason = "benchmarks")]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use new_zealand::nz;
use par_reduce::{
    DEFAULT_MAX_COST, Dimensions, Discipline, ExecutionEngine, SchedulingPolicy, SkewedTasks,
    StrategyConfig, WorkloadKind, WorkloadSource,
};

const TASKS: usize = 2_000;
const WORKERS: usize = 4;

fn entrypoint(c: &mut Criterion) {
    let costs = WorkloadSource::new()
        .generate(
            WorkloadKind::SyntheticCostSequence {
                max_cost: DEFAULT_MAX_COST,
            },
            Dimensions::Length(TASKS),
            42,
        )
        .unwrap()
        .into_costs()
        .unwrap();

    let workload = SkewedTasks::new(costs);
    let engine = ExecutionEngine::new();

    let mut g = c.benchmark_group("policies");

    for policy in [
        SchedulingPolicy::Static,
        SchedulingPolicy::dynamic(),
        SchedulingPolicy::Dynamic { chunk: nz!(64) },
        SchedulingPolicy::guided(),
    ] {
        let config =
            StrategyConfig::new(Discipline::ReductionDirective, policy, WORKERS).unwrap();

        g.bench_function(format!("skewed_{policy}"), |b| {
            b.iter(|| black_box(engine.run(&workload, &config).unwrap().result()));
        });
    }

    g.finish();
}

criterion_group!(benches, entrypoint);
criterion_main!(benches);
