//! Benchmarks for the core optimization pipeline.

#[cfg(feature = "bench")]
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use ils_cvrp::config::Config;
use ils_cvrp::instance::Instance;
use ils_cvrp::IlsAlgorithm;

/// Random uniform instance of the requested size.
fn create_benchmark_instance(customers: usize) -> Instance {
    let mut rng = ChaCha8Rng::seed_from_u64(customers as u64);
    let mut coords = vec![(0.0, 0.0)];
    let mut demands = vec![0i64];
    for _ in 0..customers {
        coords.push((rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0)));
        demands.push(rng.gen_range(1..=10));
    }
    let xs = coords.iter().map(|c| c.0).collect();
    let ys = coords.iter().map(|c| c.1).collect();
    Instance::new(
        format!("bench-n{}", customers),
        xs,
        ys,
        demands,
        50,
        None,
        0.0,
        coords.len(),
        true,
        None,
    )
    .expect("valid benchmark instance")
}

#[cfg(feature = "bench")]
fn benchmark_coreopt(c: &mut Criterion) {
    let mut group = c.benchmark_group("coreopt");
    group.sample_size(10);

    for size in [100, 200, 400].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let instance = create_benchmark_instance(size);
                let config = Config::new()
                    .with_seed(0)
                    .with_coreopt_iterations(1_000)
                    .with_routemin_iterations(100);
                let mut algorithm = IlsAlgorithm::new(instance, config);
                algorithm.run()
            });
        });
    }

    group.finish();
}

#[cfg(feature = "bench")]
criterion_group!(benches, benchmark_coreopt);
#[cfg(feature = "bench")]
criterion_main!(benches);

#[cfg(not(feature = "bench"))]
fn main() {
    let _ = create_benchmark_instance(10);
}
