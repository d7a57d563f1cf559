use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use sandpile_relax::{CheckerboardStabilizer, DistributedStabilizer, Grid, SerialStabilizer, Stabilizer};

fn bench_uniform(c: &mut Criterion) {
	let mut group = c.benchmark_group("stabilize_all_4");
	group.sample_size(10);

	for &n in &[64, 128] {
		let input = Grid::filled(n, n, 4).unwrap();
		let schemes: Vec<(String, Box<dyn Stabilizer>)> = vec![
			("serial".to_string(), Box::new(SerialStabilizer::new())),
			("shared-4".to_string(), Box::new(CheckerboardStabilizer::new(4).unwrap())),
			("distributed-4".to_string(), Box::new(DistributedStabilizer::new(4).unwrap())),
		];
		for (name, s) in &schemes {
			group.bench_function(BenchmarkId::new(name.as_str(), n), |b| {
				b.iter_batched(
					|| input.clone(),
					|mut grid| s.stabilize(&mut grid).expect("stabilize failed"),
					BatchSize::LargeInput,
				)
			});
		}
	}

	group.finish();
}

criterion_group!(benches, bench_uniform);
criterion_main!(benches);
