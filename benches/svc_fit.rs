use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ehgstudies::learn::estimator::Classifier;
use ehgstudies::learn::{Kernel, Svc, SvcParams};
use ndarray::{Array1, Array2};
use rand::distributions::Standard;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn labelled_matrix(rows: usize, cols: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = StdRng::seed_from_u64(0x5EED_5C + rows as u64);
    let y = Array1::from_shape_fn(rows, |i| (i % 2) as f64);
    let x = Array2::from_shape_fn((rows, cols), |(i, j)| {
        let noise: f64 = rng.sample(Standard);
        if j == 0 { noise + y[i] } else { noise }
    });
    (x, y)
}

fn benchmark_svc_fit(c: &mut Criterion) {
    let sizes = [30_usize, 100, 300];
    let data: Vec<_> = sizes
        .iter()
        .map(|&size| (size, labelled_matrix(size, 21)))
        .collect();

    let mut group = c.benchmark_group("svc_fit");
    for (size, (x, y)) in data.iter() {
        group.throughput(Throughput::Elements(*size as u64));

        for (name, kernel) in [("linear", Kernel::Linear), ("rbf", Kernel::Rbf)] {
            group.bench_with_input(BenchmarkId::new(name, size), &(x, y), |b, (x, y)| {
                b.iter(|| {
                    let mut svc = Svc::new(SvcParams::new(kernel));
                    svc.fit(black_box(x.view()), black_box(y.view()))
                        .expect("fit succeeds on two-class data");
                    black_box(svc);
                });
            });
        }
    }
    group.finish();
}

criterion_group!(svc_fit, benchmark_svc_fit);
criterion_main!(svc_fit);
