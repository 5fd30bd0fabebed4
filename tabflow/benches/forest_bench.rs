//! Benchmarks for forest training and prediction.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tabflow::ml::{ForestParams, RandomForest, Smote};
use tabflow::testing::separable_training_set;

fn forest_benchmark(c: &mut Criterion) {
    let (features, labels) = separable_training_set(400, 20).unwrap().into_parts();
    let params = ForestParams::default();

    c.bench_function("forest_fit_400x20", |b| {
        b.iter(|| RandomForest::fit(black_box(&features), black_box(&labels), &params, 4).unwrap());
    });

    let forest = RandomForest::fit(&features, &labels, &params, 4).unwrap();
    c.bench_function("forest_predict_400x20", |b| {
        b.iter(|| forest.predict(black_box(&features)).unwrap());
    });
}

fn smote_benchmark(c: &mut Criterion) {
    let (features, mut labels) = separable_training_set(400, 20).unwrap().into_parts();
    // Leave one row in ten in the minority class.
    for (i, label) in labels.iter_mut().enumerate() {
        *label = if i % 10 == 0 { 1.0 } else { 0.0 };
    }
    let smote = Smote::default();

    c.bench_function("smote_400x20", |b| {
        b.iter(|| smote.fit_resample(black_box(&features), black_box(&labels)).unwrap());
    });
}

criterion_group!(benches, forest_benchmark, smote_benchmark);
criterion_main!(benches);
