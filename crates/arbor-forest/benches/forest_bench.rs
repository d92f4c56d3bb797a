//! Criterion benchmarks for arbor-forest: training, prediction and split search.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use arbor_forest::{
    BackendKind, Dataset, ForestConfig, LabelColumn, ParallelBackend, SequentialBackend,
    SplitEvaluator, TrainingFrame,
};

fn make_classification(n_rows: usize, n_features: usize, n_classes: usize, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut header = vec!["id".to_string()];
    header.extend((0..n_features).map(|f| format!("f{f}")));
    header.push("class".to_string());

    let mut records = vec![header];
    for i in 0..n_rows {
        let class = i % n_classes;
        let mut row = vec![(i + 1).to_string()];
        row.extend((0..n_features).map(|f| {
            let base = if f < 3 { class as f64 * 3.0 } else { 0.0 };
            format!("{:.6}", base + rng.r#gen::<f64>() * 0.5)
        }));
        row.push(class.to_string());
        records.push(row);
    }
    Dataset::from_records(records).unwrap()
}

fn bench_forest_train(c: &mut Criterion) {
    let ds = make_classification(300, 10, 5, 42);
    let cfg = ForestConfig::new(20).unwrap().with_seed(42);

    c.bench_function("forest_train_300x10_5class_20trees", |b| {
        b.iter(|| cfg.fit(&ds, &LabelColumn::Last).unwrap());
    });

    let par = cfg.clone().with_backend(BackendKind::Parallel);
    c.bench_function("forest_train_300x10_5class_20trees_parallel_backend", |b| {
        b.iter(|| par.fit(&ds, &LabelColumn::Last).unwrap());
    });
}

fn bench_forest_predict_batch(c: &mut Criterion) {
    let ds = make_classification(300, 10, 5, 42);
    let result = ForestConfig::new(20)
        .unwrap()
        .with_seed(42)
        .fit(&ds, &LabelColumn::Last)
        .unwrap();
    let forest = result.into_forest();
    let records: Vec<Vec<String>> = ds.rows().map(<[String]>::to_vec).collect();

    c.bench_function("forest_predict_batch_300x10_20trees", |b| {
        b.iter(|| forest.predict_batch(&records).unwrap());
    });
}

fn bench_best_split(c: &mut Criterion) {
    let ds = make_classification(500, 20, 5, 42);
    let frame = TrainingFrame::new(&ds, &LabelColumn::Last).unwrap();
    let rows: Vec<usize> = (0..frame.n_rows()).collect();
    let columns = frame.schema().features().to_vec();

    c.bench_function("best_split_500x20_sequential", |b| {
        let ev = SplitEvaluator::new(&frame, &SequentialBackend);
        b.iter(|| ev.best_split(&rows, &columns).unwrap());
    });
    c.bench_function("best_split_500x20_parallel", |b| {
        let ev = SplitEvaluator::new(&frame, &ParallelBackend);
        b.iter(|| ev.best_split(&rows, &columns).unwrap());
    });
}

criterion_group!(
    benches,
    bench_forest_train,
    bench_forest_predict_batch,
    bench_best_split
);
criterion_main!(benches);
