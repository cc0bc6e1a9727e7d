use criterion::{criterion_group, criterion_main};

mod benchmarks {
    pub mod authoring;
}
use benchmarks::authoring::{nchooser_benchmarks, predicate_benchmarks};

criterion_group!(authoring_benches, predicate_benchmarks, nchooser_benchmarks,);

criterion_main!(authoring_benches);
