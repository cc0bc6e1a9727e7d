use criterion::Criterion;
use hiv_authoring::coordinators::{TargetCounts, TargetedDistribution};
use hiv_authoring::Predicate;
use std::hint::black_box;

/// `(a | !b) & (c | !d) & ...` over `clauses` pairs, which doubles its DNF with each pair.
fn product_of_sums(clauses: usize) -> Predicate {
    let leaves = [
        Predicate::is_circumcised,
        Predicate::is_hiv_positive,
        Predicate::is_on_art,
        Predicate::is_post_debut,
        Predicate::is_pregnant,
    ];
    let mut predicate = leaves[0]() | !leaves[1]();
    for i in 1..clauses {
        predicate = predicate & (leaves[i % leaves.len()]() | !leaves[(i + 2) % leaves.len()]());
    }
    predicate
}

pub fn predicate_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("targeting::predicate");

    for clauses in [2, 6, 10] {
        let predicate = product_of_sums(clauses);
        group.bench_function(format!("to_dnf_{clauses}"), |b| {
            b.iter(|| black_box(black_box(&predicate).to_dnf()));
        });
        group.bench_function(format!("to_json_{clauses}"), |b| {
            b.iter(|| black_box(black_box(&predicate).to_json()));
        });
    }

    let double_negated = !!product_of_sums(6);
    group.bench_function("to_dnf_double_negation", |b| {
        b.iter(|| black_box(black_box(&double_negated).to_dnf()));
    });

    group.finish();
}

pub fn nchooser_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("coordinators::nchooser");
    let mins: Vec<f64> = (0..10).map(|i| 15.0 + 5.0 * f64::from(i)).collect();
    let maxs: Vec<f64> = mins.iter().map(|min| min + 5.0).collect();
    let distribution = TargetedDistribution::new(
        2010.0,
        2011.0,
        &mins,
        &maxs,
        TargetCounts::by_sex(Some((0..10).map(|i| 1000 * (i + 1)).collect()), Some(vec![750; 10]))
            .expect("Valid target counts"),
    )
    .expect("Valid targeted distribution");

    // One year of 30-day steps
    group.bench_function("step_plan_monthly", |b| {
        b.iter(|| black_box(distribution.step_plan(black_box(0.01), black_box(13))));
    });

    // One year of daily steps
    group.bench_function("step_plan_daily", |b| {
        b.iter(|| black_box(distribution.step_plan(black_box(0.01), black_box(365))));
    });

    group.finish();
}
