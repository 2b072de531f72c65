use criterion::{criterion_group, criterion_main, Criterion};
use heuropt::{
    solver::{SolverBuilder, SolverOptions},
    Fitness, Individual, Problem, ProblemDefinition, Representation, Result,
};

const ITEMS: usize = 40;

struct Knapsack {
    values: Vec<f64>,
    weights: Vec<f64>,
    capacity: f64,
}

impl Knapsack {
    fn new() -> Self {
        let values = (0..ITEMS).map(|i| 5.0 + (i * 7 % 13) as f64).collect();
        let weights: Vec<f64> = (0..ITEMS).map(|i| 2.0 + (i * 5 % 11) as f64).collect();
        let capacity = weights.iter().sum::<f64>() / 3.0;
        Self {
            values,
            weights,
            capacity,
        }
    }
}

impl Problem for Knapsack {
    fn evaluate(&self, individual: &Individual) -> Result<Fitness> {
        let value: f64 = individual
            .variables()
            .iter()
            .zip(&self.values)
            .map(|(x, v)| x * v)
            .sum();
        Ok(Fitness::Scalar(value))
    }

    fn check_constraints(&self, individual: &Individual) -> bool {
        let weight: f64 = individual
            .variables()
            .iter()
            .zip(&self.weights)
            .map(|(x, w)| x * w)
            .sum();
        weight <= self.capacity
    }
}

fn bench_knapsack(c: &mut Criterion) {
    let mut group = c.benchmark_group("knapsack_solver");
    group.sample_size(10);
    for threshold in [usize::MAX, 1].iter() {
        let name = if *threshold == 1 {
            "parallel"
        } else {
            "sequential"
        };
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut solver = SolverBuilder::new()
                    .with_problem(Knapsack::new())
                    .with_definition(ProblemDefinition::new(Representation::binary(ITEMS)).unwrap())
                    .with_options(
                        SolverOptions::builder()
                            .num_generations(20)
                            .population_size(30)
                            .large_population_capacity(150)
                            .num_offspring(60)
                            .parallel_threshold(*threshold)
                            .seed(7)
                            .build(),
                    )
                    .build()
                    .unwrap();
                let report = solver.run();
                assert!(report.is_ok());
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_knapsack);
criterion_main!(benches);
