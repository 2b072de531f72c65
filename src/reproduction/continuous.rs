//! Real-valued operators.
//!
//! Recombination is either differential (`v = b + F·(c − d)` with binomial crossover
//! against a target `a`) or estimation-of-distribution sampling around the guided
//! probabilities. Without recombination a parent is cloned and Gaussian-mutated.

use crate::error::Result;
use crate::individual::Genome;
use crate::reproduction::{layout_mismatch, ReproductionConfig, Slot};
use crate::rng::RandomNumberGenerator;
use crate::selection::SelectionStrategy;

const DIFFERENTIAL_PARENTS: usize = 4;

fn reals<'a>(slot: &Slot<'a>, parent: usize) -> Result<&'a [f64]> {
    match slot.parent(parent)? {
        Genome::Continuous(values) => Ok(values),
        _ => Err(layout_mismatch("continuous", slot.index)),
    }
}

pub(crate) fn reproduce(
    config: &ReproductionConfig,
    selection: &dyn SelectionStrategy,
    slot: &Slot<'_>,
    bounds: &[(f64, f64)],
    rng: &mut RandomNumberGenerator,
) -> Result<Genome> {
    let values = if rng.bernoulli(config.crossover_probability) {
        if slot.parent_count() >= DIFFERENTIAL_PARENTS && rng.bernoulli(config.differential_share)
        {
            differential(config, slot, bounds, rng)?
        } else {
            sample_distribution(config, slot, bounds, rng)?
        }
    } else {
        let parent = selection.select_one(slot.scores(), rng)?;
        let mut child = reals(slot, parent)?.to_vec();
        gaussian_mutation(config, bounds, &mut child, rng);
        child
    };
    Ok(Genome::Continuous(values))
}

fn differential(
    config: &ReproductionConfig,
    slot: &Slot<'_>,
    bounds: &[(f64, f64)],
    rng: &mut RandomNumberGenerator,
) -> Result<Vec<f64>> {
    let picked = rng.distinct_indices(slot.parent_count(), DIFFERENTIAL_PARENTS);
    let a = reals(slot, picked[0])?;
    let b = reals(slot, picked[1])?;
    let c = reals(slot, picked[2])?;
    let d = reals(slot, picked[3])?;
    if [a, b, c, d].iter().any(|p| p.len() != bounds.len()) {
        return Err(layout_mismatch("continuous", slot.index));
    }

    let forced = rng.index(bounds.len().max(1));
    let child = bounds
        .iter()
        .enumerate()
        .map(|(k, &(lo, hi))| {
            let value = if k == forced || rng.bernoulli(config.differential_crossover_rate) {
                b[k] + config.differential_weight * (c[k] - d[k])
            } else {
                a[k]
            };
            value.clamp(lo, hi)
        })
        .collect();
    Ok(child)
}

fn sample_distribution(
    config: &ReproductionConfig,
    slot: &Slot<'_>,
    bounds: &[(f64, f64)],
    rng: &mut RandomNumberGenerator,
) -> Result<Vec<f64>> {
    let mut child = Vec::with_capacity(bounds.len());
    for (k, &(lo, hi)) in bounds.iter().enumerate() {
        let p = slot.ctx.convergence.probability(slot.offset + k)?;
        let sampled = rng.normal(p, config.eda_spread).clamp(0.0, 1.0);
        child.push(lo + sampled * (hi - lo));
    }
    Ok(child)
}

pub(crate) fn gaussian_mutation(
    config: &ReproductionConfig,
    bounds: &[(f64, f64)],
    values: &mut [f64],
    rng: &mut RandomNumberGenerator,
) {
    let rate = config.mutation_rate_for(values.len());
    for (value, &(lo, hi)) in values.iter_mut().zip(bounds) {
        if rng.bernoulli(rate) {
            *value = rng
                .normal(*value, config.gaussian_sigma * (hi - lo))
                .clamp(lo, hi);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{ProblemDefinition, Representation};
    use crate::reproduction::test_support::Fixture;
    use crate::selection::MixedSelection;

    fn run(config: &ReproductionConfig, parents: usize) -> Vec<Vec<f64>> {
        let bounds = vec![(-5.0, 5.0), (0.0, 1.0), (2.0, 3.0)];
        let definition =
            ProblemDefinition::new(Representation::continuous_bounded(bounds.clone())).unwrap();
        let fixture = Fixture::new(definition, parents, 12);
        let ctx = fixture.context();
        let slot = Slot::new(&ctx, 0);
        let mut rng = RandomNumberGenerator::from_seed(12);
        (0..40)
            .map(|_| {
                match reproduce(config, &MixedSelection::default(), &slot, &bounds, &mut rng)
                    .unwrap()
                {
                    Genome::Continuous(values) => values,
                    other => panic!("unexpected genome {:?}", other),
                }
            })
            .collect()
    }

    fn assert_in_bounds(children: &[Vec<f64>]) {
        let bounds = [(-5.0, 5.0), (0.0, 1.0), (2.0, 3.0)];
        for child in children {
            assert_eq!(child.len(), 3);
            for (v, (lo, hi)) in child.iter().zip(&bounds) {
                assert!(v >= lo && v <= hi, "{} outside [{}, {}]", v, lo, hi);
            }
        }
    }

    #[test]
    fn test_differential_recombination_is_clamped() {
        let config = ReproductionConfig {
            crossover_probability: 1.0,
            differential_share: 1.0,
            differential_weight: 2.0,
            ..Default::default()
        };
        assert_in_bounds(&run(&config, 8));
    }

    #[test]
    fn test_eda_fallback_with_few_parents() {
        let config = ReproductionConfig {
            crossover_probability: 1.0,
            differential_share: 1.0,
            ..Default::default()
        };
        assert_in_bounds(&run(&config, 3));
    }

    #[test]
    fn test_gaussian_mutation_branch() {
        let config = ReproductionConfig {
            crossover_probability: 0.0,
            mutation_rate: Some(1.0),
            gaussian_sigma: 5.0,
            ..Default::default()
        };
        assert_in_bounds(&run(&config, 5));
    }
}
