//! Bit-string operators: two-point crossover and guided bit mutation.

use crate::error::Result;
use crate::individual::Genome;
use crate::reproduction::{layout_mismatch, two_point, ReproductionConfig, Slot};
use crate::rng::RandomNumberGenerator;
use crate::selection::SelectionStrategy;

fn bits<'a>(slot: &Slot<'a>, parent: usize) -> Result<&'a [bool]> {
    match slot.parent(parent)? {
        Genome::Binary(bits) => Ok(bits),
        _ => Err(layout_mismatch("binary", slot.index)),
    }
}

pub(crate) fn reproduce(
    config: &ReproductionConfig,
    selection: &dyn SelectionStrategy,
    slot: &Slot<'_>,
    rng: &mut RandomNumberGenerator,
) -> Result<Genome> {
    let scores = slot.scores();
    let mut child = if slot.parent_count() >= 2 && rng.bernoulli(config.crossover_probability) {
        let picked = selection.select(scores, 2, rng)?;
        let first = bits(slot, picked[0])?;
        let second = bits(slot, picked[picked.len() - 1])?;
        two_point(first, second, rng)
    } else {
        bits(slot, selection.select_one(scores, rng)?)?.to_vec()
    };
    mutate(config, slot, &mut child, rng)?;
    Ok(Genome::Binary(child))
}

/// Mutates each bit with the configured rate, either by sampling the guided-convergence
/// probability of that bit or by flipping it.
pub(crate) fn mutate(
    config: &ReproductionConfig,
    slot: &Slot<'_>,
    bits: &mut [bool],
    rng: &mut RandomNumberGenerator,
) -> Result<()> {
    let rate = config.mutation_rate_for(bits.len());
    for (k, bit) in bits.iter_mut().enumerate() {
        if !rng.bernoulli(rate) {
            continue;
        }
        if rng.bernoulli(config.guided_mutation_probability) {
            let p = slot.ctx.convergence.draw(slot.offset + k, rng)?;
            *bit = rng.bernoulli(p);
        } else {
            *bit = !*bit;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::individual::{Fitness, Individual};
    use crate::population::ParentPool;
    use crate::problem::{ProblemDefinition, Representation};
    use crate::reproduction::test_support::Fixture;
    use crate::selection::MixedSelection;

    #[test]
    fn test_offspring_length() {
        let definition = ProblemDefinition::new(Representation::binary(12)).unwrap();
        let fixture = Fixture::new(definition, 5, 8);
        let ctx = fixture.context();
        let slot = Slot::new(&ctx, 0);
        let mut rng = RandomNumberGenerator::from_seed(8);
        for _ in 0..10 {
            let genome = reproduce(
                &ReproductionConfig::default(),
                &MixedSelection::default(),
                &slot,
                &mut rng,
            )
            .unwrap();
            assert!(matches!(genome, Genome::Binary(ref b) if b.len() == 12));
        }
    }

    #[test]
    fn test_guided_mutation_follows_converged_model() {
        let definition = ProblemDefinition::new(Representation::binary(8)).unwrap();
        let mut fixture = Fixture::new(definition, 0, 1);
        let mut ones = Individual::new(0, Genome::Binary(vec![true; 8]));
        ones.set_fitness(Fitness::Scalar(8.0));
        fixture.convergence = crate::convergence::GuidedConvergence::new(&fixture.definition, 1.0)
            .unwrap();
        fixture.convergence.update([&ones]).unwrap();

        let mut zeros = Individual::new(1, Genome::Binary(vec![false; 8]));
        zeros.set_fitness(Fitness::Scalar(0.0));
        fixture.parents = ParentPool::from_individuals(vec![zeros]);

        let config = ReproductionConfig {
            mutation_rate: Some(1.0),
            guided_mutation_probability: 1.0,
            ..Default::default()
        };
        let ctx = fixture.context();
        let slot = Slot::new(&ctx, 0);
        let mut rng = RandomNumberGenerator::from_seed(2);
        let genome = reproduce(&config, &MixedSelection::default(), &slot, &mut rng).unwrap();
        assert_eq!(genome, Genome::Binary(vec![true; 8]));
    }
}
