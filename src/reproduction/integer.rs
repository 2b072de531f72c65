//! Integer operators.
//!
//! The crossover branch is two-point crossover followed by positional mutation. The
//! other branch is guided mutation: the best chromosome of the pool with a share of
//! its positions replaced by draws from the guided-convergence model.

use crate::error::Result;
use crate::individual::Genome;
use crate::reproduction::{layout_mismatch, two_point, ReproductionConfig, Slot};
use crate::rng::RandomNumberGenerator;
use crate::selection::SelectionStrategy;

fn values<'a>(slot: &Slot<'a>, parent: usize) -> Result<&'a [i64]> {
    match slot.parent(parent)? {
        Genome::Integer(values) => Ok(values),
        _ => Err(layout_mismatch("integer", slot.index)),
    }
}

fn guided_value(
    slot: &Slot<'_>,
    position: usize,
    (lo, hi): (i64, i64),
    rng: &mut RandomNumberGenerator,
) -> Result<i64> {
    let drawn = slot.ctx.convergence.draw(slot.offset + position, rng)?;
    Ok((drawn.round() as i64).clamp(lo, hi))
}

pub(crate) fn reproduce(
    config: &ReproductionConfig,
    selection: &dyn SelectionStrategy,
    slot: &Slot<'_>,
    bounds: &[(i64, i64)],
    rng: &mut RandomNumberGenerator,
) -> Result<Genome> {
    let scores = slot.scores();
    if slot.parent_count() >= 2 && rng.bernoulli(config.crossover_probability) {
        let picked = selection.select(scores, 2, rng)?;
        let first = values(slot, picked[0])?;
        let second = values(slot, picked[picked.len() - 1])?;
        let mut child = two_point(first, second, rng);
        mutate(config, slot, bounds, &mut child, rng)?;
        return Ok(Genome::Integer(child));
    }

    // the pool is ordered best first
    let mut child = values(slot, 0)?.to_vec();
    for (k, value) in child.iter_mut().enumerate() {
        if rng.bernoulli(config.guided_blend_rate) {
            if let Some(&range) = bounds.get(k) {
                *value = guided_value(slot, k, range, rng)?;
            }
        }
    }
    Ok(Genome::Integer(child))
}

/// Resamples positions with the configured rate, either uniformly within bounds or
/// from the guided discrete distribution.
pub(crate) fn mutate(
    config: &ReproductionConfig,
    slot: &Slot<'_>,
    bounds: &[(i64, i64)],
    values: &mut [i64],
    rng: &mut RandomNumberGenerator,
) -> Result<()> {
    let rate = config.mutation_rate_for(values.len());
    for (k, (value, &(lo, hi))) in values.iter_mut().zip(bounds).enumerate() {
        if !rng.bernoulli(rate) {
            continue;
        }
        *value = if rng.bernoulli(config.guided_mutation_probability) {
            guided_value(slot, k, (lo, hi), rng)?
        } else {
            rng.range_i64(lo, hi)
        };
    }
    Ok(())
}
