//! Genetic programming operators: random injection, subtree crossover and subtree
//! mutation, all bounded by the configured tree size and depth.

use tracing::debug;

use crate::error::{OptimizationError, Result};
use crate::individual::tree::TreeConfig;
use crate::individual::{ExpressionTree, Genome};
use crate::reproduction::{layout_mismatch, OperatorOutcome, ReproductionConfig, Slot};
use crate::rng::RandomNumberGenerator;
use crate::selection::SelectionStrategy;

fn tree<'a>(slot: &Slot<'a>, parent: usize) -> Result<&'a ExpressionTree> {
    match slot.parent(parent)? {
        Genome::Tree(tree) => Ok(tree),
        _ => Err(layout_mismatch("tree", slot.index)),
    }
}

pub(crate) fn reproduce(
    config: &ReproductionConfig,
    tournament: &dyn SelectionStrategy,
    slot: &Slot<'_>,
    tree_config: &TreeConfig,
    rng: &mut RandomNumberGenerator,
) -> Result<Genome> {
    if rng.bernoulli(config.random_injection_probability) {
        return Ok(Genome::Tree(tree_config.random_tree(rng)));
    }

    let parent = tree(slot, tournament.select_one(slot.scores(), rng)?)?;
    let outcome =
        if slot.parent_count() >= 2 && rng.bernoulli(config.tree_crossover_probability) {
            let donor = tree(slot, tournament.select_one(slot.scores(), rng)?)?;
            match subtree_crossover(parent, donor, tree_config, config.tree_retries, rng)? {
                OperatorOutcome::GaveUp { attempts, .. } => {
                    debug!(attempts, "Subtree crossover gave up, mutating instead");
                    subtree_mutation(parent, tree_config, config.tree_retries, rng)?
                }
                applied => applied,
            }
        } else {
            subtree_mutation(parent, tree_config, config.tree_retries, rng)?
        };

    if let OperatorOutcome::GaveUp { attempts, .. } = &outcome {
        debug!(attempts = *attempts, "Subtree mutation gave up, keeping the parent");
    }
    let applied = outcome.is_applied();
    let child = outcome.into_inner();
    if applied && !within_limits(&child, tree_config) {
        return Err(OptimizationError::InvariantViolation(format!(
            "Tree of size {} and depth {} exceeds the limits {} and {}",
            child.size(),
            child.depth(),
            tree_config.max_size,
            tree_config.max_depth
        )));
    }
    Ok(Genome::Tree(child))
}

fn within_limits(tree: &ExpressionTree, config: &TreeConfig) -> bool {
    tree.size() <= config.max_size && tree.depth() <= config.max_depth
}

/// Replaces a random subtree of `parent` with a random subtree of `donor`.
///
/// Candidates above `config.max_size` or deeper than `config.max_depth` are rejected;
/// after `retries` rejections the parent is returned unchanged as
/// [`OperatorOutcome::GaveUp`].
pub fn subtree_crossover(
    parent: &ExpressionTree,
    donor: &ExpressionTree,
    config: &TreeConfig,
    retries: usize,
    rng: &mut RandomNumberGenerator,
) -> Result<OperatorOutcome<ExpressionTree>> {
    for _ in 0..retries {
        let at = rng.index(parent.size());
        let graft = donor
            .subtree(rng.index(donor.size()))
            .cloned()
            .ok_or_else(|| {
                OptimizationError::InvariantViolation("Donor subtree out of range".to_string())
            })?;
        let mut child = parent.clone();
        child.replace_subtree(at, graft)?;
        if within_limits(&child, config) {
            return Ok(OperatorOutcome::Applied(child));
        }
    }
    Ok(OperatorOutcome::GaveUp {
        attempts: retries,
        unchanged: parent.clone(),
    })
}

/// Replaces a random subtree of `parent` with a freshly grown one that respects the
/// depth limit at that position. Size and depth violations are retried like crossover.
pub fn subtree_mutation(
    parent: &ExpressionTree,
    config: &TreeConfig,
    retries: usize,
    rng: &mut RandomNumberGenerator,
) -> Result<OperatorOutcome<ExpressionTree>> {
    for _ in 0..retries {
        let at = rng.index(parent.size());
        let level = parent.level_of(at).unwrap_or(0);
        let replacement = config.grow(config.max_depth.saturating_sub(level), rng);
        let mut child = parent.clone();
        child.replace_subtree(at, replacement)?;
        if within_limits(&child, config) {
            return Ok(OperatorOutcome::Applied(child));
        }
    }
    Ok(OperatorOutcome::GaveUp {
        attempts: retries,
        unchanged: parent.clone(),
    })
}
