//! # Reproduction
//!
//! Produces one offspring per call from a read-only [`ParentPool`](crate::population::ParentPool).
//!
//! Every representation follows the same pattern: with the crossover probability, pick
//! parents and recombine them; otherwise clone one parent and mutate it. The operators
//! themselves live in one module per representation; [`Reproducer`] dispatches to them per
//! sub-representation slot, so a composite offspring is assembled from one leaf offspring
//! per slot.
//!
//! Exhausted retry budgets are not errors: operators report them as
//! [`OperatorOutcome::GaveUp`] and the unmodified clone is used instead.

pub mod binary;
pub mod continuous;
pub mod integer;
pub mod tree;

use std::fmt::Debug;

use tracing::trace;

use crate::context::SearchContext;
use crate::error::{OptimizationError, Result};
use crate::individual::{Genome, Individual};
use crate::problem::LeafRepresentation;
use crate::rng::RandomNumberGenerator;
use crate::selection::{MixedSelection, TournamentSelection};

/// Produces offspring from the current parent pool.
pub trait Reproduction: Debug + Send + Sync {
    /// Creates a new, unevaluated individual. The parent pool is never modified.
    fn reproduce(
        &self,
        ctx: &SearchContext<'_>,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Individual>;
}

/// Result of a bounded-retry operator.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorOutcome<T> {
    Applied(T),
    /// The retry budget ran out; `unchanged` is the untouched input.
    GaveUp { attempts: usize, unchanged: T },
}

impl<T> OperatorOutcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, OperatorOutcome::Applied(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            OperatorOutcome::Applied(value) => value,
            OperatorOutcome::GaveUp { unchanged, .. } => unchanged,
        }
    }
}

/// Tunables of every reproduction operator.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct ReproductionConfig {
    pub crossover_probability: f64,
    /// Per-variable mutation probability; `None` means `1 / n`.
    pub mutation_rate: Option<f64>,
    /// Probability that a mutated position is drawn from the guided-convergence model
    /// instead of uniformly.
    pub guided_mutation_probability: f64,
    /// Share of continuous recombinations that are differential rather than EDA sampling.
    pub differential_share: f64,
    pub differential_weight: f64,
    pub differential_crossover_rate: f64,
    /// Standard deviation of EDA sampling around the model probability.
    pub eda_spread: f64,
    /// Probability that a position of the best chromosome is replaced by a guided draw.
    pub guided_blend_rate: f64,
    /// Share of uniform picks in mixed parent selection.
    pub uniform_selection_probability: f64,
    pub random_injection_probability: f64,
    pub tree_crossover_probability: f64,
    pub tree_retries: usize,
    pub tree_tournament_size: usize,
    /// Gaussian mutation deviation, relative to the variable's range.
    pub gaussian_sigma: f64,
}

impl Default for ReproductionConfig {
    fn default() -> Self {
        Self {
            crossover_probability: 0.8,
            mutation_rate: None,
            guided_mutation_probability: 0.5,
            differential_share: 0.5,
            differential_weight: 0.5,
            differential_crossover_rate: 0.9,
            eda_spread: 0.1,
            guided_blend_rate: 0.3,
            uniform_selection_probability: 0.2,
            random_injection_probability: 0.05,
            tree_crossover_probability: 0.7,
            tree_retries: 5,
            tree_tournament_size: 3,
            gaussian_sigma: 0.1,
        }
    }
}

impl ReproductionConfig {
    pub fn validate(&self) -> Result<()> {
        let probabilities = [
            ("Crossover probability", self.crossover_probability),
            ("Guided mutation probability", self.guided_mutation_probability),
            ("Differential share", self.differential_share),
            ("Differential crossover rate", self.differential_crossover_rate),
            ("Guided blend rate", self.guided_blend_rate),
            ("Uniform selection probability", self.uniform_selection_probability),
            ("Random injection probability", self.random_injection_probability),
            ("Tree crossover probability", self.tree_crossover_probability),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(OptimizationError::Configuration(format!(
                    "{} must be between 0.0 and 1.0",
                    name
                )));
            }
        }
        if let Some(rate) = self.mutation_rate {
            if !(rate > 0.0 && rate <= 1.0) {
                return Err(OptimizationError::Configuration(
                    "Mutation rate must be in (0.0, 1.0]".to_string(),
                ));
            }
        }
        if !(self.differential_weight > 0.0 && self.differential_weight <= 2.0) {
            return Err(OptimizationError::Configuration(
                "Differential weight must be in (0.0, 2.0]".to_string(),
            ));
        }
        if !(self.eda_spread > 0.0 && self.gaussian_sigma > 0.0) {
            return Err(OptimizationError::Configuration(
                "EDA spread and Gaussian sigma must be positive".to_string(),
            ));
        }
        if self.tree_retries == 0 || self.tree_tournament_size == 0 {
            return Err(OptimizationError::Configuration(
                "Tree retries and tournament size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-variable mutation probability for a chromosome of length `n`.
    pub fn mutation_rate_for(&self, n: usize) -> f64 {
        self.mutation_rate
            .unwrap_or_else(|| 1.0 / n.max(1) as f64)
    }
}

/// One sub-representation slot being reproduced.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Slot<'a> {
    pub ctx: SearchContext<'a>,
    pub index: usize,
    /// Flat index of the slot's first variable.
    pub offset: usize,
}

impl<'a> Slot<'a> {
    fn new(ctx: &SearchContext<'a>, index: usize) -> Self {
        Self {
            ctx: *ctx,
            index,
            offset: ctx.slot_offset(index),
        }
    }

    pub fn scores(&self) -> &'a [f64] {
        self.ctx.parents.scores()
    }

    pub fn parent_count(&self) -> usize {
        self.ctx.parents.len()
    }

    pub fn parent(&self, index: usize) -> Result<&'a Genome> {
        self.ctx
            .parents
            .get(index)
            .and_then(|p| p.slot_genome(self.index))
            .ok_or_else(|| {
                OptimizationError::InvariantViolation(format!(
                    "Parent {} has no genome for slot {}",
                    index, self.index
                ))
            })
    }
}

pub(crate) fn layout_mismatch(expected: &str, slot: usize) -> OptimizationError {
    OptimizationError::InvariantViolation(format!(
        "Expected a {} genome in slot {}",
        expected, slot
    ))
}

/// Two-point crossover: the segment between two random cut points comes from `b`.
pub(crate) fn two_point<T: Clone>(a: &[T], b: &[T], rng: &mut RandomNumberGenerator) -> Vec<T> {
    let n = a.len().min(b.len());
    if n < 2 {
        return a.to_vec();
    }
    let (mut first, mut second) = (rng.index(n + 1), rng.index(n + 1));
    if first > second {
        std::mem::swap(&mut first, &mut second);
    }
    let mut child = a.to_vec();
    child[first..second].clone_from_slice(&b[first..second]);
    child
}

/// Default reproduction strategy dispatching on the problem's representation.
#[derive(Debug, Clone)]
pub struct Reproducer {
    config: ReproductionConfig,
    selection: MixedSelection,
    tournament: TournamentSelection,
}

impl Reproducer {
    pub fn new(config: ReproductionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    /// Builds the selection strategies from a config that already passed validation.
    fn from_validated(config: ReproductionConfig) -> Self {
        let selection = MixedSelection::default()
            .with_uniform_probability(config.uniform_selection_probability);
        let tournament = TournamentSelection::default()
            .with_duplicates()
            .with_tournament_size(config.tree_tournament_size)
            .expect("tree_tournament_size is validated to be at least 1");
        Self {
            config,
            selection,
            tournament,
        }
    }

    pub fn config(&self) -> &ReproductionConfig {
        &self.config
    }

    fn reproduce_slot(
        &self,
        slot: &Slot<'_>,
        leaf: &LeafRepresentation,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Genome> {
        match leaf {
            LeafRepresentation::Binary { .. } => {
                binary::reproduce(&self.config, &self.selection, slot, rng)
            }
            LeafRepresentation::Integer { bounds } => {
                integer::reproduce(&self.config, &self.selection, slot, bounds, rng)
            }
            LeafRepresentation::Continuous { bounds } => {
                continuous::reproduce(&self.config, &self.selection, slot, bounds, rng)
            }
            LeafRepresentation::Tree(tree_config) => {
                tree::reproduce(&self.config, &self.tournament, slot, tree_config, rng)
            }
        }
    }
}

impl Default for Reproducer {
    fn default() -> Self {
        Self::from_validated(ReproductionConfig::default())
    }
}

impl Reproduction for Reproducer {
    fn reproduce(
        &self,
        ctx: &SearchContext<'_>,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Individual> {
        if ctx.parents.is_empty() {
            trace!("Empty parent pool, creating a random individual");
            return Ok(Individual::random(ctx.definition, ctx.ids, rng));
        }

        let representation = ctx.definition.representation();
        let mut genomes = Vec::with_capacity(representation.slots().len());
        for (index, leaf) in representation.slots().iter().enumerate() {
            let slot = Slot::new(ctx, index);
            genomes.push(self.reproduce_slot(&slot, leaf, rng)?);
        }

        if representation.is_mixed() {
            let children = genomes
                .into_iter()
                .map(|genome| Individual::new(ctx.ids.next_id(), genome))
                .collect();
            Individual::composite(ctx.ids.next_id(), children)
        } else {
            let genome = genomes
                .pop()
                .ok_or_else(|| layout_mismatch("leaf", 0))?;
            Ok(Individual::new(ctx.ids.next_id(), genome))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::Fixture;
    use super::*;
    use crate::individual::tree::TreeConfig;
    use crate::problem::{ProblemDefinition, Representation};

    #[test]
    fn test_invalid_config() {
        let config = ReproductionConfig {
            crossover_probability: 1.5,
            ..Default::default()
        };
        assert!(Reproducer::new(config).is_err());
        let config = ReproductionConfig {
            tree_retries: 0,
            ..Default::default()
        };
        assert!(Reproducer::new(config).is_err());
    }

    #[test]
    fn test_default_selection_follows_config() {
        let default = Reproducer::default();
        let built = Reproducer::new(ReproductionConfig::default()).unwrap();
        assert_eq!(format!("{:?}", default), format!("{:?}", built));
        assert_eq!(
            default.tournament.tournament_size(),
            ReproductionConfig::default().tree_tournament_size
        );

        let custom = Reproducer::new(ReproductionConfig {
            tree_tournament_size: 5,
            uniform_selection_probability: 0.6,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(custom.tournament.tournament_size(), 5);
        assert_eq!(custom.selection.uniform_probability(), 0.6);
    }

    #[test]
    fn test_mutation_rate_defaults_to_inverse_length() {
        let config = ReproductionConfig::default();
        assert_eq!(config.mutation_rate_for(4), 0.25);
        assert_eq!(config.mutation_rate_for(0), 1.0);
    }

    #[test]
    fn test_two_point_keeps_alleles_positional() {
        let mut rng = RandomNumberGenerator::from_seed(3);
        let a = vec![0; 10];
        let b = vec![1; 10];
        for _ in 0..20 {
            let child = two_point(&a, &b, &mut rng);
            assert_eq!(child.len(), 10);
            let ones: Vec<usize> = (0..10).filter(|&i| child[i] == 1).collect();
            if let (Some(first), Some(last)) = (ones.first(), ones.last()) {
                assert_eq!(ones.len(), last - first + 1);
            }
        }
    }

    #[test]
    fn test_offspring_matches_composite_layout() {
        let definition = ProblemDefinition::new(Representation::mixed(vec![
            LeafRepresentation::Binary { length: 4 },
            LeafRepresentation::Continuous {
                bounds: vec![(-1.0, 1.0); 3],
            },
            LeafRepresentation::Tree(TreeConfig::default()),
        ]))
        .unwrap();
        let fixture = Fixture::new(definition, 8, 21);
        let reproducer = Reproducer::new(ReproductionConfig::default()).unwrap();
        let mut rng = RandomNumberGenerator::from_seed(4);

        for _ in 0..20 {
            let child = reproducer.reproduce(&fixture.context(), &mut rng).unwrap();
            assert!(child.is_composite());
            assert!(!child.is_evaluated());
            assert_eq!(child.children().len(), 3);
            assert!(child.child(0).unwrap().has_boolean_chromosome());
            assert!(child.child(1).unwrap().has_real_chromosome());
            assert!(child.child(2).unwrap().has_tree());
            for (value, info) in child.variables().iter().zip(fixture.definition.variables()) {
                assert!(*value >= info.min && *value <= info.max);
            }
        }
    }

    #[test]
    fn test_parents_are_not_mutated() {
        let definition = ProblemDefinition::new(Representation::uniform_integer(6, 0, 9)).unwrap();
        let fixture = Fixture::new(definition, 6, 2);
        let before = fixture.parents.individuals().to_vec();
        let reproducer = Reproducer::default();
        let mut rng = RandomNumberGenerator::from_seed(6);
        for _ in 0..30 {
            reproducer.reproduce(&fixture.context(), &mut rng).unwrap();
        }
        assert_eq!(fixture.parents.individuals(), before.as_slice());
    }

    #[test]
    fn test_empty_pool_yields_random_individual() {
        let definition = ProblemDefinition::new(Representation::binary(5)).unwrap();
        let fixture = Fixture::new(definition, 0, 1);
        let mut rng = RandomNumberGenerator::from_seed(1);
        let child = Reproducer::default()
            .reproduce(&fixture.context(), &mut rng)
            .unwrap();
        assert_eq!(child.variable_count(), 5);
    }
}
