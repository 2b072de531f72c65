use crate::error::{out_of_range, OptimizationError, Result};
use crate::individual::Individual;
use crate::problem::VariableInfo;

/// Primitives repair and local search need from a representation.
///
/// Binary and integer variables move in whole units; continuous variables move by
/// arbitrary amounts.
pub trait WeightedVariables {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn value(&self, index: usize) -> Result<f64>;

    fn min_value(&self, index: usize) -> Result<f64>;

    fn max_value(&self, index: usize) -> Result<f64>;

    /// Smallest step of the variable, `None` for continuous variables.
    fn unit(&self, index: usize) -> Result<Option<f64>>;

    /// Adds `amount`, saturating at the upper bound.
    fn add(&mut self, index: usize, amount: f64) -> Result<()>;

    /// Removes `amount`, saturating at the lower bound.
    fn remove(&mut self, index: usize, amount: f64) -> Result<()>;

    fn can_add(&self, index: usize) -> Result<bool> {
        Ok(self.value(index)? < self.max_value(index)?)
    }

    fn can_remove(&self, index: usize) -> Result<bool> {
        Ok(self.value(index)? > self.min_value(index)?)
    }
}

/// The flat variable space of one individual, with bounds from the problem definition.
#[derive(Debug)]
pub struct FlatVariables<'a> {
    individual: &'a mut Individual,
    variables: &'a [VariableInfo],
}

impl<'a> FlatVariables<'a> {
    /// # Errors
    ///
    /// Returns `InvariantViolation` when the individual does not match the variable table.
    pub fn new(individual: &'a mut Individual, variables: &'a [VariableInfo]) -> Result<Self> {
        if individual.variable_count() != variables.len() {
            return Err(OptimizationError::InvariantViolation(format!(
                "Individual {} has {} variables, the problem defines {}",
                individual.id(),
                individual.variable_count(),
                variables.len()
            )));
        }
        Ok(Self {
            individual,
            variables,
        })
    }

    fn info(&self, index: usize) -> Result<&VariableInfo> {
        self.variables
            .get(index)
            .ok_or_else(|| out_of_range("Variable", index, self.variables.len()))
    }

    fn shift(&mut self, index: usize, delta: f64) -> Result<()> {
        let info = *self.info(index)?;
        let value = self.individual.variable(index)?;
        self.individual
            .set_variable(index, (value + delta).clamp(info.min, info.max))
    }
}

impl WeightedVariables for FlatVariables<'_> {
    fn len(&self) -> usize {
        self.variables.len()
    }

    fn value(&self, index: usize) -> Result<f64> {
        self.individual.variable(index)
    }

    fn min_value(&self, index: usize) -> Result<f64> {
        Ok(self.info(index)?.min)
    }

    fn max_value(&self, index: usize) -> Result<f64> {
        Ok(self.info(index)?.max)
    }

    fn unit(&self, index: usize) -> Result<Option<f64>> {
        Ok(self.info(index)?.unit())
    }

    fn add(&mut self, index: usize, amount: f64) -> Result<()> {
        self.shift(index, amount)
    }

    fn remove(&mut self, index: usize, amount: f64) -> Result<()> {
        self.shift(index, -amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::individual::Genome;
    use crate::problem::{ProblemDefinition, Representation};

    #[test]
    fn test_moves_saturate_at_bounds() {
        let definition = ProblemDefinition::new(Representation::uniform_integer(2, 0, 5)).unwrap();
        let mut individual = Individual::new(0, Genome::Integer(vec![4, 1]));
        let mut variables = FlatVariables::new(&mut individual, definition.variables()).unwrap();

        variables.add(0, 3.0).unwrap();
        variables.remove(1, 3.0).unwrap();
        assert_eq!(variables.value(0).unwrap(), 5.0);
        assert_eq!(variables.value(1).unwrap(), 0.0);
        assert!(!variables.can_add(0).unwrap());
        assert!(!variables.can_remove(1).unwrap());
        assert_eq!(variables.unit(0).unwrap(), Some(1.0));
        assert_eq!(individual.integers(), Some(&[5, 0][..]));
    }

    #[test]
    fn test_layout_mismatch() {
        let definition = ProblemDefinition::new(Representation::binary(3)).unwrap();
        let mut individual = Individual::new(0, Genome::Binary(vec![true]));
        assert!(FlatVariables::new(&mut individual, definition.variables()).is_err());
    }
}
