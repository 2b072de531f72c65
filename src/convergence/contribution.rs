use std::cmp::Ordering;

/// A variable index paired with a ranking score.
///
/// Orders ascending by score; sort and reverse for most-promising-first.
#[derive(Debug, Clone, Copy)]
pub struct VariableContribution {
    pub index: usize,
    pub score: f64,
}

impl VariableContribution {
    pub fn new(index: usize, score: f64) -> Self {
        Self { index, score }
    }
}

impl PartialEq for VariableContribution {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VariableContribution {}

impl PartialOrd for VariableContribution {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VariableContribution {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.index.cmp(&other.index))
    }
}
