pub mod mixed;
pub mod rank;
pub mod selection_strategy;
pub mod tournament;

pub use mixed::MixedSelection;
pub use rank::RankBasedSelection;
pub use selection_strategy::SelectionStrategy;
pub use tournament::TournamentSelection;
