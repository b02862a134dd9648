mod extract;
pub mod tournaments;

pub use extract::{ValidatedJson, ValidatedQuery};
pub use tournaments::{router as tournaments_router, TournamentAppState};
