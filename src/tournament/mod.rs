mod context;
mod lifecycle;
pub mod manager;
mod progress;
pub mod ranking;
mod registration;
mod standings;

pub use manager::{
    NewTournament, ScheduleReport, SolveOutcome, TournamentManager, TournamentUpdate,
};
