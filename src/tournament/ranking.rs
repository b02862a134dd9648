use crate::db::models::{DashboardEntry, Participant, TournamentResult};
use std::cmp::Ordering;

/// Total order over standings: score desc, solved count desc, earlier last
/// solve first (never solved last), then user id.
pub fn compare_standings(a: &Participant, b: &Participant) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| b.solved_count.cmp(&a.solved_count))
        .then_with(|| compare_last_solve(a.last_solved_at.as_deref(), b.last_solved_at.as_deref()))
        .then_with(|| a.user_id.cmp(&b.user_id))
}

fn compare_last_solve(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn sort_standings(participants: &mut [Participant]) {
    participants.sort_by(compare_standings);
}

pub fn dashboard(mut participants: Vec<Participant>) -> Vec<DashboardEntry> {
    sort_standings(&mut participants);
    participants
        .into_iter()
        .enumerate()
        .map(|(i, p)| DashboardEntry {
            rank: i as i64 + 1,
            user_id: p.user_id,
            display_name: p.display_name,
            score: p.score,
            solved_count: p.solved_count,
            joined_at: p.joined_at,
            last_solved_at: p.last_solved_at,
        })
        .collect()
}

/// Dense 1-based ranks; equal standings still get distinct ranks.
pub fn final_results(
    tournament_id: &str,
    mut participants: Vec<Participant>,
    finished_at: &str,
) -> Vec<TournamentResult> {
    sort_standings(&mut participants);
    participants
        .into_iter()
        .enumerate()
        .map(|(i, p)| TournamentResult {
            tournament_id: tournament_id.to_string(),
            user_id: p.user_id,
            display_name: p.display_name,
            score: p.score,
            solved_count: p.solved_count,
            rank: i as i64 + 1,
            finished_at: finished_at.to_string(),
        })
        .collect()
}
