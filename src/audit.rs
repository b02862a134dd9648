//! Structured audit logging for outcome-relevant events.
//!
//! Tournament transitions, registrations, credited solves and finalization
//! are logged under the `audit` target with structured fields.

/// Log a tournament lifecycle event
pub fn log_tournament_event(tournament_id: &str, event: &str, details: &str) {
    tracing::info!(
        target: "audit",
        event = "tournament",
        tournament_id = tournament_id,
        tournament_event = event,
        details = details,
        "Tournament {}: {} - {}",
        tournament_id,
        event,
        details
    );
}

/// Log a registration change
pub fn log_registration(tournament_id: &str, user_id: &str, registered: bool) {
    tracing::info!(
        target: "audit",
        event = "registration",
        tournament_id = tournament_id,
        user_id = user_id,
        registered = registered,
        "Registration: {} {} tournament {}",
        user_id,
        if registered { "joined" } else { "left" },
        tournament_id
    );
}

/// Log a solve submission, credited or rejected as a duplicate
pub fn log_solve(tournament_id: &str, user_id: &str, puzzle_id: &str, points: i64, accepted: bool) {
    tracing::info!(
        target: "audit",
        event = "solve",
        tournament_id = tournament_id,
        user_id = user_id,
        puzzle_id = puzzle_id,
        points = points,
        accepted = accepted,
        "Solve: {} by {} in tournament {} (accepted={}, points={})",
        puzzle_id,
        user_id,
        tournament_id,
        accepted,
        points
    );
}

/// Log a degraded leaderboard cache operation
pub fn log_cache_degraded(tournament_id: &str, operation: &str, error: &str) {
    tracing::warn!(
        target: "audit",
        event = "cache_degraded",
        tournament_id = tournament_id,
        operation = operation,
        error = error,
        "Leaderboard cache degraded during {} for tournament {}: {}",
        operation,
        tournament_id,
        error
    );
}

/// Log a security event (unauthorized access, ownership violations, etc.)
pub fn log_security_event(user_id: &str, event: &str, details: &str) {
    tracing::warn!(
        target: "audit",
        event = "security",
        user_id = user_id,
        security_event = event,
        details = details,
        "Security: {} - {} - {}",
        event,
        user_id,
        details
    );
}
