//! Points awarded for a solved puzzle.
//!
//! Every difficulty tier has a base value and a par time. Solving faster than
//! par earns a proportional bonus of up to +100% of the base; solving at or
//! beyond par earns exactly the base. Unknown tiers are worth nothing.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    VeryHard,
    Insane,
    Inhuman,
}

impl Difficulty {
    pub const ALL: [Difficulty; 6] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::VeryHard,
        Difficulty::Insane,
        Difficulty::Inhuman,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::VeryHard => "very_hard",
            Difficulty::Insane => "insane",
            Difficulty::Inhuman => "inhuman",
        }
    }

    pub fn base_points(&self) -> i64 {
        match self {
            Difficulty::Easy => 10,
            Difficulty::Medium => 20,
            Difficulty::Hard => 30,
            Difficulty::VeryHard => 40,
            Difficulty::Insane => 50,
            Difficulty::Inhuman => 60,
        }
    }

    /// Par time in seconds.
    pub fn par_time_secs(&self) -> i64 {
        match self {
            Difficulty::Easy => 60,
            Difficulty::Medium => 120,
            Difficulty::Hard => 180,
            Difficulty::VeryHard => 300,
            Difficulty::Insane => 420,
            Difficulty::Inhuman => 600,
        }
    }

    /// `floor(base * (1 + max(0, (par - t) / par)))`, in exact integer math.
    pub fn points_for(&self, solve_time_secs: i64) -> i64 {
        let base = self.base_points();
        let par = self.par_time_secs();
        let t = solve_time_secs.clamp(0, par);
        base * (2 * par - t) / par
    }
}

impl FromStr for Difficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Difficulty::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or(())
    }
}

/// Score for a solve given a raw tier name.
pub fn score(difficulty: &str, solve_time_secs: i64) -> i64 {
    difficulty
        .parse::<Difficulty>()
        .map(|tier| tier.points_for(solve_time_secs))
        .unwrap_or(0)
}
