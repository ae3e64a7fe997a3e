use std::fmt;
use std::time::Duration;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::progression::{Assessment, Draw, Presentation, Step, Verdict};
use crate::session::Answer;

pub const GAME_NAME: &str = "KohsTest";
pub const TIME_BONUS_CAP: u32 = 30;
pub const MAX_SCORE: u32 = 100 + TIME_BONUS_CAP;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockColor
{
    Red,
    White,
    Blue,
    Yellow,
}

impl BlockColor
{
    pub const ALL: [BlockColor; 4] = [
        BlockColor::Red,
        BlockColor::White,
        BlockColor::Blue,
        BlockColor::Yellow,
    ];

    pub fn as_str(&self) -> &'static str
    {
        match self {
            BlockColor::Red => "red",
            BlockColor::White => "white",
            BlockColor::Blue => "blue",
            BlockColor::Yellow => "yellow",
        }
    }

    pub fn rgb(&self) -> (u8, u8, u8)
    {
        match self {
            BlockColor::Red => (200, 30, 30),
            BlockColor::White => (235, 235, 235),
            BlockColor::Blue => (40, 80, 220),
            BlockColor::Yellow => (240, 200, 0),
        }
    }
}

impl fmt::Display for BlockColor
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.as_str())
    }
}

pub type TargetGrid = Vec<Vec<BlockColor>>;
pub type UserGrid = Vec<Vec<Option<BlockColor>>>;

#[derive(Clone, Debug, PartialEq)]
pub struct Pattern
{
    pub id: u32,
    pub name: &'static str,
    pub difficulty: &'static str,
    pub grid: TargetGrid,
}

pub fn patterns() -> Vec<Pattern>
{
    use BlockColor::*;
    vec![
        Pattern {
            id: 1,
            name: "Simple Square",
            difficulty: "easy",
            grid: vec![vec![Red, White], vec![White, Red]],
        },
        Pattern {
            id: 2,
            name: "Color Mix",
            difficulty: "easy",
            grid: vec![vec![Blue, Yellow], vec![Yellow, Blue]],
        },
        Pattern {
            id: 3,
            name: "Mixed Pattern",
            difficulty: "medium",
            grid: vec![vec![Red, Blue], vec![Yellow, White]],
        },
        Pattern {
            id: 4,
            name: "Complex Pattern",
            difficulty: "medium",
            grid: vec![
                vec![Blue, White, Yellow],
                vec![Red, Yellow, White],
                vec![Yellow, Red, Blue],
            ],
        },
        Pattern {
            id: 5,
            name: "Advanced Pattern",
            difficulty: "hard",
            grid: vec![
                vec![Blue, White, Red, Yellow],
                vec![Red, Yellow, White, Blue],
                vec![White, Red, Blue, Red],
                vec![Yellow, Blue, Red, White],
            ],
        },
    ]
}

pub fn pattern_by_id(id: u32) -> Option<Pattern>
{
    patterns().into_iter().find(|pattern| pattern.id == id)
}

pub fn empty_grid(rows: usize, cols: usize) -> UserGrid
{
    vec![vec![None; cols]; rows]
}

pub fn is_grid_empty(grid: &UserGrid) -> bool
{
    grid.iter().all(|row| row.iter().all(|cell| cell.is_none()))
}

/// Exact match: every row has the target's length and every cell agrees.
pub fn compare_grids(user: &UserGrid, target: &TargetGrid) -> bool
{
    if user.len() != target.len() {
        return false;
    }
    user.iter().zip(target.iter()).all(|(user_row, target_row)| {
        user_row.len() == target_row.len()
            && user_row
                .iter()
                .zip(target_row.iter())
                .all(|(cell, expected)| *cell == Some(*expected))
    })
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridScore
{
    pub score: u32,
    pub accuracy: f64,
}

pub fn time_bonus(seconds: f64) -> u32
{
    let penalty = (seconds.max(0.0) / 10.0).floor() as u32;
    TIME_BONUS_CAP.saturating_sub(penalty)
}

pub fn score_grid(user: &UserGrid, target: &TargetGrid, seconds: f64) -> GridScore
{
    let mut correct = 0usize;
    let mut total = 0usize;
    for (i, target_row) in target.iter().enumerate() {
        for (j, expected) in target_row.iter().enumerate() {
            total += 1;
            let cell = user.get(i).and_then(|row| row.get(j)).copied().flatten();
            if cell == Some(*expected) {
                correct += 1;
            }
        }
    }

    let accuracy = if total > 0 {
        correct as f64 / total as f64
    } else {
        0.0
    };
    let base = (accuracy * 100.0).round() as u32;
    GridScore {
        score: (base + time_bonus(seconds)).min(MAX_SCORE),
        accuracy,
    }
}

pub fn grid_answer(grid: &UserGrid) -> Answer
{
    Answer::Grid(
        grid.iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.map(|color| color.as_str().to_string()))
                    .collect()
            })
            .collect(),
    )
}

pub struct KohsGame
{
    patterns: Vec<Pattern>,
    index: Option<usize>,
}

impl KohsGame
{
    pub fn new() -> Self
    {
        Self::with_patterns(patterns())
    }

    pub fn with_patterns(patterns: Vec<Pattern>) -> Self
    {
        Self {
            patterns,
            index: None,
        }
    }

    pub fn pattern_count(&self) -> usize
    {
        self.patterns.len()
    }
}

impl Default for KohsGame
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl Assessment for KohsGame
{
    type Stimulus = Pattern;
    type Response = UserGrid;

    fn name(&self) -> &str
    {
        GAME_NAME
    }

    fn begin(&mut self)
    {
        self.index = None;
    }

    fn stimulus(&mut self, draw: Draw, _rng: &mut StdRng) -> Option<Pattern>
    {
        let next = match (draw, self.index) {
            (Draw::Repeat, Some(index)) => index,
            (_, Some(index)) => index + 1,
            (_, None) => 0,
        };
        let pattern = self.patterns.get(next)?.clone();
        self.index = Some(next);
        Some(pattern)
    }

    fn presentation(&self, _stimulus: &Pattern) -> Presentation
    {
        Presentation::UntilInput
    }

    fn validate(&self, response: &UserGrid) -> Result<(), String>
    {
        if is_grid_empty(response) {
            return Err("Place at least one block before submitting".to_string());
        }
        Ok(())
    }

    fn evaluate(&self, stimulus: &Pattern, response: &UserGrid, elapsed: Duration) -> Verdict
    {
        let seconds = elapsed.as_secs_f64();
        let scored = score_grid(response, &stimulus.grid, seconds);
        Verdict {
            is_correct: compare_grids(response, &stimulus.grid),
            score: scored.score as f64,
            answer: Some(grid_answer(response)),
        }
    }

    fn advance_policy(&mut self, _verdict: &Verdict) -> Step
    {
        Step::Continue
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use BlockColor::*;

    fn filled(grid: &TargetGrid) -> UserGrid
    {
        grid.iter()
            .map(|row| row.iter().map(|cell| Some(*cell)).collect())
            .collect()
    }

    #[test]
    fn test_identical_grid_is_correct()
    {
        let target = vec![vec![Red, White], vec![White, Red]];
        assert!(compare_grids(&filled(&target), &target));
    }

    #[test]
    fn test_swapped_grid_is_incorrect()
    {
        let target = vec![vec![Red, White], vec![White, Red]];
        let swapped = filled(&vec![vec![White, Red], vec![Red, White]]);
        assert!(!compare_grids(&swapped, &target));
    }

    #[test]
    fn test_dimension_mismatch_is_incorrect()
    {
        let target = vec![vec![Red, White], vec![White, Red]];
        let short = vec![vec![Some(Red), Some(White)]];
        let wide = vec![
            vec![Some(Red), Some(White), Some(Red)],
            vec![Some(White), Some(Red), Some(Red)],
        ];
        assert!(!compare_grids(&short, &target));
        assert!(!compare_grids(&wide, &target));
    }

    #[test]
    fn test_time_bonus_decays_every_ten_seconds()
    {
        assert_eq!(time_bonus(0.0), 30);
        assert_eq!(time_bonus(9.9), 30);
        assert_eq!(time_bonus(10.0), 29);
        assert_eq!(time_bonus(125.0), 18);
        assert_eq!(time_bonus(1000.0), 0);
    }

    #[test]
    fn test_score_grid_partial_accuracy()
    {
        let target = vec![vec![Red, White], vec![White, Red]];
        let user = vec![vec![Some(Red), None], vec![Some(White), Some(Blue)]];
        let scored = score_grid(&user, &target, 25.0);
        assert_eq!(scored.accuracy, 0.5);
        assert_eq!(scored.score, 50 + 28);
    }

    #[test]
    fn test_score_grid_is_capped()
    {
        let target = vec![vec![Red, White], vec![White, Red]];
        let scored = score_grid(&filled(&target), &target, 0.0);
        assert_eq!(scored.score, MAX_SCORE);
        assert_eq!(scored.accuracy, 1.0);
    }

    #[test]
    fn test_empty_grid_is_rejected()
    {
        let game = KohsGame::new();
        assert!(game.validate(&empty_grid(2, 2)).is_err());
        let mut grid = empty_grid(2, 2);
        grid[1][0] = Some(Yellow);
        assert!(game.validate(&grid).is_ok());
    }

    #[test]
    fn test_first_fixture_matches_example()
    {
        let first = pattern_by_id(1).unwrap();
        assert_eq!(first.grid, vec![vec![Red, White], vec![White, Red]]);
    }
}
