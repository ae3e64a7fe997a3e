use std::fmt;
use std::time::Duration;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::progression::{Assessment, Draw, Presentation, Step, Verdict};
use crate::session::Answer;

pub const GAME_NAME: &str = "PassAlongTest";
pub const SIZE: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cell
{
    Red,
    Blue,
    Empty,
}

impl Cell
{
    pub fn as_str(&self) -> &'static str
    {
        match self {
            Cell::Red => "red",
            Cell::Blue => "blue",
            Cell::Empty => "empty",
        }
    }
}

impl fmt::Display for Cell
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.as_str())
    }
}

pub type Tray = [[Cell; SIZE]; SIZE];

pub fn initial_tray() -> Tray
{
    use Cell::*;
    [[Blue, Blue, Red], [Red, Empty, Blue], [Red, Red, Blue]]
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Design
{
    pub id: u32,
    pub target: Tray,
}

impl Design
{
    pub fn is_advanced(&self) -> bool
    {
        self.id > 4
    }

    pub fn time_limit(&self) -> Duration
    {
        if self.is_advanced() {
            Duration::from_secs(180)
        } else {
            Duration::from_secs(120)
        }
    }
}

pub fn designs() -> Vec<Design>
{
    use Cell::*;
    let targets: [Tray; 8] = [
        [[Red, Red, Blue], [Blue, Empty, Red], [Blue, Red, Blue]],
        [[Blue, Red, Red], [Red, Blue, Empty], [Blue, Blue, Red]],
        [[Red, Blue, Red], [Blue, Red, Blue], [Empty, Red, Blue]],
        [[Blue, Red, Blue], [Red, Blue, Red], [Blue, Empty, Red]],
        [[Red, Blue, Empty], [Blue, Red, Blue], [Red, Blue, Red]],
        [[Blue, Red, Blue], [Red, Empty, Red], [Blue, Blue, Red]],
        [[Red, Blue, Red], [Blue, Red, Blue], [Red, Blue, Empty]],
        [[Blue, Red, Blue], [Red, Blue, Red], [Empty, Blue, Red]],
    ];
    targets
        .into_iter()
        .enumerate()
        .map(|(index, target)| Design {
            id: index as u32 + 1,
            target,
        })
        .collect()
}

pub fn design_by_id(id: u32) -> Option<Design>
{
    designs().into_iter().find(|design| design.id == id)
}

/// Slides the block at `from` into `to`. Only legal when `to` is empty and
/// shares an edge with `from`.
pub fn move_block(tray: &mut Tray, from: (usize, usize), to: (usize, usize)) -> bool
{
    let in_bounds = |(row, col): (usize, usize)| row < SIZE && col < SIZE;
    if !in_bounds(from) || !in_bounds(to) {
        return false;
    }
    let adjacent = from.0.abs_diff(to.0) + from.1.abs_diff(to.1) == 1;
    if !adjacent || tray[to.0][to.1] != Cell::Empty || tray[from.0][from.1] == Cell::Empty {
        return false;
    }
    tray[to.0][to.1] = tray[from.0][from.1];
    tray[from.0][from.1] = Cell::Empty;
    true
}

/// Slides the block at `from` into whichever neighbour is empty.
pub fn slide_into_gap(tray: &mut Tray, from: (usize, usize)) -> bool
{
    let (row, col) = from;
    let neighbours = [
        (row.wrapping_sub(1), col),
        (row + 1, col),
        (row, col.wrapping_sub(1)),
        (row, col + 1),
    ];
    neighbours.into_iter().any(|to| move_block(tray, from, to))
}

pub fn matches(tray: &Tray, design: &Tray) -> bool
{
    tray == design
}

/// `design_index` is zero-based.
pub fn score_for(design_index: usize, seconds: f64, is_correct: bool) -> u32
{
    if !is_correct {
        return 0;
    }
    if design_index < 4 {
        match seconds {
            s if s <= 60.0 => 2,
            s if s <= 120.0 => 1,
            _ => 0,
        }
    } else {
        match seconds {
            s if s <= 60.0 => 3,
            s if s <= 120.0 => 2,
            s if s <= 180.0 => 1,
            _ => 0,
        }
    }
}

pub fn tray_answer(tray: &Tray) -> Answer
{
    Answer::Grid(
        tray.iter()
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        Cell::Empty => None,
                        other => Some(other.as_str().to_string()),
                    })
                    .collect()
            })
            .collect(),
    )
}

pub struct PassAlongGame
{
    designs: Vec<Design>,
    index: Option<usize>,
}

impl PassAlongGame
{
    pub fn new() -> Self
    {
        Self {
            designs: designs(),
            index: None,
        }
    }

    pub fn design_count(&self) -> usize
    {
        self.designs.len()
    }
}

impl Default for PassAlongGame
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl Assessment for PassAlongGame
{
    type Stimulus = Design;
    type Response = Tray;

    fn name(&self) -> &str
    {
        GAME_NAME
    }

    fn begin(&mut self)
    {
        self.index = None;
    }

    fn stimulus(&mut self, draw: Draw, _rng: &mut StdRng) -> Option<Design>
    {
        let next = match (draw, self.index) {
            (Draw::Repeat, Some(index)) => index,
            (_, Some(index)) => index + 1,
            (_, None) => 0,
        };
        let design = self.designs.get(next)?.clone();
        self.index = Some(next);
        Some(design)
    }

    fn presentation(&self, _stimulus: &Design) -> Presentation
    {
        Presentation::UntilInput
    }

    fn response_limit(&self, stimulus: &Design) -> Option<Duration>
    {
        Some(stimulus.time_limit())
    }

    fn evaluate(&self, stimulus: &Design, response: &Tray, elapsed: Duration) -> Verdict
    {
        let is_correct = matches(response, &stimulus.target);
        let index = stimulus.id.saturating_sub(1) as usize;
        let score = score_for(index, elapsed.as_secs_f64(), is_correct);
        Verdict {
            is_correct,
            score: score as f64,
            answer: Some(tray_answer(response)),
        }
    }

    fn advance_policy(&mut self, _verdict: &Verdict) -> Step
    {
        Step::Continue
    }
}
