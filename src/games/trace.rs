use std::time::Duration;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::progression::{Assessment, Draw, Presentation, Step, Verdict};
use crate::session::Answer;

pub const GAME_NAME: &str = "PatternTest";
pub const CANVAS_WIDTH: f64 = 400.0;
pub const CANVAS_HEIGHT: f64 = 300.0;
pub const PASS_SCORE: u32 = 70;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point
{
    pub x: f64,
    pub y: f64,
}

impl Point
{
    pub const fn new(x: f64, y: f64) -> Self
    {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64
    {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn clamped(self) -> Self
    {
        Self {
            x: self.x.clamp(0.0, CANVAS_WIDTH),
            y: self.y.clamp(0.0, CANVAS_HEIGHT),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TracePattern
{
    pub id: u32,
    pub name: &'static str,
    pub points: Vec<Point>,
}

impl TracePattern
{
    pub fn time_limit(&self) -> Duration
    {
        if self.id <= 4 {
            Duration::from_secs(120)
        } else {
            Duration::from_secs(180)
        }
    }
}

const FIXTURES: [(&str, &[(f64, f64)]); 8] = [
    ("Triangle", &[(200.0, 50.0), (250.0, 150.0), (150.0, 150.0), (200.0, 50.0)]),
    (
        "Rectangle",
        &[(100.0, 100.0), (300.0, 100.0), (300.0, 200.0), (100.0, 200.0), (100.0, 100.0)],
    ),
    (
        "Kite",
        &[(200.0, 50.0), (250.0, 150.0), (150.0, 150.0), (200.0, 250.0), (200.0, 50.0)],
    ),
    ("Inverted Triangle", &[(100.0, 50.0), (300.0, 50.0), (200.0, 150.0), (100.0, 50.0)]),
    (
        "Zigzag",
        &[(150.0, 50.0), (250.0, 50.0), (200.0, 150.0), (150.0, 250.0), (150.0, 50.0)],
    ),
    (
        "Flat Diamond",
        &[(100.0, 100.0), (200.0, 50.0), (300.0, 100.0), (200.0, 150.0), (100.0, 100.0)],
    ),
    (
        "Diamond",
        &[(200.0, 50.0), (300.0, 150.0), (200.0, 250.0), (100.0, 150.0), (200.0, 50.0)],
    ),
    (
        "Large Square",
        &[(100.0, 50.0), (300.0, 50.0), (300.0, 250.0), (100.0, 250.0), (100.0, 50.0)],
    ),
];

pub fn patterns() -> Vec<TracePattern>
{
    FIXTURES
        .iter()
        .enumerate()
        .map(|(index, (name, points))| TracePattern {
            id: index as u32 + 1,
            name: *name,
            points: points.iter().map(|(x, y)| Point::new(*x, *y)).collect(),
        })
        .collect()
}

pub fn pattern_by_id(id: u32) -> Option<TracePattern>
{
    patterns().into_iter().find(|pattern| pattern.id == id)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceScore
{
    pub score: u32,
    pub is_correct: bool,
}

/// Index-resampled mean distance between the two polylines, mapped to 0..=100.
pub fn score_trace(reference: &[Point], user: &[Point]) -> TraceScore
{
    if user.len() < 2 || reference.is_empty() {
        return TraceScore {
            score: 0,
            is_correct: false,
        };
    }

    let pairs = reference.len().min(user.len());
    let total: f64 = (0..pairs)
        .map(|i| {
            let expected = &reference[i % reference.len()];
            let drawn = &user[i * user.len() / pairs];
            expected.distance(drawn)
        })
        .sum();
    let average = total / pairs as f64;

    let score = (100.0 - (average / 2.0).round()).max(0.0) as u32;
    TraceScore {
        score,
        is_correct: score >= PASS_SCORE,
    }
}

pub fn points_answer(points: &[Point]) -> Answer
{
    Answer::Points(points.iter().map(|p| [p.x, p.y]).collect())
}

pub struct TraceGame
{
    patterns: Vec<TracePattern>,
    index: Option<usize>,
}

impl TraceGame
{
    pub fn new() -> Self
    {
        Self {
            patterns: patterns(),
            index: None,
        }
    }

    pub fn pattern_count(&self) -> usize
    {
        self.patterns.len()
    }
}

impl Default for TraceGame
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl Assessment for TraceGame
{
    type Stimulus = TracePattern;
    type Response = Vec<Point>;

    fn name(&self) -> &str
    {
        GAME_NAME
    }

    fn begin(&mut self)
    {
        self.index = None;
    }

    fn stimulus(&mut self, draw: Draw, _rng: &mut StdRng) -> Option<TracePattern>
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

    fn presentation(&self, _stimulus: &TracePattern) -> Presentation
    {
        Presentation::UntilInput
    }

    fn response_limit(&self, stimulus: &TracePattern) -> Option<Duration>
    {
        Some(stimulus.time_limit())
    }

    fn validate(&self, response: &Vec<Point>) -> Result<(), String>
    {
        if response.is_empty() {
            return Err("Please draw the pattern before submitting".to_string());
        }
        Ok(())
    }

    fn evaluate(&self, stimulus: &TracePattern, response: &Vec<Point>, _elapsed: Duration) -> Verdict
    {
        let scored = score_trace(&stimulus.points, response);
        Verdict {
            is_correct: scored.is_correct,
            score: scored.score as f64,
            answer: Some(points_answer(response)),
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

    fn offset(points: &[Point], dx: f64, dy: f64) -> Vec<Point>
    {
        points.iter().map(|p| Point::new(p.x + dx, p.y + dy)).collect()
    }

    #[test]
    fn test_identical_trace_scores_full_marks()
    {
        let pattern = pattern_by_id(1).unwrap();
        let scored = score_trace(&pattern.points, &pattern.points);
        assert_eq!(scored.score, 100);
        assert!(scored.is_correct);
    }

    #[test]
    fn test_single_point_scores_zero()
    {
        let pattern = pattern_by_id(2).unwrap();
        let scored = score_trace(&pattern.points, &[Point::new(100.0, 100.0)]);
        assert_eq!(scored.score, 0);
        assert!(!scored.is_correct);
        assert_eq!(score_trace(&pattern.points, &[]).score, 0);
    }

    #[test]
    fn test_offset_lowers_score()
    {
        let pattern = pattern_by_id(2).unwrap();
        let shifted = offset(&pattern.points, 30.0, 40.0);
        let scored = score_trace(&pattern.points, &shifted);
        assert_eq!(scored.score, 75);
        assert!(scored.is_correct);

        let far = offset(&pattern.points, 60.0, 80.0);
        let scored = score_trace(&pattern.points, &far);
        assert_eq!(scored.score, 50);
        assert!(!scored.is_correct);
    }

    #[test]
    fn test_dense_user_trace_is_resampled_by_index()
    {
        let reference = vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)];
        let user: Vec<Point> = (0..10).map(|i| Point::new(i as f64 * 50.0, 0.0)).collect();
        // Pairs ref[0] with user[0] and ref[1] with user[5].
        let scored = score_trace(&reference, &user);
        assert_eq!(scored.score, 100 - 38);
    }

    #[test]
    fn test_score_never_negative()
    {
        let pattern = pattern_by_id(8).unwrap();
        let far = offset(&pattern.points, 1000.0, 1000.0);
        assert_eq!(score_trace(&pattern.points, &far).score, 0);
    }

    #[test]
    fn test_time_limits_by_pattern_number()
    {
        let patterns = patterns();
        assert_eq!(patterns.len(), 8);
        assert_eq!(patterns[3].time_limit(), Duration::from_secs(120));
        assert_eq!(patterns[4].time_limit(), Duration::from_secs(180));
    }

    #[test]
    fn test_empty_submission_is_rejected()
    {
        let game = TraceGame::new();
        assert!(game.validate(&Vec::new()).is_err());
        assert!(game.validate(&vec![Point::new(1.0, 1.0)]).is_ok());
    }
}
