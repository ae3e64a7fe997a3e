use std::time::Duration;

use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::progression::{Assessment, Draw, Presentation, Step, Verdict};
use crate::session::Answer;

pub const GAME_NAME: &str = "PictureConstructionTest";
pub const PICTURE_POINTS: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction
{
    Up,
    Down,
    Left,
    Right,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board
{
    rows: usize,
    cols: usize,
    tiles: Vec<Option<u32>>,
}

impl Board
{
    pub fn solved(rows: usize, cols: usize) -> Self
    {
        let count = rows * cols;
        let mut tiles: Vec<Option<u32>> = (1..count as u32).map(Some).collect();
        tiles.push(None);
        Self { rows, cols, tiles }
    }

    /// Accepts any arrangement of 1..n-1 plus one blank.
    pub fn from_tiles(rows: usize, cols: usize, tiles: Vec<Option<u32>>) -> Option<Self>
    {
        let count = rows * cols;
        if count == 0 || tiles.len() != count {
            return None;
        }
        let mut seen = vec![false; count];
        for tile in &tiles {
            let slot = match tile {
                Some(value) if *value >= 1 && (*value as usize) < count => *value as usize,
                Some(_) => return None,
                None => 0,
            };
            if seen[slot] {
                return None;
            }
            seen[slot] = true;
        }
        Some(Self { rows, cols, tiles })
    }

    /// Random solvable arrangement that is never already solved.
    pub fn shuffled(rows: usize, cols: usize, rng: &mut impl Rng) -> Self
    {
        let mut board = Self::solved(rows, cols);
        if board.tiles.len() < 2 {
            return board;
        }
        loop {
            board.tiles.shuffle(rng);
            if !board.is_solvable() {
                board.swap_first_tiles();
            }
            if !board.is_solved() {
                return board;
            }
        }
    }

    pub fn rows(&self) -> usize
    {
        self.rows
    }

    pub fn cols(&self) -> usize
    {
        self.cols
    }

    pub fn tiles(&self) -> &[Option<u32>]
    {
        &self.tiles
    }

    pub fn blank(&self) -> usize
    {
        self.tiles.iter().position(|tile| tile.is_none()).unwrap_or(0)
    }

    pub fn inversions(&self) -> usize
    {
        let values: Vec<u32> = self.tiles.iter().flatten().copied().collect();
        let mut count = 0;
        for (i, a) in values.iter().enumerate() {
            count += values[i + 1..].iter().filter(|b| *a > **b).count();
        }
        count
    }

    pub fn is_solvable(&self) -> bool
    {
        let inversions = self.inversions();
        if self.cols % 2 == 1 {
            return inversions % 2 == 0;
        }
        let blank_row = self.blank() / self.cols;
        let from_bottom = self.rows - 1 - blank_row;
        (inversions + from_bottom) % 2 == 0
    }

    pub fn is_solved(&self) -> bool
    {
        let last = self.tiles.len() - 1;
        self.tiles.iter().enumerate().all(|(index, tile)| {
            if index == last {
                tile.is_none()
            } else {
                *tile == Some(index as u32 + 1)
            }
        })
    }

    pub fn is_valid_move(&self, index: usize) -> bool
    {
        if index >= self.tiles.len() {
            return false;
        }
        let blank = self.blank();
        let (row, col) = (index / self.cols, index % self.cols);
        let (blank_row, blank_col) = (blank / self.cols, blank % self.cols);
        row.abs_diff(blank_row) + col.abs_diff(blank_col) == 1
    }

    /// Moves the tile at `index` into the blank. Returns false if the tile
    /// is not orthogonally adjacent to the blank.
    pub fn slide(&mut self, index: usize) -> bool
    {
        if !self.is_valid_move(index) {
            return false;
        }
        let blank = self.blank();
        self.tiles.swap(index, blank);
        true
    }

    /// Keyboard form: the arrow names the direction the tile travels, so
    /// `Up` pulls the tile below the blank upward.
    pub fn slide_toward(&mut self, direction: Direction) -> bool
    {
        let blank = self.blank();
        let (row, col) = (blank / self.cols, blank % self.cols);
        let source = match direction {
            Direction::Up if row + 1 < self.rows => blank + self.cols,
            Direction::Down if row > 0 => blank - self.cols,
            Direction::Left if col + 1 < self.cols => blank + 1,
            Direction::Right if col > 0 => blank - 1,
            _ => return false,
        };
        self.slide(source)
    }

    pub fn answer(&self) -> Answer
    {
        Answer::Tiles(self.tiles.clone())
    }

    fn swap_first_tiles(&mut self)
    {
        let mut filled = self
            .tiles
            .iter()
            .enumerate()
            .filter(|(_, tile)| tile.is_some())
            .map(|(index, _)| index);
        if let (Some(a), Some(b)) = (filled.next(), filled.next()) {
            self.tiles.swap(a, b);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PuzzleVariant
{
    Slide,
    Picture,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Level
{
    pub rows: usize,
    pub cols: usize,
    pub limit: Duration,
}

const SLIDE_LEVELS: [(usize, usize, u64); 5] =
    [(2, 2, 60), (3, 3, 90), (3, 3, 120), (4, 4, 180), (4, 4, 240)];

const PICTURE_LEVELS: [(usize, usize, u64); 5] =
    [(2, 1, 60), (2, 2, 120), (3, 2, 180), (4, 2, 240), (4, 3, 300)];

impl PuzzleVariant
{
    pub fn levels(&self) -> Vec<Level>
    {
        let table = match self {
            PuzzleVariant::Slide => &SLIDE_LEVELS,
            PuzzleVariant::Picture => &PICTURE_LEVELS,
        };
        table
            .iter()
            .map(|(rows, cols, secs)| Level {
                rows: *rows,
                cols: *cols,
                limit: Duration::from_secs(*secs),
            })
            .collect()
    }

    pub fn level(&self, index: usize) -> Option<Level>
    {
        self.levels().get(index).copied()
    }

    /// `level` is zero-based.
    pub fn score(&self, level: usize, solved: bool, elapsed: Duration, limit: Duration) -> u32
    {
        if !solved {
            return 0;
        }
        match self {
            PuzzleVariant::Picture => PICTURE_POINTS,
            PuzzleVariant::Slide => {
                let fraction = elapsed.as_secs_f64() / limit.as_secs_f64().max(f64::EPSILON);
                let raw = ((level + 1) as f64 * 5.0 * (1.0 - fraction)).floor();
                raw.max(1.0) as u32
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PuzzleRound
{
    pub level: usize,
    pub limit: Duration,
    pub board: Board,
}

pub struct PuzzleGame
{
    variant: PuzzleVariant,
    index: Option<usize>,
}

impl PuzzleGame
{
    pub fn new(variant: PuzzleVariant) -> Self
    {
        Self {
            variant,
            index: None,
        }
    }

    pub fn variant(&self) -> PuzzleVariant
    {
        self.variant
    }

    pub fn level_count(&self) -> usize
    {
        self.variant.levels().len()
    }
}

impl Assessment for PuzzleGame
{
    type Stimulus = PuzzleRound;
    type Response = Board;

    fn name(&self) -> &str
    {
        GAME_NAME
    }

    fn begin(&mut self)
    {
        self.index = None;
    }

    fn stimulus(&mut self, draw: Draw, rng: &mut StdRng) -> Option<PuzzleRound>
    {
        let next = match (draw, self.index) {
            (Draw::Repeat, Some(index)) => index,
            (_, Some(index)) => index + 1,
            (_, None) => 0,
        };
        let level = self.variant.level(next)?;
        self.index = Some(next);
        Some(PuzzleRound {
            level: next,
            limit: level.limit,
            board: Board::shuffled(level.rows, level.cols, rng),
        })
    }

    fn presentation(&self, _stimulus: &PuzzleRound) -> Presentation
    {
        Presentation::UntilInput
    }

    fn response_limit(&self, stimulus: &PuzzleRound) -> Option<Duration>
    {
        Some(stimulus.limit)
    }

    fn validate(&self, response: &Board) -> Result<(), String>
    {
        if !response.is_solved() {
            return Err("The picture is not complete yet".to_string());
        }
        Ok(())
    }

    fn evaluate(&self, stimulus: &PuzzleRound, response: &Board, elapsed: Duration) -> Verdict
    {
        let same_shape = response.rows() == stimulus.board.rows()
            && response.cols() == stimulus.board.cols();
        let solved = same_shape && response.is_solved();
        let score = self
            .variant
            .score(stimulus.level, solved, elapsed, stimulus.limit);
        Verdict {
            is_correct: solved,
            score: score as f64,
            answer: Some(response.answer()),
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
    use rand::SeedableRng;

    #[test]
    fn test_shuffled_boards_are_solvable_and_unsolved()
    {
        for variant in [PuzzleVariant::Slide, PuzzleVariant::Picture] {
            for level in variant.levels() {
                for seed in 0..200 {
                    let mut rng = StdRng::seed_from_u64(seed);
                    let board = Board::shuffled(level.rows, level.cols, &mut rng);
                    assert!(board.is_solvable(), "{variant:?} {level:?} seed {seed}");
                    assert!(!board.is_solved());
                }
            }
        }
    }

    #[test]
    fn test_solved_board_is_solvable()
    {
        for (rows, cols) in [(2, 2), (3, 3), (4, 4), (2, 3), (3, 4)] {
            let board = Board::solved(rows, cols);
            assert!(board.is_solved());
            assert!(board.is_solvable());
            assert_eq!(board.inversions(), 0);
        }
    }

    #[test]
    fn test_single_swap_is_unsolvable()
    {
        let board = Board::from_tiles(3, 3, vec![
            Some(2),
            Some(1),
            Some(3),
            Some(4),
            Some(5),
            Some(6),
            Some(7),
            Some(8),
            None,
        ])
        .unwrap();
        assert!(!board.is_solvable());

        let board =
            Board::from_tiles(2, 2, vec![Some(2), Some(1), Some(3), None]).unwrap();
        assert!(!board.is_solvable());
    }

    #[test]
    fn test_even_width_counts_blank_row()
    {
        // Blank on the top row after one legal move.
        let mut board = Board::solved(2, 2);
        assert!(board.slide_toward(Direction::Down));
        assert_eq!(board.tiles(), &[Some(1), None, Some(3), Some(2)]);
        assert!(board.is_solvable());
    }

    #[test]
    fn test_slide_only_adjacent_tiles()
    {
        let mut board = Board::solved(3, 3);
        assert!(!board.is_valid_move(0));
        assert!(!board.slide(4));
        assert!(board.slide(7));
        assert_eq!(board.blank(), 7);
        assert!(board.slide(8));
        assert!(board.is_solved());
        assert!(!board.slide(42));
    }

    #[test]
    fn test_slide_toward_edges()
    {
        let mut board = Board::solved(2, 2);
        assert!(!board.slide_toward(Direction::Up));
        assert!(!board.slide_toward(Direction::Left));
        assert!(board.slide_toward(Direction::Right));
        assert_eq!(board.blank(), 2);
    }

    #[test]
    fn test_from_tiles_rejects_bad_sets()
    {
        assert!(Board::from_tiles(2, 2, vec![Some(1), Some(1), Some(3), None]).is_none());
        assert!(Board::from_tiles(2, 2, vec![Some(1), Some(2), Some(4), None]).is_none());
        assert!(Board::from_tiles(2, 2, vec![Some(1), Some(2), None]).is_none());
        assert!(Board::from_tiles(2, 2, vec![Some(1), None, Some(3), None]).is_none());
    }

    #[test]
    fn test_slide_scoring()
    {
        let variant = PuzzleVariant::Slide;
        let limit = Duration::from_secs(60);
        assert_eq!(variant.score(0, true, Duration::ZERO, limit), 5);
        assert_eq!(variant.score(0, true, Duration::from_secs(30), limit), 2);
        assert_eq!(variant.score(0, true, Duration::from_secs(59), limit), 1);
        assert_eq!(variant.score(4, true, Duration::ZERO, Duration::from_secs(240)), 25);
        assert_eq!(variant.score(0, false, Duration::ZERO, limit), 0);
    }

    #[test]
    fn test_picture_scoring_is_flat()
    {
        let variant = PuzzleVariant::Picture;
        let limit = Duration::from_secs(60);
        assert_eq!(variant.score(3, true, Duration::from_secs(50), limit), PICTURE_POINTS);
        assert_eq!(variant.score(3, false, Duration::from_secs(50), limit), 0);
    }

    #[test]
    fn test_levels_follow_variant_tables()
    {
        let slide = PuzzleVariant::Slide.levels();
        assert_eq!(slide.len(), 5);
        assert_eq!((slide[3].rows, slide[3].cols), (4, 4));
        assert_eq!(slide[1].limit, Duration::from_secs(90));

        let picture = PuzzleVariant::Picture.levels();
        let shapes: Vec<(usize, usize)> = picture
            .iter()
            .map(|level| (level.rows, level.cols))
            .collect();
        assert_eq!(shapes, vec![(2, 1), (2, 2), (3, 2), (4, 2), (4, 3)]);
        assert_eq!(picture[4].limit, Duration::from_secs(300));
    }

    #[test]
    fn test_unsolved_board_is_rejected_but_scores_zero_on_timeout()
    {
        let mut game = PuzzleGame::new(PuzzleVariant::Slide);
        let mut rng = StdRng::seed_from_u64(9);
        let round = game.stimulus(Draw::Next, &mut rng).unwrap();
        assert!(game.validate(&round.board).is_err());

        let verdict = game.evaluate(&round, &round.board, Duration::from_secs(60));
        assert!(!verdict.is_correct);
        assert_eq!(verdict.score, 0.0);

        let solved = Board::solved(2, 2);
        let verdict = game.evaluate(&round, &solved, Duration::from_secs(30));
        assert!(verdict.is_correct);
        assert_eq!(verdict.score, 2.0);
    }

    #[test]
    fn test_single_column_board_slides_vertically()
    {
        let mut rng = StdRng::seed_from_u64(1);
        let mut board = Board::shuffled(2, 1, &mut rng);
        assert_eq!(board.tiles(), &[None, Some(1)]);
        assert!(!board.slide_toward(Direction::Left));
        assert!(board.slide_toward(Direction::Up));
        assert!(board.is_solved());
    }
}
