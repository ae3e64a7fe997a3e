use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent};

use super::{
    Flow, Lifecycle, Screen, countdown, feedback_lines, header, intro_lines, lifecycle_key,
    notice_line, summary_lines, swatch,
};
use crate::games::puzzle::{Board, Direction, PuzzleGame, PuzzleVariant};
use crate::progression::{Controller, Phase, Tick};
use crate::store::SessionStore;

pub struct PuzzleScreen<S>
{
    controller: Controller<PuzzleGame, S>,
    board: Option<Board>,
    moves: u32,
    notice: Option<String>,
}

impl<S: SessionStore> PuzzleScreen<S>
{
    pub fn new(store: S, key: String, variant: PuzzleVariant) -> Self
    {
        Self {
            controller: Controller::new(PuzzleGame::new(variant), store, key),
            board: None,
            moves: 0,
            notice: None,
        }
    }

    fn reset_board(&mut self)
    {
        self.board = self.controller.stimulus().map(|round| round.board.clone());
        self.moves = 0;
    }

    fn slide(&mut self, direction: Direction, now: Instant)
    {
        let Some(board) = self.board.as_mut() else {
            return;
        };
        if !board.slide_toward(direction) {
            return;
        }
        self.moves += 1;
        if board.is_solved() {
            let finished = board.clone();
            if self.controller.submit(finished, now).is_ok() {
                self.notice = self.controller.take_notice();
            }
        }
    }

    fn render_board(&self, lines: &mut Vec<String>)
    {
        let Some(board) = &self.board else {
            return;
        };
        let count = board.tiles().len() as f64;
        for row in board.tiles().chunks(board.cols()) {
            let cells: String = row
                .iter()
                .map(|tile| match tile {
                    Some(value) => swatch(Some(tile_color(*value, count)), &value.to_string()),
                    None => swatch(None, ""),
                })
                .collect();
            lines.push(format!("  {cells}"));
            lines.push(format!("  {cells}"));
        }
    }
}

/// Gradient keyed on the tile's home position, so a solved board reads as
/// one continuous picture.
fn tile_color(value: u32, count: f64) -> (u8, u8, u8)
{
    let t = (value as f64 - 1.0) / (count - 1.0).max(1.0);
    let r = 40.0 + 200.0 * t;
    let g = 90.0 + 110.0 * (1.0 - (2.0 * t - 1.0).abs());
    let b = 220.0 - 170.0 * t;
    (r as u8, g as u8, b as u8)
}

impl<S: SessionStore> Screen for PuzzleScreen<S>
{
    fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Flow
    {
        match lifecycle_key(&mut self.controller, key.code, now) {
            Lifecycle::Quit => return Flow::Quit,
            Lifecycle::NewItem => {
                self.notice = self.controller.take_notice();
                self.reset_board();
                return Flow::Continue;
            }
            Lifecycle::Handled => return Flow::Continue,
            Lifecycle::Unhandled => {}
        }

        if !matches!(self.controller.phase(), Phase::AwaitingInput { .. }) {
            return Flow::Continue;
        }
        let direction = match key.code {
            KeyCode::Up => Direction::Up,
            KeyCode::Down => Direction::Down,
            KeyCode::Left => Direction::Left,
            KeyCode::Right => Direction::Right,
            _ => return Flow::Continue,
        };
        self.slide(direction, now);
        Flow::Continue
    }

    fn tick(&mut self, now: Instant)
    {
        if self.controller.tick(now) != Tick::TimeUp {
            return;
        }
        let Some(board) = self.board.clone() else {
            return;
        };
        if self.controller.time_up(board, now).is_ok() {
            self.notice = Some("Time's up!".to_string());
            if let Some(notice) = self.controller.take_notice() {
                self.notice = Some(notice);
            }
        }
    }

    fn render(&self, now: Instant) -> Vec<String>
    {
        let phase = self.controller.phase();
        let game = self.controller.game();
        let title = match game.variant() {
            PuzzleVariant::Picture => "Picture Construction",
            PuzzleVariant::Slide => "Sliding Puzzle",
        };
        let mut lines = header(title, phase);

        match phase {
            Phase::Intro => lines.extend(intro_lines(
                "Slide the tiles back into order before the timer runs out.",
                &[
                    "Arrow keys slide a tile into the gap",
                    "The round ends as soon as the picture is complete",
                    "n moves on to the next level after a round",
                ],
            )),
            Phase::Completed => lines.extend(summary_lines(self.controller.record())),
            _ => {
                if let Some(round) = self.controller.stimulus() {
                    lines.push(format!(
                        "Level {}/{}  Moves: {}  {}",
                        round.level + 1,
                        game.level_count(),
                        self.moves,
                        countdown(self.controller.time_left(now))
                    ));
                }
                lines.push(String::new());
                self.render_board(&mut lines);
                if phase == Phase::Feedback {
                    if let Some(result) = self.controller.last_result() {
                        lines.extend(feedback_lines(result));
                    }
                }
            }
        }

        lines.push(String::new());
        lines.push(notice_line(&self.notice));
        lines
    }
}
