use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent};

use super::{
    Flow, Lifecycle, Screen, countdown, feedback_lines, header, intro_lines, lifecycle_key,
    notice_line, summary_lines, swatch,
};
use crate::games::pass_along::{Cell, PassAlongGame, SIZE, Tray, initial_tray, slide_into_gap};
use crate::progression::{Controller, Phase, ProgressionError, Tick};
use crate::store::SessionStore;

pub struct PassAlongScreen<S>
{
    controller: Controller<PassAlongGame, S>,
    tray: Tray,
    cursor: (usize, usize),
    notice: Option<String>,
}

impl<S: SessionStore> PassAlongScreen<S>
{
    pub fn new(store: S, key: String) -> Self
    {
        Self {
            controller: Controller::new(PassAlongGame::new(), store, key),
            tray: initial_tray(),
            cursor: (0, 0),
            notice: None,
        }
    }

    fn submit(&mut self, now: Instant)
    {
        match self.controller.submit(self.tray, now) {
            Ok(_) => self.notice = self.controller.take_notice(),
            Err(ProgressionError::Rejected(reason)) => self.notice = Some(reason),
            Err(_) => {}
        }
    }
}

fn cell_color(cell: Cell) -> Option<(u8, u8, u8)>
{
    match cell {
        Cell::Red => Some((200, 30, 30)),
        Cell::Blue => Some((40, 80, 220)),
        Cell::Empty => None,
    }
}

fn render_trays(tray: &Tray, target: &Tray, cursor: Option<(usize, usize)>) -> Vec<String>
{
    let mut lines = vec![format!("{:<20}{}", "Your tray", "Design")];
    for row in 0..SIZE {
        let mut line = String::new();
        for col in 0..SIZE {
            let label = if cursor == Some((row, col)) { "[]" } else { "" };
            let empty_label = if label.is_empty() { " . " } else { label };
            let cell = tray[row][col];
            line.push_str(&match cell_color(cell) {
                Some(rgb) => swatch(Some(rgb), label),
                None => swatch(None, empty_label),
            });
        }
        line.push_str(&" ".repeat(20 - SIZE * 4));
        for col in 0..SIZE {
            let cell = target[row][col];
            line.push_str(&swatch(cell_color(cell), if cell == Cell::Empty { " . " } else { "" }));
        }
        lines.push(line);
    }
    lines
}

impl<S: SessionStore> Screen for PassAlongScreen<S>
{
    fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Flow
    {
        match lifecycle_key(&mut self.controller, key.code, now) {
            Lifecycle::Quit => return Flow::Quit,
            Lifecycle::NewItem => {
                self.notice = self.controller.take_notice();
                self.tray = initial_tray();
                self.cursor = (0, 0);
                return Flow::Continue;
            }
            Lifecycle::Handled => return Flow::Continue,
            Lifecycle::Unhandled => {}
        }

        if !matches!(self.controller.phase(), Phase::AwaitingInput { .. }) {
            return Flow::Continue;
        }
        let (row, col) = self.cursor;
        match key.code {
            KeyCode::Up => self.cursor = (row.saturating_sub(1), col),
            KeyCode::Down => self.cursor = ((row + 1).min(SIZE - 1), col),
            KeyCode::Left => self.cursor = (row, col.saturating_sub(1)),
            KeyCode::Right => self.cursor = (row, (col + 1).min(SIZE - 1)),
            KeyCode::Enter => {
                if !slide_into_gap(&mut self.tray, self.cursor) {
                    self.notice = Some("Blocks can only slide into the empty space".to_string());
                } else {
                    self.notice = None;
                }
            }
            KeyCode::Char('s') => self.submit(now),
            _ => {}
        }
        Flow::Continue
    }

    fn tick(&mut self, now: Instant)
    {
        if self.controller.tick(now) == Tick::TimeUp && self.controller.time_up(self.tray, now).is_ok() {
            self.notice = Some("Time's up!".to_string());
        }
    }

    fn render(&self, now: Instant) -> Vec<String>
    {
        let phase = self.controller.phase();
        let mut lines = header("Pass-Along", phase);

        match phase {
            Phase::Intro => lines.extend(intro_lines(
                "Slide the red and blue blocks until your tray matches the design.",
                &[
                    "Arrows move the cursor",
                    "Enter slides the block under the cursor into the gap",
                    "s submits the tray",
                ],
            )),
            Phase::Completed => lines.extend(summary_lines(self.controller.record())),
            _ => {
                if let Some(design) = self.controller.stimulus() {
                    lines.push(format!(
                        "Design {}/{}  {}",
                        design.id,
                        self.controller.game().design_count(),
                        countdown(self.controller.time_left(now))
                    ));
                    lines.push(String::new());
                    let cursor = matches!(phase, Phase::AwaitingInput { .. }).then_some(self.cursor);
                    lines.extend(render_trays(&self.tray, &design.target, cursor));
                }
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
