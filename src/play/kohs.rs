use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent};

use super::{
    Flow, Lifecycle, Screen, feedback_lines, header, intro_lines, lifecycle_key, notice_line,
    summary_lines, swatch,
};
use crate::games::kohs::{BlockColor, KohsGame, Pattern, UserGrid, empty_grid};
use crate::progression::{Controller, Phase, ProgressionError};
use crate::store::SessionStore;

pub struct KohsScreen<S>
{
    controller: Controller<KohsGame, S>,
    grid: UserGrid,
    cursor: (usize, usize),
    notice: Option<String>,
}

impl<S: SessionStore> KohsScreen<S>
{
    pub fn new(store: S, key: String) -> Self
    {
        Self {
            controller: Controller::new(KohsGame::new(), store, key),
            grid: Vec::new(),
            cursor: (0, 0),
            notice: None,
        }
    }

    fn reset_grid(&mut self)
    {
        let (rows, cols) = match self.controller.stimulus() {
            Some(pattern) => dimensions(pattern),
            None => (0, 0),
        };
        self.grid = empty_grid(rows, cols);
        self.cursor = (0, 0);
    }

    fn move_cursor(&mut self, code: KeyCode)
    {
        let rows = self.grid.len();
        let cols = self.grid.first().map_or(0, |row| row.len());
        if rows == 0 || cols == 0 {
            return;
        }
        let (row, col) = self.cursor;
        self.cursor = match code {
            KeyCode::Up => (row.saturating_sub(1), col),
            KeyCode::Down => ((row + 1).min(rows - 1), col),
            KeyCode::Left => (row, col.saturating_sub(1)),
            KeyCode::Right => (row, (col + 1).min(cols - 1)),
            _ => self.cursor,
        };
    }

    fn set_cell(&mut self, value: Option<BlockColor>)
    {
        let (row, col) = self.cursor;
        if let Some(cell) = self.grid.get_mut(row).and_then(|cells| cells.get_mut(col)) {
            *cell = value;
        }
    }

    fn submit(&mut self, now: Instant)
    {
        match self.controller.submit(self.grid.clone(), now) {
            Ok(_) => self.notice = self.controller.take_notice(),
            Err(ProgressionError::Rejected(reason)) => self.notice = Some(reason),
            Err(_) => {}
        }
    }

    fn render_grids(&self) -> Vec<String>
    {
        let Some(pattern) = self.controller.stimulus() else {
            return Vec::new();
        };
        let mut lines = vec![format!("{:<24}{}", "Target", "Your design")];
        for (i, target_row) in pattern.grid.iter().enumerate() {
            let target: String = target_row
                .iter()
                .map(|color| swatch(Some(color.rgb()), ""))
                .collect();
            let padding = " ".repeat(24usize.saturating_sub(target_row.len() * 4));
            let user: String = self
                .grid
                .get(i)
                .map(|row| {
                    row.iter()
                        .enumerate()
                        .map(|(j, cell)| {
                            let label = if self.cursor == (i, j) { "[]" } else { "" };
                            match cell {
                                Some(color) => swatch(Some(color.rgb()), label),
                                None => swatch(None, if label.is_empty() { " . " } else { label }),
                            }
                        })
                        .collect()
                })
                .unwrap_or_default();
            lines.push(format!("{target}{padding}{user}"));
        }
        lines
    }
}

fn dimensions(pattern: &Pattern) -> (usize, usize)
{
    let rows = pattern.grid.len();
    let cols = pattern.grid.first().map_or(0, |row| row.len());
    (rows, cols)
}

impl<S: SessionStore> Screen for KohsScreen<S>
{
    fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Flow
    {
        match lifecycle_key(&mut self.controller, key.code, now) {
            Lifecycle::Quit => return Flow::Quit,
            Lifecycle::NewItem => {
                self.notice = self.controller.take_notice();
                self.reset_grid();
                return Flow::Continue;
            }
            Lifecycle::Handled => return Flow::Continue,
            Lifecycle::Unhandled => {}
        }

        if !matches!(self.controller.phase(), Phase::AwaitingInput { .. }) {
            return Flow::Continue;
        }
        match key.code {
            KeyCode::Up | KeyCode::Down | KeyCode::Left | KeyCode::Right => {
                self.move_cursor(key.code)
            }
            KeyCode::Char(ch @ '1'..='4') => {
                let index = ch as usize - '1' as usize;
                self.set_cell(Some(BlockColor::ALL[index]));
            }
            KeyCode::Backspace | KeyCode::Delete => self.set_cell(None),
            KeyCode::Char('x') => {
                let cursor = self.cursor;
                self.reset_grid();
                self.cursor = cursor;
            }
            KeyCode::Enter => self.submit(now),
            _ => {}
        }
        Flow::Continue
    }

    fn tick(&mut self, now: Instant)
    {
        self.controller.tick(now);
    }

    fn render(&self, now: Instant) -> Vec<String>
    {
        let phase = self.controller.phase();
        let mut lines = header("Kohs Block Design", phase);

        match phase {
            Phase::Intro => lines.extend(intro_lines(
                "Rebuild each coloured pattern on the empty grid as quickly as you can.",
                &[
                    "Arrows move the cursor",
                    "1 red, 2 white, 3 blue, 4 yellow",
                    "Backspace clears a cell, x clears the grid",
                    "Enter submits",
                ],
            )),
            Phase::Completed => lines.extend(summary_lines(self.controller.record())),
            _ => {
                if let Some(pattern) = self.controller.stimulus() {
                    lines.push(format!(
                        "Pattern {}/{}: {} ({})",
                        pattern.id,
                        self.controller.game().pattern_count(),
                        pattern.name,
                        pattern.difficulty
                    ));
                }
                if let Some(elapsed) = self.controller.elapsed(now) {
                    lines.push(format!("Elapsed: {}s", elapsed.as_secs()));
                }
                lines.push(String::new());
                lines.extend(self.render_grids());
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
