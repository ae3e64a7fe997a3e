use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};

use super::{
    Flow, Lifecycle, RESET, Screen, ansi_fg, countdown, feedback_lines, header, intro_lines,
    lifecycle_key, notice_line, summary_lines,
};
use crate::games::trace::{CANVAS_HEIGHT, CANVAS_WIDTH, Point, TraceGame};
use crate::progression::{Controller, Phase, ProgressionError, Tick};
use crate::store::SessionStore;

const COLS: usize = 50;
const ROWS: usize = 15;
const CELL_W: f64 = CANVAS_WIDTH / COLS as f64;
const CELL_H: f64 = CANVAS_HEIGHT / ROWS as f64;
/// Screen position of the canvas' top-left cell. Must match `render`.
const CANVAS_TOP: u16 = 6;
const CANVAS_LEFT: u16 = 1;
const PEN_STEP: f64 = 10.0;

pub struct TraceScreen<S>
{
    controller: Controller<TraceGame, S>,
    points: Vec<Point>,
    notice: Option<String>,
}

impl<S: SessionStore> TraceScreen<S>
{
    pub fn new(store: S, key: String) -> Self
    {
        Self {
            controller: Controller::new(TraceGame::new(), store, key),
            points: Vec::new(),
            notice: None,
        }
    }

    fn drawing(&self) -> bool
    {
        matches!(self.controller.phase(), Phase::AwaitingInput { .. })
    }

    fn extend_with_pen(&mut self, dx: f64, dy: f64)
    {
        let from = self
            .points
            .last()
            .copied()
            .unwrap_or(Point::new(CANVAS_WIDTH / 2.0, CANVAS_HEIGHT / 2.0));
        if self.points.is_empty() {
            self.points.push(from);
        }
        self.points
            .push(Point::new(from.x + dx, from.y + dy).clamped());
    }

    fn submit(&mut self, now: Instant)
    {
        match self.controller.submit(self.points.clone(), now) {
            Ok(_) => self.notice = self.controller.take_notice(),
            Err(ProgressionError::Rejected(reason)) => self.notice = Some(reason),
            Err(_) => {}
        }
    }

    fn render_canvas(&self, reference: &[Point]) -> Vec<String>
    {
        let mut grid = vec![vec![' '; COLS]; ROWS];
        for pair in reference.windows(2) {
            for point in sample_segment(pair[0], pair[1]) {
                let (row, col) = to_cell(point);
                grid[row][col] = '.';
            }
        }
        for pair in self.points.windows(2) {
            for point in sample_segment(pair[0], pair[1]) {
                let (row, col) = to_cell(point);
                grid[row][col] = '#';
            }
        }
        if let Some(point) = self.points.last() {
            let (row, col) = to_cell(*point);
            grid[row][col] = '@';
        }

        let ink = ansi_fg((90, 200, 255));
        let guide = ansi_fg((120, 120, 120));
        let mut lines = vec![format!("+{}+", "-".repeat(COLS))];
        for row in grid {
            let mut line = String::from("|");
            for ch in row {
                match ch {
                    '.' => line.push_str(&format!("{guide}.{RESET}")),
                    '#' | '@' => line.push_str(&format!("{ink}{ch}{RESET}")),
                    other => line.push(other),
                }
            }
            line.push('|');
            lines.push(line);
        }
        lines.push(format!("+{}+", "-".repeat(COLS)));
        lines
    }
}

fn to_cell(point: Point) -> (usize, usize)
{
    let col = (point.x / CELL_W).floor().clamp(0.0, (COLS - 1) as f64) as usize;
    let row = (point.y / CELL_H).floor().clamp(0.0, (ROWS - 1) as f64) as usize;
    (row, col)
}

fn from_cell(column: u16, row: u16) -> Option<Point>
{
    let col = column.checked_sub(CANVAS_LEFT)? as usize;
    let row = row.checked_sub(CANVAS_TOP)? as usize;
    if col >= COLS || row >= ROWS {
        return None;
    }
    Some(Point::new(
        (col as f64 + 0.5) * CELL_W,
        (row as f64 + 0.5) * CELL_H,
    ))
}

fn sample_segment(from: Point, to: Point) -> Vec<Point>
{
    let steps = (from.distance(&to) / 4.0).ceil().max(1.0) as usize;
    (0..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            Point::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t)
        })
        .collect()
}

impl<S: SessionStore> Screen for TraceScreen<S>
{
    fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Flow
    {
        match lifecycle_key(&mut self.controller, key.code, now) {
            Lifecycle::Quit => return Flow::Quit,
            Lifecycle::NewItem => {
                self.notice = self.controller.take_notice();
                self.points.clear();
                return Flow::Continue;
            }
            Lifecycle::Handled => return Flow::Continue,
            Lifecycle::Unhandled => {}
        }

        if !self.drawing() {
            return Flow::Continue;
        }
        match key.code {
            KeyCode::Up => self.extend_with_pen(0.0, -PEN_STEP),
            KeyCode::Down => self.extend_with_pen(0.0, PEN_STEP),
            KeyCode::Left => self.extend_with_pen(-PEN_STEP, 0.0),
            KeyCode::Right => self.extend_with_pen(PEN_STEP, 0.0),
            KeyCode::Char('c') => self.points.clear(),
            KeyCode::Enter => self.submit(now),
            _ => {}
        }
        Flow::Continue
    }

    fn handle_mouse(&mut self, mouse: MouseEvent, _now: Instant)
    {
        if !self.drawing() {
            return;
        }
        let pressed = matches!(
            mouse.kind,
            MouseEventKind::Down(MouseButton::Left) | MouseEventKind::Drag(MouseButton::Left)
        );
        if !pressed {
            return;
        }
        if let Some(point) = from_cell(mouse.column, mouse.row) {
            if self.points.last() != Some(&point) {
                self.points.push(point);
            }
        }
    }

    fn tick(&mut self, now: Instant)
    {
        if self.controller.tick(now) == Tick::TimeUp
            && self.controller.time_up(self.points.clone(), now).is_ok()
        {
            self.notice = Some("Time's up!".to_string());
        }
    }

    fn render(&self, now: Instant) -> Vec<String>
    {
        let phase = self.controller.phase();
        let mut lines = header("Pattern Trace", phase);

        match phase {
            Phase::Intro => lines.extend(intro_lines(
                "Trace over the dotted guide shape as closely as you can.",
                &[
                    "Drag with the left mouse button to draw",
                    "Arrow keys extend the line from its end",
                    "c clears the drawing, Enter submits",
                ],
            )),
            Phase::Completed => lines.extend(summary_lines(self.controller.record())),
            _ => {
                let reference: &[Point] = match self.controller.stimulus() {
                    Some(pattern) => {
                        lines.push(format!(
                            "Pattern {}/{}: {}  Points: {}  {}",
                            pattern.id,
                            self.controller.game().pattern_count(),
                            pattern.name,
                            self.points.len(),
                            countdown(self.controller.time_left(now))
                        ));
                        pattern.points.as_slice()
                    }
                    None => {
                        lines.push(String::new());
                        &[]
                    }
                };
                lines.push(String::new());
                lines.extend(self.render_canvas(reference));
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
