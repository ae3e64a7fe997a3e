use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent};

use super::{
    Flow, Lifecycle, RESET, Screen, ansi_fg, feedback_lines, header, intro_lines, lifecycle_key,
    notice_line, summary_lines,
};
use crate::games::digit_span::{DigitSpanGame, RecallMode};
use crate::progression::{Controller, Phase, ProgressionError};
use crate::store::SessionStore;

pub struct DigitSpanScreen<S>
{
    controller: Controller<DigitSpanGame, S>,
    input: String,
    notice: Option<String>,
}

impl<S: SessionStore> DigitSpanScreen<S>
{
    pub fn new(store: S, key: String, start: RecallMode, display: Duration) -> Self
    {
        Self {
            controller: Controller::new(DigitSpanGame::new(start, display), store, key),
            input: String::new(),
            notice: None,
        }
    }

    fn submit(&mut self, now: Instant)
    {
        match self.controller.submit(self.input.clone(), now) {
            Ok(_) => self.notice = self.controller.take_notice(),
            Err(ProgressionError::Rejected(reason)) => self.notice = Some(reason),
            Err(_) => {}
        }
    }

    fn render_round(&self, lines: &mut Vec<String>)
    {
        let Some(sequence) = self.controller.stimulus() else {
            return;
        };
        if sequence.mode_changed {
            lines.push(format!(
                "{}Now: {}{RESET}",
                ansi_fg((240, 190, 40)),
                sequence.mode.title()
            ));
        }
        lines.push(format!(
            "{}  |  {} digits",
            sequence.mode.title(),
            sequence.digits.len()
        ));
        lines.push(String::new());

        if self.controller.is_stimulus_visible() {
            let spaced: Vec<String> = sequence.digits.iter().map(|d| d.to_string()).collect();
            lines.push(format!("    {}", spaced.join("   ")));
            lines.push(String::new());
            lines.push("Memorise the sequence...".to_string());
        } else if matches!(self.controller.phase(), Phase::AwaitingInput { .. }) {
            lines.push(format!("{}:", sequence.mode.instruction()));
            lines.push(format!("> {}_", self.input));
            lines.push(String::new());
            lines.push("Enter submits. Backspace edits.".to_string());
        } else if let Some(result) = self.controller.last_result() {
            lines.push(format!("Sequence was: {}", sequence.as_text()));
            lines.push(format!("You typed:    {}", self.input));
            lines.extend(feedback_lines(result));
        }
    }

    fn render_report(&self, lines: &mut Vec<String>)
    {
        let record = self.controller.record();
        lines.extend(summary_lines(record));
        let report = self.controller.game().report(record);
        lines.push(String::new());
        lines.push(format!(
            "Longest span forward: {}  reverse: {}",
            report.longest_forward, report.longest_reverse
        ));
        lines.push(format!("Recall index: {}", report.recall_index));
        lines.push(report.suggestion.to_string());
    }
}

impl<S: SessionStore> Screen for DigitSpanScreen<S>
{
    fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Flow
    {
        let awaiting = matches!(self.controller.phase(), Phase::AwaitingInput { .. });
        // While typing, Enter belongs to the answer, not to the lifecycle.
        if !awaiting || key.code == KeyCode::Esc {
            match lifecycle_key(&mut self.controller, key.code, now) {
                Lifecycle::Quit => return Flow::Quit,
                Lifecycle::NewItem => {
                    self.notice = self.controller.take_notice();
                    self.input.clear();
                    return Flow::Continue;
                }
                Lifecycle::Handled | Lifecycle::Unhandled => return Flow::Continue,
            }
        }

        match key.code {
            KeyCode::Char(ch) if ch.is_ascii_digit() => {
                if self.input.len() < 16 {
                    self.input.push(ch);
                }
            }
            KeyCode::Backspace => {
                self.input.pop();
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

    fn render(&self, _now: Instant) -> Vec<String>
    {
        let phase = self.controller.phase();
        let mut lines = header("Digit Span", phase);
        match phase {
            Phase::Intro => lines.extend(intro_lines(
                "A sequence of digits appears for a few seconds. Type it back from memory.",
                &[
                    "Forward rounds: type the digits in order",
                    "Reverse rounds: type them backwards",
                    "Sequences grow by one digit after each correct answer",
                    "Digits and Backspace edit, Enter submits",
                ],
            )),
            Phase::Completed => self.render_report(&mut lines),
            _ => self.render_round(&mut lines),
        }
        lines.push(String::new());
        lines.push(notice_line(&self.notice));
        lines
    }
}
