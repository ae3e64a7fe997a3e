use std::time::Duration;

use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::progression::{Assessment, Draw, Presentation, Step, Verdict};
use crate::session::{Answer, SessionRecord};

pub const GAME_NAME: &str = "MemoryTest";
pub const START_LENGTH: usize = 3;
pub const DEFAULT_DISPLAY: Duration = Duration::from_millis(3000);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecallMode
{
    Forward,
    Reverse,
}

impl RecallMode
{
    pub fn max_digits(&self) -> usize
    {
        match self {
            RecallMode::Forward => 9,
            RecallMode::Reverse => 6,
        }
    }

    pub fn title(&self) -> &'static str
    {
        match self {
            RecallMode::Forward => "Forward Recall",
            RecallMode::Reverse => "Reverse Recall",
        }
    }

    pub fn instruction(&self) -> &'static str
    {
        match self {
            RecallMode::Forward => "Enter the numbers in order",
            RecallMode::Reverse => "Enter the numbers in reverse",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigitSequence
{
    pub digits: Vec<u8>,
    pub mode: RecallMode,
    /// First sequence after switching into this mode.
    pub mode_changed: bool,
}

impl DigitSequence
{
    pub fn as_text(&self) -> String
    {
        self.digits.iter().map(|d| char::from(b'0' + d)).collect()
    }

    pub fn expected_answer(&self) -> String
    {
        let mut text = self.as_text();
        if self.mode == RecallMode::Reverse {
            text = text.chars().rev().collect();
        }
        text
    }
}

pub fn generate_sequence(length: usize, rng: &mut impl Rng) -> Vec<u8>
{
    (0..length).map(|_| rng.gen_range(0..9u8)).collect()
}

pub fn normalize_answer(answer: &str) -> String
{
    answer.chars().filter(|ch| !ch.is_whitespace()).collect()
}

pub fn is_recall_correct(sequence: &str, mode: RecallMode, answer: &str) -> bool
{
    let expected: String = match mode {
        RecallMode::Forward => normalize_answer(sequence),
        RecallMode::Reverse => normalize_answer(sequence).chars().rev().collect(),
    };
    normalize_answer(answer) == expected
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpanOutcome
{
    Longer(usize),
    SameLength(usize),
    SwitchMode(RecallMode),
    Finished,
}

/// Difficulty policy: grow on success, allow one miss per level, then
/// branch to reverse mode or finish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpanPolicy
{
    mode: RecallMode,
    length: usize,
    misses: u32,
    finished: bool,
}

impl SpanPolicy
{
    pub fn new(mode: RecallMode) -> Self
    {
        Self {
            mode,
            length: START_LENGTH,
            misses: 0,
            finished: false,
        }
    }

    pub fn mode(&self) -> RecallMode
    {
        self.mode
    }

    pub fn length(&self) -> usize
    {
        self.length
    }

    pub fn is_finished(&self) -> bool
    {
        self.finished
    }

    pub fn record(&mut self, correct: bool) -> SpanOutcome
    {
        if self.finished {
            return SpanOutcome::Finished;
        }
        if correct {
            self.misses = 0;
            if self.length < self.mode.max_digits() {
                self.length += 1;
                return SpanOutcome::Longer(self.length);
            }
            return self.leave_mode();
        }

        self.misses += 1;
        if self.misses >= 2 {
            return self.leave_mode();
        }
        SpanOutcome::SameLength(self.length)
    }

    fn leave_mode(&mut self) -> SpanOutcome
    {
        match self.mode {
            RecallMode::Forward => {
                self.mode = RecallMode::Reverse;
                self.length = START_LENGTH;
                self.misses = 0;
                SpanOutcome::SwitchMode(RecallMode::Reverse)
            }
            RecallMode::Reverse => {
                self.finished = true;
                SpanOutcome::Finished
            }
        }
    }
}

pub struct DigitSpanGame
{
    start_mode: RecallMode,
    display: Duration,
    policy: SpanPolicy,
    current: Option<DigitSequence>,
    mode_changed: bool,
    longest_forward: usize,
    longest_reverse: usize,
    /// Policy and spans as they stood when `current` was drawn. A repeat
    /// rewinds to it, so a replaced answer is only counted once.
    before_current: Option<(SpanPolicy, usize, usize)>,
}

impl DigitSpanGame
{
    pub fn new(start_mode: RecallMode, display: Duration) -> Self
    {
        Self {
            start_mode,
            display,
            policy: SpanPolicy::new(start_mode),
            current: None,
            mode_changed: true,
            longest_forward: 0,
            longest_reverse: 0,
            before_current: None,
        }
    }

    pub fn policy(&self) -> &SpanPolicy
    {
        &self.policy
    }

    pub fn display(&self) -> Duration
    {
        self.display
    }

    pub fn report(&self, record: &SessionRecord) -> SpanReport
    {
        let correct = record.correct_count();
        let total = record.len();
        SpanReport {
            longest_forward: self.longest_forward,
            longest_reverse: self.longest_reverse,
            correct,
            total,
            recall_index: recall_index(correct, total),
            suggestion: suggestion(correct, total),
        }
    }
}

impl Default for DigitSpanGame
{
    fn default() -> Self
    {
        Self::new(RecallMode::Forward, DEFAULT_DISPLAY)
    }
}

impl Assessment for DigitSpanGame
{
    type Stimulus = DigitSequence;
    type Response = String;

    fn name(&self) -> &str
    {
        GAME_NAME
    }

    fn begin(&mut self)
    {
        self.policy = SpanPolicy::new(self.start_mode);
        self.current = None;
        self.mode_changed = true;
        self.longest_forward = 0;
        self.longest_reverse = 0;
        self.before_current = None;
    }

    fn stimulus(&mut self, draw: Draw, rng: &mut StdRng) -> Option<DigitSequence>
    {
        if let (Draw::Repeat, Some(current), Some(before)) =
            (draw, &self.current, &self.before_current)
        {
            let (policy, longest_forward, longest_reverse) = before.clone();
            self.policy = policy;
            self.longest_forward = longest_forward;
            self.longest_reverse = longest_reverse;
            self.mode_changed = false;
            let sequence = DigitSequence {
                digits: generate_sequence(current.digits.len(), rng),
                mode: current.mode,
                mode_changed: false,
            };
            self.current = Some(sequence.clone());
            return Some(sequence);
        }

        if self.policy.is_finished() {
            return None;
        }
        let sequence = DigitSequence {
            digits: generate_sequence(self.policy.length(), rng),
            mode: self.policy.mode(),
            mode_changed: self.mode_changed,
        };
        self.mode_changed = false;
        self.before_current = Some((
            self.policy.clone(),
            self.longest_forward,
            self.longest_reverse,
        ));
        self.current = Some(sequence.clone());
        Some(sequence)
    }

    fn presentation(&self, _stimulus: &DigitSequence) -> Presentation
    {
        Presentation::Timed(self.display)
    }

    fn validate(&self, response: &String) -> Result<(), String>
    {
        let answer = normalize_answer(response);
        if answer.is_empty() {
            return Err("Type the digits you remember".to_string());
        }
        if !answer.chars().all(|ch| ch.is_ascii_digit()) {
            return Err("Answers can only contain digits".to_string());
        }
        Ok(())
    }

    fn evaluate(&self, stimulus: &DigitSequence, response: &String, _elapsed: Duration) -> Verdict
    {
        let is_correct = is_recall_correct(&stimulus.as_text(), stimulus.mode, response);
        Verdict {
            is_correct,
            score: if is_correct { 1.0 } else { 0.0 },
            answer: Some(Answer::Text(normalize_answer(response))),
        }
    }

    fn advance_policy(&mut self, verdict: &Verdict) -> Step
    {
        if verdict.is_correct {
            if let Some(current) = &self.current {
                let longest = match current.mode {
                    RecallMode::Forward => &mut self.longest_forward,
                    RecallMode::Reverse => &mut self.longest_reverse,
                };
                *longest = (*longest).max(current.digits.len());
            }
        }
        match self.policy.record(verdict.is_correct) {
            SpanOutcome::SwitchMode(_) => {
                self.mode_changed = true;
                Step::Continue
            }
            SpanOutcome::Finished => Step::Complete,
            _ => Step::Continue,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpanReport
{
    pub longest_forward: usize,
    pub longest_reverse: usize,
    pub correct: usize,
    pub total: usize,
    pub recall_index: i64,
    pub suggestion: &'static str,
}

pub fn recall_index(correct: usize, total: usize) -> i64
{
    if total == 0 {
        return 70;
    }
    let percentage = correct as f64 / total as f64;
    let index = (100.0 + (percentage - 0.5) * 150.0).round() as i64;
    index.clamp(70, 130)
}

pub fn suggestion(correct: usize, total: usize) -> &'static str
{
    let percentage = if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    };
    if percentage >= 0.8 {
        "Excellent recall. Try longer sequences or practice with distractions."
    } else if percentage >= 0.5 {
        "Good effort. Daily practice with similar sequences will improve accuracy and speed."
    } else {
        "Start with shorter sequences and build up gradually, focusing on concentration."
    }
}
