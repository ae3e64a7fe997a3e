//! Progression controller shared by every game.
//!
//! ```text
//! Intro -> Presenting -> AwaitingInput -> Evaluating -> Feedback -> (next | Completed)
//!                ^                                          |
//!                +------------------ retry -----------------+
//! ```
//!
//! Games plug in through [`Assessment`]. The controller owns timing,
//! question numbering and recording; the game owns stimuli, scoring and
//! difficulty policy. All timers are deadlines stored on the controller, so
//! dropping it cancels them.

use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::session::{Answer, QuestionResult, SessionRecord};
use crate::store::{Recorder, SessionStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase
{
    Intro,
    Presenting
    {
        until: Instant,
    },
    AwaitingInput
    {
        opened_at: Instant,
        deadline: Option<Instant>,
        stimulus_visible: bool,
    },
    Evaluating,
    Feedback,
    Completed,
}

impl Phase
{
    pub fn label(&self) -> &'static str
    {
        match self {
            Phase::Intro => "intro",
            Phase::Presenting { .. } => "presenting",
            Phase::AwaitingInput { .. } => "awaiting input",
            Phase::Evaluating => "evaluating",
            Phase::Feedback => "feedback",
            Phase::Completed => "completed",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presentation
{
    /// Show the stimulus for a fixed time, then hide it and open input.
    Timed(Duration),
    /// Open input immediately and keep the stimulus on screen.
    UntilInput,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Draw
{
    Next,
    Repeat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step
{
    Continue,
    Complete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick
{
    Idle,
    InputOpened,
    TimeUp,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Verdict
{
    pub is_correct: bool,
    pub score: f64,
    pub answer: Option<Answer>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProgressionError
{
    #[error("cannot {action} while {phase}")]
    InvalidPhase
    {
        action: &'static str,
        phase: &'static str,
    },

    #[error("{0}")]
    Rejected(String),
}

pub trait Assessment
{
    type Stimulus;
    type Response;

    fn name(&self) -> &str;

    /// Resets difficulty and item position for a new run.
    fn begin(&mut self);

    /// `None` means the item list is exhausted.
    fn stimulus(&mut self, draw: Draw, rng: &mut StdRng) -> Option<Self::Stimulus>;

    fn presentation(&self, stimulus: &Self::Stimulus) -> Presentation;

    fn response_limit(&self, _stimulus: &Self::Stimulus) -> Option<Duration>
    {
        None
    }

    fn validate(&self, _response: &Self::Response) -> Result<(), String>
    {
        Ok(())
    }

    fn evaluate(
        &self,
        stimulus: &Self::Stimulus,
        response: &Self::Response,
        elapsed: Duration,
    ) -> Verdict;

    /// Called once per recorded result; decides whether the run goes on.
    fn advance_policy(&mut self, verdict: &Verdict) -> Step;
}

pub struct Controller<G: Assessment, S>
{
    game: G,
    recorder: Recorder<S>,
    rng: StdRng,
    phase: Phase,
    stimulus: Option<G::Stimulus>,
    question_id: u32,
    pending: Step,
    last_result: Option<QuestionResult>,
    notice: Option<String>,
}

impl<G: Assessment, S: SessionStore> Controller<G, S>
{
    pub fn new(game: G, store: S, key: impl Into<String>) -> Self
    {
        Self::with_rng(game, store, key, StdRng::from_entropy())
    }

    pub fn with_seed(game: G, store: S, key: impl Into<String>, seed: u64) -> Self
    {
        Self::with_rng(game, store, key, StdRng::seed_from_u64(seed))
    }

    fn with_rng(game: G, store: S, key: impl Into<String>, rng: StdRng) -> Self
    {
        let name = game.name().to_string();
        Self {
            game,
            recorder: Recorder::new(store, key, name),
            rng,
            phase: Phase::Intro,
            stimulus: None,
            question_id: 0,
            pending: Step::Continue,
            last_result: None,
            notice: None,
        }
    }

    pub fn phase(&self) -> Phase
    {
        self.phase
    }

    pub fn game(&self) -> &G
    {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut G
    {
        &mut self.game
    }

    pub fn stimulus(&self) -> Option<&G::Stimulus>
    {
        self.stimulus.as_ref()
    }

    pub fn question_id(&self) -> u32
    {
        self.question_id
    }

    pub fn record(&self) -> &SessionRecord
    {
        self.recorder.record()
    }

    pub fn recorder(&self) -> &Recorder<S>
    {
        &self.recorder
    }

    pub fn last_result(&self) -> Option<&QuestionResult>
    {
        self.last_result.as_ref()
    }

    pub fn take_notice(&mut self) -> Option<String>
    {
        self.notice.take()
    }

    pub fn is_stimulus_visible(&self) -> bool
    {
        match self.phase {
            Phase::Presenting { .. } => true,
            Phase::AwaitingInput {
                stimulus_visible, ..
            } => stimulus_visible,
            _ => false,
        }
    }

    /// Seconds left before the response deadline, if one is running.
    pub fn time_left(&self, now: Instant) -> Option<Duration>
    {
        match self.phase {
            Phase::AwaitingInput {
                deadline: Some(deadline),
                ..
            } => Some(deadline.saturating_duration_since(now)),
            _ => None,
        }
    }

    pub fn elapsed(&self, now: Instant) -> Option<Duration>
    {
        match self.phase {
            Phase::AwaitingInput { opened_at, .. } => Some(now.saturating_duration_since(opened_at)),
            _ => None,
        }
    }

    pub fn start(&mut self, now: Instant) -> Result<(), ProgressionError>
    {
        if self.phase != Phase::Intro {
            return Err(self.invalid("start"));
        }
        info!(game = self.game.name(), "Starting session");
        if let Err(err) = self.recorder.begin() {
            self.storage_failed(err);
        }
        self.game.begin();
        self.question_id = 0;
        self.pending = Step::Continue;
        self.last_result = None;
        self.present(Draw::Next, now);
        Ok(())
    }

    pub fn tick(&mut self, now: Instant) -> Tick
    {
        let phase = self.phase;
        match phase {
            Phase::Presenting { until } if now >= until => {
                let deadline = self.deadline_from(until);
                self.phase = Phase::AwaitingInput {
                    opened_at: until,
                    deadline,
                    stimulus_visible: false,
                };
                Tick::InputOpened
            }
            Phase::AwaitingInput {
                deadline: Some(deadline),
                ..
            } if now >= deadline => Tick::TimeUp,
            _ => Tick::Idle,
        }
    }

    /// Explicit submission. Rejected responses leave every piece of state
    /// untouched.
    pub fn submit(
        &mut self,
        response: G::Response,
        now: Instant,
    ) -> Result<&QuestionResult, ProgressionError>
    {
        if !matches!(self.phase, Phase::AwaitingInput { .. }) {
            return Err(self.invalid("submit"));
        }
        self.game.validate(&response).map_err(ProgressionError::Rejected)?;
        Ok(self.evaluate(response, now))
    }

    /// Implicit submission when the response deadline passes. Skips
    /// validation and caps the elapsed time at the limit.
    pub fn time_up(
        &mut self,
        response: G::Response,
        now: Instant,
    ) -> Result<&QuestionResult, ProgressionError>
    {
        let deadline = match self.phase {
            Phase::AwaitingInput { deadline, .. } => deadline,
            _ => return Err(self.invalid("time out")),
        };
        let now = match deadline {
            Some(deadline) if now > deadline => deadline,
            _ => now,
        };
        Ok(self.evaluate(response, now))
    }

    pub fn retry(&mut self, now: Instant) -> Result<(), ProgressionError>
    {
        if self.phase != Phase::Feedback {
            return Err(self.invalid("retry"));
        }
        debug!(question_id = self.question_id, "Retrying question");
        self.pending = Step::Continue;
        self.present(Draw::Repeat, now);
        Ok(())
    }

    pub fn advance(&mut self, now: Instant) -> Result<(), ProgressionError>
    {
        if self.phase != Phase::Feedback {
            return Err(self.invalid("advance"));
        }
        if self.pending == Step::Complete {
            self.complete();
        } else {
            self.present(Draw::Next, now);
        }
        Ok(())
    }

    /// Back to the intro screen with the session cleared.
    pub fn restart(&mut self)
    {
        info!(game = self.game.name(), "Restarting session");
        if let Err(err) = self.recorder.begin() {
            self.storage_failed(err);
        }
        self.phase = Phase::Intro;
        self.stimulus = None;
        self.question_id = 0;
        self.pending = Step::Continue;
        self.last_result = None;
    }

    fn present(&mut self, draw: Draw, now: Instant)
    {
        let stimulus = match self.game.stimulus(draw, &mut self.rng) {
            Some(stimulus) => stimulus,
            None => {
                self.complete();
                return;
            }
        };
        if draw == Draw::Next || self.question_id == 0 {
            self.question_id += 1;
        }

        self.phase = match self.game.presentation(&stimulus) {
            Presentation::Timed(duration) => Phase::Presenting {
                until: now + duration,
            },
            Presentation::UntilInput => Phase::AwaitingInput {
                opened_at: now,
                deadline: self.game.response_limit(&stimulus).map(|limit| now + limit),
                stimulus_visible: true,
            },
        };
        self.stimulus = Some(stimulus);
        debug!(
            question_id = self.question_id,
            phase = self.phase.label(),
            "Presented stimulus"
        );
    }

    fn deadline_from(&self, opened_at: Instant) -> Option<Instant>
    {
        self.stimulus
            .as_ref()
            .and_then(|stimulus| self.game.response_limit(stimulus))
            .map(|limit| opened_at + limit)
    }

    fn evaluate(&mut self, response: G::Response, now: Instant) -> &QuestionResult
    {
        let opened_at = match self.phase {
            Phase::AwaitingInput { opened_at, .. } => opened_at,
            _ => now,
        };
        self.phase = Phase::Evaluating;
        let elapsed = now.saturating_duration_since(opened_at);

        let verdict = match self.stimulus.as_ref() {
            Some(stimulus) => self.game.evaluate(stimulus, &response, elapsed),
            None => Verdict {
                is_correct: false,
                score: 0.0,
                answer: None,
            },
        };
        debug!(
            question_id = self.question_id,
            is_correct = verdict.is_correct,
            score = verdict.score,
            elapsed = elapsed.as_secs_f64(),
            "Evaluated response"
        );

        self.pending = self.game.advance_policy(&verdict);
        let result = QuestionResult {
            question_id: self.question_id,
            is_correct: verdict.is_correct,
            response_time: elapsed.as_secs_f64(),
            score: verdict.score,
            answer: verdict.answer,
        };
        if let Err(err) = self.recorder.save(result.clone()) {
            self.storage_failed(err);
        }
        self.phase = Phase::Feedback;
        self.last_result.insert(result)
    }

    fn complete(&mut self)
    {
        let record = self.recorder.record();
        info!(
            game = self.game.name(),
            questions = record.len(),
            total_score = record.total_score,
            "Session completed"
        );
        self.phase = Phase::Completed;
    }

    fn storage_failed(&mut self, err: crate::store::StoreError)
    {
        warn!(key = self.recorder.key(), "Session not saved: {err}");
        self.notice = Some(format!("Could not save progress: {err}"));
    }

    fn invalid(&self, action: &'static str) -> ProgressionError
    {
        ProgressionError::InvalidPhase {
            action,
            phase: self.phase.label(),
        }
    }
}
