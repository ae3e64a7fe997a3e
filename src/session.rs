//! Per-game session records.
//!
//! A `SessionRecord` is the persisted aggregate for one game: the list of
//! question results plus totals that are recomputed on every update.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer
{
    Grid(Vec<Vec<Option<String>>>),
    Points(Vec<[f64; 2]>),
    Tiles(Vec<Option<u32>>),
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult
{
    pub question_id: u32,
    pub is_correct: bool,
    /// Seconds between the input opening and the submission.
    pub response_time: f64,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<Answer>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord
{
    pub game_name: String,
    #[serde(default)]
    pub total_score: f64,
    #[serde(default)]
    pub total_time_taken: f64,
    #[serde(default)]
    pub questions: Vec<QuestionResult>,
}

impl SessionRecord
{
    pub fn new(game_name: impl Into<String>) -> Self
    {
        Self {
            game_name: game_name.into(),
            total_score: 0.0,
            total_time_taken: 0.0,
            questions: Vec::new(),
        }
    }

    /// Replaces the result with the same question id, or appends it.
    pub fn upsert(&mut self, result: QuestionResult)
    {
        match self
            .questions
            .iter_mut()
            .find(|existing| existing.question_id == result.question_id)
        {
            Some(existing) => *existing = result,
            None => self.questions.push(result),
        }
        self.recompute_totals();
    }

    pub fn recompute_totals(&mut self)
    {
        self.total_score = self.questions.iter().map(|q| q.score).sum();
        self.total_time_taken = self.questions.iter().map(|q| q.response_time).sum();
    }

    pub fn question(&self, question_id: u32) -> Option<&QuestionResult>
    {
        self.questions.iter().find(|q| q.question_id == question_id)
    }

    pub fn correct_count(&self) -> usize
    {
        self.questions.iter().filter(|q| q.is_correct).count()
    }

    pub fn len(&self) -> usize
    {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.questions.is_empty()
    }
}
