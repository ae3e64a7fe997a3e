use std::time::{Duration, Instant};

use mindcheck::games::digit_span::{DigitSpanGame, RecallMode};
use mindcheck::games::kohs::{BlockColor, KohsGame, Pattern, UserGrid};
use mindcheck::progression::{Controller, Phase, ProgressionError, Tick};
use mindcheck::session::SessionRecord;
use mindcheck::store::{MemoryStore, SessionStore, StoreError, load_record};
use pretty_assertions::assert_eq;

use BlockColor::*;

const KEY: &str = "KohsTest";

fn two_patterns() -> KohsGame
{
    KohsGame::with_patterns(vec![
        Pattern {
            id: 1,
            name: "Checker",
            difficulty: "Easy",
            grid: vec![vec![Red, White], vec![White, Red]],
        },
        Pattern {
            id: 2,
            name: "Stripes",
            difficulty: "Easy",
            grid: vec![vec![Blue, Blue], vec![Yellow, Yellow]],
        },
    ])
}

fn filled(pattern: &Pattern) -> UserGrid
{
    pattern
        .grid
        .iter()
        .map(|row| row.iter().map(|cell| Some(*cell)).collect())
        .collect()
}

fn stored(controller: &Controller<KohsGame, MemoryStore>) -> SessionRecord
{
    load_record(controller.recorder().store(), KEY).unwrap()
}

#[test]
fn test_actions_outside_their_phase_are_refused()
{
    let now = Instant::now();
    let mut controller = Controller::with_seed(two_patterns(), MemoryStore::new(), KEY, 7);

    assert!(matches!(
        controller.submit(vec![vec![Some(Red)]], now),
        Err(ProgressionError::InvalidPhase { .. })
    ));
    assert!(controller.retry(now).is_err());
    assert!(controller.advance(now).is_err());

    controller.start(now).unwrap();
    assert!(controller.start(now).is_err());
    assert!(controller.retry(now).is_err());
}

#[test]
fn test_start_writes_an_empty_record()
{
    let now = Instant::now();
    let mut store = MemoryStore::new();
    store.set(KEY, r#"{"gameName":"KohsTest","totalScore":99,"questions":[]}"#).unwrap();

    let mut controller = Controller::with_seed(two_patterns(), store, KEY, 7);
    controller.start(now).unwrap();

    let record = stored(&controller);
    assert_eq!(record, SessionRecord::new("KohsTest"));
    assert_eq!(controller.question_id(), 1);
    assert!(matches!(controller.phase(), Phase::AwaitingInput { .. }));
}

#[test]
fn test_rejected_submission_changes_nothing()
{
    let now = Instant::now();
    let mut controller = Controller::with_seed(two_patterns(), MemoryStore::new(), KEY, 7);
    controller.start(now).unwrap();
    let before = controller.phase();

    let empty: UserGrid = vec![vec![None, None], vec![None, None]];
    let err = controller.submit(empty, now + Duration::from_secs(3)).unwrap_err();

    assert!(matches!(err, ProgressionError::Rejected(_)));
    assert_eq!(controller.phase(), before);
    assert_eq!(controller.question_id(), 1);
    assert!(controller.record().is_empty());
    assert!(stored(&controller).is_empty());
}

#[test]
fn test_correct_submission_is_scored_and_stored()
{
    let now = Instant::now();
    let mut controller = Controller::with_seed(two_patterns(), MemoryStore::new(), KEY, 7);
    controller.start(now).unwrap();

    let grid = filled(controller.stimulus().unwrap());
    let result = controller.submit(grid, now + Duration::from_secs(25)).unwrap().clone();

    assert!(result.is_correct);
    assert_eq!(result.question_id, 1);
    // 100 for accuracy, 30 - 2 for the time bonus
    assert_eq!(result.score, 128.0);
    assert_eq!(result.response_time, 25.0);
    assert_eq!(controller.phase(), Phase::Feedback);

    let record = stored(&controller);
    assert_eq!(record.len(), 1);
    assert_eq!(record.total_score, 128.0);
    assert_eq!(record.total_time_taken, 25.0);
}

#[test]
fn test_retry_replaces_the_same_question()
{
    let now = Instant::now();
    let mut controller = Controller::with_seed(two_patterns(), MemoryStore::new(), KEY, 7);
    controller.start(now).unwrap();

    let wrong: UserGrid = vec![vec![Some(Blue), None], vec![None, None]];
    let first = controller.submit(wrong, now + Duration::from_secs(5)).unwrap();
    assert!(!first.is_correct);

    let later = now + Duration::from_secs(10);
    controller.retry(later).unwrap();
    assert_eq!(controller.question_id(), 1);
    assert_eq!(controller.stimulus().unwrap().id, 1);

    let grid = filled(controller.stimulus().unwrap());
    controller.submit(grid, later + Duration::from_secs(4)).unwrap();

    let record = stored(&controller);
    assert_eq!(record.len(), 1);
    assert!(record.questions[0].is_correct);
    assert_eq!(record.questions[0].response_time, 4.0);
}

#[test]
fn test_running_out_of_items_completes_the_session()
{
    let now = Instant::now();
    let mut controller = Controller::with_seed(two_patterns(), MemoryStore::new(), KEY, 7);
    controller.start(now).unwrap();

    for _ in 0..2 {
        let grid = filled(controller.stimulus().unwrap());
        controller.submit(grid, now).unwrap();
        controller.advance(now).unwrap();
    }

    assert_eq!(controller.phase(), Phase::Completed);
    assert_eq!(controller.record().len(), 2);
    assert_eq!(controller.record().correct_count(), 2);

    controller.restart();
    assert_eq!(controller.phase(), Phase::Intro);
    assert!(stored(&controller).is_empty());
}

struct BrokenStore;

impl SessionStore for BrokenStore
{
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError>
    {
        Ok(None)
    }

    fn set(&mut self, _key: &str, _value: &str) -> Result<(), StoreError>
    {
        Err(StoreError::Unavailable("quota exceeded".to_string()))
    }

    fn clear(&mut self, _key: &str) -> Result<(), StoreError>
    {
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError>
    {
        Ok(Vec::new())
    }
}

#[test]
fn test_storage_failure_becomes_a_notice()
{
    let now = Instant::now();
    let mut controller = Controller::with_seed(two_patterns(), BrokenStore, KEY, 7);
    controller.start(now).unwrap();
    let notice = controller.take_notice().unwrap();
    assert!(notice.contains("quota exceeded"));
    assert_eq!(controller.take_notice(), None);

    let grid = filled(controller.stimulus().unwrap());
    let result = controller.submit(grid, now).unwrap();
    assert!(result.is_correct);
    assert!(controller.take_notice().is_some());
    assert_eq!(controller.record().len(), 1);
}

#[test]
fn test_digit_span_display_then_input()
{
    let now = Instant::now();
    let game = DigitSpanGame::new(RecallMode::Forward, Duration::from_secs(3));
    let mut controller = Controller::with_seed(game, MemoryStore::new(), "MemoryTest", 42);
    controller.start(now).unwrap();

    assert!(matches!(controller.phase(), Phase::Presenting { .. }));
    assert!(controller.is_stimulus_visible());
    assert!(controller.submit("123".to_string(), now).is_err());
    assert_eq!(controller.tick(now + Duration::from_secs(1)), Tick::Idle);

    let opened = now + Duration::from_secs(3);
    assert_eq!(controller.tick(opened), Tick::InputOpened);
    assert!(!controller.is_stimulus_visible());

    let answer = controller.stimulus().unwrap().as_text();
    assert_eq!(answer.len(), 3);
    let result = controller
        .submit(answer, opened + Duration::from_secs(2))
        .unwrap();
    assert!(result.is_correct);
    assert_eq!(result.response_time, 2.0);

    controller.advance(opened).unwrap();
    assert_eq!(controller.stimulus().unwrap().digits.len(), 4);
    assert_eq!(controller.question_id(), 2);
}

#[test]
fn test_digit_span_switches_to_reverse_after_two_misses()
{
    let mut now = Instant::now();
    let game = DigitSpanGame::new(RecallMode::Forward, Duration::from_secs(1));
    let mut controller = Controller::with_seed(game, MemoryStore::new(), "MemoryTest", 3);
    controller.start(now).unwrap();

    for _ in 0..2 {
        now += Duration::from_secs(1);
        controller.tick(now);
        let wrong = "0".repeat(20);
        assert!(!controller.submit(wrong, now).unwrap().is_correct);
        controller.advance(now).unwrap();
    }

    let sequence = controller.stimulus().unwrap();
    assert_eq!(sequence.mode, RecallMode::Reverse);
    assert!(sequence.mode_changed);
    assert_eq!(sequence.digits.len(), 3);
    assert_eq!(controller.question_id(), 3);

    for _ in 0..2 {
        now += Duration::from_secs(1);
        controller.tick(now);
        controller.submit("0".repeat(20), now).unwrap();
        controller.advance(now).unwrap();
    }
    assert_eq!(controller.phase(), Phase::Completed);
    assert_eq!(controller.record().len(), 4);
}

#[test]
fn test_digit_span_retry_counts_once()
{
    let mut now = Instant::now();
    let game = DigitSpanGame::new(RecallMode::Forward, Duration::from_secs(1));
    let mut controller = Controller::with_seed(game, MemoryStore::new(), "MemoryTest", 21);
    controller.start(now).unwrap();
    let mut lengths = vec![controller.stimulus().unwrap().digits.len()];

    now += Duration::from_secs(1);
    controller.tick(now);
    let answer = controller.stimulus().unwrap().as_text();
    assert!(controller.submit(answer, now).unwrap().is_correct);

    controller.retry(now).unwrap();
    lengths.push(controller.stimulus().unwrap().digits.len());
    now += Duration::from_secs(1);
    controller.tick(now);
    let answer = controller.stimulus().unwrap().as_text();
    assert!(controller.submit(answer, now).unwrap().is_correct);

    controller.advance(now).unwrap();
    lengths.push(controller.stimulus().unwrap().digits.len());

    assert_eq!(lengths, vec![3, 3, 4]);
    assert_eq!(controller.game().policy().length(), 4);
    assert_eq!(controller.record().len(), 1);
    assert_eq!(controller.question_id(), 2);
}

#[test]
fn test_same_seed_same_sequence()
{
    let now = Instant::now();
    let digits = |seed| {
        let game = DigitSpanGame::default();
        let mut controller = Controller::with_seed(game, MemoryStore::new(), "MemoryTest", seed);
        controller.start(now).unwrap();
        controller.stimulus().unwrap().digits.clone()
    };
    assert_eq!(digits(11), digits(11));
}
