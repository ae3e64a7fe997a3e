//! Terminal frontends. Each game is a [`Screen`] driven by [`run_screen`],
//! which owns the terminal and the frame loop.

pub mod digit_span;
pub mod kohs;
pub mod pass_along;
pub mod puzzle;
pub mod trace;

use std::io::{self, Stdout, Write};
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEvent,
};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use tracing::info;

use crate::config::{AppConfig, ConfigError};
use crate::games::GameKind;
use crate::games::digit_span::RecallMode;
use crate::games::puzzle::PuzzleVariant;
use crate::progression::{Assessment, Controller, Phase, ProgressionError};
use crate::session::{QuestionResult, SessionRecord};
use crate::store::{FileStore, SessionStore};

const TICK_MS: u64 = 33;
pub const RESET: &str = "\x1b[0m";

#[derive(Debug, thiserror::Error)]
pub enum PlayError
{
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("terminal error: {0}")]
    Terminal(#[from] io::Error),
}

#[derive(Clone, Copy, Debug)]
pub struct GameOptions
{
    pub puzzle_variant: PuzzleVariant,
    pub digit_start: RecallMode,
}

impl Default for GameOptions
{
    fn default() -> Self
    {
        Self {
            puzzle_variant: PuzzleVariant::Picture,
            digit_start: RecallMode::Forward,
        }
    }
}

pub fn run_game(kind: GameKind, config: &AppConfig, options: GameOptions) -> Result<(), PlayError>
{
    let store = FileStore::new(config.session_dir()?);
    let key = config.storage_keys.for_game(kind).to_string();
    info!(?kind, %key, "Launching game");

    match kind {
        GameKind::Kohs => run_screen(&mut kohs::KohsScreen::new(store, key)),
        GameKind::DigitSpan => run_screen(&mut digit_span::DigitSpanScreen::new(
            store,
            key,
            options.digit_start,
            config.digit_display(),
        )),
        GameKind::Puzzle => run_screen(&mut puzzle::PuzzleScreen::new(
            store,
            key,
            options.puzzle_variant,
        )),
        GameKind::Trace => run_screen(&mut trace::TraceScreen::new(store, key)),
        GameKind::PassAlong => run_screen(&mut pass_along::PassAlongScreen::new(store, key)),
    }?;
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow
{
    Continue,
    Quit,
}

pub trait Screen
{
    fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Flow;

    fn handle_mouse(&mut self, _mouse: MouseEvent, _now: Instant) {}

    /// Advances timers once per loop iteration.
    fn tick(&mut self, now: Instant);

    fn render(&self, now: Instant) -> Vec<String>;

    fn wants_mouse(&self) -> bool
    {
        false
    }
}

struct TerminalGuard
{
    stdout: Stdout,
    mouse: bool,
}

impl TerminalGuard
{
    fn enter(mouse: bool) -> io::Result<Self>
    {
        let mut stdout = io::stdout();
        terminal::enable_raw_mode()?;
        execute!(stdout, EnterAlternateScreen, Hide)?;
        if mouse {
            execute!(stdout, EnableMouseCapture)?;
        }
        Ok(Self { stdout, mouse })
    }

    fn stdout(&mut self) -> &mut Stdout
    {
        &mut self.stdout
    }
}

impl Drop for TerminalGuard
{
    fn drop(&mut self)
    {
        if self.mouse {
            let _ = execute!(self.stdout, DisableMouseCapture);
        }
        let _ = execute!(self.stdout, Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

pub fn run_screen(screen: &mut impl Screen) -> io::Result<()>
{
    let mut term = TerminalGuard::enter(screen.wants_mouse())?;
    let mut last_tick: Option<Instant> = None;

    loop {
        let now = Instant::now();
        while event::poll(Duration::from_millis(0))? {
            let flow = match event::read()? {
                Event::Key(KeyEvent {
                    code: KeyCode::Char('c'),
                    modifiers,
                    ..
                }) if modifiers.contains(KeyModifiers::CONTROL) => Flow::Quit,
                Event::Key(key) if key.kind != KeyEventKind::Release => screen.handle_key(key, now),
                Event::Mouse(mouse) => {
                    screen.handle_mouse(mouse, now);
                    Flow::Continue
                }
                _ => Flow::Continue,
            };
            if flow == Flow::Quit {
                return Ok(());
            }
        }

        screen.tick(now);

        let due = last_tick.is_none_or(|tick| tick.elapsed() >= Duration::from_millis(TICK_MS));
        if due {
            draw_lines(term.stdout(), &screen.render(now))?;
            last_tick = Some(Instant::now());
        }

        std::thread::sleep(Duration::from_millis(1));
    }
}

fn draw_lines(stdout: &mut Stdout, lines: &[String]) -> io::Result<()>
{
    let output = format!("{}\r\n", lines.join("\r\n"));
    queue!(stdout, MoveTo(0, 0), Clear(ClearType::All))?;
    stdout.write_all(output.as_bytes())?;
    stdout.flush()
}

// ── Shared lifecycle handling ───────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle
{
    Quit,
    /// A new stimulus is on screen; the frontend resets its working state.
    NewItem,
    Handled,
    Unhandled,
}

/// Keys that mean the same thing in every game: Esc quits, Enter starts,
/// `r`/`n` retry or advance from feedback, and the completion screen
/// offers `r` to restart and SPACE to leave.
pub fn lifecycle_key<G: Assessment, S: SessionStore>(
    controller: &mut Controller<G, S>,
    code: KeyCode,
    now: Instant,
) -> Lifecycle
{
    if code == KeyCode::Esc {
        return Lifecycle::Quit;
    }
    let outcome: Result<Lifecycle, ProgressionError> = match (controller.phase(), code) {
        (Phase::Intro, KeyCode::Enter | KeyCode::Char(' ')) => {
            controller.start(now).map(|_| Lifecycle::NewItem)
        }
        (Phase::Feedback, KeyCode::Char('r')) => controller.retry(now).map(|_| Lifecycle::NewItem),
        (Phase::Feedback, KeyCode::Char('n') | KeyCode::Enter) => {
            controller.advance(now).map(|_| Lifecycle::NewItem)
        }
        (Phase::Completed, KeyCode::Char('r')) => {
            controller.restart();
            Ok(Lifecycle::Handled)
        }
        (Phase::Completed, KeyCode::Char(' ')) => Ok(Lifecycle::Quit),
        _ => Ok(Lifecycle::Unhandled),
    };
    outcome.unwrap_or(Lifecycle::Handled)
}

pub fn header(title: &str, phase: Phase) -> Vec<String>
{
    vec![
        format!("mindcheck - {title}"),
        format!("Phase: {}", phase.label()),
        String::new(),
    ]
}

pub fn intro_lines(description: &str, controls: &[&str]) -> Vec<String>
{
    let mut lines = vec![description.to_string(), String::new(), "Controls:".to_string()];
    lines.extend(controls.iter().map(|line| format!("  {line}")));
    lines.push(String::new());
    lines.push("Press Enter to begin. Esc quits.".to_string());
    lines
}

pub fn feedback_lines(result: &QuestionResult) -> Vec<String>
{
    let verdict = if result.is_correct {
        format!("{}Correct!{RESET}", ansi_fg((60, 200, 90)))
    } else {
        format!("{}Not quite.{RESET}", ansi_fg((230, 80, 60)))
    };
    vec![
        String::new(),
        verdict,
        format!(
            "Score: {}  Time: {:.1}s",
            format_score(result.score),
            result.response_time
        ),
        "r retry this item, n next item, Esc quit.".to_string(),
    ]
}

pub fn summary_lines(record: &SessionRecord) -> Vec<String>
{
    let mut lines = vec![
        "Session complete".to_string(),
        String::new(),
        format!(
            "Items: {}  Correct: {}  Total score: {}  Total time: {:.1}s",
            record.len(),
            record.correct_count(),
            format_score(record.total_score),
            record.total_time_taken
        ),
        String::new(),
    ];
    for question in &record.questions {
        lines.push(format!(
            "  #{:<2} {:<9} score {:>6}  {:>6.1}s",
            question.question_id,
            if question.is_correct { "correct" } else { "missed" },
            format_score(question.score),
            question.response_time
        ));
    }
    lines.push(String::new());
    lines.push("Press r to play again or SPACE to exit.".to_string());
    lines
}

pub fn notice_line(notice: &Option<String>) -> String
{
    match notice {
        Some(text) => format!("{}! {text}{RESET}", ansi_fg((240, 190, 40))),
        None => String::new(),
    }
}

pub fn countdown(left: Option<Duration>) -> String
{
    match left {
        Some(left) => {
            let secs = left.as_secs();
            format!("Time left: {}:{:02}", secs / 60, secs % 60)
        }
        None => String::new(),
    }
}

fn format_score(score: f64) -> String
{
    if score.fract() == 0.0 {
        format!("{score:.0}")
    } else {
        format!("{score:.2}")
    }
}

pub fn ansi_fg((r, g, b): (u8, u8, u8)) -> String
{
    format!("\x1b[38;2;{r};{g};{b}m")
}

pub fn ansi_bg((r, g, b): (u8, u8, u8)) -> String
{
    format!("\x1b[48;2;{r};{g};{b}m")
}

/// Four-column coloured block, optionally carrying a centred label.
pub fn swatch(color: Option<(u8, u8, u8)>, label: &str) -> String
{
    match color {
        Some(rgb) => format!("{}{}{label:^4}{RESET}", ansi_bg(rgb), ansi_fg(contrast(rgb))),
        None => format!("{label:^4}"),
    }
}

fn contrast((r, g, b): (u8, u8, u8)) -> (u8, u8, u8)
{
    let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
    if luma > 140.0 { (20, 20, 20) } else { (245, 245, 245) }
}
