use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use tracing::info;

use mindcheck::composite::{self, Profile};
use mindcheck::config::AppConfig;
use mindcheck::games::digit_span::RecallMode;
use mindcheck::games::puzzle::PuzzleVariant;
use mindcheck::games::{self, GameKind};
use mindcheck::play::{self, GameOptions};
use mindcheck::store::{FileStore, SessionStore};
use mindcheck::{logging, server};

#[derive(Parser)]
#[command(name = "mindcheck")]
#[command(about = "Cognitive assessment mini-games for the terminal")]
#[command(version)]
struct Cli
{
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Data directory for sessions, logs and submissions (overrides config)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands
{
    /// List the available games
    List,
    /// Kohs block design
    Kohs,
    /// Digit span recall
    DigitSpan
    {
        /// Start with reverse recall
        #[arg(long)]
        reverse: bool,
    },
    /// Sliding picture puzzle
    Puzzle
    {
        #[arg(long, value_enum, default_value_t = VariantArg::Picture)]
        variant: VariantArg,
    },
    /// Free-hand pattern tracing
    Trace,
    /// Pass-along block rearrangement
    PassAlong,
    /// Print the cross-game composite from stored sessions
    Report
    {
        #[arg(long)]
        age: Option<u32>,
        #[arg(long)]
        education: Option<String>,
    },
    /// Delete every stored game session
    Reset,
    /// Run the HTTP evaluation service
    Serve
    {
        /// Address to bind, e.g. 127.0.0.1:5000
        #[arg(long)]
        bind: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum VariantArg
{
    Picture,
    Slide,
}

impl From<VariantArg> for PuzzleVariant
{
    fn from(value: VariantArg) -> Self
    {
        match value {
            VariantArg::Picture => PuzzleVariant::Picture,
            VariantArg::Slide => PuzzleVariant::Slide,
        }
    }
}

fn main() -> Result<()>
{
    let cli = Cli::parse();
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }

    match cli.command {
        None => interactive_menu(&config),
        Some(Commands::List) => {
            list_games();
            Ok(())
        }
        Some(Commands::Kohs) => launch(GameKind::Kohs, &config, GameOptions::default()),
        Some(Commands::DigitSpan { reverse }) => {
            let options = GameOptions {
                digit_start: if reverse { RecallMode::Reverse } else { RecallMode::Forward },
                ..GameOptions::default()
            };
            launch(GameKind::DigitSpan, &config, options)
        }
        Some(Commands::Puzzle { variant }) => {
            let options = GameOptions {
                puzzle_variant: variant.into(),
                ..GameOptions::default()
            };
            launch(GameKind::Puzzle, &config, options)
        }
        Some(Commands::Trace) => launch(GameKind::Trace, &config, GameOptions::default()),
        Some(Commands::PassAlong) => launch(GameKind::PassAlong, &config, GameOptions::default()),
        Some(Commands::Report { age, education }) => report(&config, age, education),
        Some(Commands::Reset) => reset(&config),
        Some(Commands::Serve { bind }) => {
            if let Some(bind) = bind {
                config.bind_address = Some(bind);
            }
            serve(&config)
        }
    }
}

fn launch(kind: GameKind, config: &AppConfig, options: GameOptions) -> Result<()>
{
    let log_dir = config.log_dir()?;
    let _guard = logging::init_file_logging(&log_dir).into_diagnostic()?;
    play::run_game(kind, config, options).into_diagnostic()
}

fn serve(config: &AppConfig) -> Result<()>
{
    logging::init_stderr_logging();
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    runtime.block_on(server::serve(config)).into_diagnostic()
}

fn report(config: &AppConfig, age: Option<u32>, education: Option<String>) -> Result<()>
{
    let store = FileStore::new(config.session_dir()?);
    let keys = &config.storage_keys;
    let mut profile: Profile = composite::load_profile(&store, &keys.profile).unwrap_or_default();
    if age.is_some() {
        profile.age = age;
    }
    if education.is_some() {
        profile.education = education;
    }

    let records = composite::gather(&store, keys);
    let summary = composite::composite_index(&records, &profile);

    println!("Stored sessions:");
    for (name, record) in [
        ("kohs", &records.kohs),
        ("digit-span", &records.digit_span),
        ("puzzle", &records.puzzle),
        ("trace", &records.trace),
        ("pass-along", &records.pass_along),
    ] {
        match record {
            Some(record) => println!(
                "  {:<10} - {} items, {} correct, score {:.2}",
                name,
                record.len(),
                record.correct_count(),
                record.total_score
            ),
            None => println!("  {name:<10} - no session"),
        }
    }
    println!();
    println!("Kohs:        {:.1}%", summary.kohs_percent);
    println!("Pass-along:  {:.1}%", summary.pass_along_percent);
    println!("Pattern:     {:.1}%", summary.pattern_percent);
    println!("Raw total:   {:.2}", summary.raw_total);
    println!("Composite:   {}", summary.index);
    Ok(())
}

fn reset(config: &AppConfig) -> Result<()>
{
    let mut store = FileStore::new(config.session_dir()?);
    for key in config.storage_keys.games() {
        store.clear(key).into_diagnostic()?;
    }
    info!("Cleared stored sessions");
    println!("Cleared stored sessions.");
    Ok(())
}

fn interactive_menu(config: &AppConfig) -> Result<()>
{
    let registry = games::registry();
    println!("mindcheck");
    println!();
    println!("Select a game:");
    for (idx, game) in registry.iter().enumerate() {
        println!("  {}. {} - {}", idx + 1, game.name, game.description);
    }
    println!();
    print!("Enter number or name (default 1, q to quit): ");
    std::io::stdout().flush().into_diagnostic()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input).into_diagnostic()?;
    let choice = input.trim();

    if choice.eq_ignore_ascii_case("q") {
        return Ok(());
    }
    let selected = if choice.is_empty() {
        registry.first().map(|game| game.kind)
    } else if let Ok(index) = choice.parse::<usize>() {
        index
            .checked_sub(1)
            .and_then(|index| registry.get(index))
            .map(|game| game.kind)
    } else {
        games::find(choice).map(|game| game.kind)
    };

    match selected {
        Some(kind) => launch(kind, config, GameOptions::default()),
        None => Err(miette::miette!("Invalid selection '{choice}'. Run with --help.")),
    }
}

fn list_games()
{
    println!("Available games:");
    for game in games::registry() {
        println!("  {:<10} - {}", game.name, game.description);
    }
}
