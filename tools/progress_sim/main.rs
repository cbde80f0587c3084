//! Progress Simulator - drive the progression library from a shell.
//!
//! Usage:
//!   progress_sim status
//!   progress_sim complete spec-lab 100 --perfect
//!   progress_sim replay script.json
//!   progress_sim reset
//!
//! Script format: `[{"lesson": 1, "xpAwarded": 100}, {"lesson": "goal-forge", "xpAwarded": 90}]`

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use progressorium_core::{
    finish_lesson, GameResult, HandoffOutcome, LessonDescriptor, LessonId, NextScreen,
    ProgressConfig, ProgressTracker, CONFIG_FILE_NAME,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Log filter variable, e.g. `PROGRESSORIUM_LOG=debug`
const LOG_ENV: &str = "PROGRESSORIUM_LOG";

#[derive(Parser)]
#[command(name = "progress_sim")]
#[command(about = "Simulate learner progress against a real store", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: ./progressorium.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show XP, level, badges and completion
    Status,

    /// List the lesson catalog with completion marks
    Lessons,

    /// Finish one lesson
    Complete {
        /// Lesson id or slug
        lesson: String,

        /// XP the game awarded
        xp: i64,

        #[arg(long)]
        perfect: bool,
    },

    /// Apply a JSON script of completion events
    Replay { script: PathBuf },

    /// Erase all progress
    Reset,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LessonRef {
    Id(u32),
    Slug(String),
}

/// One catalog row for `lessons --json`
#[derive(Debug, Serialize)]
struct LessonRow<'a> {
    #[serde(flatten)]
    lesson: &'a LessonDescriptor,
    completed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptEvent {
    lesson: LessonRef,
    xp_awarded: i64,
    #[serde(default)]
    perfect: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let mut tracker = ProgressTracker::open(&config)
        .with_context(|| format!("Failed to open progress in {}", config.data_dir.display()))?;

    if tracker.load_status().is_anomaly() {
        eprintln!("warning: stored progress was unreadable, starting fresh");
    }

    match cli.command {
        Commands::Status => print_status(&tracker, cli.json),
        Commands::Lessons => print_lessons(&tracker, cli.json),
        Commands::Complete {
            lesson,
            xp,
            perfect,
        } => {
            let id = resolve_lesson(&tracker, &LessonRef::parse(&lesson))?;
            let outcome = finish_lesson(
                &mut tracker,
                id,
                GameResult {
                    xp_awarded: xp,
                    perfect,
                },
            )?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
            Ok(())
        }
        Commands::Replay { script } => replay(&mut tracker, &script, cli.json),
        Commands::Reset => {
            if tracker.reset_progress() {
                println!("Progress reset.");
            } else {
                println!("Progress reset for this session, but storage could not be cleared.");
            }
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<ProgressConfig> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    let mut config = ProgressConfig::load_from(&path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    info!("Using data dir {}", config.data_dir.display());
    Ok(config)
}

impl LessonRef {
    fn parse(raw: &str) -> Self {
        match raw.parse::<u32>() {
            Ok(id) => LessonRef::Id(id),
            Err(_) => LessonRef::Slug(raw.to_string()),
        }
    }
}

fn resolve_lesson(tracker: &ProgressTracker, lesson: &LessonRef) -> Result<LessonId> {
    let found = match lesson {
        LessonRef::Id(id) => tracker.catalog().by_id(LessonId(*id)),
        LessonRef::Slug(slug) => tracker.catalog().by_slug(slug),
    };
    match found {
        Some(l) => Ok(l.id),
        None => bail!("No lesson matches {:?}", lesson),
    }
}

fn replay(tracker: &mut ProgressTracker, script: &Path, json: bool) -> Result<()> {
    let raw = fs::read_to_string(script)
        .with_context(|| format!("Failed to read script {}", script.display()))?;
    let events: Vec<ScriptEvent> =
        serde_json::from_str(&raw).context("Script must be a JSON array of events")?;

    let mut rejected = 0;
    let mut outcomes = Vec::new();
    for (n, event) in events.iter().enumerate() {
        let result = resolve_lesson(tracker, &event.lesson).and_then(|id| {
            let game = GameResult {
                xp_awarded: event.xp_awarded,
                perfect: event.perfect,
            };
            Ok(finish_lesson(tracker, id, game)?)
        });
        match result {
            Ok(outcome) if json => outcomes.push(outcome),
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => {
                rejected += 1;
                eprintln!("event {}: rejected: {}", n + 1, e);
            }
        }
    }

    if json {
        let report = serde_json::json!({
            "outcomes": outcomes,
            "progress": tracker.get_progress(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        print_status(tracker, false)?;
    }
    if rejected > 0 {
        eprintln!("{} of {} events rejected", rejected, events.len());
    }
    Ok(())
}

fn print_status(tracker: &ProgressTracker, json: bool) -> Result<()> {
    let state = tracker.get_progress();
    if json {
        println!("{}", serde_json::to_string_pretty(state)?);
        return Ok(());
    }

    let rank = tracker.rank();
    println!("Level {} ({})", tracker.current_level(), rank);
    println!(
        "XP {}  [{}%]  {} to next level",
        state.xp(),
        tracker.progress_to_next_level(),
        tracker.xp_to_next_level()
    );
    println!(
        "Lessons {}/{} ({:.0}%)",
        state.completed_count(),
        tracker.catalog().len(),
        tracker.completion_percent()
    );

    let earned = tracker.earned_badges();
    if earned.is_empty() {
        println!("Badges: none yet");
    } else {
        println!("Badges:");
        for badge in earned {
            println!("  {} (+{} XP)", badge.name, badge.xp_bonus);
        }
    }
    Ok(())
}

fn lesson_rows(tracker: &ProgressTracker) -> Vec<LessonRow<'_>> {
    let state = tracker.get_progress();
    tracker
        .catalog()
        .lessons()
        .iter()
        .map(|lesson| LessonRow {
            lesson,
            completed: state.has_completed(lesson.id),
        })
        .collect()
}

fn print_lessons(tracker: &ProgressTracker, json: bool) -> Result<()> {
    let rows = lesson_rows(tracker);
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for row in rows {
        let mark = if row.completed { "x" } else { " " };
        println!(
            "[{}] {:>2} {:<24} {:<10} {} XP",
            mark,
            row.lesson.id.value(),
            row.lesson.slug,
            row.lesson.layer.as_str(),
            row.lesson.xp
        );
    }
    Ok(())
}

fn print_outcome(outcome: &HandoffOutcome) {
    if outcome.already_completed {
        println!("{}: replayed, no XP", outcome.lesson.title);
    } else {
        println!("{}: +{} XP", outcome.lesson.title, outcome.xp_credited);
    }
    for badge in &outcome.newly_awarded {
        println!("  {}", progressorium_core::badges::format_badge_unlock(badge));
    }
    if outcome.leveled_up() {
        println!("  Level up! {} -> {}", outcome.level_before, outcome.level_after);
    }
    if !outcome.saved {
        println!("  (progress not saved)");
    }
    match outcome.next {
        NextScreen::Lesson { slug, .. } => println!("  next: {}", slug),
        NextScreen::LessonIndex => println!("  next: lesson index"),
        NextScreen::CourseComplete => println!("  course complete!"),
    }
}
