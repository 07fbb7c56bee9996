//! Headless level runner (default binary).
//!
//! Loads a level document, plays scripted swaps and boosters in command-line
//! order, and prints the final board.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use log::info;

use gemfall::core::LevelData;
use gemfall::engine::{Session, SessionConfig};
use gemfall::script::{play, Step};

/// Play a match-3 level without a screen
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Level document (JSON)
    level: PathBuf,

    /// RNG seed (overrides GEMFALL_SEED)
    #[arg(long)]
    seed: Option<u32>,

    /// Swap two tiles: x1,y1,x2,y2 (repeatable)
    #[arg(long = "swap", value_parser = swap_arg)]
    swaps: Vec<Step>,

    /// Fire a booster: kind@x,y with kind single|row|column|shuffle (repeatable)
    #[arg(long = "booster", value_parser = booster_arg)]
    boosters: Vec<Step>,

    /// Print the final board snapshot as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn swap_arg(s: &str) -> Result<Step, String> {
    Step::parse_swap(s).map_err(|e| e.to_string())
}

fn booster_arg(s: &str) -> Result<Step, String> {
    Step::parse_booster(s).map_err(|e| e.to_string())
}

/// Interleave swaps and boosters back into the order they were typed.
fn ordered_steps(matches: &ArgMatches, args: &Args) -> Vec<Step> {
    let indexed = |id: &str, steps: &[Step]| -> Vec<(usize, Step)> {
        matches
            .indices_of(id)
            .map(|indices| indices.zip(steps.iter().copied()).collect())
            .unwrap_or_default()
    };
    let mut steps = indexed("swaps", &args.swaps);
    steps.extend(indexed("boosters", &args.boosters));
    steps.sort_by_key(|&(index, _)| index);
    steps.into_iter().map(|(_, step)| step).collect()
}

fn main() -> Result<()> {
    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches)?;
    gemfall::logging::init(args.verbose);

    let text = fs::read_to_string(&args.level)
        .with_context(|| format!("reading {}", args.level.display()))?;
    let level = LevelData::from_json(&text)
        .with_context(|| format!("loading {}", args.level.display()))?;

    let mut config = SessionConfig::from_env();
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let mut session = Session::new(level, config)?;
    let initial = session.resolve_initial();
    if initial.passes > 0 {
        info!("initial board settled after {} passes", initial.passes);
    }
    session.tick();

    let steps = ordered_steps(&matches, &args);
    let reports = play(&mut session, &steps);
    info!(
        "{} of {} inputs played, outcome {:?}",
        reports.len(),
        steps.len(),
        session.outcome()
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
    } else {
        for row in session.grid().to_ascii() {
            println!("{}", row);
        }
        println!("moves left: {}", session.moves_left());
        for progress in session.goals().progress() {
            println!(
                "goal {:?} #{}: {} left",
                progress.goal.kind, progress.goal.target_id, progress.remaining
            );
        }
    }
    Ok(())
}
