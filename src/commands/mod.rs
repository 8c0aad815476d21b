mod preview;
mod room;

use clap::{Parser, Subcommand};
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;

use crate::config::Config;
use crate::manager::RoomManager;
use crate::models::PositionMap;

pub type CommandResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

lazy_static! {
    static ref ASSIGNMENT_RE: Regex =
        Regex::new(r"^\s*(?P<label>[^=]*?)\s*=\s*(?P<position>[^=]+?)\s*$").unwrap();
}

/// Place options on a 0-100 bar and split a 100-point budget between them.
#[derive(Parser, Debug)]
#[command(name = "vote-bar", author, version, about, long_about = None)]
pub struct Cli {
    /// Print machine readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Turn on informational logging (RUST_LOG still takes precedence).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show how a set of positions splits the budget, without storing anything.
    Preview {
        /// LABEL=POSITION pairs, positions between 0 and 100.
        #[arg(required = true, value_parser = parse_assignment)]
        positions: Vec<(String, f64)>,
    },
    /// Create a room and print its code.
    Create {
        /// An option to offer (repeatable). Defaults to Option A..D.
        #[arg(short, long = "option")]
        options: Vec<String>,
    },
    /// Replace the options offered in a room. Existing votes are kept.
    Options {
        code: String,
        #[arg(short, long = "option", required = true)]
        options: Vec<String>,
    },
    /// Submit (or replace) a participant's vote.
    Vote {
        code: String,
        /// Participant id; a new one is generated when omitted.
        #[arg(short, long)]
        participant: Option<String>,
        /// LABEL=POSITION pairs, positions between 0 and 100.
        #[arg(required = true, value_parser = parse_assignment)]
        positions: Vec<(String, f64)>,
    },
    /// Show the combined ranking of a room.
    Results { code: String },
    /// Show a room's options and votes.
    Show { code: String },
    /// Remove a participant's vote from a room.
    Withdraw { code: String, participant: String },
    /// Delete a room and all of its votes.
    Delete { code: String },
    /// List all rooms.
    List,
    /// Delete rooms idle for longer than ROOM_MAX_AGE_HOURS.
    Sweep {
        /// Keep running and sweep every SWEEP_INTERVAL_SECONDS until interrupted.
        #[arg(long)]
        watch: bool,
    },
}

/// Parses one `LABEL=POSITION` argument.
pub fn parse_assignment(raw: &str) -> Result<(String, f64), String> {
    let caps = ASSIGNMENT_RE
        .captures(raw)
        .ok_or_else(|| format!("expected LABEL=POSITION, got '{}'", raw))?;
    let label = caps["label"].to_string();
    if label.is_empty() {
        return Err(format!("missing label in '{}'", raw));
    }
    let position = caps["position"]
        .parse::<f64>()
        .map_err(|e| format!("bad position in '{}': {}", raw, e))?;
    Ok((label, position))
}

/// Collects parsed assignments, refusing to silently drop a repeated label.
pub fn positions_from_assignments(assignments: Vec<(String, f64)>) -> Result<PositionMap, String> {
    let mut positions = PositionMap::with_capacity(assignments.len());
    for (label, position) in assignments {
        if positions.insert(label.clone(), position).is_some() {
            return Err(format!("option '{}' is placed more than once", label));
        }
    }
    Ok(positions)
}

pub async fn run(cli: Cli) -> CommandResult {
    let json = cli.json;

    // Previews never need storage.
    if let Command::Preview { positions } = cli.command {
        return preview::handle_preview(positions_from_assignments(positions)?, json);
    }

    let config = Config::from_env()?;
    let manager = RoomManager::open(config).await?;

    let outcome = match cli.command {
        Command::Preview { .. } => Ok(()),
        Command::Create { options } => room::handle_create(&manager, options, json).await,
        Command::Options { code, options } => {
            room::handle_options(&manager, &code, options, json).await
        }
        Command::Vote {
            code,
            participant,
            positions,
        } => {
            let positions = positions_from_assignments(positions)?;
            room::handle_vote(&manager, &code, participant, positions, json).await
        }
        Command::Results { code } => room::handle_results(&manager, &code, json).await,
        Command::Show { code } => room::handle_show(&manager, &code, json).await,
        Command::Withdraw { code, participant } => {
            room::handle_withdraw(&manager, &code, &participant, json).await
        }
        Command::Delete { code } => room::handle_delete(&manager, &code, json).await,
        Command::List => room::handle_list(&manager, json).await,
        Command::Sweep { watch: false } => room::handle_sweep(&manager, json).await,
        Command::Sweep { watch: true } => {
            let manager = Arc::new(manager);
            let outcome = room::handle_watch(Arc::clone(&manager)).await;
            manager.close().await;
            return outcome;
        }
    };

    manager.close().await;
    outcome
}
