use log::{info, warn};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::commands::CommandResult;
use crate::commands::preview::format_placements;
use crate::manager::RoomManager;
use crate::models::{PositionMap, Room, RoomSummary};
use crate::tasks::room_sweeper::sweep_idle_rooms_task;
use crate::voting::{self, RoomResults};

pub async fn handle_create(
    manager: &RoomManager,
    options: Vec<String>,
    json: bool,
) -> CommandResult {
    let options = if options.is_empty() { None } else { Some(options) };
    let room = manager.create_room(options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&room)?);
    } else {
        println!("{}", room.code);
    }
    Ok(())
}

pub async fn handle_options(
    manager: &RoomManager,
    code: &str,
    options: Vec<String>,
    json: bool,
) -> CommandResult {
    let options = manager.update_options(code, options).await?;

    if json {
        println!("{}", json!({ "options": options }));
    } else {
        println!("{}", options.join(", "));
    }
    Ok(())
}

pub async fn handle_vote(
    manager: &RoomManager,
    code: &str,
    participant: Option<String>,
    positions: PositionMap,
    json: bool,
) -> CommandResult {
    let participant = participant.unwrap_or_else(|| Uuid::new_v4().to_string());
    manager.submit_vote(code, &participant, &positions).await?;
    let placements = voting::placements(&positions)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "participant": participant,
                "placements": placements,
            }))?
        );
    } else {
        println!("Vote stored for participant {}", participant);
        print!("{}", format_placements(&placements));
    }
    Ok(())
}

pub async fn handle_results(manager: &RoomManager, code: &str, json: bool) -> CommandResult {
    let results = manager.results(code).await?;
    if !results.skipped.is_empty() {
        warn!(
            "{} stored vote(s) could not be counted",
            results.skipped.len()
        );
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print!("{}", format_results(&results));
    }
    Ok(())
}

pub async fn handle_show(manager: &RoomManager, code: &str, json: bool) -> CommandResult {
    let room = manager.get_room(code).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&room)?);
    } else {
        print!("{}", format_room(&room));
    }
    Ok(())
}

pub async fn handle_withdraw(
    manager: &RoomManager,
    code: &str,
    participant: &str,
    json: bool,
) -> CommandResult {
    let removed = manager.withdraw_vote(code, participant).await?;

    if json {
        println!("{}", json!({ "participant": participant, "removed": removed }));
    } else if removed {
        println!("Removed vote from {}", participant);
    } else {
        println!("{} had not voted", participant);
    }
    Ok(())
}

pub async fn handle_delete(manager: &RoomManager, code: &str, json: bool) -> CommandResult {
    manager.delete_room(code).await?;

    if json {
        println!("{}", json!({ "deleted": code.trim().to_uppercase() }));
    } else {
        println!("Deleted room {}", code.trim().to_uppercase());
    }
    Ok(())
}

pub async fn handle_list(manager: &RoomManager, json: bool) -> CommandResult {
    let rooms = manager.list_rooms().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rooms)?);
    } else if rooms.is_empty() {
        println!("No active rooms");
    } else {
        for room in &rooms {
            println!("{}", format_summary(room));
        }
    }
    Ok(())
}

pub async fn handle_sweep(manager: &RoomManager, json: bool) -> CommandResult {
    let removed = manager.sweep_idle_rooms().await?;

    if json {
        println!("{}", json!({ "removed": removed }));
    } else {
        println!("Removed {} idle room(s)", removed);
    }
    Ok(())
}

/// Sweeps on the configured interval until Ctrl-C.
pub async fn handle_watch(manager: Arc<RoomManager>) -> CommandResult {
    let every = manager.config().sweep_interval;
    let handle = tokio::spawn(sweep_idle_rooms_task(Arc::clone(&manager), every));

    tokio::signal::ctrl_c().await?;
    info!("Interrupted, stopping sweeper");
    handle.abort();
    Ok(())
}

fn format_results(results: &RoomResults) -> String {
    let mut out = format!("{} participant(s) voted\n", results.participants);
    if results.ranking.is_empty() {
        out.push_str("No votes yet\n");
    }
    for entry in &results.ranking {
        out.push_str(&format!(
            "{}. {}: {:.1} points\n",
            entry.rank, entry.option, entry.points
        ));
    }
    if !results.skipped.is_empty() {
        out.push_str(&format!("Not counted: {}\n", results.skipped.join(", ")));
    }
    out
}

fn format_room(room: &Room) -> String {
    let mut out = format!(
        "Room {}\nCreated:      {}\nLast updated: {}\nOptions:      {}\n",
        room.code,
        room.created_at.to_rfc3339(),
        room.last_updated.to_rfc3339(),
        room.options.join(", ")
    );

    let mut participants: Vec<&String> = room.votes.keys().collect();
    participants.sort();
    out.push_str(&format!("Votes:        {}\n", participants.len()));
    for participant in participants {
        let mut placed: Vec<(&String, &f64)> = room.votes[participant].iter().collect();
        placed.sort_by(|a, b| a.0.cmp(b.0));
        let placed: Vec<String> = placed
            .into_iter()
            .map(|(option, position)| format!("{}={}", option, position))
            .collect();
        out.push_str(&format!("  {}: {}\n", participant, placed.join(" ")));
    }
    out
}

fn format_summary(room: &RoomSummary) -> String {
    format!(
        "{}  {} option(s)  {} vote(s)  updated {}",
        room.code,
        room.options.len(),
        room.participants,
        room.last_updated.to_rfc3339()
    )
}
