use crate::commands::CommandResult;
use crate::models::PositionMap;
use crate::voting::{self, Placement};

pub fn handle_preview(positions: PositionMap, json: bool) -> CommandResult {
    let placements = voting::placements(&positions)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&placements)?);
    } else {
        print!("{}", format_placements(&placements));
    }
    Ok(())
}

pub(crate) fn format_placements(placements: &[Placement]) -> String {
    let width = placements
        .iter()
        .map(|placement| placement.option.chars().count())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for placement in placements {
        out.push_str(&format!(
            "{:<width$}  at {:>6.2}  ->  {:>6.2}%\n",
            placement.option,
            placement.position,
            placement.share,
            width = width
        ));
    }
    out
}
