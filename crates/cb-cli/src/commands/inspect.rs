use std::fs;
use std::path::Path;

use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use cb_core::{CellIndex, Occupancy};
use cb_simulation::{Session, SessionSnapshot};

pub fn run(path: &Path, index: Option<u32>) -> Result<(), String> {
    let json =
        fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let snapshot = SessionSnapshot::from_json(&json).map_err(|e| format!("invalid snapshot: {e}"))?;
    let session = Session::restore(snapshot).map_err(|e| format!("cannot restore: {e}"))?;
    let field = session.field();
    let registry = session.registry();

    match index {
        Some(raw) => {
            let cell = CellIndex(raw);
            let block = field
                .get(cell)
                .ok_or_else(|| format!("no block at cell {cell}"))?;
            println!(
                "  {} {} {}",
                "Block".bold(),
                cell,
                format!("at {}", block.position).dimmed()
            );
            println!("  Value: {}", block.value);
            let owner = block
                .owner
                .as_ref()
                .map(|o| o.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("  Owner: {owner}");
            println!();

            let cluster = field.cluster(cell);
            println!(
                "  {} {}",
                "Matching cluster".bold().underline(),
                format!("({} blocks)", cluster.len()).dimmed()
            );
            println!();
            let rows = cluster
                .iter()
                .filter_map(|i| field.get(*i).map(|b| (*i, b)));
            println!("{}", super::block_table(rows, registry));
        }
        None => {
            let w = field.grid().width();
            println!(
                "  {} {}",
                "Session".bold(),
                format!("({w}x{w}x{w}, seed={})", session.config().seed).dimmed()
            );
            println!(
                "  {} blocks, {} participants, next event #{}",
                field.len(),
                registry.len(),
                session.feed().next_seq()
            );
            println!();

            println!("  {}", "Roster".bold().underline());
            println!();
            if registry.is_empty() {
                println!("  {}", "(no participants)".dimmed());
            } else {
                let mut table = Table::new();
                table.set_content_arrangement(ContentArrangement::Dynamic);
                table.set_header(vec!["Participant", "Name", "Color", "Owned"]);
                for cubist in registry.iter() {
                    table.add_row(vec![
                        cubist.id.to_string(),
                        cubist.display_name().to_string(),
                        cubist.color_hex().to_string(),
                        field.owned_by(&cubist.id).len().to_string(),
                    ]);
                }
                println!("{table}");
            }
            println!();

            println!("  {}", "Blocks".bold().underline());
            println!();
            println!("{}", super::block_table(field.iter(), registry));
        }
    }

    Ok(())
}
