use colored::Colorize;

use cb_core::{CubistRegistry, Occupancy};
use cb_simulation::FieldSimulation;

pub fn run(seed: u64, width: u32, per_plane: u32) -> Result<(), String> {
    let config = super::field_config(seed, width, per_plane);
    let field = FieldSimulation::seeded(&config).map_err(|e| format!("layout failed: {e}"))?;

    let w = field.grid().width();
    println!(
        "  {} {}",
        "Field".bold(),
        format!("({w}x{w}x{w}, seed={seed}, {per_plane} per plane)").dimmed()
    );
    println!(
        "  {} blocks placed, {} cells",
        field.len(),
        field.grid().cell_count()
    );
    println!();

    if field.is_empty() {
        println!("  {}", "(empty field)".dimmed());
        return Ok(());
    }

    println!("{}", super::block_table(field.iter(), &CubistRegistry::new()));
    Ok(())
}
