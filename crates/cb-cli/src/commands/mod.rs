pub mod inspect;
pub mod layout;
pub mod replay;

use cb_core::{Block, CellIndex, CubistRegistry, UNCLAIMED_COLOR};
use cb_simulation::FieldConfig;
use comfy_table::{ContentArrangement, Table};

/// Build a field configuration from command-line flags.
fn field_config(seed: u64, width: u32, per_plane: u32) -> FieldConfig {
    FieldConfig::default()
        .with_seed(seed)
        .with_width(width)
        .with_blocks_per_plane(per_plane)
}

/// Render blocks as a table. Owners are resolved against `registry` when it
/// knows them.
fn block_table<'a>(
    blocks: impl IntoIterator<Item = (CellIndex, &'a Block)>,
    registry: &CubistRegistry,
) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Cell", "Position", "Value", "Owner", "Color"]);

    for (index, block) in blocks {
        let (owner, color) = match &block.owner {
            Some(id) => match registry.get(id) {
                Some(cubist) => (
                    format!("{} ({id})", cubist.display_name()),
                    cubist.color_hex(),
                ),
                None => (id.to_string(), UNCLAIMED_COLOR),
            },
            None => ("-".to_string(), UNCLAIMED_COLOR),
        };
        table.add_row(vec![
            index.to_string(),
            block.position.to_string(),
            block.value.to_string(),
            owner,
            color.to_string(),
        ]);
    }
    table
}
