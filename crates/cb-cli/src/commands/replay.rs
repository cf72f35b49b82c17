use std::fs;
use std::path::Path;

use colored::Colorize;

use cb_simulation::{ChangeKind, ChangeSink, FieldConfig, FieldMirror, Intent, Session};

pub fn run(
    script: &Path,
    seed: u64,
    width: u32,
    verbose: bool,
    snapshot: Option<&Path>,
) -> Result<(), String> {
    let source = fs::read_to_string(script)
        .map_err(|e| format!("cannot read {}: {e}", script.display()))?;
    let intents = Intent::parse_script(&source).map_err(|e| format!("invalid script: {e}"))?;

    let config = FieldConfig::default().with_seed(seed).with_width(width);
    let mut session = Session::new(config).map_err(|e| format!("session start failed: {e}"))?;
    let mut mirror = FieldMirror::of(session.field());
    let mut rejected = 0usize;
    let mut committed = 0usize;

    println!(
        "  {} {}",
        "Replay".bold(),
        format!("({} intents, seed={seed}, width={width})", intents.len()).dimmed()
    );
    println!();

    for (n, intent) in intents.iter().enumerate() {
        let report = session
            .apply(intent)
            .map_err(|e| format!("intent {n} failed: {e}"))?;
        mirror.apply_all(&report.events);

        if let Some(reason) = report.rejection {
            rejected += 1;
            if verbose {
                println!(
                    "  {} intent {n} by {}: {reason}",
                    "REJECT".yellow().bold(),
                    intent.participant()
                );
            }
        }
        for event in &report.events {
            let seq = format!("[{:>4}]", event.seq).dimmed();
            println!("  {seq} {}", describe(&event.kind));
        }
        committed += report.events.len();
    }

    if !mirror.agrees_with(session.field()) || !mirror.faults().is_empty() {
        return Err(format!(
            "event stream diverged from field: {}",
            mirror.faults().join("; ")
        ));
    }

    println!();
    println!(
        "  {} events committed, {} intents rejected",
        committed, rejected
    );
    println!(
        "  {} blocks, {} participants",
        session.field().len(),
        session.registry().len()
    );

    if let Some(path) = snapshot {
        let json = session
            .snapshot()
            .to_json()
            .map_err(|e| format!("cannot encode snapshot: {e}"))?;
        fs::write(path, json).map_err(|e| format!("cannot write {}: {e}", path.display()))?;
        println!("  Snapshot written to {}", path.display());
    }

    Ok(())
}

fn describe(kind: &ChangeKind) -> colored::ColoredString {
    let text = match kind {
        ChangeKind::BlockMoved { from, to } => format!("{} {from} -> {to}", kind.label()),
        ChangeKind::BlockAdded { at, value } => format!("{} {at} value {value}", kind.label()),
        ChangeKind::BlockRemoved { at } => format!("{} {at}", kind.label()),
        ChangeKind::OwnershipChanged { at, owner } => match owner {
            Some(owner) => format!("{} {at} -> {owner}", kind.label()),
            None => format!("{} {at} cleared", kind.label()),
        },
        ChangeKind::RosterChanged => kind.label().to_string(),
    };
    match kind {
        ChangeKind::BlockMoved { .. } => text.cyan(),
        ChangeKind::BlockAdded { .. } => text.green(),
        ChangeKind::BlockRemoved { .. } => text.red(),
        ChangeKind::OwnershipChanged { .. } => text.yellow(),
        ChangeKind::RosterChanged => text.magenta(),
    }
}
