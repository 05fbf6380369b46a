//! Refresh the catalogue and list its entries.

use std::path::PathBuf;

use shotkit_project_model::EntryKind;

use super::{print_warnings, Context};

pub async fn run(ctx: &Context, tracker: PathBuf, kind: Option<EntryKind>) -> anyhow::Result<()> {
    let project = ctx.project(Some(&tracker));
    let report = project
        .catalogue()
        .refresh()
        .await
        .map_err(|e| anyhow::anyhow!("Catalogue refresh failed [{}]: {e}", e.code()))?;

    println!("Catalogue: {}", project.catalogue().project());
    println!(
        "  Assets: {}  Shots: {}  Sequences: {}",
        report.assets, report.shots, report.sequences
    );

    let kinds: Vec<EntryKind> = match kind {
        Some(kind) => vec![kind],
        None => EntryKind::ALL.to_vec(),
    };
    for kind in kinds {
        let entries = project.catalogue().entries_of_kind(kind);
        println!("\n{kind} ({}):", entries.len());
        for entry in entries {
            let marker = if entry.category.known { "" } else { " (unknown category)" };
            println!(
                "  {} {} [{}]{marker}",
                entry.id, entry.name, entry.category.name
            );
        }
    }

    print_warnings(report.warnings.iter());
    Ok(())
}
