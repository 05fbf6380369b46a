//! Write a shot file from asset files.

use std::path::PathBuf;

use anyhow::Context as _;
use shotkit_project_model::{ItemRecord, StagedItem, StagedOverride};

use super::Context;

pub fn run(
    ctx: &Context,
    shot: PathBuf,
    files: Vec<String>,
    inherit: Option<PathBuf>,
    overrides: Vec<String>,
) -> anyhow::Result<()> {
    let items: Vec<StagedItem> = files.iter().map(|spec| parse_item(spec)).collect();
    let overrides = overrides
        .iter()
        .map(|spec| parse_override(spec))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let project = ctx.project(None);
    let written = project
        .assembler()
        .save(&shot, &items, &overrides, inherit.as_deref())
        .with_context(|| format!("Failed to write shot {}", shot.display()))?;

    println!("Shot written to {}", ctx.root.join(&shot).display());
    println!("  Files: {}", written.files.len());
    println!("  Overrides: {}", written.overrides.len());
    if let Some(root) = &written.root {
        println!("  Inherits: {root}");
    }
    Ok(())
}

/// `FILE` stores an empty inline record; `FILE=RECORD` includes RECORD.
fn parse_item(spec: &str) -> StagedItem {
    match spec.split_once('=') {
        Some((path, record)) if !record.is_empty() => StagedItem {
            path: PathBuf::from(path),
            record: ItemRecord::Include(PathBuf::from(record)),
        },
        _ => StagedItem {
            path: PathBuf::from(spec.trim_end_matches('=')),
            record: ItemRecord::Inline(serde_json::Map::new()),
        },
    }
}

/// `NAME=FILE`: the override record is included from FILE.
fn parse_override(spec: &str) -> anyhow::Result<StagedOverride> {
    let (name, file) = spec
        .split_once('=')
        .filter(|(name, file)| !name.is_empty() && !file.is_empty())
        .ok_or_else(|| anyhow::anyhow!("override must be NAME=FILE, got '{spec}'"))?;
    Ok(StagedOverride {
        name: name.to_string(),
        record: ItemRecord::Include(PathBuf::from(file)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_take_an_optional_record_file() {
        let plain = parse_item("assets/hero/hero.abc");
        assert_eq!(plain.path, PathBuf::from("assets/hero/hero.abc"));
        assert_eq!(plain.record, ItemRecord::Inline(serde_json::Map::new()));

        let included = parse_item("assets/hero/hero.abc=assets/hero/hero.json");
        assert_eq!(
            included.record,
            ItemRecord::Include(PathBuf::from("assets/hero/hero.json"))
        );
    }

    #[test]
    fn overrides_are_name_equals_file() {
        let staged = parse_override("attributes=overrides/attrs.json").unwrap();
        assert_eq!(staged.name, "attributes");
        assert_eq!(
            staged.record,
            ItemRecord::Include(PathBuf::from("overrides/attrs.json"))
        );
        assert!(parse_override("attributes").is_err());
        assert!(parse_override("=attrs.json").is_err());
    }
}
