//! Show shot file information.

use std::path::PathBuf;

use super::{print_warnings, Context};

pub fn run(ctx: &Context, shot: PathBuf) -> anyhow::Result<()> {
    let project = ctx.project(None);
    let (file, warnings) = project
        .assembler()
        .parse(&shot)
        .map_err(|e| anyhow::anyhow!("Failed to load shot: {e}"))?;

    println!("Shot: {}", shot.display());
    println!("  Data version: {}", file.data_version);
    println!("  Assembler version: {}", file.assembler_version);
    if let Some(root) = &file.root {
        println!("  Inherits: {root}");
    }
    println!();

    println!("Files ({}):", file.files.len());
    for (path, record) in &file.files {
        let handler = project
            .file_types()
            .handler_for_path(&ctx.root.join(path))
            .map(|h| h.label().to_string())
            .unwrap_or_else(|_| "unregistered".to_string());
        match record.as_object() {
            Some(map) if !map.is_empty() => {
                println!("  {path} [{handler}] {}", serde_json::to_string(record)?)
            }
            _ => println!("  {path} [{handler}]"),
        }
    }
    println!();

    println!("Overrides ({}):", file.overrides.len());
    for name in file.overrides.keys() {
        let step = project
            .overrides()
            .get(name)
            .map(|o| o.step().to_string())
            .unwrap_or_else(|_| "unregistered".to_string());
        println!("  {name} ({step})");
    }

    print_warnings(warnings.iter());
    Ok(())
}
