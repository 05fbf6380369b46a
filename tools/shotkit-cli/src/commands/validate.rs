//! Validate a shot file.

use std::path::PathBuf;

use shotkit_cache_exchange::FileKind;

use super::{print_warnings, Context};

pub fn run(ctx: &Context, shot: PathBuf) -> anyhow::Result<()> {
    println!("Validating shot at: {}", shot.display());
    println!("  Version policy: {:?}", ctx.config.shot.version_policy);

    let project = ctx.project(None);
    let (file, warnings) = project.assembler().parse(&shot).map_err(|e| {
        anyhow::anyhow!("Failed to load shot [{}]: {e}", e.code())
    })?;

    let mut issues = Vec::new();
    for path in file.files.keys() {
        let absolute = ctx.root.join(path);
        match project.file_types().handler_for_path(&absolute) {
            Ok(handler) => {
                if !absolute.is_file() {
                    issues.push(format!("{path}: file missing"));
                } else if handler.kind() == FileKind::PointCache
                    && !shotkit_cache_exchange::point_cache::sidecar_exists(&absolute)
                {
                    issues.push(format!("{path}: no tag sidecar, tags will not be restored"));
                }
            }
            Err(e) => issues.push(format!("{path}: {e}")),
        }
    }
    for name in file.overrides.keys() {
        if let Err(e) = project.overrides().get(name) {
            issues.push(format!("{name}: {e}"));
        }
    }

    print_warnings(warnings.iter());
    if issues.is_empty() {
        println!("\nShot is valid.");
    } else {
        println!("\nValidation issues:");
        for issue in &issues {
            println!("  - {issue}");
        }
        println!(
            "\n{} issue(s) found. Shot will load partially.",
            issues.len()
        );
    }
    Ok(())
}
