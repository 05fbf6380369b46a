//! Print a JSON file with includes expanded.

use std::path::PathBuf;

use shotkit_project_model::build_json_include;

pub fn run(dir: PathBuf, file: PathBuf) -> anyhow::Result<()> {
    let value = build_json_include(&dir, &file)
        .map_err(|e| anyhow::anyhow!("Failed to expand {}: {e}", file.display()))?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
