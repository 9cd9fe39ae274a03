//! CLI command for adding one file to an archive.

use std::fs;
use std::path::Path;

use mmlod::archive::Archive;

pub fn execute(archive_path: &Path, file: &Path) -> anyhow::Result<()> {
    let data = fs::read(file)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", file.display()))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow::anyhow!("{} has no file name", file.display()))?;

    let mut archive = Archive::open(archive_path)?;
    archive.add(&name, data, true)?;
    archive.rebuild()?;

    println!("Added: {name}");
    println!("Archive saved: {}", archive_path.display());
    Ok(())
}
