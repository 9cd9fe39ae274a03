//! CLI command for listing archive contents.

use std::path::Path;

use mmlod::archive::Archive;

pub fn execute(path: &Path, filter: Option<&str>) -> anyhow::Result<()> {
    let archive = Archive::open(path)?;

    println!("Archive: {}", path.display());
    println!("Archive type: {}", archive.flavour().as_str());
    println!("Files in archive: {}", archive.len());
    println!();
    println!("{:>8}  {:>10}  {:>10}  NAME", "KIND", "PACKED", "UNPACKED");

    let indices = archive.matching_indices(filter);
    for i in &indices {
        let Some(entry) = archive.entry(*i) else {
            continue;
        };
        println!(
            "{:>8}  {:>10}  {:>10}  {}",
            entry.kind.as_str(),
            entry.packed_size,
            entry.unpacked_size,
            entry.name
        );
    }
    if filter.is_some() {
        println!();
        println!("{} of {} entries matched", indices.len(), archive.len());
    }
    Ok(())
}
