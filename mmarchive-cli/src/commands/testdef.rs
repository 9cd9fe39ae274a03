//! CLI command for validating DEF files without writing output.

use std::fs;
use std::path::Path;

use mmlod::archive::{Archive, EntryKind};
use mmlod::def::DefSprite;
use walkdir::WalkDir;

use super::{path_extension, path_stem};

pub fn execute(source: &Path, strict_errors: bool) -> anyhow::Result<()> {
    let mut tested = 0usize;
    let mut failed = 0usize;

    if path_extension(source) == "def" {
        println!("Testing DEF file: {}", source.display());
        match test_def_bytes(fs::read(source)?) {
            Ok((frames, groups)) => {
                println!("DEF file valid: {frames} frames, {groups} groups");
            }
            Err(e) => {
                if strict_errors {
                    return Err(e.into());
                }
                eprintln!("{}: {e}", path_stem(source));
                failed += 1;
            }
        }
        tested = 1;
    } else if source.is_dir() {
        for entry in WalkDir::new(source).sort_by_file_name() {
            let entry = entry.map_err(|e| anyhow::anyhow!("directory walk failed: {e}"))?;
            if !entry.file_type().is_file() || path_extension(entry.path()) != "def" {
                continue;
            }
            tested += 1;
            if let Err(e) = test_def_bytes(fs::read(entry.path())?) {
                if strict_errors {
                    return Err(e.into());
                }
                eprintln!("{}: {e}", path_stem(entry.path()));
                failed += 1;
            }
        }
    } else {
        let mut archive = Archive::open(source)?;
        archive.set_tolerant(!strict_errors);
        println!("Testing DEF files in archive: {} total files", archive.len());

        for i in 0..archive.len() {
            let Some(entry) = archive.entry(i) else {
                continue;
            };
            if entry.kind != EntryKind::Def {
                continue;
            }
            let name = entry.name.clone();
            tested += 1;
            let result = archive.entry_data(i).and_then(test_def_bytes);
            if let Err(e) = result {
                if strict_errors {
                    return Err(e.into());
                }
                eprintln!("{name}: {e}");
                failed += 1;
            }
        }
    }

    println!();
    println!("Testing complete: {tested} DEF files tested, {failed} errors");
    Ok(())
}

/// Parse a DEF and decode every frame, reporting the first failure.
fn test_def_bytes(data: Vec<u8>) -> mmlod::Result<(usize, usize)> {
    let sprite = DefSprite::parse(data)?;
    for (g, f) in sprite.frame_indices() {
        sprite.frame(g, f)?;
    }
    Ok((sprite.frames_total(), sprite.groups.len()))
}
