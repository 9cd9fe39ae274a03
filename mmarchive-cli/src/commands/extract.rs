//! CLI command for extracting archive entries to files.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use mmlod::archive::{Archive, ArchiveFlavour, LodVersion};
use mmlod::pixels::Palette;
use mmlod::utils::write_atomic;

use super::default_output;

pub fn execute(
    path: &Path,
    output: Option<PathBuf>,
    filter: Option<&str>,
    strict_errors: bool,
    raw: bool,
) -> anyhow::Result<()> {
    let mut archive = Archive::open(path)?;
    archive.set_tolerant(!strict_errors);

    let out_dir = output.unwrap_or_else(|| default_output(path, ""));
    fs::create_dir_all(&out_dir)?;

    // Sprites resolve their palettes in a sibling bitmaps archive.
    let mut bitmaps = if archive.flavour() == ArchiveFlavour::Lod(LodVersion::Sprites) {
        open_sibling_bitmaps(path)
    } else {
        None
    };

    let indices = archive.matching_indices(filter);
    println!("Extracting {} entries to {}", indices.len(), out_dir.display());

    let mut written = 0usize;
    for i in indices {
        let Some(entry) = archive.entry(i) else {
            continue;
        };
        let name = entry.name.clone();
        match extract_one(&mut archive, bitmaps.as_mut(), i, &out_dir, raw) {
            Ok(file_name) => {
                println!("Extracted: {file_name}");
                written += 1;
            }
            Err(e) if strict_errors => return Err(e.into()),
            Err(e) => eprintln!("Error extracting {name}: {e}"),
        }
    }
    println!("Extraction complete: {written} files");
    Ok(())
}

fn open_sibling_bitmaps(path: &Path) -> Option<Archive<File>> {
    let candidate = path.parent()?.join("bitmaps.lod");
    match Archive::open(&candidate) {
        Ok(archive) => Some(archive),
        Err(e) => {
            tracing::warn!(path = %candidate.display(), error = %e, "no bitmaps archive for sprite palettes");
            None
        }
    }
}

fn extract_one(
    archive: &mut Archive<File>,
    bitmaps: Option<&mut Archive<File>>,
    index: usize,
    out_dir: &Path,
    raw: bool,
) -> mmlod::Result<String> {
    let out_name = archive.extract_name(index)?;

    if !raw && out_name.ends_with(".bmp") {
        let decoded = if archive.flavour() == ArchiveFlavour::Lod(LodVersion::Sprites) {
            sprite_image(archive, bitmaps, index)
        } else {
            archive.extract_image(index)
        };
        // A sprite without its palette archive still extracts raw.
        let image = match decoded {
            Ok(image) => image,
            Err(mmlod::Error::PaletteMissing(pal)) => {
                tracing::warn!(palette = pal, "palette unavailable, extracting raw");
                None
            }
            Err(e) => return Err(e),
        };
        if let Some(image) = image {
            write_atomic(&out_dir.join(&out_name), &image.to_bmp())?;
            return Ok(out_name);
        }
    }

    // Raw fallback keeps the entry's own name.
    let entry_name = archive
        .entry(index)
        .map(|e| e.name.clone())
        .unwrap_or_else(|| out_name.clone());
    let file_name = if raw || out_name.ends_with(".bmp") {
        entry_name
    } else {
        out_name
    };
    let bytes = archive.entry_data(index)?;
    write_atomic(&out_dir.join(&file_name), &bytes)?;
    Ok(file_name)
}

fn sprite_image(
    archive: &mut Archive<File>,
    bitmaps: Option<&mut Archive<File>>,
    index: usize,
) -> mmlod::Result<Option<mmlod::pixels::PixelImage>> {
    let pal_id = archive.sprite_palette_id(index)?;
    let palette: Palette = match bitmaps {
        Some(bitmaps) => bitmaps.load_palette(pal_id)?,
        None => return Err(mmlod::Error::PaletteMissing(format!("pal{pal_id:03}"))),
    };
    Ok(Some(archive.extract_sprite_image(index, &palette)?))
}
