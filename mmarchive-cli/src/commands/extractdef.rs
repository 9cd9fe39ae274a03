//! CLI command for extracting DEFs into the DefTool exchange layout.

use std::fs;
use std::path::{Path, PathBuf};

use mmlod::archive::{Archive, EntryKind};
use mmlod::def::DefSprite;
use mmlod::hdl;

use super::{default_output, path_extension, path_stem};

pub fn execute(
    source: &Path,
    output: Option<PathBuf>,
    no_shadow: bool,
    in_24_bits: bool,
    strict_errors: bool,
) -> anyhow::Result<()> {
    let out_dir = output.unwrap_or_else(|| default_output(source, "_deftool"));
    let external_shadow = !no_shadow;

    if path_extension(source) == "def" {
        println!("Extracting DEF for DefTool to: {}", out_dir.display());
        fs::create_dir_all(&out_dir)?;
        let sprite = DefSprite::parse(fs::read(source)?)?;
        let hdl_path = out_dir.join(format!("{}.hdl", path_stem(source)));
        let errors = hdl::write_deftool_list(&sprite, &hdl_path, external_shadow, in_24_bits)?;
        report_errors(&path_stem(source), &errors, strict_errors)?;
        println!("Extracted DEF: {}", source.display());
        return Ok(());
    }

    let mut archive = Archive::open(source)?;
    archive.set_tolerant(!strict_errors);
    println!("Archive loaded: {} files found", archive.len());
    println!("Extracting DEF files for DefTool to: {}", out_dir.display());

    let mut def_count = 0usize;
    for i in 0..archive.len() {
        let Some(entry) = archive.entry(i) else {
            continue;
        };
        if entry.kind != EntryKind::Def {
            continue;
        }
        let name = entry.name.clone();
        def_count += 1;

        let result = (|| -> mmlod::Result<Vec<String>> {
            let stem = mmlod::utils::name_stem(&name).to_string();
            let extract_dir = out_dir.join(&stem);
            fs::create_dir_all(&extract_dir)?;
            let sprite = DefSprite::parse(archive.entry_data(i)?)?;
            let hdl_path = extract_dir.join(format!("{stem}.hdl"));
            hdl::write_deftool_list(&sprite, &hdl_path, external_shadow, in_24_bits)
        })();

        match result {
            Ok(errors) => {
                report_errors(&name, &errors, strict_errors)?;
                println!("Extracted DEF: {name}");
            }
            Err(e) if strict_errors => return Err(e.into()),
            Err(e) => eprintln!("Error extracting {name}: {e}"),
        }
    }

    if def_count == 0 {
        println!("No DEF files found in archive");
    }
    println!("DEF extraction complete.");
    Ok(())
}

fn report_errors(name: &str, errors: &[String], strict_errors: bool) -> anyhow::Result<()> {
    for error in errors {
        eprintln!("{name}: {error}");
    }
    if strict_errors && !errors.is_empty() {
        return Err(mmlod::Error::InvalidDef(format!("{name}: {}", errors[0])).into());
    }
    Ok(())
}
