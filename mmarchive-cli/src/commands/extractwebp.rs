//! CLI command for extracting DEFs as animated images.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use mmlod::archive::{Archive, EntryKind};
use mmlod::compose::{compose_def, ComposeOptions, CropMode, ShadowMode};
use mmlod::config::DefConfig;
use mmlod::def::DefSprite;
use mmlod::hdl;
use walkdir::WalkDir;

use crate::sink::ApngSink;

use super::{default_output, path_extension, path_stem};

pub struct Args {
    pub source: PathBuf,
    pub output: Option<PathBuf>,
    pub no_crop: Option<Option<String>>,
    pub individual_crop: bool,
    pub hota: bool,
    pub hdl_structure: bool,
    pub shadow_in_main: bool,
    pub strict_errors: bool,
    pub config: Option<PathBuf>,
}

pub fn execute(args: Args) -> anyhow::Result<()> {
    let config: DefConfig = match &args.config {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => DefConfig::default(),
    };

    let mut options = ComposeOptions {
        shadow: if args.shadow_in_main {
            ShadowMode::ShadowInMain
        } else {
            ShadowMode::SeparateShadow
        },
        crop: if args.individual_crop {
            CropMode::Individual
        } else {
            CropMode::Predefined
        },
        no_crop_types: BTreeSet::new(),
        hota_palette: args.hota || args.source.to_string_lossy().contains("HotA"),
        hota_names: args.hota,
    };
    match &args.no_crop {
        Some(Some(types)) => {
            options.no_crop_types = types
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        Some(None) => options.crop = CropMode::None,
        None => {}
    }

    let out_root = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.source, "_webp"));

    if args.hdl_structure {
        return extract_hdl_dir(&args, &config, &options, &out_root);
    }

    match path_extension(&args.source).as_str() {
        "def" => {
            println!("Extracting DEF as animation to: {}", out_root.display());
            let sprite = DefSprite::parse(fs::read(&args.source)?)?;
            let def_name = path_stem(&args.source);
            let def_dir = out_root.join(&def_name);
            fs::create_dir_all(&def_dir)?;
            let mut sink = ApngSink::new(def_dir);
            compose_def(&sprite, &def_name, &config, &options, &mut sink)?;
            Ok(())
        }
        _ if args.source.is_dir() => extract_def_dir(&args, &config, &options, &out_root),
        _ => extract_archive(&args, &config, &options, &out_root),
    }
}

fn extract_archive(
    args: &Args,
    config: &DefConfig,
    options: &ComposeOptions,
    out_root: &Path,
) -> anyhow::Result<()> {
    let mut archive = Archive::open(&args.source)?;
    archive.set_tolerant(!args.strict_errors);

    println!("Extracting DEF files as animations to: {}", out_root.display());
    let lod_dir = out_root.join(path_stem(&args.source));
    fs::create_dir_all(&lod_dir)?;

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

        let result = (|| -> mmlod::Result<()> {
            let def_name = mmlod::utils::name_stem(&name).to_string();
            let sprite = DefSprite::parse(archive.entry_data(i)?)?;
            let def_dir = lod_dir.join(&def_name);
            fs::create_dir_all(&def_dir)?;
            let mut sink = ApngSink::new(def_dir);
            compose_def(&sprite, &def_name, config, options, &mut sink)
        })();

        match result {
            Ok(()) => {}
            Err(e) if args.strict_errors => return Err(e.into()),
            Err(e) => eprintln!("Error processing {name}: {e}"),
        }
    }

    if def_count == 0 {
        println!("No DEF files found in archive");
    } else {
        println!("Animation extraction complete: {def_count} DEF files processed");
    }
    Ok(())
}

fn extract_def_dir(
    args: &Args,
    config: &DefConfig,
    options: &ComposeOptions,
    out_root: &Path,
) -> anyhow::Result<()> {
    println!("Scanning {} for DEF files...", args.source.display());
    let mut processed = 0usize;
    for entry in WalkDir::new(&args.source).sort_by_file_name() {
        let entry = entry.map_err(|e| anyhow::anyhow!("directory walk failed: {e}"))?;
        if !entry.file_type().is_file() || path_extension(entry.path()) != "def" {
            continue;
        }
        processed += 1;
        let def_name = path_stem(entry.path());

        let result = (|| -> mmlod::Result<()> {
            let sprite = DefSprite::parse(fs::read(entry.path())?)?;
            let def_dir = out_root.join(&def_name);
            fs::create_dir_all(&def_dir)?;
            let mut sink = ApngSink::new(def_dir);
            compose_def(&sprite, &def_name, config, options, &mut sink)
        })();

        match result {
            Ok(()) => {}
            Err(e) if args.strict_errors => return Err(e.into()),
            Err(e) => eprintln!("Error processing {def_name}: {e}"),
        }
    }
    if processed == 0 {
        println!("No DEF files found");
    }
    Ok(())
}

fn extract_hdl_dir(
    args: &Args,
    config: &DefConfig,
    options: &ComposeOptions,
    out_root: &Path,
) -> anyhow::Result<()> {
    if !args.source.is_dir() {
        return Err(mmlod::Error::Usage(
            "--hdl-structure requires a directory path".into(),
        )
        .into());
    }

    println!("Scanning {} for HDL files...", args.source.display());
    let mut hdl_files: Vec<PathBuf> = fs::read_dir(&args.source)?
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| path_extension(p) == "hdl")
        .collect();
    hdl_files.sort();

    if hdl_files.is_empty() {
        println!("No HDL files found");
        return Ok(());
    }
    println!("Found {} HDL files", hdl_files.len());

    for hdl_path in &hdl_files {
        let def_name = path_stem(hdl_path);
        let out_dir = out_root.join(&def_name);
        fs::create_dir_all(&out_dir)?;
        let mut sink = ApngSink::new(out_dir);
        match hdl::compose_from_hdl(hdl_path, config, options, &mut sink) {
            Ok(()) => {}
            Err(e) if args.strict_errors => return Err(e.into()),
            Err(e) => eprintln!("Error processing {def_name}: {e}"),
        }
    }
    Ok(())
}
